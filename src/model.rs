use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One slide worth of content as produced by the LLM or the outline parser.
///
/// Every field is optional on the wire and deserialization is lenient:
/// numbers become strings, a lone keypoint string becomes a one-element list,
/// and table cells of any scalar type are stringified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideContent {
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(deserialize_with = "lenient_keypoints", skip_serializing_if = "Vec::is_empty")]
    pub keypoints: Vec<Keypoint>,
    #[serde(deserialize_with = "lenient_image", skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(deserialize_with = "lenient_table", skip_serializing_if = "Option::is_none")]
    pub table: Option<TableData>,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(
        rename = "type",
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(deserialize_with = "lenient_string_list", skip_serializing_if = "Vec::is_empty")]
    pub difficulties: Vec<String>,
    #[serde(deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl SlideContent {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_keypoints<I, S>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keypoints = points
            .into_iter()
            .map(|p| Keypoint::Text(p.into()))
            .collect();
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_table(mut self, rows: Vec<Vec<String>>) -> Self {
        self.table = Some(TableData::Rows(rows));
        self
    }

    pub fn layout_is(&self, name: &str) -> bool {
        self.layout.as_deref() == Some(name)
    }

    pub fn kind_is(&self, name: &str) -> bool {
        self.kind.as_deref() == Some(name)
    }

    /// Keypoint texts flattened to plain strings.
    pub fn keypoint_texts(&self) -> Vec<String> {
        self.keypoints.iter().map(Keypoint::text).collect()
    }

    /// Determines what kind of slide this entry wants, given its position.
    pub fn content_type(&self, index: usize, total: usize) -> ContentType {
        if index == 0 || self.kind_is("cover") {
            ContentType::Cover
        } else if index + 1 == total
            || self.kind_is("summary")
            || self.kind_is("conclusion")
            || self.layout_is("summary")
        {
            ContentType::Summary
        } else if !self.keypoints.is_empty() {
            ContentType::Keypoints
        } else if self.table.is_some() {
            ContentType::Table
        } else if self.image.is_some() || self.layout_is("image") {
            ContentType::Image
        } else {
            ContentType::Content
        }
    }
}

/// A single bullet point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Keypoint {
    Text(String),
    Item { text: String, level: u32 },
    Group(Vec<String>),
}

impl Keypoint {
    pub fn text(&self) -> String {
        match self {
            Keypoint::Text(text) => text.clone(),
            Keypoint::Item { text, .. } => text.clone(),
            Keypoint::Group(items) => items.join(" - "),
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            Keypoint::Item { level, .. } => *level,
            _ => 0,
        }
    }

    fn from_value(value: &Value) -> Keypoint {
        match value {
            Value::Object(map) => {
                let text = map
                    .get("text")
                    .or_else(|| map.get("content"))
                    .map(value_to_string)
                    .unwrap_or_default();
                let level = map
                    .get("level")
                    .and_then(|l| l.as_u64().or_else(|| l.as_str()?.parse().ok()))
                    .unwrap_or(0) as u32;
                Keypoint::Item { text, level }
            }
            Value::Array(items) => Keypoint::Group(items.iter().map(value_to_string).collect()),
            other => Keypoint::Text(value_to_string(other)),
        }
    }
}

/// Where a slide's image comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ImageRef {
    Url(String),
    Path(String),
    Description(String),
}

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".bmp", ".webp"];

impl ImageRef {
    /// Classifies a raw string as a URL, a local path or a search description.
    pub fn parse(raw: &str) -> Option<ImageRef> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let lower = raw.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
        {
            Some(ImageRef::Url(raw.to_string()))
        } else if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            Some(ImageRef::Path(raw.to_string()))
        } else {
            Some(ImageRef::Description(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::Url(s) | ImageRef::Path(s) | ImageRef::Description(s) => s,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Url(s) => Some(s),
            _ => None,
        }
    }
}

/// Table content: either rows of cells or a pre-rendered HTML fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableData {
    Rows(Vec<Vec<String>>),
    Html(String),
}

impl TableData {
    pub fn rows(&self) -> Option<&[Vec<String>]> {
        match self {
            TableData::Rows(rows) => Some(rows),
            TableData::Html(_) => None,
        }
    }

    /// Column count of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows()
            .map(|rows| rows.iter().map(Vec::len).max().unwrap_or(0))
            .unwrap_or(0)
    }
}

/// Content category used to match slides against template tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Cover,
    Content,
    Keypoints,
    Image,
    Table,
    Chart,
    Summary,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Cover,
        ContentType::Content,
        ContentType::Keypoints,
        ContentType::Image,
        ContentType::Table,
        ContentType::Chart,
        ContentType::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Cover => "cover",
            ContentType::Content => "content",
            ContentType::Keypoints => "keypoints",
            ContentType::Image => "image",
            ContentType::Table => "table",
            ContentType::Chart => "chart",
            ContentType::Summary => "summary",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders any JSON scalar as the string a user would expect to see.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_string(&Value::deserialize(d)?))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let s = value_to_string(&Value::deserialize(d)?);
    Ok(if s.trim().is_empty() { None } else { Some(s) })
}

fn lenient_string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(value_to_string).collect(),
        other => vec![value_to_string(&other)],
    })
}

fn lenient_keypoints<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Keypoint>, D::Error> {
    Ok(keypoints_from_value(&Value::deserialize(d)?))
}

/// Coerces a raw `keypoints` value into a list of bullet points.
pub fn keypoints_from_value(value: &Value) -> Vec<Keypoint> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(Keypoint::from_value)
            .collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        other => vec![Keypoint::from_value(other)],
    }
}

fn lenient_image<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ImageRef>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => ImageRef::parse(&s),
        Value::Object(map) => {
            if let Some(url) = map.get("url").and_then(Value::as_str) {
                ImageRef::parse(url)
            } else {
                ["description", "desc", "keyword", "query"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .and_then(|s| {
                        let s = s.trim();
                        (!s.is_empty()).then(|| ImageRef::Description(s.to_string()))
                    })
            }
        }
        _ => None,
    })
}

fn lenient_table<'de, D: Deserializer<'de>>(d: D) -> Result<Option<TableData>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(TableData::Html(s)),
        Value::Array(rows) if !rows.is_empty() => Some(TableData::Rows(
            rows.iter()
                .map(|row| match row {
                    Value::Array(cells) => cells.iter().map(value_to_string).collect(),
                    other => vec![value_to_string(other)],
                })
                .collect(),
        )),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_fields() {
        let slide: SlideContent = serde_json::from_value(serde_json::json!({
            "title": 42,
            "content": null,
            "keypoints": "single",
            "table": [["a", 1], "loose"],
            "image": "https://example.com/x.png",
            "type": "cover",
            "unknown": true
        }))
        .unwrap();
        assert_eq!(slide.title, "42");
        assert_eq!(slide.content, "");
        assert_eq!(slide.keypoints, vec![Keypoint::Text("single".into())]);
        assert_eq!(
            slide.table,
            Some(TableData::Rows(vec![
                vec!["a".into(), "1".into()],
                vec!["loose".into()]
            ]))
        );
        assert!(matches!(slide.image, Some(ImageRef::Url(_))));
        assert!(slide.kind_is("cover"));
    }

    #[test]
    fn test_keypoint_shapes() {
        let points = keypoints_from_value(&serde_json::json!([
            "plain",
            {"text": "nested", "level": 1},
            ["a", "b"]
        ]));
        assert_eq!(points[0].text(), "plain");
        assert_eq!(points[1].level(), 1);
        assert_eq!(points[2].text(), "a - b");
    }

    #[test]
    fn test_image_ref_parse() {
        assert!(matches!(ImageRef::parse("photo.JPG"), Some(ImageRef::Path(_))));
        assert!(matches!(
            ImageRef::parse("细胞结构示意图"),
            Some(ImageRef::Description(_))
        ));
        assert_eq!(ImageRef::parse("  "), None);
    }

    #[test]
    fn test_content_type() {
        let slides = vec![
            SlideContent::new("a", ""),
            SlideContent::new("b", "").with_keypoints(["x"]),
            SlideContent::new("c", "").with_table(vec![vec!["1".into()]]),
            SlideContent::new("d", "").with_layout("image"),
            SlideContent::new("e", ""),
        ];
        let types: Vec<_> = slides
            .iter()
            .enumerate()
            .map(|(i, s)| s.content_type(i, slides.len()))
            .collect();
        assert_eq!(
            types,
            vec![
                ContentType::Cover,
                ContentType::Keypoints,
                ContentType::Table,
                ContentType::Image,
                ContentType::Summary
            ]
        );
    }
}
