//! Template analysis and the JSON metadata sidecar.

use crate::classify::{text_role, Role};
use crate::error::PptError;
use crate::model::ContentType;
use crate::package::PptxPackage;
use crate::slide::{
    layout_name, load_slide, Shape, ShapeKind, PH_CHART, PH_PICTURE, PH_TABLE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub slide_count: usize,
    pub slide_width: i64,
    pub slide_height: i64,
    #[serde(default)]
    pub suitable_for: BTreeMap<String, bool>,
    pub slides: Vec<SlideMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideMetadata {
    pub index: usize,
    #[serde(default)]
    pub layout_name: String,
    #[serde(default)]
    pub shapes: Vec<ShapeMetadata>,
    #[serde(default)]
    pub placeholders: Vec<PlaceholderMetadata>,
    #[serde(default)]
    pub has_title: bool,
    #[serde(default)]
    pub has_content: bool,
    #[serde(default)]
    pub has_image: bool,
    #[serde(default)]
    pub has_table: bool,
    #[serde(default)]
    pub has_chart: bool,
    #[serde(default)]
    pub suitable_for: Vec<String>,
}

impl SlideMetadata {
    pub fn supports(&self, content_type: ContentType) -> bool {
        let tag = content_type.as_str();
        self.suitable_for.iter().any(|t| {
            t == tag || (content_type == ContentType::Summary && t == "conclusion")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMetadata {
    #[serde(rename = "type")]
    pub shape_type: String,
    pub name: String,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub has_text: bool,
    pub text: String,
    pub is_title: bool,
    pub is_content: bool,
    pub is_image: bool,
    pub is_table: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<usize>,
    pub is_chart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_idx: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderMetadata {
    pub idx: u32,
    #[serde(rename = "type")]
    pub placeholder_type: u32,
    pub name: String,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub has_text: bool,
    pub text: String,
}

/// Sidecar location: `<dir>/<stem>.json`.
pub fn metadata_path(template: &Path) -> PathBuf {
    template.with_extension("json")
}

pub fn template_stem(template: &Path) -> String {
    template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string())
}

pub fn analyze_template(path: impl AsRef<Path>) -> Result<TemplateMetadata, PptError> {
    let path = path.as_ref();
    let package = PptxPackage::open(path)?;
    let name = template_stem(path);
    let mut metadata = analyze_package(&package, &name)?;
    metadata.desc = format!("{}模板", name);
    info!(
        template = %path.display(),
        slides = metadata.slide_count,
        "analyzed template"
    );
    Ok(metadata)
}

pub fn analyze_package(package: &PptxPackage, name: &str) -> Result<TemplateMetadata, PptError> {
    let size = package.slide_size();
    let parts = package.slide_parts()?;
    let count = parts.len();
    let mut slides = Vec::with_capacity(count);
    for (index, part) in parts.iter().enumerate() {
        let slide = load_slide(package, part)?;
        slides.push(describe_slide(
            index,
            count,
            layout_name(package, part),
            slide.shapes(),
            size,
        ));
    }
    let mut suitable_for = BTreeMap::new();
    for ct in ContentType::ALL {
        suitable_for.insert(
            ct.as_str().to_string(),
            slides.iter().any(|s| s.supports(ct)),
        );
    }
    Ok(TemplateMetadata {
        name: name.to_string(),
        desc: format!("{}模板", name),
        slide_count: count,
        slide_width: size.0,
        slide_height: size.1,
        suitable_for,
        slides,
    })
}

fn describe_slide(
    index: usize,
    count: usize,
    layout_name: String,
    shapes: &[Shape],
    size: (i64, i64),
) -> SlideMetadata {
    let mut meta = SlideMetadata {
        index,
        layout_name,
        shapes: Vec::new(),
        placeholders: Vec::new(),
        has_title: false,
        has_content: false,
        has_image: false,
        has_table: false,
        has_chart: false,
        suitable_for: Vec::new(),
    };
    for shape in shapes {
        let g = shape.geometry_or_default();
        let code = shape.placeholder_code();
        let role = shape.has_text_frame.then(|| text_role(shape, size));
        let is_image = shape.kind == ShapeKind::Picture || code == Some(PH_PICTURE);
        let is_table = shape.kind == ShapeKind::Table || code == Some(PH_TABLE);
        let is_chart = is_chart_shape(shape);
        let entry = ShapeMetadata {
            shape_type: shape.kind.as_str().to_string(),
            name: shape.name.clone(),
            left: g.x,
            top: g.y,
            width: g.cx,
            height: g.cy,
            has_text: shape.has_text_frame,
            text: shape.text(),
            is_title: role == Some(Role::Title),
            is_content: role == Some(Role::Content),
            is_image,
            is_table,
            rows: shape.table_size.map(|t| t.0),
            columns: shape.table_size.map(|t| t.1),
            is_chart,
            chart_type: shape.chart_type.clone(),
            placeholder_type: code,
            placeholder_idx: shape.placeholder.map(|p| p.idx),
        };
        meta.has_title |= entry.is_title;
        meta.has_content |= entry.is_content;
        meta.has_image |= is_image;
        meta.has_table |= is_table;
        meta.has_chart |= is_chart;
        if let Some(ph) = shape.placeholder {
            meta.placeholders.push(PlaceholderMetadata {
                idx: ph.idx,
                placeholder_type: ph.code,
                name: shape.name.clone(),
                left: g.x,
                top: g.y,
                width: g.cx,
                height: g.cy,
                has_text: shape.has_text_frame,
                text: entry.text.clone(),
            });
        }
        meta.shapes.push(entry);
    }
    meta.suitable_for = slide_tags(&meta, index, count);
    debug!(slide = index, tags = ?meta.suitable_for, "tagged slide");
    meta
}

/// Chart frames and `type="chart"` placeholders; code 13 is the slide number.
fn is_chart_shape(shape: &Shape) -> bool {
    shape.kind == ShapeKind::Chart || shape.placeholder_code() == Some(PH_CHART)
}

fn slide_tags(meta: &SlideMetadata, index: usize, count: usize) -> Vec<String> {
    if index == 0 {
        return vec!["cover".to_string()];
    }
    if index + 1 == count {
        return vec!["conclusion".to_string(), "summary".to_string()];
    }
    let mut tags = Vec::new();
    if meta.has_title && meta.has_content {
        tags.push("content".to_string());
        tags.push("keypoints".to_string());
    }
    if meta.has_image {
        tags.push("image".to_string());
    }
    if meta.has_table {
        tags.push("table".to_string());
    }
    if meta.has_chart {
        tags.push("chart".to_string());
    }
    tags
}

pub fn save_metadata(template: &Path, metadata: &TemplateMetadata) -> Result<PathBuf, PptError> {
    let path = metadata_path(template);
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Loads the sidecar, re-analysing when it is missing, unreadable or stale.
pub fn load_or_analyze(template: impl AsRef<Path>) -> Result<TemplateMetadata, PptError> {
    let template = template.as_ref();
    let sidecar = metadata_path(template);
    let fresh = match (modified(&sidecar), modified(template)) {
        (Some(json), Some(pptx)) => json >= pptx,
        (Some(_), None) => true,
        _ => false,
    };
    if fresh {
        match std::fs::read_to_string(&sidecar)
            .map_err(PptError::from)
            .and_then(|s| serde_json::from_str::<TemplateMetadata>(&s).map_err(PptError::from))
        {
            Ok(mut metadata) => {
                if metadata.desc.is_empty() {
                    metadata.desc = format!("{}模板", template_stem(template));
                }
                return Ok(metadata);
            }
            Err(e) => warn!(sidecar = %sidecar.display(), error = %e, "unreadable sidecar, re-analyzing"),
        }
    }
    let metadata = analyze_template(template)?;
    if let Err(e) = save_metadata(template, &metadata) {
        warn!(sidecar = %sidecar.display(), error = %e, "could not write sidecar");
    }
    Ok(metadata)
}

/// Analyses every `.pptx` in `dir`, skipping Office lock files.
pub fn analyze_all_templates(dir: impl AsRef<Path>) -> Result<Vec<TemplateMetadata>, PptError> {
    let mut results = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
        .flatten()
        .map(|e| e.path())
        .filter(|p| is_template_file(p))
        .collect();
    entries.sort();
    for path in entries {
        match analyze_template(&path).and_then(|m| save_metadata(&path, &m).map(|_| m)) {
            Ok(metadata) => results.push(metadata),
            Err(e) => warn!(template = %path.display(), error = %e, "template analysis failed"),
        }
    }
    Ok(results)
}

pub fn is_template_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    !name.starts_with("~$")
        && path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pptx"))
            .unwrap_or(false)
}

/// Picks the template slide to clone for a piece of content.
pub fn find_best_slide(
    metadata: Option<&TemplateMetadata>,
    content_type: ContentType,
    index: usize,
    slide_count: usize,
) -> usize {
    if slide_count == 0 {
        return 0;
    }
    if let Some(meta) = metadata {
        if let Some(slide) = meta
            .slides
            .iter()
            .find(|s| s.index < slide_count && s.supports(content_type))
        {
            return slide.index;
        }
    }
    match content_type {
        ContentType::Cover => 0,
        ContentType::Summary => slide_count - 1,
        _ if index < slide_count => index,
        _ => 1.min(slide_count - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slide::SlideXml;

    fn meta_with_tags(tags: &[&[&str]]) -> TemplateMetadata {
        TemplateMetadata {
            name: "t".into(),
            desc: String::new(),
            slide_count: tags.len(),
            slide_width: 1,
            slide_height: 1,
            suitable_for: BTreeMap::new(),
            slides: tags
                .iter()
                .enumerate()
                .map(|(i, t)| SlideMetadata {
                    index: i,
                    layout_name: String::new(),
                    shapes: vec![],
                    placeholders: vec![],
                    has_title: false,
                    has_content: false,
                    has_image: false,
                    has_table: false,
                    has_chart: false,
                    suitable_for: t.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_find_best_slide_without_metadata() {
        assert_eq!(find_best_slide(None, ContentType::Cover, 3, 5), 0);
        assert_eq!(find_best_slide(None, ContentType::Summary, 1, 5), 4);
        assert_eq!(find_best_slide(None, ContentType::Content, 2, 5), 2);
        assert_eq!(find_best_slide(None, ContentType::Content, 9, 5), 1);
        assert_eq!(find_best_slide(None, ContentType::Content, 9, 1), 0);
    }

    #[test]
    fn test_find_best_slide_by_tag() {
        let meta = meta_with_tags(&[&["cover"], &["content"], &["image"], &["conclusion", "summary"]]);
        assert_eq!(find_best_slide(Some(&meta), ContentType::Image, 1, 4), 2);
        assert_eq!(find_best_slide(Some(&meta), ContentType::Summary, 1, 4), 3);
        assert_eq!(find_best_slide(Some(&meta), ContentType::Table, 1, 4), 1);
    }

    #[test]
    fn test_chart_placeholder_tags_chart() {
        let slide = |ph: &str| {
            let xml = format!(
                concat!(
                    r#"<p:sld><p:cSld><p:spTree><p:nvGrpSpPr/><p:grpSpPr/>"#,
                    r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="p"/><p:cNvSpPr/><p:nvPr><p:ph {}/></p:nvPr></p:nvSpPr>"#,
                    r#"<p:spPr/><p:txBody><a:bodyPr/><a:p/></p:txBody></p:sp>"#,
                    r#"</p:spTree></p:cSld></p:sld>"#
                ),
                ph
            );
            let slide = SlideXml::parse(&xml).unwrap();
            describe_slide(1, 3, String::new(), slide.shapes(), (1000, 1000))
        };
        let chart = slide(r#"type="chart" idx="1""#);
        assert!(chart.has_chart);
        assert!(chart.suitable_for.contains(&"chart".to_string()));
        assert_eq!(chart.placeholders[0].placeholder_type, PH_CHART);

        let number = slide(r#"type="sldNum" idx="12""#);
        assert!(!number.has_chart);
        assert!(!number.suitable_for.contains(&"chart".to_string()));
    }

    #[test]
    fn test_lock_files_skipped() {
        assert!(is_template_file(Path::new("a/Deck.PPTX")));
        assert!(!is_template_file(Path::new("a/~$Deck.pptx")));
        assert!(!is_template_file(Path::new("a/deck.json")));
    }
}
