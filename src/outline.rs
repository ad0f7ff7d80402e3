//! Outline generation: prompt the LLM, then coax its reply into slide content.
//!
//! Model output is rarely clean JSON. Parsing degrades step by step: the whole
//! cleaned text, the outermost array, individual objects, and finally a
//! line-based reading of a plain-text outline.

use crate::analyzer::{metadata_path, TemplateMetadata};
use crate::error::PptError;
use crate::images::ImageService;
use crate::knowledge::KnowledgeRetriever;
use crate::llm::{LlmConfig, SharedLlmClient};
use crate::model::{ImageRef, Keypoint, SlideContent};
use crate::prompts::{outline_prompt, PromptRequest};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^根据.*?信息.*?[，,。]",
        r"^假设.*?[，,。]",
        r"^以下是.*?[，,。]",
        r"^---+$",
        r"^#+\s*",
        r"^\s*PPT大纲[:：]?",
        r"^\s*PPT标题[:：]?",
        r"^\s*扩写[:：]?",
        r"^\s*扩写完成[:：]?",
        r"^\s*AI生成进度[:：]?",
        r"^\s*图片检索失败",
        r"^\s*AI图片生成失败",
        r"^\s*图片获取失败",
        r"^\s*WebSocket.*?失败",
        r"^\s*未生成PPT",
        r"^\s*PPT生成完成",
        r"^\s*发送给PPT生成的outline",
        r"^\s*\d+\s*[:：]",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(第[一二三四五六七八九十]+[章节]|章节\d+|\d+[\.、]|#{1,6}\s)").unwrap()
});
static NUMBER_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[\.、]\s*").unwrap());
static HEADING_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}\s").unwrap());
static BULLET_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-•*]\s*").unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());
static ARRAY_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").unwrap());
static OBJECT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").unwrap());

/// Default when the page request is missing or unreadable.
pub const DEFAULT_PAGES: usize = 8;

/// Target slide count from the user's `pages` field.
pub fn page_count(pages: &Value) -> usize {
    match pages {
        Value::String(s) => match s.trim() {
            "精简" => 5,
            "详细" => 12,
            digits if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => digits
                .parse::<usize>()
                .map(|n| n.clamp(3, 20))
                .unwrap_or(20),
            _ => DEFAULT_PAGES,
        },
        Value::Number(n) => match n.as_i64() {
            Some(n) => n.clamp(3, 20) as usize,
            None => DEFAULT_PAGES,
        },
        _ => DEFAULT_PAGES,
    }
}

/// Drops filler lines the model likes to add around its answer.
pub fn filter_irrelevant(text: &str) -> String {
    text.split('\n')
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !NOISE_PATTERNS.iter().any(|p| p.is_match(trimmed))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalises text that should hold a JSON array into something parseable.
pub fn clean_json_text(text: &str) -> String {
    let mut clean = text.trim();
    if let (Some(start), Some(end)) = (clean.find('['), clean.rfind(']')) {
        if end > start {
            clean = &clean[start..=end];
        }
    }
    let replaced = clean
        .replace('π', "pi")
        .replace('√', "sqrt")
        .replace('∞', "infinity")
        .replace('°', "度")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2026}', "...");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    TRAILING_COMMA.replace_all(&collapsed, "$1").into_owned()
}

fn keypoints_slide(title: &str, content: &str, points: Vec<String>, objective: &str) -> Value {
    json!({
        "type": "keypoints",
        "title": title,
        "content": content,
        "keypoints": points,
        "difficulties": [],
        "objective": objective,
        "layout": "keypoints",
        "color": "蓝色科技风",
    })
}

/// Reads a chapter/bullet/paragraph text outline into slide objects.
pub fn parse_outline_text(text: &str) -> Vec<Value> {
    let mut slides: Vec<Value> = Vec::new();
    // Index of the slide opened by the last chapter line.
    let mut chapter: Option<usize> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if CHAPTER.is_match(line) {
            let stripped = NUMBER_PREFIX.replace(line, "");
            let title = HEADING_PREFIX.replace(&stripped, "");
            slides.push(keypoints_slide(&title, "", Vec::new(), "掌握相关概念和应用"));
            chapter = Some(slides.len() - 1);
        } else if BULLET_PREFIX.is_match(line) {
            let point = BULLET_PREFIX.replace(line, "");
            let point = NUMBER_PREFIX.replace(&point, "").into_owned();
            if let Some(i) = chapter {
                if let Some(points) = slides[i]["keypoints"].as_array_mut() {
                    points.push(Value::String(point));
                }
            } else {
                let title = format!("要点 {}", slides.len() + 1);
                slides.push(keypoints_slide(&title, &point, vec![point.clone()], "理解要点内容"));
            }
        } else if line.chars().count() > 10 {
            let open_chapter = chapter.filter(|&i| slides[i]["content"].as_str() == Some(""));
            match open_chapter {
                Some(i) => slides[i]["content"] = Value::String(line.to_string()),
                None => {
                    let mut title: String = line.chars().take(20).collect();
                    if line.chars().count() > 20 {
                        title.push_str("...");
                    }
                    slides.push(keypoints_slide(&title, line, vec![line.to_string()], "理解相关内容"));
                }
            }
        }
    }

    if slides.is_empty() {
        slides.push(json!({
            "type": "cover",
            "title": "课件标题",
            "content": "课件内容描述",
            "keypoints": ["要点1", "要点2", "要点3"],
            "difficulties": ["重难点1"],
            "objective": "学习目标",
            "layout": "cover",
            "color": "蓝色科技风",
        }));
    }
    slides
}

fn is_empty_outline(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Parses model output into a list of raw slide objects.
pub fn parse_llm_output(text: &str) -> Vec<Value> {
    let cleaned = clean_json_text(text);
    let parsed = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) if !is_empty_outline(&value) => Some(value),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "direct JSON parse failed");
            None
        }
    };

    let parsed = parsed.or_else(|| {
        let span = ARRAY_SPAN.find(&cleaned)?;
        match serde_json::from_str::<Value>(&clean_json_text(span.as_str())) {
            Ok(value) if !is_empty_outline(&value) => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "array span parse failed");
                None
            }
        }
    });

    let parsed = parsed.or_else(|| {
        let objects: Vec<Value> = OBJECT_SPAN
            .find_iter(&cleaned)
            .filter_map(|m| match serde_json::from_str::<Value>(m.as_str()) {
                Ok(value @ Value::Object(_)) if !is_empty_outline(&value) => Some(value),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, "skipping unparseable object");
                    None
                }
            })
            .collect();
        (!objects.is_empty()).then_some(Value::Array(objects))
    });

    match parsed {
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
        None => {
            warn!("no JSON found in model output, reading it as a text outline");
            parse_outline_text(text)
        }
    }
}

/// Converts raw slide objects into content, skipping anything that is not an object.
pub fn slides_from_values(raw: &[Value]) -> Vec<SlideContent> {
    raw.iter()
        .filter_map(|value| {
            if !value.is_object() {
                warn!(value = %value, "skipping non-object slide");
                return None;
            }
            match serde_json::from_value::<SlideContent>(value.clone()) {
                Ok(slide) => Some(slide),
                Err(e) => {
                    warn!(error = %e, "skipping malformed slide");
                    None
                }
            }
        })
        .collect()
}

/// Prepares a client-supplied outline for rendering.
pub fn preprocess_outline(raw: &[Value], topic: &str, default_layout: &str) -> Vec<SlideContent> {
    slides_from_values(raw)
        .into_iter()
        .map(|mut slide| {
            if slide.title.trim().is_empty() && slide.content.trim().is_empty() {
                slide.title = if topic.trim().is_empty() {
                    "未命名幻灯片".to_string()
                } else {
                    topic.to_string()
                };
            }
            if slide.layout.is_none() {
                slide.layout = Some(default_layout.to_string());
            }
            slide
        })
        .collect()
}

/// Adds a cover and a summary if missing, numbers keypoints, and attaches
/// teaching notes to body slides.
pub fn enhance_for_education(
    slides: Vec<SlideContent>,
    topic: &str,
    subject: &str,
) -> Vec<SlideContent> {
    if slides.is_empty() {
        return slides;
    }
    let has_cover = slides.iter().any(|s| s.kind_is("cover") || s.layout_is("cover"));
    let has_summary = slides.iter().any(|s| s.kind_is("conclusion") || s.kind_is("summary"));

    let mut out = Vec::with_capacity(slides.len() + 2);
    if !has_cover {
        out.push(
            SlideContent::new(topic, format!("教学课件 - {}", subject))
                .with_kind("cover")
                .with_layout("cover"),
        );
    }

    for mut slide in slides {
        if !slide.keypoints.is_empty() {
            slide.keypoints = slide
                .keypoints
                .iter()
                .enumerate()
                .map(|(i, point)| match point {
                    Keypoint::Item { text, level } => Keypoint::Item {
                        text: format!("<strong>{}.</strong> {}", i + 1, text),
                        level: *level,
                    },
                    other => Keypoint::Text(format!("<strong>{}.</strong> {}", i + 1, other.text())),
                })
                .collect();
        }
        if !slide.kind_is("cover") && !slide.kind_is("conclusion") && slide.note.is_none() {
            let title = if slide.title.is_empty() { "知识点" } else { slide.title.as_str() };
            slide.note = Some(format!(
                "教学提示：引导学生理解{}的关键概念，讨论相关应用。",
                title
            ));
        }
        out.push(slide);
    }

    if !has_summary {
        out.push(
            SlideContent::new(format!("{} - 总结", topic), "本节课程要点回顾")
                .with_kind("conclusion")
                .with_layout("summary")
                .with_keypoints(["掌握核心概念", "理解应用场景", "完成相关练习"]),
        );
    }
    out
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    })
}

/// Parameters of an outline request, as sent by the front end.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutlineRequest {
    pub topic: String,
    pub background: Option<String>,
    pub pages: Value,
    pub role: Option<String>,
    pub scene: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub deep_think: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub web_search: bool,
    pub template: Option<String>,
    pub subject: Option<String>,
    /// Reference material supplied by the caller; skips knowledge lookup.
    pub enhanced_context: Option<String>,
}

impl OutlineRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }
}

pub struct OutlineGenerator {
    llm: SharedLlmClient,
    knowledge: Option<Arc<KnowledgeRetriever>>,
    images: Option<Arc<ImageService>>,
    template_dir: Option<PathBuf>,
}

impl OutlineGenerator {
    pub fn new(llm: SharedLlmClient) -> Self {
        Self {
            llm,
            knowledge: None,
            images: None,
            template_dir: None,
        }
    }

    pub fn with_knowledge(mut self, knowledge: Arc<KnowledgeRetriever>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_images(mut self, images: Arc<ImageService>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    fn template_desc(&self, template: Option<&str>) -> Option<String> {
        let template = template.filter(|t| !t.trim().is_empty())?;
        let path = metadata_path(&self.template_dir.as_ref()?.join(template));
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<TemplateMetadata>(&text) {
            Ok(meta) => Some(meta.desc).filter(|d| !d.is_empty()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable template description");
                None
            }
        }
    }

    fn reference_material(&self, request: &OutlineRequest) -> Option<String> {
        if let Some(context) = request.enhanced_context.as_deref().filter(|c| !c.trim().is_empty()) {
            return Some(context.to_string());
        }
        let knowledge = self.knowledge.as_ref()?;
        let context = knowledge.relevant_content(&request.topic, request.subject.as_deref(), 2000);
        info!(chars = context.chars().count(), "knowledge base context retrieved");
        Some(context).filter(|c| !c.trim().is_empty())
    }

    pub async fn generate(&self, request: &OutlineRequest) -> Result<Vec<SlideContent>, PptError> {
        if request.topic.trim().is_empty() {
            return Err(PptError::InvalidRequest("缺少主题".to_string()));
        }
        let pages = page_count(&request.pages);
        info!(topic = %request.topic, pages, deep_think = request.deep_think, "generating outline");

        let template_desc = self.template_desc(request.template.as_deref());
        let context = self.reference_material(request);
        let prompt = outline_prompt(
            &PromptRequest {
                topic: &request.topic,
                pages,
                background: request.background.as_deref(),
                role: request.role.as_deref(),
                scene: request.scene.as_deref(),
                template_desc: template_desc.as_deref(),
            },
            context.as_deref(),
        );

        let config = LlmConfig::for_outline(request.deep_think);
        let reply = self.llm.complete_with_config(&prompt, &config).await?;
        info!(chars = reply.chars().count(), "outline reply received");

        let filtered = filter_irrelevant(&reply);
        let mut slides = slides_from_values(&parse_llm_output(&filtered));
        info!(slides = slides.len(), "outline parsed");

        if request.web_search {
            self.attach_images(&mut slides, &request.topic).await;
        }
        Ok(slides)
    }

    /// Resolves image descriptions to URLs through the image search.
    async fn attach_images(&self, slides: &mut [SlideContent], topic: &str) {
        let Some(images) = &self.images else {
            debug!("web search requested without an image service");
            return;
        };
        for (i, slide) in slides.iter_mut().enumerate() {
            let Some(ImageRef::Description(desc)) = &slide.image else {
                continue;
            };
            let query = format!("{} {} {}", topic, slide.title, desc);
            info!(slide = i + 1, query = %query, "searching slide image");
            if let Some(url) = images.search_image(&query, 1).await.into_iter().next() {
                slide.image = Some(ImageRef::Url(url));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&json!("精简")), 5);
        assert_eq!(page_count(&json!("详细")), 12);
        assert_eq!(page_count(&json!("1")), 3);
        assert_eq!(page_count(&json!("15")), 15);
        assert_eq!(page_count(&json!(50)), 20);
        assert_eq!(page_count(&json!("多一点")), 8);
        assert_eq!(page_count(&Value::Null), 8);
    }

    #[test]
    fn test_filter_irrelevant() {
        let text = "以下是为您生成的大纲，请查收。\n## 第一部分\n[{\"title\":\"a\"}]\n\n1: 多余\nPPT生成完成";
        assert_eq!(filter_irrelevant(text), "[{\"title\":\"a\"}]");
    }

    #[test]
    fn test_clean_json_text() {
        let text = "好的：\n[{\u{201C}title\u{201D}: \u{201C}圆周率π\u{201D},}, ]\n谢谢";
        assert_eq!(clean_json_text(text), "[{\"title\": \"圆周率pi\"}]");
    }

    #[test]
    fn test_parse_llm_output_fallbacks() {
        let direct = parse_llm_output(r#"[{"title":"a"},{"title":"b"}]"#);
        assert_eq!(direct.len(), 2);

        let single = parse_llm_output(r#"{"title":"only"}"#);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0]["title"], "only");

        let objects = parse_llm_output(r#"slide {"title":"x"} and {"title":"y", "k": {"a": 1}} done"#);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1]["title"], "y");
    }

    #[test]
    fn test_parse_outline_text() {
        let text = "第一章 细胞的结构\n细胞是生物体结构和功能的基本单位。\n- 细胞膜\n- 细胞核\n2. 细胞的功能\n• 物质交换";
        let slides = parse_outline_text(text);
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0]["title"], "第一章 细胞的结构");
        assert_eq!(slides[0]["content"], "细胞是生物体结构和功能的基本单位。");
        assert_eq!(slides[0]["keypoints"], json!(["细胞膜", "细胞核"]));
        assert_eq!(slides[1]["title"], "细胞的功能");
        assert_eq!(slides[1]["keypoints"], json!(["物质交换"]));
        assert_eq!(slides[1]["color"], "蓝色科技风");
    }

    #[test]
    fn test_parse_outline_text_defaults() {
        let slides = parse_outline_text("短");
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0]["type"], "cover");

        let loose = parse_outline_text("- 孤立的要点");
        assert_eq!(loose[0]["title"], "要点 1");
    }

    #[test]
    fn test_preprocess_outline() {
        let raw = vec![json!({"title": "", "content": ""}), json!("noise"), json!({"title": 3})];
        let slides = preprocess_outline(&raw, "光合作用", "keypoints");
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].title, "光合作用");
        assert_eq!(slides[1].title, "3");
        assert!(slides[1].layout_is("keypoints"));
    }

    #[test]
    fn test_enhance_for_education() {
        let slides = vec![SlideContent::new("细胞膜", "").with_keypoints(["选择透过性"])];
        let out = enhance_for_education(slides, "细胞", "生物");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].content, "教学课件 - 生物");
        assert_eq!(out[1].keypoints[0].text(), "<strong>1.</strong> 选择透过性");
        assert!(out[1].note.as_deref().unwrap_or_default().contains("细胞膜"));
        assert_eq!(out[2].title, "细胞 - 总结");
        assert!(out[2].kind_is("conclusion"));
    }
}
