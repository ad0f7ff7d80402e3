//! HTML-intermediate rendering: template slides become positioned HTML pages,
//! content is substituted in, a headless browser screenshots each page, and
//! the screenshots are assembled into a 16:9 deck.

use crate::analyzer::template_stem;
use crate::builder::{image_deck, WIDE_SIZE};
use crate::error::PptError;
use crate::images::ImageService;
use crate::model::{SlideContent, TableData};
use crate::package::PptxPackage;
use crate::slide::{
    load_slide, layout_name, Shape, ShapeKind, PH_BODY, PH_CENTER_TITLE, PH_OBJECT, PH_SUBTITLE,
    PH_TITLE,
};
use crate::xml::escape_xml;
use base64::prelude::*;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub const CANVAS_WIDTH: i64 = 1280;
pub const CANVAS_HEIGHT: i64 = 720;
pub const INFO_FILE: &str = "template_info.json";
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(30);
const BROWSER_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ESCAPED_STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;strong&gt;(.*?)&lt;/strong&gt;").unwrap());

const STYLE_CSS: &str = r#"body {
  margin: 0;
  padding: 0;
  font-family: "Microsoft YaHei", "PingFang SC", sans-serif;
}

.slide-container {
  position: relative;
  width: 1280px;
  height: 720px;
  margin: 0 auto;
  overflow: hidden;
  background: #ffffff;
}

.element {
  position: absolute;
  box-sizing: border-box;
}

h1, h2, h3, h4, h5, h6 {
  margin: 0;
  padding: 0;
}

.text {
  overflow: hidden;
  line-height: 1.5;
}

.title {
  font-weight: bold;
  font-size: 36px;
}

.subtitle {
  font-size: 24px;
  color: #595959;
}

.content {
  font-size: 18px;
}

[data-purpose*="cover"] .title {
  font-size: 42px;
  text-align: center;
}

.image img {
  width: 100%;
  height: 100%;
  object-fit: contain;
}

table.slide-table {
  width: 100%;
  border-collapse: collapse;
}

table.slide-table th {
  background-color: #f0f0f0;
  font-weight: bold;
  text-align: center;
}

table.slide-table th, table.slide-table td {
  border: 1px solid #ddd;
  padding: 8px;
}

ul.slide-list {
  margin: 0;
  padding: 0 0 0 20px;
}

ul.slide-list li {
  margin-bottom: 10px;
}
"#;

/// One converted template slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlSlideInfo {
    pub index: usize,
    pub layout_name: String,
    pub purposes: Vec<String>,
    pub file: String,
}

/// A template converted to HTML pages, as recorded in `template_info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlTemplateSet {
    pub name: String,
    pub slide_width: i64,
    pub slide_height: i64,
    pub slides: Vec<HtmlSlideInfo>,
    /// Purpose to page file names, in slide order.
    pub templates: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    pub dir: PathBuf,
}

impl HtmlTemplateSet {
    /// Page used for a slide, by explicit type or inferred content.
    pub fn template_for(&self, slide: &SlideContent, index: usize) -> Option<&str> {
        let wanted = if index == 0 {
            "cover".to_string()
        } else if let Some(kind) = slide.kind.as_deref().filter(|k| !k.trim().is_empty()) {
            kind.to_lowercase()
        } else if slide.image.is_some() || slide.image_url.is_some() {
            if slide.title.is_empty() && slide.content.is_empty() {
                "image".to_string()
            } else {
                "image_content".to_string()
            }
        } else if slide.table.is_some() {
            "table".to_string()
        } else if !slide.keypoints.is_empty() {
            "bullet".to_string()
        } else {
            "content".to_string()
        };
        let first = |purpose: &str| {
            self.templates
                .get(purpose)
                .and_then(|files| files.first())
                .map(String::as_str)
        };
        first(&wanted)
            .or_else(|| first("content"))
            .or_else(|| self.slides.first().map(|s| s.file.as_str()))
    }

    pub fn read_page(&self, file: &str) -> Result<String, PptError> {
        Ok(std::fs::read_to_string(self.dir.join(file))?)
    }
}

/// Purposes of a template slide, from its position and contents.
pub fn slide_purposes(shapes: &[Shape], index: usize, total: usize) -> Vec<String> {
    if index == 0 {
        return vec!["cover".to_string()];
    }
    if index + 1 == total {
        return vec!["conclusion".to_string()];
    }
    let has_code = |codes: &[u32]| {
        shapes
            .iter()
            .any(|s| s.placeholder_code().map(|c| codes.contains(&c)).unwrap_or(false))
    };
    let has_title = has_code(&[PH_TITLE, PH_CENTER_TITLE]);
    let has_body = has_code(&[PH_BODY, PH_OBJECT]);
    let has_picture = shapes.iter().any(|s| s.kind == ShapeKind::Picture);
    let has_table = shapes.iter().any(|s| s.kind == ShapeKind::Table);

    let mut purposes = Vec::new();
    if has_title && has_body {
        purposes.push("content");
    }
    if has_picture {
        purposes.push(if has_title || has_body { "image_content" } else { "image" });
    }
    if has_table {
        purposes.push("table");
    }
    if purposes.is_empty() {
        purposes.push("general");
    }
    purposes.into_iter().map(str::to_string).collect()
}

fn page_file_name(purposes: &[String]) -> String {
    format!("{}.html", purposes.join("_"))
}

/// Absolutely positioned HTML for one shape, scaled onto the canvas.
fn element_html(shape: &Shape, slide_size: (i64, i64)) -> Option<String> {
    let geom = shape.geometry?;
    let scale_x = |v: i64| v * CANVAS_WIDTH / slide_size.0.max(1);
    let scale_y = |v: i64| v * CANVAS_HEIGHT / slide_size.1.max(1);
    let style = format!(
        "left:{}px; top:{}px; width:{}px; height:{}px;",
        scale_x(geom.x),
        scale_y(geom.y),
        scale_x(geom.cx),
        scale_y(geom.cy)
    );
    let id = format!("element_{}", shape.id);
    let html = match (shape.kind, shape.placeholder_code()) {
        (ShapeKind::Picture, _) => format!(
            r#"<div id="{id}" class="element image" style="{style}"><img src="{{{{image_url}}}}" alt="幻灯片图片"></div>"#
        ),
        (ShapeKind::Table, _) => format!(
            r#"<div id="{id}" class="element table" style="{style}">{{{{table_html}}}}</div>"#
        ),
        (_, Some(PH_TITLE | PH_CENTER_TITLE)) => format!(
            r#"<h1 id="{id}" class="element text title" style="{style}">{{{{title}}}}</h1>"#
        ),
        (_, Some(PH_SUBTITLE)) => format!(
            r#"<div id="{id}" class="element text subtitle" style="{style}">{{{{subtitle}}}}</div>"#
        ),
        (_, Some(PH_BODY | PH_OBJECT)) => format!(
            r#"<div id="{id}" class="element text content" style="{style}">{{{{content}}}}{{{{keypoints}}}}</div>"#
        ),
        _ if shape.has_text_frame => format!(
            r#"<div id="{id}" class="element text" style="{style}">{}</div>"#,
            escape_xml(&shape.text()).replace('\n', "<br>")
        ),
        _ => return None,
    };
    Some(html)
}

fn page_html(title: &str, purposes: &[String], elements: &[String]) -> String {
    let mut html = format!(
        "<!DOCTYPE html>\n<html lang=\"zh-CN\">\n<head>\n  <meta charset=\"UTF-8\">\n  <title>{}</title>\n  <link rel=\"stylesheet\" href=\"style.css\">\n</head>\n<body>\n  <div class=\"slide-container\" data-purpose=\"{}\">\n",
        escape_xml(title),
        purposes.join(",")
    );
    for element in elements {
        html.push_str("    ");
        html.push_str(element);
        html.push('\n');
    }
    html.push_str("  </div>\n</body>\n</html>\n");
    html
}

/// Replaces `{{key}}` markers; unknown keys become empty.
pub fn substitute(template: &str, values: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Escapes text, then restores bold markup.
fn inline_html(text: &str) -> String {
    let escaped = escape_xml(text);
    let bold = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    ESCAPED_STRONG
        .replace_all(&bold, "<strong>$1</strong>")
        .into_owned()
}

/// Paragraphs, `-`/`*` lists and `**bold**`.
pub fn markdown_to_html(text: &str) -> String {
    let mut html = String::new();
    for block in text.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let is_list = lines
            .iter()
            .all(|l| l.starts_with("- ") || l.starts_with("* "));
        if is_list {
            html.push_str("<ul>");
            for line in lines {
                html.push_str(&format!("<li>{}</li>", inline_html(&line[2..])));
            }
            html.push_str("</ul>");
        } else {
            let body: Vec<String> = lines.iter().map(|l| inline_html(l)).collect();
            html.push_str(&format!("<p>{}</p>", body.join("<br>")));
        }
    }
    html
}

pub fn keypoints_html(points: &[String]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let items: String = points
        .iter()
        .map(|p| format!("<li>{}</li>", inline_html(p)))
        .collect();
    format!(r#"<ul class="slide-list">{}</ul>"#, items)
}

/// A raw HTML table passes through; rows become a table with a header row.
pub fn table_html(table: &TableData) -> String {
    let rows = match table {
        TableData::Html(html) => return html.clone(),
        TableData::Rows(rows) => rows,
    };
    let Some((head, body)) = rows.split_first() else {
        return String::new();
    };
    let mut html = String::from(r#"<table class="slide-table"><thead><tr>"#);
    for cell in head {
        html.push_str(&format!("<th>{}</th>", escape_xml(cell)));
    }
    html.push_str("</tr></thead>");
    if !body.is_empty() {
        html.push_str("<tbody>");
        for row in body {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&format!("<td>{}</td>", escape_xml(cell)));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody>");
    }
    html.push_str("</table>");
    html
}

fn data_uri(bytes: &[u8]) -> String {
    let mime = infer::get(bytes)
        .map(|t| t.mime_type())
        .unwrap_or("image/png");
    format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(bytes))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Searches `PATH` for a Chrome or Chromium binary.
pub fn find_browser(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured browser not found, searching PATH");
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .flat_map(|dir| BROWSER_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

pub struct HtmlEngine {
    html_dir: PathBuf,
    browser: Option<PathBuf>,
    images: Arc<ImageService>,
}

impl HtmlEngine {
    pub fn new(html_dir: impl Into<PathBuf>, images: Arc<ImageService>) -> Self {
        Self {
            html_dir: html_dir.into(),
            browser: find_browser(None),
            images,
        }
    }

    pub fn with_browser(mut self, browser: Option<&Path>) -> Self {
        self.browser = find_browser(browser);
        self
    }

    pub fn browser(&self) -> Option<&Path> {
        self.browser.as_deref()
    }

    pub fn browser_available(&self) -> bool {
        self.browser.is_some()
    }

    /// Converts a PPTX template into HTML pages under `<html_dir>/<stem>/`.
    /// Reuses the previous conversion unless the template is newer.
    pub fn convert_template(&self, template: &Path) -> Result<HtmlTemplateSet, PptError> {
        let dir = self.html_dir.join(template_stem(template));
        let info_path = dir.join(INFO_FILE);
        let fresh = match (modified(&info_path), modified(template)) {
            (Some(info), Some(source)) => info >= source,
            _ => false,
        };
        if fresh {
            match std::fs::read_to_string(&info_path)
                .map_err(PptError::from)
                .and_then(|text| Ok(serde_json::from_str::<HtmlTemplateSet>(&text)?))
            {
                Ok(mut set) => {
                    debug!(dir = %dir.display(), "reusing HTML template");
                    set.dir = dir;
                    return Ok(set);
                }
                Err(e) => warn!(path = %info_path.display(), error = %e, "stale HTML template info"),
            }
        }

        info!(template = %template.display(), "converting template to HTML");
        let package = PptxPackage::open(template)?;
        let size = package.slide_size();
        let parts = package.slide_parts()?;
        if parts.is_empty() {
            return Err(PptError::InvalidTemplate("template has no slides".to_string()));
        }
        std::fs::create_dir_all(&dir)?;

        let mut set = HtmlTemplateSet {
            name: template
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            slide_width: size.0,
            slide_height: size.1,
            slides: Vec::new(),
            templates: BTreeMap::new(),
            dir: dir.clone(),
        };
        for (index, part) in parts.iter().enumerate() {
            let slide = load_slide(&package, part)?;
            let purposes = slide_purposes(slide.shapes(), index, parts.len());
            let file = page_file_name(&purposes);
            let layout = layout_name(&package, part);
            let elements: Vec<String> = slide
                .shapes()
                .iter()
                .filter_map(|shape| element_html(shape, size))
                .collect();
            std::fs::write(dir.join(&file), page_html(&layout, &purposes, &elements))?;
            for purpose in &purposes {
                let files = set.templates.entry(purpose.clone()).or_default();
                if !files.contains(&file) {
                    files.push(file.clone());
                }
            }
            set.slides.push(HtmlSlideInfo {
                index,
                layout_name: layout,
                purposes,
                file,
            });
        }
        std::fs::write(dir.join("style.css"), STYLE_CSS)?;
        std::fs::write(&info_path, serde_json::to_string_pretty(&set)?)?;
        info!(dir = %dir.display(), pages = set.slides.len(), "HTML template written");
        Ok(set)
    }

    async fn slide_values(&self, slide: &SlideContent, wants_image: bool) -> HashMap<&'static str, String> {
        let mut values = HashMap::new();
        values.insert("title", escape_xml(&slide.title));
        values.insert(
            "subtitle",
            escape_xml(slide.subtitle.as_deref().unwrap_or_default()),
        );
        values.insert("content", markdown_to_html(&slide.content));
        values.insert("keypoints", keypoints_html(&slide.keypoint_texts()));
        values.insert(
            "table_html",
            slide.table.as_ref().map(table_html).unwrap_or_default(),
        );
        if wants_image {
            let uri = match self.images.image_for_slide(slide).await {
                Ok(bytes) => data_uri(&bytes),
                Err(e) => {
                    warn!(title = %slide.title, error = %e, "no image for HTML slide");
                    String::new()
                }
            };
            values.insert("image_url", uri);
        }
        values
    }

    /// Fills one page per slide.
    pub async fn fill_slides(
        &self,
        set: &HtmlTemplateSet,
        slides: &[SlideContent],
    ) -> Result<Vec<String>, PptError> {
        let mut pages = Vec::with_capacity(slides.len());
        for (index, slide) in slides.iter().enumerate() {
            let file = set.template_for(slide, index).ok_or_else(|| {
                PptError::Template(format!("no HTML page available in {}", set.name))
            })?;
            let page = set.read_page(file)?;
            let values = self.slide_values(slide, page.contains("{{image_url}}")).await;
            debug!(slide = index + 1, page = file, "filled HTML page");
            pages.push(substitute(&page, &values));
        }
        Ok(pages)
    }

    async fn screenshot(&self, browser: &Path, page: &Path, png: &Path) -> Result<Vec<u8>, PptError> {
        let run = tokio::process::Command::new(browser)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg(format!("--window-size={},{}", CANVAS_WIDTH, CANVAS_HEIGHT))
            .arg(format!("--screenshot={}", png.display()))
            .arg(format!("file://{}", page.display()))
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(SCREENSHOT_TIMEOUT, run)
            .await
            .map_err(|_| PptError::Render(format!("browser timed out on {}", page.display())))??;
        if !output.status.success() {
            return Err(PptError::Render(format!(
                "browser exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(tokio::fs::read(png).await?)
    }

    /// Screenshots each page with the headless browser.
    pub async fn render_pages(&self, pages: &[String]) -> Result<Vec<Vec<u8>>, PptError> {
        let browser = self
            .browser
            .as_deref()
            .ok_or_else(|| PptError::Render("no headless browser available".to_string()))?;
        let work = tempfile::tempdir()?;
        tokio::fs::write(work.path().join("style.css"), STYLE_CSS).await?;
        let mut shots = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            let html_path = work.path().join(format!("slide_{}.html", i + 1));
            let png_path = work.path().join(format!("slide_{}.png", i + 1));
            tokio::fs::write(&html_path, page).await?;
            shots.push(self.screenshot(browser, &html_path, &png_path).await?);
            debug!(slide = i + 1, "page captured");
        }
        Ok(shots)
    }

    /// Full pipeline into `output`. Fails with a render error when the browser
    /// or the template is unavailable.
    pub async fn generate(
        &self,
        slides: &[SlideContent],
        template: &Path,
        output: &Path,
    ) -> Result<PathBuf, PptError> {
        if !self.browser_available() {
            return Err(PptError::Render("no headless browser available".to_string()));
        }
        if !template.is_file() {
            return Err(PptError::Render(format!(
                "template {} not found",
                template.display()
            )));
        }
        if slides.is_empty() {
            return Err(PptError::InvalidRequest("no slide content to render".to_string()));
        }
        let started = std::time::Instant::now();
        let set = self.convert_template(template)?;
        let pages = self.fill_slides(&set, slides).await?;

        let debug_dir = output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("debug_html");
        tokio::fs::create_dir_all(&debug_dir).await?;
        for (i, page) in pages.iter().enumerate() {
            tokio::fs::write(debug_dir.join(format!("slide_{}.html", i + 1)), page).await?;
        }

        let shots = self.render_pages(&pages).await?;
        image_deck(&shots, WIDE_SIZE).save(output)?;
        info!(
            output = %output.display(),
            slides = shots.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "HTML deck written"
        );
        Ok(output.to_path_buf())
    }
}
