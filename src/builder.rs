//! Decks synthesised from scratch, without a user template.

use crate::drawing::{
    inches, picture_xml, placeholder_xml, table_xml, text_box_xml, Align, Geometry, Paragraph,
    TextStyle,
};
use crate::error::PptError;
use crate::images::ImageService;
use crate::model::{SlideContent, TableData};
use crate::package::{
    relative_target, ContentTypes, PptxPackage, Relationship, CT_SLIDE,
    PRESENTATION, REL_IMAGE, REL_SLIDE, REL_SLIDE_LAYOUT, REL_SLIDE_MASTER,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

const SLIDE_MASTER: &str = include_str!("../resources/blank/slideMaster1.xml");
const LAYOUT_TITLE: &str = include_str!("../resources/blank/slideLayout1.xml");
const LAYOUT_TITLE_CONTENT: &str = include_str!("../resources/blank/slideLayout2.xml");
const LAYOUT_TITLE_ONLY: &str = include_str!("../resources/blank/slideLayout3.xml");
const LAYOUT_BLANK: &str = include_str!("../resources/blank/slideLayout4.xml");
const THEME: &str = include_str!("../resources/blank/theme1.xml");
const PRES_PROPS: &str = include_str!("../resources/blank/presProps.xml");
const VIEW_PROPS: &str = include_str!("../resources/blank/viewProps.xml");
const TABLE_STYLES: &str = include_str!("../resources/blank/tableStyles.xml");

const NS: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);
const REL_THEME: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
const REL_PRES_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps";
const REL_VIEW_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/viewProps";
const REL_TABLE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles";
const CT_PML: &str = "application/vnd.openxmlformats-officedocument.presentationml";

/// 4:3 deck, 10in x 7.5in.
pub const STANDARD_SIZE: (i64, i64) = (9_144_000, 6_858_000);
/// 16:9 deck, 10in x 5.625in.
pub const WIDE_SIZE: (i64, i64) = (9_144_000, 5_143_500);

const BLUE: (u8, u8, u8) = (0, 112, 192);
const GREY: (u8, u8, u8) = (89, 89, 89);
const BLACK: (u8, u8, u8) = (0, 0, 0);
const RED: (u8, u8, u8) = (192, 0, 0);

/// Clamps a requested point size into the range PowerPoint accepts.
pub fn safe_font_size(size: i64) -> u32 {
    if size <= 0 {
        12
    } else if size < 100 {
        size as u32
    } else {
        72
    }
}

fn style(size: i64) -> TextStyle {
    TextStyle::sized(safe_font_size(size))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Title,
    TitleContent,
    TitleOnly,
    Blank,
}

impl Layout {
    fn part(&self) -> &'static str {
        match self {
            Layout::Title => "ppt/slideLayouts/slideLayout1.xml",
            Layout::TitleContent => "ppt/slideLayouts/slideLayout2.xml",
            Layout::TitleOnly => "ppt/slideLayouts/slideLayout3.xml",
            Layout::Blank => "ppt/slideLayouts/slideLayout4.xml",
        }
    }
}

/// One slide under construction: shape fragments plus the media they embed.
#[derive(Debug, Clone)]
pub struct SlideDraft {
    layout: Layout,
    shapes: Vec<String>,
    media: Vec<Vec<u8>>,
    next_id: u32,
}

impl SlideDraft {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            shapes: Vec::new(),
            media: Vec::new(),
            next_id: 2,
        }
    }

    fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn placeholder(&mut self, ph: &str, name: &str, paragraphs: &[Paragraph]) -> &mut Self {
        let id = self.id();
        self.shapes.push(placeholder_xml(id, name, ph, paragraphs));
        self
    }

    pub fn text_box(&mut self, geom: Geometry, paragraphs: &[Paragraph]) -> &mut Self {
        let id = self.id();
        let name = format!("TextBox {}", id - 1);
        self.shapes.push(text_box_xml(id, &name, geom, paragraphs));
        self
    }

    /// Media rIds start after the layout relationship (rId1).
    pub fn picture(&mut self, data: Vec<u8>, geom: Geometry) -> &mut Self {
        let id = self.id();
        self.media.push(data);
        let rel_id = format!("rId{}", self.media.len() + 1);
        let name = format!("Picture {}", id - 1);
        self.shapes.push(picture_xml(id, &name, &rel_id, geom));
        self
    }

    pub fn table(
        &mut self,
        geom: Geometry,
        rows: &[Vec<String>],
        cell_style: Option<TextStyle>,
        align: Option<Align>,
    ) -> &mut Self {
        let id = self.id();
        let name = format!("Table {}", id - 1);
        self.shapes
            .push(table_xml(id, &name, geom, rows, cell_style, align));
        self
    }

    fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n<p:sld {}><p:cSld><p:spTree>",
                r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
                r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
                "{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"
            ),
            NS,
            self.shapes.concat()
        )
    }
}

/// Assembles a complete presentation package from slide drafts.
#[derive(Debug, Clone)]
pub struct DeckBuilder {
    size: (i64, i64),
    slides: Vec<SlideDraft>,
}

impl Default for DeckBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::with_size(STANDARD_SIZE)
    }

    pub fn with_size(size: (i64, i64)) -> Self {
        Self {
            size,
            slides: Vec::new(),
        }
    }

    pub fn size(&self) -> (i64, i64) {
        self.size
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn push(&mut self, slide: SlideDraft) {
        self.slides.push(slide);
    }

    pub fn finish(self) -> PptxPackage {
        let mut package = PptxPackage::new();
        let mut types = ContentTypes::default();
        types.ensure_default("rels", "application/vnd.openxmlformats-package.relationships+xml");
        types.ensure_default("xml", "application/xml");
        types.set_override(PRESENTATION, &format!("{}.presentation.main+xml", CT_PML));
        types.set_override(
            "ppt/slideMasters/slideMaster1.xml",
            &format!("{}.slideMaster+xml", CT_PML),
        );
        for layout in [
            Layout::Title,
            Layout::TitleContent,
            Layout::TitleOnly,
            Layout::Blank,
        ] {
            types.set_override(layout.part(), &format!("{}.slideLayout+xml", CT_PML));
        }
        types.set_override(
            "ppt/theme/theme1.xml",
            "application/vnd.openxmlformats-officedocument.theme+xml",
        );
        types.set_override("ppt/presProps.xml", &format!("{}.presProps+xml", CT_PML));
        types.set_override("ppt/viewProps.xml", &format!("{}.viewProps+xml", CT_PML));
        types.set_override("ppt/tableStyles.xml", &format!("{}.tableStyles+xml", CT_PML));
        types.set_override(
            "docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        );
        types.set_override(
            "docProps/app.xml",
            "application/vnd.openxmlformats-officedocument.extended-properties+xml",
        );
        for k in 1..=self.slides.len() {
            types.set_override(&format!("ppt/slides/slide{}.xml", k), CT_SLIDE);
        }
        package.set_content_types(&types);

        package.set_part("_rels/.rels", ROOT_RELS);
        package.set_part("docProps/app.xml", app_properties(self.slides.len()));
        package.set_part("docProps/core.xml", core_properties());

        package.set_part("ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER);
        let mut master_rels: Vec<Relationship> = [
            Layout::Title,
            Layout::TitleContent,
            Layout::TitleOnly,
            Layout::Blank,
        ]
        .iter()
        .enumerate()
        .map(|(i, l)| {
            Relationship::new(
                format!("rId{}", i + 1),
                REL_SLIDE_LAYOUT,
                relative_target("ppt/slideMasters/slideMaster1.xml", l.part()),
            )
        })
        .collect();
        master_rels.push(Relationship::new("rId5", REL_THEME, "../theme/theme1.xml"));
        package.set_relationships("ppt/slideMasters/slideMaster1.xml", &master_rels);

        for (layout, xml) in [
            (Layout::Title, LAYOUT_TITLE),
            (Layout::TitleContent, LAYOUT_TITLE_CONTENT),
            (Layout::TitleOnly, LAYOUT_TITLE_ONLY),
            (Layout::Blank, LAYOUT_BLANK),
        ] {
            package.set_part(layout.part(), xml);
            package.set_relationships(
                layout.part(),
                &[Relationship::new(
                    "rId1",
                    REL_SLIDE_MASTER,
                    "../slideMasters/slideMaster1.xml",
                )],
            );
        }
        package.set_part("ppt/theme/theme1.xml", THEME);
        package.set_part("ppt/presProps.xml", PRES_PROPS);
        package.set_part("ppt/viewProps.xml", VIEW_PROPS);
        package.set_part("ppt/tableStyles.xml", TABLE_STYLES);

        let mut pres_rels = vec![
            Relationship::new("rId1", REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
            Relationship::new("rId2", REL_PRES_PROPS, "presProps.xml"),
            Relationship::new("rId3", REL_VIEW_PROPS, "viewProps.xml"),
            Relationship::new("rId4", REL_THEME, "theme/theme1.xml"),
            Relationship::new("rId5", REL_TABLE_STYLES, "tableStyles.xml"),
        ];
        let mut slide_ids = String::new();
        for (k, draft) in self.slides.iter().enumerate() {
            let part = format!("ppt/slides/slide{}.xml", k + 1);
            let mut rels = vec![Relationship::new(
                "rId1",
                REL_SLIDE_LAYOUT,
                relative_target(&part, draft.layout.part()),
            )];
            for (m, data) in draft.media.iter().enumerate() {
                let media = package.add_media(data);
                rels.push(Relationship::new(
                    format!("rId{}", m + 2),
                    REL_IMAGE,
                    relative_target(&part, &media),
                ));
            }
            package.set_part(part.clone(), draft.to_xml());
            package.set_relationships(&part, &rels);

            let rel_id = format!("rId{}", k + 6);
            slide_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 256 + k, rel_id));
            pres_rels.push(Relationship::new(
                rel_id,
                REL_SLIDE,
                format!("slides/slide{}.xml", k + 1),
            ));
        }
        package.set_part(PRESENTATION, presentation_xml(self.size, &slide_ids));
        package.set_relationships(PRESENTATION, &pres_rels);
        package
    }
}

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>"#,
    "</Relationships>"
);

fn presentation_xml(size: (i64, i64), slide_ids: &str) -> String {
    let slide_list = if slide_ids.is_empty() {
        String::new()
    } else {
        format!("<p:sldIdLst>{}</p:sldIdLst>", slide_ids)
    };
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n<p:presentation {} saveSubsetFonts=\"1\">",
            r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
            "{}",
            r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/>"#,
            "</p:presentation>"
        ),
        NS, slide_list, size.0, size.1
    )
}

fn app_properties(slides: usize) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">"#,
            "<Application>{}</Application><Slides>{}</Slides></Properties>"
        ),
        env!("CARGO_PKG_NAME"),
        slides
    )
}

fn core_properties() -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "<dc:title>{}</dc:title><dc:creator>{}</dc:creator>",
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#,
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#,
            "</cp:coreProperties>"
        ),
        "演示文稿",
        env!("CARGO_PKG_NAME"),
        now,
        now
    )
}

/// How a content entry is rendered without a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideKind {
    Cover,
    Content,
    Bullet,
    Image,
    Table,
    Summary,
}

const IMAGE_TITLE_HINTS: &[&str] = &["图片", "图示", "示意图", "image", "picture", "figure"];
const BULLET_TITLE_HINTS: &[&str] = &["要点", "关键点", "重点", "key points", "bullet points"];

impl SlideKind {
    /// Picks the slide kind from position, tags, attached data and title hints.
    pub fn select(slide: &SlideContent, index: usize, total: usize) -> SlideKind {
        let kind = slide.kind.as_deref().unwrap_or_default().to_lowercase();
        let layout = slide.layout.as_deref().unwrap_or_default().to_lowercase();
        let title = slide.title.to_lowercase();
        if index == 0 || kind == "cover" || layout == "cover" || layout == "title" || title.contains("封面")
        {
            SlideKind::Cover
        } else if index + 1 == total
            || kind == "summary"
            || kind == "conclusion"
            || layout == "summary"
            || title.contains("总结")
            || title.contains("结论")
        {
            SlideKind::Summary
        } else if slide.table.is_some() || layout == "table" {
            SlideKind::Table
        } else if slide.image.is_some()
            || slide.image_url.is_some()
            || layout == "image"
            || IMAGE_TITLE_HINTS.iter().any(|h| title.contains(h))
        {
            SlideKind::Image
        } else if !slide.keypoints.is_empty()
            || layout == "bullet"
            || layout == "keypoints"
            || BULLET_TITLE_HINTS.iter().any(|h| title.contains(h))
        {
            SlideKind::Bullet
        } else {
            SlideKind::Content
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            SlideKind::Cover => "演示文稿",
            SlideKind::Content => "内容页",
            SlideKind::Bullet => "要点页",
            SlideKind::Image => "图片页",
            SlideKind::Table => "表格页",
            SlideKind::Summary => "总结",
        }
    }
}

fn lines(text: &str, style: TextStyle, align: Align) -> Vec<Paragraph> {
    text.split('\n')
        .map(|line| Paragraph::plain(line).styled(style).aligned(align))
        .collect()
}

fn keypoint_paragraphs(slide: &SlideContent, size: i64) -> Vec<Paragraph> {
    slide
        .keypoints
        .iter()
        .map(|p| {
            Paragraph::bullet(p.text(), p.level())
                .styled(style(size).color(BLACK))
                .aligned(Align::Left)
        })
        .collect()
}

fn title_paragraph(slide: &SlideContent, kind: SlideKind, size: i64, align: Align) -> Vec<Paragraph> {
    let text = if slide.title.trim().is_empty() {
        kind.default_title()
    } else {
        slide.title.as_str()
    };
    vec![Paragraph::plain(text)
        .styled(style(size).bold().color(BLUE))
        .aligned(align)]
}

fn error_box(draft: &mut SlideDraft, message: &str) {
    draft.text_box(
        Geometry::new(inches(2.0), inches(3.5), inches(6.0), inches(1.0)),
        &[Paragraph::plain(message)
            .styled(style(20).italic().color(RED))
            .aligned(Align::Center)],
    );
}

fn intro_box(draft: &mut SlideDraft, slide: &SlideContent) {
    draft.text_box(
        Geometry::new(inches(1.0), inches(1.5), inches(8.0), inches(1.0)),
        &lines(&slide.content, style(20).color(BLACK), Align::Left),
    );
}

/// Renders content entries into a fresh deck, pulling pictures from the image service.
pub struct NoTemplateGenerator {
    images: Arc<ImageService>,
}

impl NoTemplateGenerator {
    pub fn new(images: Arc<ImageService>) -> Self {
        Self { images }
    }

    pub async fn build(&self, slides: &[SlideContent]) -> PptxPackage {
        let mut deck = DeckBuilder::new();
        for (i, slide) in slides.iter().enumerate() {
            let kind = SlideKind::select(slide, i, slides.len());
            info!(slide = i + 1, kind = ?kind, title = %slide.title, "building slide");
            let draft = self.draft(slide, kind).await;
            deck.push(draft);
        }
        deck.finish()
    }

    pub async fn generate(
        &self,
        slides: &[SlideContent],
        output: impl AsRef<Path>,
    ) -> Result<(), PptError> {
        let output = output.as_ref();
        info!(output = %output.display(), slides = slides.len(), "generating deck without template");
        let package = self.build(slides).await;
        package.save(output)?;
        info!(output = %output.display(), "deck saved");
        Ok(())
    }

    pub async fn draft(&self, slide: &SlideContent, kind: SlideKind) -> SlideDraft {
        match kind {
            SlideKind::Cover => {
                let mut d = SlideDraft::new(Layout::Title);
                d.placeholder(
                    r#"type="ctrTitle""#,
                    "Title 1",
                    &title_paragraph(slide, kind, 44, Align::Center),
                )
                .placeholder(
                    r#"type="subTitle" idx="1""#,
                    "Subtitle 2",
                    &lines(&slide.content, style(24).color(GREY), Align::Center),
                );
                d
            }
            SlideKind::Content => {
                let mut d = SlideDraft::new(Layout::TitleContent);
                d.placeholder(
                    r#"type="title""#,
                    "Title 1",
                    &title_paragraph(slide, kind, 36, Align::Left),
                )
                .placeholder(
                    r#"idx="1""#,
                    "Content Placeholder 2",
                    &lines(&slide.content, style(24).color(BLACK), Align::Left),
                );
                d
            }
            SlideKind::Bullet => {
                let mut body = Vec::new();
                if !slide.content.trim().is_empty() {
                    body.push(
                        Paragraph::plain(slide.content.as_str())
                            .styled(style(24).color(BLACK))
                            .aligned(Align::Left),
                    );
                    body.push(Paragraph::plain(""));
                }
                body.extend(keypoint_paragraphs(slide, 20));
                let mut d = SlideDraft::new(Layout::TitleContent);
                d.placeholder(
                    r#"type="title""#,
                    "Title 1",
                    &title_paragraph(slide, kind, 36, Align::Left),
                )
                .placeholder(r#"idx="1""#, "Content Placeholder 2", &body);
                d
            }
            SlideKind::Image => {
                let mut d = SlideDraft::new(Layout::TitleOnly);
                d.placeholder(
                    r#"type="title""#,
                    "Title 1",
                    &title_paragraph(slide, kind, 36, Align::Left),
                );
                intro_box(&mut d, slide);
                match self.images.image_for_slide(slide).await {
                    Ok(data) => {
                        d.picture(
                            data,
                            Geometry::new(inches(2.0), inches(2.5), inches(6.0), inches(4.0)),
                        );
                    }
                    Err(e) => {
                        error!(title = %slide.title, error = %e, "adding picture failed");
                        error_box(&mut d, "图片加载失败");
                    }
                }
                d
            }
            SlideKind::Table => {
                let mut d = SlideDraft::new(Layout::TitleOnly);
                d.placeholder(
                    r#"type="title""#,
                    "Title 1",
                    &title_paragraph(slide, kind, 36, Align::Left),
                );
                intro_box(&mut d, slide);
                match &slide.table {
                    Some(TableData::Rows(rows)) if !rows.is_empty() => {
                        if rows.iter().all(Vec::is_empty) {
                            error!(title = %slide.title, "table has no columns");
                            error_box(&mut d, "表格创建失败");
                        } else {
                            d.table(
                                Geometry::new(inches(1.0), inches(2.5), inches(8.0), inches(4.0)),
                                rows,
                                Some(style(16)),
                                Some(Align::Center),
                            );
                        }
                    }
                    Some(TableData::Html(_)) => {
                        error!(title = %slide.title, "HTML tables cannot be drawn natively");
                        error_box(&mut d, "表格创建失败");
                    }
                    _ => {}
                }
                d
            }
            SlideKind::Summary => {
                let mut d = SlideDraft::new(Layout::TitleOnly);
                d.placeholder(
                    r#"type="title""#,
                    "Title 1",
                    &title_paragraph(slide, kind, 44, Align::Center),
                );
                d.text_box(
                    Geometry::new(inches(1.0), inches(2.0), inches(8.0), inches(4.0)),
                    &lines(&slide.content, style(32).color(BLACK), Align::Center),
                );
                if !slide.keypoints.is_empty() {
                    d.text_box(
                        Geometry::new(inches(1.0), inches(3.0), inches(8.0), inches(3.0)),
                        &keypoint_paragraphs(slide, 24),
                    );
                }
                d
            }
        }
    }
}

/// One blank slide per screenshot, each picture covering the whole slide.
pub fn image_deck(images: &[Vec<u8>], size: (i64, i64)) -> PptxPackage {
    let mut deck = DeckBuilder::with_size(size);
    for data in images {
        let mut draft = SlideDraft::new(Layout::Blank);
        draft.picture(data.clone(), Geometry::new(0, 0, size.0, size.1));
        deck.push(draft);
    }
    deck.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_font_size() {
        assert_eq!(safe_font_size(0), 12);
        assert_eq!(safe_font_size(-3), 12);
        assert_eq!(safe_font_size(44), 44);
        assert_eq!(safe_font_size(400), 72);
    }

    #[test]
    fn test_slide_kind_selection() {
        let total = 5;
        let plain = SlideContent::new("细胞", "text");
        assert_eq!(SlideKind::select(&plain, 0, total), SlideKind::Cover);
        assert_eq!(SlideKind::select(&plain, 4, total), SlideKind::Summary);
        assert_eq!(SlideKind::select(&plain, 2, total), SlideKind::Content);
        let table = SlideContent::new("x", "").with_table(vec![vec!["a".into()]]);
        assert_eq!(SlideKind::select(&table, 1, total), SlideKind::Table);
        let bullets = SlideContent::new("x", "").with_keypoints(["a"]);
        assert_eq!(SlideKind::select(&bullets, 1, total), SlideKind::Bullet);
        let figure = SlideContent::new("结构示意图", "");
        assert_eq!(SlideKind::select(&figure, 1, total), SlideKind::Image);
    }

    #[test]
    fn test_draft_media_ids() {
        let mut d = SlideDraft::new(Layout::Blank);
        d.picture(vec![1], Geometry::default())
            .picture(vec![2], Geometry::default());
        let xml = d.to_xml();
        assert!(xml.contains(r#"r:embed="rId2""#));
        assert!(xml.contains(r#"r:embed="rId3""#));
    }

    #[test]
    fn test_empty_deck_has_no_slide_list() {
        let package = DeckBuilder::new().finish();
        assert!(package.slide_parts().unwrap().is_empty());
        assert_eq!(package.slide_size(), STANDARD_SIZE);
    }
}
