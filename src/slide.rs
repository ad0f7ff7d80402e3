//! Span-based model of a slide (or layout/master) part.
//!
//! Shapes are located by byte span inside `p:spTree`; edits replace those
//! spans on render so everything else in the part stays byte-for-byte.

use crate::drawing::{Geometry, Paragraph};
use crate::error::PptError;
use crate::package::{PptxPackage, REL_SLIDE_LAYOUT, REL_SLIDE_MASTER};
use crate::xml::{attr, attr_i64, find_element, local_name, resolve_reference};
use quick_xml::{events::Event, reader::Reader};

pub const PH_TITLE: u32 = 1;
pub const PH_BODY: u32 = 2;
pub const PH_CENTER_TITLE: u32 = 3;
pub const PH_SUBTITLE: u32 = 4;
pub const PH_OBJECT: u32 = 7;
pub const PH_CHART: u32 = 8;
pub const PH_TABLE: u32 = 12;
pub const PH_SLIDE_NUMBER: u32 = 13;
pub const PH_FOOTER: u32 = 15;
pub const PH_DATE: u32 = 16;
pub const PH_PICTURE: u32 = 18;

/// Maps the OOXML `ST_PlaceholderType` token to its numeric code.
pub fn placeholder_code(token: &str) -> u32 {
    match token {
        "title" => PH_TITLE,
        "body" => PH_BODY,
        "ctrTitle" => PH_CENTER_TITLE,
        "subTitle" => PH_SUBTITLE,
        "obj" => PH_OBJECT,
        "chart" => PH_CHART,
        "clipArt" => 9,
        "media" => 10,
        "dgm" => 11,
        "tbl" => PH_TABLE,
        "sldNum" => PH_SLIDE_NUMBER,
        "hdr" => 14,
        "ftr" => PH_FOOTER,
        "dt" => PH_DATE,
        "pic" => PH_PICTURE,
        "sldImg" => 101,
        _ => PH_OBJECT,
    }
}

fn is_title_code(code: u32) -> bool {
    code == PH_TITLE || code == PH_CENTER_TITLE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Text,
    Picture,
    Table,
    Chart,
    Group,
    Connector,
    Other,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Text => "text",
            ShapeKind::Picture => "picture",
            ShapeKind::Table => "table",
            ShapeKind::Chart => "chart",
            ShapeKind::Group => "group",
            ShapeKind::Connector => "connector",
            ShapeKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub code: u32,
    pub idx: u32,
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub id: u32,
    pub name: String,
    pub kind: ShapeKind,
    pub placeholder: Option<Placeholder>,
    pub geometry: Option<Geometry>,
    pub has_text_frame: bool,
    pub paragraphs: Vec<String>,
    pub embed: Option<String>,
    pub table_size: Option<(usize, usize)>,
    pub chart_type: Option<String>,
    span: (usize, usize),
}

impl Shape {
    pub fn text(&self) -> String {
        self.paragraphs.join("\n")
    }

    pub fn has_text(&self) -> bool {
        self.paragraphs.iter().any(|p| !p.trim().is_empty())
    }

    pub fn placeholder_code(&self) -> Option<u32> {
        self.placeholder.map(|p| p.code)
    }

    pub fn geometry_or_default(&self) -> Geometry {
        self.geometry.unwrap_or_default()
    }

    pub fn area(&self) -> i64 {
        self.geometry_or_default().area()
    }
}

/// Parsed slide XML with queued edits.
#[derive(Debug, Clone)]
pub struct SlideXml {
    source: String,
    shapes: Vec<Shape>,
    replacements: Vec<Option<String>>,
    appended: Vec<String>,
    tree_close: usize,
    next_id: u32,
}

const SHAPE_TAGS: &[&[u8]] = &[b"sp", b"pic", b"graphicFrame", b"grpSp", b"cxnSp", b"contentPart"];

impl SlideXml {
    pub fn parse(xml: &str) -> Result<Self, PptError> {
        let (tree_start, tree_end) = find_element(xml, "p:spTree", 0)
            .ok_or_else(|| PptError::Xml("slide has no p:spTree".to_string()))?;
        let tree = &xml[tree_start..tree_end];
        let tree_close = tree_start
            + tree
                .rfind("</p:spTree>")
                .ok_or_else(|| PptError::Xml("unterminated p:spTree".to_string()))?;

        let mut reader = Reader::from_str(tree);
        let mut depth = 0usize;
        let mut open: Option<(usize, Vec<u8>)> = None;
        let mut spans = Vec::new();
        loop {
            let before = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| PptError::Xml(format!("slide tree: {}", e)))?;
            let after = reader.buffer_position() as usize;
            match event {
                Event::Start(e) => {
                    depth += 1;
                    let local = local_name(e.name().as_ref()).to_vec();
                    if depth == 2 && SHAPE_TAGS.contains(&local.as_slice()) {
                        open = Some((before, local));
                    }
                }
                Event::Empty(e) => {
                    let name = e.name();
                    let local = local_name(name.as_ref());
                    if depth == 1 && SHAPE_TAGS.contains(&local) {
                        spans.push((tree_start + before, tree_start + after));
                    }
                }
                Event::End(e) => {
                    if depth == 2 {
                        if let Some((start, tag)) = open.take() {
                            if local_name(e.name().as_ref()) == tag.as_slice() {
                                spans.push((tree_start + start, tree_start + after));
                            }
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let mut shapes = Vec::with_capacity(spans.len());
        for span in spans {
            shapes.push(parse_shape(&xml[span.0..span.1], span)?);
        }
        let next_id = shapes.iter().map(|s| s.id).max().unwrap_or(1) + 1;
        Ok(Self {
            source: xml.to_string(),
            replacements: vec![None; shapes.len()],
            shapes,
            appended: Vec::new(),
            tree_close,
            next_id,
        })
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, index: usize) -> Option<&Shape> {
        self.shapes.get(index)
    }

    pub fn is_removed(&self, index: usize) -> bool {
        matches!(self.replacements.get(index), Some(Some(s)) if s.is_empty())
    }

    /// Fills in missing placeholder geometry from a layout, then a master.
    pub fn inherit_geometry(&mut self, layout: Option<&SlideXml>, master: Option<&SlideXml>) {
        for shape in &mut self.shapes {
            if shape.geometry.is_some() {
                continue;
            }
            let Some(ph) = shape.placeholder else { continue };
            let from_layout = layout.and_then(|l| l.find_placeholder(ph));
            let inherited = from_layout
                .or_else(|| master.and_then(|m| m.find_placeholder(ph)))
                .and_then(|s| s.geometry);
            shape.geometry = inherited;
        }
    }

    fn find_placeholder(&self, ph: Placeholder) -> Option<&Shape> {
        let with_geometry = || self.shapes.iter().filter(|s| s.geometry.is_some());
        with_geometry()
            .find(|s| s.placeholder.map(|p| p.idx == ph.idx && p.code == ph.code) == Some(true))
            .or_else(|| with_geometry().find(|s| s.placeholder.map(|p| p.idx) == Some(ph.idx) && ph.idx != 0))
            .or_else(|| with_geometry().find(|s| s.placeholder.map(|p| p.code) == Some(ph.code)))
            .or_else(|| {
                with_geometry().find(|s| {
                    s.placeholder
                        .map(|p| is_title_code(p.code) == is_title_code(ph.code))
                        .unwrap_or(false)
                })
            })
    }

    fn current_xml(&self, index: usize) -> &str {
        match &self.replacements[index] {
            Some(xml) => xml,
            None => {
                let (s, e) = self.shapes[index].span;
                &self.source[s..e]
            }
        }
    }

    /// Empties a text frame, keeping one paragraph with the template's formatting.
    pub fn clear_text(&mut self, index: usize) {
        self.set_paragraphs(index, &[Paragraph::plain("")]);
    }

    /// Writes text as one paragraph per line.
    pub fn set_text(&mut self, index: usize, text: &str) {
        let paragraphs: Vec<Paragraph> = text.split('\n').map(Paragraph::plain).collect();
        self.set_paragraphs(index, &paragraphs);
    }

    pub fn set_paragraphs(&mut self, index: usize, paragraphs: &[Paragraph]) {
        if index >= self.shapes.len() || self.is_removed(index) {
            return;
        }
        let current = self.current_xml(index).to_string();
        let updated = rewrite_text_body(&current, paragraphs);
        self.replacements[index] = Some(updated);
        let shape = &mut self.shapes[index];
        shape.has_text_frame = true;
        shape.paragraphs = paragraphs.iter().map(|p| p.text.clone()).collect();
    }

    pub fn remove_shape(&mut self, index: usize) {
        if index < self.shapes.len() {
            self.replacements[index] = Some(String::new());
            self.shapes[index].paragraphs.clear();
        }
    }

    /// Points a picture at a different image relationship.
    pub fn set_picture_embed(&mut self, index: usize, rel_id: &str) -> bool {
        let Some(old) = self.shapes.get(index).and_then(|s| s.embed.clone()) else {
            return false;
        };
        let current = self.current_xml(index);
        let updated = current.replacen(
            &format!("r:embed=\"{}\"", old),
            &format!("r:embed=\"{}\"", rel_id),
            1,
        );
        self.replacements[index] = Some(updated);
        self.shapes[index].embed = Some(rel_id.to_string());
        true
    }

    /// Reserves a fresh shape id for a fragment about to be appended.
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn append_xml(&mut self, fragment: String) {
        self.appended.push(fragment);
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.source.len() + 1024);
        let mut cursor = 0;
        for (i, shape) in self.shapes.iter().enumerate() {
            let (s, e) = shape.span;
            out.push_str(&self.source[cursor..s]);
            match &self.replacements[i] {
                Some(xml) => out.push_str(xml),
                None => out.push_str(&self.source[s..e]),
            }
            cursor = e;
        }
        let close = self.tree_close.max(cursor);
        out.push_str(&self.source[cursor..close]);
        for fragment in &self.appended {
            out.push_str(fragment);
        }
        out.push_str(&self.source[close..]);
        out
    }
}

/// Parses a slide part and resolves inherited placeholder geometry.
pub fn load_slide(package: &PptxPackage, part: &str) -> Result<SlideXml, PptError> {
    let mut slide = SlideXml::parse(&package.part_str(part)?)?;
    let layout_part = package.related_part(part, REL_SLIDE_LAYOUT);
    let layout = layout_part
        .as_deref()
        .and_then(|p| package.part_str(p).ok())
        .and_then(|xml| SlideXml::parse(&xml).ok());
    let master = layout_part
        .as_deref()
        .and_then(|p| package.related_part(p, REL_SLIDE_MASTER))
        .and_then(|p| package.part_str(&p).ok())
        .and_then(|xml| SlideXml::parse(&xml).ok());
    slide.inherit_geometry(layout.as_ref(), master.as_ref());
    Ok(slide)
}

/// `name` attribute of the slide layout used by `part`.
pub fn layout_name(package: &PptxPackage, part: &str) -> String {
    let Some(xml) = package
        .related_part(part, REL_SLIDE_LAYOUT)
        .and_then(|p| package.part_str(&p).ok())
    else {
        return String::new();
    };
    let mut reader = Reader::from_str(&xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"cSld" => {
                return attr(&e, b"name").unwrap_or_default();
            }
            Ok(Event::Eof) | Err(_) => return String::new(),
            _ => {}
        }
    }
}

fn parse_shape(xml: &str, span: (usize, usize)) -> Result<Shape, PptError> {
    let mut reader = Reader::from_str(xml);
    let mut shape = Shape {
        id: 0,
        name: String::new(),
        kind: ShapeKind::Other,
        placeholder: None,
        geometry: None,
        has_text_frame: false,
        paragraphs: Vec::new(),
        embed: None,
        table_size: None,
        chart_type: None,
        span,
    };
    let mut root: Option<Vec<u8>> = None;
    let mut depth = 0usize;
    let mut xfrm_depth: Option<usize> = None;
    let mut xfrm_done = false;
    let mut off: Option<(i64, i64)> = None;
    let mut ext: Option<(i64, i64)> = None;
    let mut in_text_body = false;
    let mut in_t = false;
    let mut rows = 0usize;
    let mut cols = 0usize;
    let mut graphic_uri: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| PptError::Xml(format!("shape: {}", e)))?;
        let (e, is_start) = match &event {
            Event::Start(e) => (Some(e.clone()), true),
            Event::Empty(e) => (Some(e.clone()), false),
            _ => (None, false),
        };
        if let Some(e) = e {
            let qname = e.name();
            let local = local_name(qname.as_ref());
            if root.is_none() {
                root = Some(local.to_vec());
            }
            match local {
                b"cNvPr" if shape.name.is_empty() && depth <= 3 => {
                    shape.id = attr_i64(&e, b"id").unwrap_or(0).max(0) as u32;
                    shape.name = attr(&e, b"name").unwrap_or_default();
                }
                b"ph" if shape.placeholder.is_none() => {
                    let code = attr(&e, b"type")
                        .map(|t| placeholder_code(&t))
                        .unwrap_or(PH_OBJECT);
                    let idx = attr_i64(&e, b"idx").unwrap_or(0).max(0) as u32;
                    shape.placeholder = Some(Placeholder { code, idx });
                }
                b"xfrm" if !xfrm_done && xfrm_depth.is_none() && is_start => {
                    xfrm_depth = Some(depth);
                }
                b"off" if xfrm_depth.is_some() => {
                    off = Some((attr_i64(&e, b"x").unwrap_or(0), attr_i64(&e, b"y").unwrap_or(0)));
                }
                b"ext" if xfrm_depth.is_some() => {
                    ext = Some((
                        attr_i64(&e, b"cx").unwrap_or(0),
                        attr_i64(&e, b"cy").unwrap_or(0),
                    ));
                }
                b"txBody" if qname.as_ref() == b"p:txBody" => {
                    shape.has_text_frame = true;
                    in_text_body = is_start;
                }
                b"p" if in_text_body => shape.paragraphs.push(String::new()),
                b"t" if in_text_body && is_start => in_t = true,
                b"br" if in_text_body => {
                    if let Some(p) = shape.paragraphs.last_mut() {
                        p.push('\n');
                    }
                }
                b"blip" if shape.embed.is_none() => {
                    shape.embed = attr(&e, b"r:embed");
                }
                b"graphicData" => graphic_uri = attr(&e, b"uri"),
                b"gridCol" => cols += 1,
                b"tr" => rows += 1,
                _ => {}
            }
            if local == b"chart" && graphic_uri.as_deref().map(|u| u.ends_with("/chart")) == Some(true) {
                shape.chart_type.get_or_insert_with(|| "chart".to_string());
            }
            if is_start {
                depth += 1;
            }
            continue;
        }
        match event {
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let qname = e.name();
                let local = local_name(qname.as_ref());
                if local == b"xfrm" && xfrm_depth == Some(depth) {
                    xfrm_depth = None;
                    xfrm_done = true;
                } else if qname.as_ref() == b"p:txBody" {
                    in_text_body = false;
                } else if local == b"t" {
                    in_t = false;
                }
            }
            Event::Text(t) if in_t => {
                let text = t
                    .decode()
                    .map_err(|e| PptError::Xml(format!("text decode: {}", e)))?;
                if let Some(p) = shape.paragraphs.last_mut() {
                    p.push_str(&text);
                }
            }
            Event::GeneralRef(r) if in_t => {
                let name = r
                    .decode()
                    .map_err(|e| PptError::Xml(format!("entity decode: {}", e)))?;
                if let (Some(p), Some(resolved)) =
                    (shape.paragraphs.last_mut(), resolve_reference(&name))
                {
                    p.push_str(&resolved);
                }
            }
            Event::CData(c) if in_t => {
                if let Some(p) = shape.paragraphs.last_mut() {
                    p.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let (Some((x, y)), Some((cx, cy))) = (off, ext) {
        shape.geometry = Some(Geometry::new(x, y, cx, cy));
    }
    shape.kind = match root.as_deref() {
        Some(b"sp") => ShapeKind::Text,
        Some(b"pic") => ShapeKind::Picture,
        Some(b"grpSp") => ShapeKind::Group,
        Some(b"cxnSp") => ShapeKind::Connector,
        Some(b"graphicFrame") => match graphic_uri.as_deref() {
            Some(u) if u.ends_with("/table") => {
                shape.table_size = Some((rows, cols));
                ShapeKind::Table
            }
            Some(u) if u.ends_with("/chart") || u.contains("chart") => {
                shape.chart_type.get_or_insert_with(|| "chart".to_string());
                ShapeKind::Chart
            }
            _ => ShapeKind::Other,
        },
        _ => ShapeKind::Other,
    };
    if shape.kind == ShapeKind::Group {
        // Text nested in a group belongs to its children.
        shape.paragraphs.clear();
        shape.has_text_frame = false;
    }
    Ok(shape)
}

/// Replaces the paragraphs of a shape's `p:txBody`, keeping body properties,
/// list style and the first paragraph/run formatting.
fn rewrite_text_body(shape_xml: &str, paragraphs: &[Paragraph]) -> String {
    let Some((start, end)) = find_element(shape_xml, "p:txBody", 0) else {
        let body = build_text_body(
            "<p:txBody>",
            r#"<a:bodyPr wrap="square" rtlCol="0"/>"#,
            "<a:lstStyle/>",
            None,
            None,
            paragraphs,
        );
        return match shape_xml.rfind("</p:sp>") {
            Some(pos) => format!("{}{}{}", &shape_xml[..pos], body, &shape_xml[pos..]),
            None => shape_xml.to_string(),
        };
    };
    let body = &shape_xml[start..end];
    let open_end = body.find('>').map(|p| p + 1).unwrap_or(body.len());
    let open_tag = if body[..open_end].ends_with("/>") {
        "<p:txBody>".to_string()
    } else {
        body[..open_end].to_string()
    };
    let slice = |tag: &str| find_element(body, tag, 0).map(|(s, e)| body[s..e].to_string());
    let body_pr = slice("a:bodyPr").unwrap_or_else(|| "<a:bodyPr/>".to_string());
    let lst_style = slice("a:lstStyle").unwrap_or_else(|| "<a:lstStyle/>".to_string());
    let first_para = find_element(body, "a:p", 0).map(|(s, e)| &body[s..e]);
    let ppr = first_para.and_then(|p| find_element(p, "a:pPr", 0).map(|(s, e)| p[s..e].to_string()));
    let rpr = slice("a:rPr").or_else(|| {
        slice("a:endParaRPr").map(|r| {
            r.replacen("<a:endParaRPr", "<a:rPr", 1)
                .replace("</a:endParaRPr>", "</a:rPr>")
        })
    });
    let rebuilt = build_text_body(
        &open_tag,
        &body_pr,
        &lst_style,
        ppr.as_deref(),
        rpr.as_deref(),
        paragraphs,
    );
    format!("{}{}{}", &shape_xml[..start], rebuilt, &shape_xml[end..])
}

fn build_text_body(
    open_tag: &str,
    body_pr: &str,
    lst_style: &str,
    ppr: Option<&str>,
    rpr: Option<&str>,
    paragraphs: &[Paragraph],
) -> String {
    let mut xml = format!("{}{}{}", open_tag, body_pr, lst_style);
    if paragraphs.is_empty() {
        xml.push_str("<a:p/>");
    }
    for p in paragraphs {
        xml.push_str(&p.to_xml(ppr, rpr));
    }
    xml.push_str("</p:txBody>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
        r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
        r#"<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
        r#"<p:grpSpPr/>"#,
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>"#,
        r#"<p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:pPr algn="ctr"/><a:r><a:rPr lang="en-US" sz="4000"/><a:t>Old &amp; title</a:t></a:r></a:p></p:txBody></p:sp>"#,
        r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Body"/><p:cNvSpPr/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>"#,
        r#"<p:spPr><a:xfrm><a:off x="100" y="200"/><a:ext cx="300" cy="400"/></a:xfrm></p:spPr>"#,
        r#"<p:txBody><a:bodyPr/><a:p><a:r><a:t>line one</a:t></a:r><a:br/><a:r><a:t>two</a:t></a:r></a:p><a:p><a:r><a:t>para</a:t></a:r></a:p></p:txBody></p:sp>"#,
        r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture 3"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>"#,
        r#"<p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr><a:xfrm><a:off x="1" y="2"/><a:ext cx="3" cy="4"/></a:xfrm></p:spPr></p:pic>"#,
        r#"</p:spTree></p:cSld></p:sld>"#
    );

    #[test]
    fn test_parse_shapes() {
        let slide = SlideXml::parse(SLIDE).unwrap();
        let shapes = slide.shapes();
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].placeholder_code(), Some(PH_TITLE));
        assert_eq!(shapes[0].text(), "Old & title");
        assert!(shapes[0].geometry.is_none());
        assert_eq!(shapes[1].placeholder, Some(Placeholder { code: PH_OBJECT, idx: 1 }));
        assert_eq!(shapes[1].geometry, Some(Geometry::new(100, 200, 300, 400)));
        assert_eq!(shapes[1].text(), "line one\ntwo\npara");
        assert_eq!(shapes[2].kind, ShapeKind::Picture);
        assert_eq!(shapes[2].embed.as_deref(), Some("rId2"));
    }

    #[test]
    fn test_edit_keeps_formatting() {
        let mut slide = SlideXml::parse(SLIDE).unwrap();
        slide.set_text(0, "新标题");
        slide.clear_text(1);
        slide.set_picture_embed(2, "rId9");
        let xml = slide.render();
        assert!(xml.contains(r#"<a:pPr algn="ctr"/><a:r><a:rPr lang="en-US" sz="4000"/><a:t>新标题</a:t>"#));
        assert!(!xml.contains("line one"));
        assert!(xml.contains(r#"r:embed="rId9""#));

        let reparsed = SlideXml::parse(&xml).unwrap();
        assert_eq!(reparsed.shapes()[0].text(), "新标题");
        assert!(!reparsed.shapes()[1].has_text());
    }

    #[test]
    fn test_remove_and_append() {
        let mut slide = SlideXml::parse(SLIDE).unwrap();
        slide.remove_shape(2);
        let id = slide.allocate_id();
        assert_eq!(id, 5);
        slide.append_xml(crate::drawing::picture_xml(id, "Picture", "rId7", Geometry::new(0, 0, 10, 10)));
        let xml = slide.render();
        assert!(!xml.contains("rId2"));
        assert!(xml.contains(r#"r:embed="rId7"/>"#));
        assert!(xml.ends_with("</p:spTree></p:cSld></p:sld>"));
    }

    #[test]
    fn test_inherit_geometry_from_layout() {
        let layout = SLIDE.replace(r#"<p:spPr/>"#, r#"<p:spPr><a:xfrm><a:off x="9" y="8"/><a:ext cx="7" cy="6"/></a:xfrm></p:spPr>"#);
        let layout = SlideXml::parse(&layout).unwrap();
        let mut slide = SlideXml::parse(SLIDE).unwrap();
        slide.inherit_geometry(Some(&layout), None);
        assert_eq!(slide.shapes()[0].geometry, Some(Geometry::new(9, 8, 7, 6)));
    }
}
