//! DrawingML fragments for shapes the generators add to slides.

use crate::xml::escape_xml;

pub const EMU_PER_INCH: i64 = 914_400;
pub const EMU_PER_POINT: i64 = 12_700;

/// Built-in "Medium Style 2 - Accent 1" table style.
const TABLE_STYLE_ID: &str = "{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}";

pub fn inches(value: f64) -> i64 {
    (value * EMU_PER_INCH as f64) as i64
}

/// Position and size in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Geometry {
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    /// Geometry given as fractions of the slide size.
    pub fn relative(slide: (i64, i64), x: f64, y: f64, cx: f64, cy: f64) -> Self {
        let (w, h) = (slide.0 as f64, slide.1 as f64);
        Self::new(
            (w * x) as i64,
            (h * y) as i64,
            (w * cx) as i64,
            (h * cy) as i64,
        )
    }

    pub fn area(&self) -> i64 {
        self.cx.saturating_mul(self.cy)
    }

    pub fn intersection_area(&self, other: &Geometry) -> i64 {
        let left = self.x.max(other.x);
        let right = (self.x + self.cx).min(other.x + other.cx);
        let top = self.y.max(other.y);
        let bottom = (self.y + self.cy).min(other.y + other.cy);
        if right <= left || bottom <= top {
            0
        } else {
            (right - left) * (bottom - top)
        }
    }

    fn xfrm(&self, prefix: &str) -> String {
        format!(
            r#"<{p}:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></{p}:xfrm>"#,
            self.x,
            self.y,
            self.cx,
            self.cy,
            p = prefix
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    fn attr(&self) -> &'static str {
        match self {
            Align::Left => "l",
            Align::Center => "ctr",
            Align::Right => "r",
        }
    }
}

/// Run-level formatting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextStyle {
    pub size_pt: Option<u32>,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<(u8, u8, u8)>,
}

impl TextStyle {
    pub fn sized(size_pt: u32) -> Self {
        Self {
            size_pt: Some(size_pt),
            ..Default::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn color(mut self, rgb: (u8, u8, u8)) -> Self {
        self.color = Some(rgb);
        self
    }

    pub fn run_properties(&self) -> String {
        let mut xml = String::from(r#"<a:rPr lang="zh-CN" altLang="en-US" dirty="0""#);
        if let Some(size) = self.size_pt {
            xml.push_str(&format!(r#" sz="{}""#, size * 100));
        }
        if self.bold {
            xml.push_str(r#" b="1""#);
        }
        if self.italic {
            xml.push_str(r#" i="1""#);
        }
        match self.color {
            Some((r, g, b)) => xml.push_str(&format!(
                r#"><a:solidFill><a:srgbClr val="{:02X}{:02X}{:02X}"/></a:solidFill></a:rPr>"#,
                r, g, b
            )),
            None => xml.push_str("/>"),
        }
        xml
    }
}

/// A paragraph to be written into a text body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub text: String,
    pub level: u32,
    pub bullet: bool,
    pub align: Option<Align>,
    pub style: Option<TextStyle>,
}

impl Paragraph {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn bullet(text: impl Into<String>, level: u32) -> Self {
        Self {
            text: text.into(),
            level,
            bullet: true,
            ..Default::default()
        }
    }

    pub fn styled(mut self, style: TextStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn aligned(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    /// Paragraph properties; `inherited` is the template's first `a:pPr`,
    /// reused for plain paragraphs.
    pub fn paragraph_properties(&self, inherited: Option<&str>) -> String {
        if !self.bullet && self.level == 0 && self.align.is_none() {
            return inherited.unwrap_or_default().to_string();
        }
        let mut xml = String::from("<a:pPr");
        if self.bullet {
            let indent = 285_750;
            xml.push_str(&format!(
                r#" marL="{}" indent="-{}""#,
                indent * (self.level as i64 + 1),
                indent
            ));
        }
        if self.level > 0 {
            xml.push_str(&format!(r#" lvl="{}""#, self.level.min(8)));
        }
        if let Some(align) = self.align {
            xml.push_str(&format!(r#" algn="{}""#, align.attr()));
        }
        if self.bullet {
            xml.push_str(r#"><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/></a:pPr>"#);
        } else {
            xml.push_str("/>");
        }
        xml
    }

    /// Full `a:p` element. `inherited_rpr` is used when no explicit style is set.
    pub fn to_xml(&self, inherited_ppr: Option<&str>, inherited_rpr: Option<&str>) -> String {
        let ppr = self.paragraph_properties(inherited_ppr);
        let rpr = match &self.style {
            Some(style) => style.run_properties(),
            None => inherited_rpr.unwrap_or_default().to_string(),
        };
        if self.text.is_empty() {
            let end = end_paragraph_properties(&rpr);
            return format!("<a:p>{}{}</a:p>", ppr, end);
        }
        let mut xml = format!("<a:p>{}", ppr);
        for (i, line) in self.text.split('\n').enumerate() {
            if i > 0 {
                xml.push_str(&format!("<a:br>{}</a:br>", rpr));
            }
            if !line.is_empty() {
                xml.push_str(&format!("<a:r>{}<a:t>{}</a:t></a:r>", rpr, escape_xml(line)));
            }
        }
        xml.push_str("</a:p>");
        xml
    }
}

/// Turns an `a:rPr` into the equivalent `a:endParaRPr`.
fn end_paragraph_properties(rpr: &str) -> String {
    if rpr.is_empty() {
        return String::new();
    }
    rpr.replacen("<a:rPr", "<a:endParaRPr", 1)
        .replace("</a:rPr>", "</a:endParaRPr>")
}

pub fn picture_xml(id: u32, name: &str, rel_id: &str, geom: Geometry) -> String {
    format!(
        concat!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}"/>"#,
            r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
            r#"<p:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
            r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
        ),
        id = id,
        name = escape_xml(name),
        rid = escape_xml(rel_id),
        xfrm = geom.xfrm("a"),
    )
}

pub fn text_box_xml(id: u32, name: &str, geom: Geometry, paragraphs: &[Paragraph]) -> String {
    let mut xml = format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#,
            r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#
        ),
        id,
        escape_xml(name),
        geom.xfrm("a")
    );
    if paragraphs.is_empty() {
        xml.push_str("<a:p/>");
    }
    for p in paragraphs {
        xml.push_str(&p.to_xml(None, None));
    }
    xml.push_str("</p:txBody></p:sp>");
    xml
}

/// A placeholder shape that takes its position from the layout.
/// `ph` holds the `p:ph` attributes, e.g. `type="title"`.
pub fn placeholder_xml(id: u32, name: &str, ph: &str, paragraphs: &[Paragraph]) -> String {
    let mut xml = format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#,
            r#"<p:nvPr><p:ph {}/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>"#
        ),
        id,
        escape_xml(name),
        ph
    );
    if paragraphs.is_empty() {
        xml.push_str("<a:p/>");
    }
    for p in paragraphs {
        xml.push_str(&p.to_xml(None, None));
    }
    xml.push_str("</p:txBody></p:sp>");
    xml
}

/// A table graphic frame; cells are plain strings, rows may be ragged.
pub fn table_xml(
    id: u32,
    name: &str,
    geom: Geometry,
    rows: &[Vec<String>],
    cell_style: Option<TextStyle>,
    align: Option<Align>,
) -> String {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
    let col_w = geom.cx / cols as i64;
    let row_h = geom.cy / rows.len().max(1) as i64;
    let mut xml = format!(
        concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{}" name="{}"/>"#,
            r#"<p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>"#,
            r#"{}<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#,
            r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"><a:tableStyleId>{}</a:tableStyleId></a:tblPr><a:tblGrid>"#
        ),
        id,
        escape_xml(name),
        geom.xfrm("p"),
        TABLE_STYLE_ID
    );
    for _ in 0..cols {
        xml.push_str(&format!(r#"<a:gridCol w="{}"/>"#, col_w));
    }
    xml.push_str("</a:tblGrid>");
    for row in rows {
        xml.push_str(&format!(r#"<a:tr h="{}">"#, row_h));
        for c in 0..cols {
            let text = row.get(c).map(String::as_str).unwrap_or("");
            let mut para = Paragraph::plain(text);
            para.style = cell_style;
            para.align = align;
            xml.push_str("<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>");
            xml.push_str(&para.to_xml(None, None));
            xml.push_str("</a:txBody><a:tcPr/></a:tc>");
        }
        xml.push_str("</a:tr>");
    }
    xml.push_str("</a:tbl></a:graphicData></a:graphic></p:graphicFrame>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullet_paragraph() {
        let xml = Paragraph::bullet("a < b", 1).to_xml(None, Some(r#"<a:rPr sz="2000"/>"#));
        assert!(xml.contains(r#"lvl="1""#));
        assert!(xml.contains("<a:buChar"));
        assert!(xml.contains("<a:t>a &lt; b</a:t>"));
        assert!(xml.contains(r#"<a:rPr sz="2000"/>"#));
    }

    #[test]
    fn test_empty_paragraph_keeps_run_format() {
        let xml = Paragraph::plain("").to_xml(None, Some(r#"<a:rPr sz="2000"/>"#));
        assert_eq!(xml, r#"<a:p><a:endParaRPr sz="2000"/></a:p>"#);
    }

    #[test]
    fn test_table_ragged_rows() {
        let rows = vec![vec!["h1".to_string(), "h2".to_string()], vec!["x".to_string()]];
        let xml = table_xml(5, "Table", Geometry::new(0, 0, 1000, 1000), &rows, None, None);
        assert_eq!(xml.matches("<a:gridCol").count(), 2);
        assert_eq!(xml.matches("<a:tc>").count(), 4);
    }

    #[test]
    fn test_intersection() {
        let a = Geometry::new(0, 0, 10, 10);
        let b = Geometry::new(5, 5, 10, 10);
        assert_eq!(a.intersection_area(&b), 25);
        assert_eq!(a.intersection_area(&Geometry::new(20, 20, 1, 1)), 0);
    }
}
