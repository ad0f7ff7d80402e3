use crate::error::PptError;
use crate::xml::{attr, escape_xml, local_name};
use quick_xml::{events::Event, reader::Reader};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const PRESENTATION: &str = "ppt/presentation.xml";

pub const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
pub const REL_NOTES_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// Default slide size (16:9, 10in x 5.625in) when `p:sldSz` is absent.
pub const DEFAULT_SLIDE_SIZE: (i64, i64) = (9_144_000, 5_143_500);

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn new(id: impl Into<String>, rel_type: &str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.to_string(),
            target: target.into(),
            external: false,
        }
    }
}

/// An OOXML package held fully in memory, parts kept in archive order.
#[derive(Debug, Clone, Default)]
pub struct PptxPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl PptxPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, PptError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            PptError::InvalidTemplate(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PptError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| PptError::InvalidTemplate(format!("not a zip package: {}", e)))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push((name, data));
        }
        let package = Self { parts };
        if !package.has_part(PRESENTATION) {
            return Err(PptError::InvalidTemplate(
                "missing ppt/presentation.xml".to_string(),
            ));
        }
        Ok(package)
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    pub fn part_str(&self, name: &str) -> Result<String, PptError> {
        let data = self
            .part(name)
            .ok_or_else(|| PptError::InvalidTemplate(format!("missing part {}", name)))?;
        String::from_utf8(data.to_vec())
            .map_err(|e| PptError::Xml(format!("{} is not UTF-8: {}", name, e)))
    }

    pub fn set_part(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        match self.parts.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = data,
            None => self.parts.push((name, data)),
        }
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        let pos = self.parts.iter().position(|(n, _)| n == name)?;
        Some(self.parts.remove(pos).1)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PptError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let ordered = self
            .parts
            .iter()
            .filter(|(n, _)| n == CONTENT_TYPES)
            .chain(self.parts.iter().filter(|(n, _)| n != CONTENT_TYPES));
        for (name, data) in ordered {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PptError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Relationships declared by `part`, empty when it has no rels part.
    pub fn relationships(&self, part: &str) -> Vec<Relationship> {
        match self.part(&rels_path(part)) {
            Some(data) => parse_relationships(&String::from_utf8_lossy(data)),
            None => Vec::new(),
        }
    }

    pub fn set_relationships(&mut self, part: &str, rels: &[Relationship]) {
        self.set_part(rels_path(part), write_relationships(rels));
    }

    /// Resolves the part a relationship of `part` points at.
    pub fn target_of(&self, part: &str, rel_id: &str) -> Option<String> {
        self.relationships(part)
            .into_iter()
            .find(|r| r.id == rel_id && !r.external)
            .map(|r| resolve_target(part, &r.target))
    }

    /// First internal relationship of the given type.
    pub fn related_part(&self, part: &str, rel_type: &str) -> Option<String> {
        self.relationships(part)
            .into_iter()
            .find(|r| r.rel_type == rel_type && !r.external)
            .map(|r| resolve_target(part, &r.target))
    }

    /// Slide part names in presentation order.
    pub fn slide_parts(&self) -> Result<Vec<String>, PptError> {
        let xml = self.part_str(PRESENTATION)?;
        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);
        let mut ids = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                    if local_name(e.name().as_ref()) == b"sldId" {
                        if let Some(rid) = attr(&e, b"r:id") {
                            ids.push(rid);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(PptError::Xml(format!("presentation.xml: {}", e))),
                _ => {}
            }
        }
        let rels = self.relationships(PRESENTATION);
        Ok(ids
            .iter()
            .filter_map(|rid| rels.iter().find(|r| &r.id == rid))
            .map(|r| resolve_target(PRESENTATION, &r.target))
            .filter(|name| self.has_part(name))
            .collect())
    }

    /// Slide width and height in EMU.
    pub fn slide_size(&self) -> (i64, i64) {
        let Ok(xml) = self.part_str(PRESENTATION) else {
            return DEFAULT_SLIDE_SIZE;
        };
        let mut reader = Reader::from_str(&xml);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                    if local_name(e.name().as_ref()) == b"sldSz" {
                        let cx = crate::xml::attr_i64(&e, b"cx");
                        let cy = crate::xml::attr_i64(&e, b"cy");
                        if let (Some(cx), Some(cy)) = (cx, cy) {
                            if cx > 0 && cy > 0 {
                                return (cx, cy);
                            }
                        }
                    }
                }
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
        }
        DEFAULT_SLIDE_SIZE
    }

    pub fn content_types(&self) -> ContentTypes {
        self.part(CONTENT_TYPES)
            .map(|d| ContentTypes::parse(&String::from_utf8_lossy(d)))
            .unwrap_or_default()
    }

    pub fn set_content_types(&mut self, types: &ContentTypes) {
        self.set_part(CONTENT_TYPES, types.to_xml());
    }

    /// Stores an image under `ppt/media` and returns the part name.
    pub fn add_media(&mut self, data: &[u8]) -> String {
        let ext = image_extension(data);
        let mut n = 1;
        let name = loop {
            let candidate = format!("ppt/media/image{}.{}", n, ext);
            if !self.has_part(&candidate) {
                break candidate;
            }
            n += 1;
        };
        self.set_part(name.clone(), data.to_vec());
        let mut types = self.content_types();
        types.ensure_default(ext, &format!("image/{}", if ext == "jpg" { "jpeg" } else { ext }));
        self.set_content_types(&types);
        name
    }
}

/// File extension for image bytes, sniffed by magic number.
pub fn image_extension(data: &[u8]) -> &'static str {
    match infer::get(data).map(|k| k.extension()) {
        Some("png") => "png",
        Some("gif") => "gif",
        Some("bmp") => "bmp",
        Some("webp") => "webp",
        _ => "jpg",
    }
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`
pub fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against the directory of its source part.
pub fn resolve_target(source: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segments: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative target from one part to another, as written in rels files.
pub fn relative_target(source: &str, target: &str) -> String {
    let from: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to: Vec<&str> = target.split('/').collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = std::iter::repeat("..").take(from.len() - common).collect();
    parts.extend(&to[common..]);
    parts.join("/")
}

pub fn parse_relationships(xml: &str) -> Vec<Relationship> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut rels = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"Relationship" {
                    let id = attr(&e, b"Id");
                    let rel_type = attr(&e, b"Type");
                    let target = attr(&e, b"Target");
                    if let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) {
                        let external = attr(&e, b"TargetMode").as_deref() == Some("External");
                        rels.push(Relationship {
                            id,
                            rel_type,
                            target,
                            external,
                        });
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    rels
}

pub fn write_relationships(rels: &[Relationship]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    );
    for r in rels {
        xml.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"{}/>",
            escape_xml(&r.id),
            escape_xml(&r.rel_type),
            escape_xml(&r.target),
            if r.external {
                " TargetMode=\"External\""
            } else {
                ""
            }
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// Next free `rIdN` in a relationship list.
pub fn next_rel_id(rels: &[Relationship]) -> String {
    let max = rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// Parsed `[Content_Types].xml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTypes {
    pub defaults: Vec<(String, String)>,
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Self {
        let mut types = ContentTypes::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"Default" => {
                        if let (Some(ext), Some(ct)) = (attr(&e, b"Extension"), attr(&e, b"ContentType")) {
                            types.defaults.push((ext, ct));
                        }
                    }
                    b"Override" => {
                        if let (Some(part), Some(ct)) = (attr(&e, b"PartName"), attr(&e, b"ContentType")) {
                            types
                                .overrides
                                .push((part.trim_start_matches('/').to_string(), ct));
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
        }
        types
    }

    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        if !self.defaults.iter().any(|(e, _)| e.eq_ignore_ascii_case(ext)) {
            self.defaults
                .push((ext.to_string(), content_type.to_string()));
        }
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        self.remove_override(part);
        self.overrides
            .push((part.to_string(), content_type.to_string()));
    }

    pub fn remove_override(&mut self, part: &str) {
        self.overrides.retain(|(p, _)| p != part);
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
        );
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape_xml(ext),
                escape_xml(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                "<Override PartName=\"/{}\" ContentType=\"{}\"/>",
                escape_xml(part),
                escape_xml(ct)
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide3.xml"),
            "ppt/slides/slide3.xml"
        );
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "/ppt/media/image1.png"),
            "ppt/media/image1.png"
        );
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(
            relative_target("ppt/slides/slide1.xml", "ppt/media/image1.png"),
            "../media/image1.png"
        );
        assert_eq!(
            relative_target("ppt/presentation.xml", "ppt/slides/slide2.xml"),
            "slides/slide2.xml"
        );
    }

    #[test]
    fn test_relationships_roundtrip_keeps_external() {
        let rels = vec![
            Relationship::new("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
            Relationship {
                id: "rId2".into(),
                rel_type: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink".into(),
                target: "https://example.com/?a=1&b=2".into(),
                external: true,
            },
        ];
        let parsed = parse_relationships(&write_relationships(&rels));
        assert_eq!(parsed, rels);
        assert_eq!(next_rel_id(&parsed), "rId3");
    }

    #[test]
    fn test_rels_path() {
        assert_eq!(rels_path("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_path("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
    }
}
