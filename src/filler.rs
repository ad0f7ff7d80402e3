//! Fills an arbitrary PPTX template with slide content.
//!
//! Template slides are cloned per content entry, every text frame is
//! emptied, and content is routed to shapes by their inferred role
//! (see [`crate::classify`]). Slides the outline does not use are dropped,
//! so the output has exactly one slide per entry.

use crate::analyzer::{find_best_slide, load_or_analyze, TemplateMetadata};
use crate::classify::classify_shapes;
use crate::cleanup::optimize_text_layout;
use crate::drawing::{picture_xml, table_xml, Geometry, Paragraph};
use crate::error::PptError;
use crate::images::{DefaultImage, ImageService};
use crate::model::{ContentType, Keypoint, SlideContent};
use crate::package::{
    next_rel_id, relative_target, rels_path, resolve_target, PptxPackage, Relationship,
    CT_SLIDE, PRESENTATION, REL_IMAGE, REL_NOTES_SLIDE, REL_SLIDE,
};
use crate::slide::{load_slide, SlideXml};
use crate::xml::find_element;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How template slides are chosen for content entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideAssignment {
    /// Slide `i` for entry `i`; extra entries cycle through the inner slides.
    #[default]
    Positional,
    /// The first slide tagged for the entry's content type.
    ByContentType,
}

/// Summary of a completed fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillReport {
    pub slide_count: usize,
    pub source_slides: Vec<usize>,
    pub content_types: Vec<ContentType>,
    pub images_placed: usize,
    pub tables_placed: usize,
    pub shapes_cleared: usize,
}

#[derive(Debug, Default)]
struct SlideStats {
    images: usize,
    tables: usize,
    cleared: usize,
}

/// Template slide to clone for entry `index` when slides are taken in order.
pub fn positional_source(index: usize, slide_count: usize) -> usize {
    if index < slide_count {
        index
    } else if slide_count <= 2 {
        0
    } else {
        (index - slide_count) % (slide_count - 2) + 1
    }
}

/// Words used to search for a slide picture: title words, leading content
/// words, the first words of the first keypoints, then the subject.
pub fn topic_keywords(slide: &SlideContent) -> Vec<String> {
    let mut keywords: Vec<String> = slide
        .title
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .map(str::to_string)
        .collect();
    for word in slide.content.split_whitespace().take(10) {
        if word.chars().count() > 1 && !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    for point in slide.keypoints.iter().take(3) {
        let Keypoint::Text(text) = point else { continue };
        for word in text.split_whitespace().take(3) {
            if word.chars().count() > 1 && !keywords.iter().any(|k| k == word) {
                keywords.push(word.to_string());
            }
        }
    }
    if let Some(subject) = &slide.subject {
        keywords.push(subject.clone());
    }
    keywords
}

/// Default picture used when neither a user image nor a topic image is found.
pub fn fallback_image(slide: &SlideContent) -> DefaultImage {
    let subject = slide.subject.as_deref().unwrap_or_default().to_lowercase();
    let title = slide.title.to_lowercase();
    let content = slide.content.to_lowercase();
    if subject.contains("生物") || title.contains("细胞") || content.contains("细胞") {
        if title.contains("植物") || content.contains("植物") {
            DefaultImage::PlantCell
        } else {
            DefaultImage::AnimalCell
        }
    } else if title.contains("总结") || title.contains("结论") {
        DefaultImage::Conclusion
    } else if title.contains("封面") || title.contains("标题") || slide.kind_is("cover") {
        DefaultImage::Cover
    } else {
        DefaultImage::Default
    }
}

pub struct TemplateFiller {
    images: Arc<ImageService>,
    assignment: SlideAssignment,
    optimize_layout: bool,
}

impl TemplateFiller {
    pub fn new(images: Arc<ImageService>) -> Self {
        Self {
            images,
            assignment: SlideAssignment::default(),
            optimize_layout: true,
        }
    }

    pub fn with_assignment(mut self, assignment: SlideAssignment) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn with_layout_optimization(mut self, enabled: bool) -> Self {
        self.optimize_layout = enabled;
        self
    }

    /// Fills `template` with `slides` and writes the result to `output`.
    pub async fn fill(
        &self,
        template: impl AsRef<Path>,
        slides: &[SlideContent],
        output: impl AsRef<Path>,
    ) -> Result<FillReport, PptError> {
        let template = template.as_ref();
        let output = output.as_ref();
        info!(template = %template.display(), output = %output.display(), slides = slides.len(), "filling template");
        let package = PptxPackage::open(template)?;
        let metadata = match load_or_analyze(template) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(template = %template.display(), error = %e, "no template metadata, using geometry only");
                None
            }
        };
        let (package, report) = self.fill_package(package, metadata.as_ref(), slides).await?;
        package.save(output)?;
        info!(output = %output.display(), slides = report.slide_count, "template filled");
        Ok(report)
    }

    pub async fn fill_package(
        &self,
        mut package: PptxPackage,
        metadata: Option<&TemplateMetadata>,
        slides: &[SlideContent],
    ) -> Result<(PptxPackage, FillReport), PptError> {
        if slides.is_empty() {
            return Err(PptError::InvalidRequest("no slide content to fill".to_string()));
        }
        let sources = package.slide_parts()?;
        if sources.is_empty() {
            return Err(PptError::InvalidTemplate("template has no slides".to_string()));
        }
        let size = package.slide_size();
        let total = slides.len();

        let mut report = FillReport {
            slide_count: total,
            ..Default::default()
        };
        for (i, slide) in slides.iter().enumerate() {
            let content_type = slide.content_type(i, total);
            let source = match self.assignment {
                SlideAssignment::Positional => positional_source(i, sources.len()),
                SlideAssignment::ByContentType => {
                    find_best_slide(metadata, content_type, i, sources.len())
                }
            };
            debug!(slide = i + 1, source, content_type = %content_type, "assigned template slide");
            report.content_types.push(content_type);
            report.source_slides.push(source);
        }

        let parts = rebuild_slide_list(&mut package, &sources, &report.source_slides)?;

        for (i, (part, slide)) in parts.iter().zip(slides).enumerate() {
            info!(slide = i + 1, content_type = %report.content_types[i], title = %slide.title, "filling slide");
            let stats = self.fill_slide(&mut package, part, slide, size).await?;
            report.images_placed += stats.images;
            report.tables_placed += stats.tables;
            report.shapes_cleared += stats.cleared;
        }
        Ok((package, report))
    }

    async fn fill_slide(
        &self,
        package: &mut PptxPackage,
        part: &str,
        content: &SlideContent,
        size: (i64, i64),
    ) -> Result<SlideStats, PptError> {
        let mut slide = load_slide(package, part)?;
        let mut stats = SlideStats::default();

        let text_frames: Vec<usize> = (0..slide.shapes().len())
            .filter(|&i| slide.shapes()[i].has_text_frame)
            .collect();
        for &i in &text_frames {
            slide.clear_text(i);
        }

        let roles = classify_shapes(slide.shapes(), size);
        let mut used: HashSet<usize> = HashSet::new();
        let largest_unused = |used: &HashSet<usize>, slide: &SlideXml| {
            roles
                .text
                .iter()
                .copied()
                .filter(|i| !used.contains(i))
                .max_by_key(|&i| slide.shapes()[i].area())
        };

        let title = content.title.trim();
        if !title.is_empty() {
            if let Some(&target) = roles.title.first().or(roles.text.first()) {
                slide.set_text(target, title);
                used.insert(target);
            }
        }

        if let Some(subtitle) = content.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
            let target = roles.subtitle.first().copied().or_else(|| {
                (roles.text.len() > 1 && roles.title.is_empty()).then(|| roles.text[1])
            });
            if let Some(target) = target {
                slide.set_text(target, subtitle);
                used.insert(target);
            }
        }

        let body = content.content.trim();
        if !body.is_empty() {
            let target = roles
                .content
                .first()
                .copied()
                .filter(|i| !used.contains(i))
                .or_else(|| largest_unused(&used, &slide));
            if let Some(target) = target {
                slide.set_text(target, body);
                used.insert(target);
            }
        }

        if !content.keypoints.is_empty() {
            let target = if body.is_empty() && !roles.content.is_empty() {
                Some(roles.content[0])
            } else if roles.content.len() > 1 {
                Some(roles.content[1])
            } else {
                largest_unused(&used, &slide)
            };
            if let Some(target) = target {
                let paragraphs: Vec<Paragraph> = content
                    .keypoints
                    .iter()
                    .map(|p| Paragraph::bullet(p.text(), p.level()))
                    .collect();
                slide.set_paragraphs(target, &paragraphs);
                used.insert(target);
                debug!(count = paragraphs.len(), "keypoints written");
            }
        }

        let wants_image = content.image.is_some()
            || content.image_url.is_some()
            || content.layout_is("image");
        let has_target = !roles.image_placeholders.is_empty() || !roles.decorative_pictures.is_empty();
        if wants_image || has_target {
            if let Some(data) = self.slide_image(content).await {
                let smallest = roles
                    .decorative_pictures
                    .iter()
                    .copied()
                    .min_by_key(|&i| slide.shapes()[i].area());
                if let Some(&ph) = roles.image_placeholders.first() {
                    let geom = slide.shapes()[ph].geometry_or_default();
                    let rel_id = attach_image(package, part, &data);
                    let id = slide.allocate_id();
                    slide.remove_shape(ph);
                    slide.append_xml(picture_xml(id, &format!("Picture {}", id), &rel_id, geom));
                    stats.images += 1;
                } else if let Some(pic) = smallest {
                    let rel_id = attach_image(package, part, &data);
                    if slide.set_picture_embed(pic, &rel_id) {
                        stats.images += 1;
                    }
                } else if wants_image {
                    let geom = Geometry::relative(size, 0.5, 0.3, 0.4, 0.4);
                    let rel_id = attach_image(package, part, &data);
                    let id = slide.allocate_id();
                    slide.append_xml(picture_xml(id, &format!("Picture {}", id), &rel_id, geom));
                    stats.images += 1;
                }
            }
        }

        if let Some(rows) = content.table.as_ref().and_then(|t| t.rows()) {
            let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
            if !rows.is_empty() && cols > 0 {
                let geom = match roles.table_placeholders.first() {
                    Some(&ph) => {
                        let geom = slide.shapes()[ph].geometry_or_default();
                        slide.remove_shape(ph);
                        geom
                    }
                    None => Geometry::relative(size, 0.1, 0.4, 0.8, 0.4),
                };
                let id = slide.allocate_id();
                slide.append_xml(table_xml(id, &format!("Table {}", id), geom, rows, None, None));
                stats.tables += 1;
                info!(rows = rows.len(), cols, "table added");
            }
        } else if content.table.is_some() {
            debug!("HTML table skipped in template fill");
        }

        if let Some(footer) = content.footer.as_deref().filter(|f| !f.trim().is_empty()) {
            let lowest = roles
                .text
                .iter()
                .copied()
                .filter(|i| !used.contains(i))
                .max_by_key(|&i| slide.shapes()[i].geometry_or_default().y);
            if let Some(target) = lowest {
                slide.set_text(target, footer);
                used.insert(target);
            }
        }

        if self.optimize_layout {
            stats.cleared = optimize_text_layout(&mut slide, content, size);
        }
        package.set_part(part.to_string(), slide.render());
        Ok(stats)
    }

    /// User image, then a topic search, then a default picture.
    async fn slide_image(&self, content: &SlideContent) -> Option<Vec<u8>> {
        if let Some(data) = self.images.user_image(content).await {
            return Some(data);
        }
        let keywords = topic_keywords(content);
        if let Some(data) = self.images.topic_image(&keywords).await {
            return Some(data);
        }
        match self.images.default_image(fallback_image(content)) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(error = %e, "default image unavailable");
                None
            }
        }
    }
}

/// Stores image bytes and links them from `part`, returning the new rId.
fn attach_image(package: &mut PptxPackage, part: &str, data: &[u8]) -> String {
    let media = package.add_media(data);
    let mut rels = package.relationships(part);
    let rel_id = next_rel_id(&rels);
    rels.push(Relationship::new(
        rel_id.clone(),
        REL_IMAGE,
        relative_target(part, &media),
    ));
    package.set_relationships(part, &rels);
    rel_id
}

/// Replaces the template's slides with clones of `picks`, one per entry,
/// and rewrites the presentation's slide list. Returns the new part names.
fn rebuild_slide_list(
    package: &mut PptxPackage,
    sources: &[String],
    picks: &[usize],
) -> Result<Vec<String>, PptError> {
    let originals: Vec<(String, Vec<Relationship>)> = sources
        .iter()
        .map(|part| package.part_str(part).map(|xml| (xml, package.relationships(part))))
        .collect::<Result<_, _>>()?;

    let mut types = package.content_types();
    for part in sources {
        for rel in package.relationships(part) {
            if rel.rel_type == REL_NOTES_SLIDE && !rel.external {
                let notes = resolve_target(part, &rel.target);
                package.remove_part(&rels_path(&notes));
                package.remove_part(&notes);
                types.remove_override(&notes);
            }
        }
        package.remove_part(&rels_path(part));
        package.remove_part(part);
        types.remove_override(part);
    }

    let mut parts = Vec::with_capacity(picks.len());
    for (k, &pick) in picks.iter().enumerate() {
        let part = format!("ppt/slides/slide{}.xml", k + 1);
        let (xml, rels) = &originals[pick];
        let rels: Vec<Relationship> = rels
            .iter()
            .filter(|r| r.rel_type != REL_NOTES_SLIDE)
            .cloned()
            .map(|mut r| {
                if r.rel_type == REL_SLIDE && !r.external {
                    r.target = "slide1.xml".to_string();
                }
                r
            })
            .collect();
        package.set_part(part.clone(), xml.clone());
        package.set_relationships(&part, &rels);
        types.set_override(&part, CT_SLIDE);
        parts.push(part);
    }
    package.set_content_types(&types);

    let mut pres_rels: Vec<Relationship> = package
        .relationships(PRESENTATION)
        .into_iter()
        .filter(|r| r.rel_type != REL_SLIDE)
        .collect();
    let mut entries = String::new();
    let mut ids = Vec::with_capacity(parts.len());
    for (k, part) in parts.iter().enumerate() {
        let rel_id = next_rel_id(&pres_rels);
        ids.push(256 + k);
        entries.push_str(&format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 256 + k, rel_id));
        pres_rels.push(Relationship::new(
            rel_id,
            REL_SLIDE,
            relative_target(PRESENTATION, part),
        ));
    }
    package.set_relationships(PRESENTATION, &pres_rels);

    let presentation = package.part_str(PRESENTATION)?;
    let presentation = replace_slide_id_list(&presentation, &entries)?;
    let presentation = rewrite_sections(&presentation, &ids);
    package.set_part(PRESENTATION, presentation);
    Ok(parts)
}

/// Swaps in a new `p:sldIdLst` and drops custom shows, which name old slides.
fn replace_slide_id_list(xml: &str, entries: &str) -> Result<String, PptError> {
    let list = format!("<p:sldIdLst>{}</p:sldIdLst>", entries);
    let mut out = match find_element(xml, "p:sldIdLst", 0) {
        Some((s, e)) => format!("{}{}{}", &xml[..s], list, &xml[e..]),
        None => {
            let (s, _) = find_element(xml, "p:sldSz", 0).ok_or_else(|| {
                PptError::InvalidTemplate("presentation.xml has no p:sldSz".to_string())
            })?;
            format!("{}{}{}", &xml[..s], list, &xml[s..])
        }
    };
    if let Some((s, e)) = find_element(&out, "p:custShowLst", 0) {
        out.replace_range(s..e, "");
    }
    Ok(out)
}

/// Collapses `p14:sectionLst` into its first section holding every slide in `ids`.
fn rewrite_sections(xml: &str, ids: &[usize]) -> String {
    let Some((s, e)) = find_element(xml, "p14:sectionLst", 0) else {
        return xml.to_string();
    };
    let block = &xml[s..e];
    let open_tag = |from: usize, tag: &str| -> Option<String> {
        let (ts, _) = find_element(block, tag, from)?;
        let end = ts + block[ts..].find('>')?;
        Some(format!("{}>", block[ts..end].trim_end_matches('/')))
    };
    let list_open = open_tag(0, "p14:sectionLst")
        .unwrap_or_else(|| "<p14:sectionLst>".to_string());
    let section_open = open_tag(1, "p14:section")
        .unwrap_or_else(|| r#"<p14:section name="Default Section">"#.to_string());
    let slides: String = ids
        .iter()
        .map(|id| format!(r#"<p14:sldId id="{}"/>"#, id))
        .collect();
    let rebuilt = format!(
        "{}{}<p14:sldIdLst>{}</p14:sldIdLst></p14:section></p14:sectionLst>",
        list_open, section_open, slides
    );
    format!("{}{}{}", &xml[..s], rebuilt, &xml[e..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_source() {
        assert_eq!(positional_source(2, 5), 2);
        assert_eq!(positional_source(5, 5), 1);
        assert_eq!(positional_source(7, 5), 3);
        assert_eq!(positional_source(8, 5), 1);
        assert_eq!(positional_source(3, 2), 0);
    }

    #[test]
    fn test_topic_keywords_order() {
        let mut slide = SlideContent::new("Plant cells", "cells have a wall")
            .with_keypoints(["chloroplast makes sugar fast"]);
        slide.subject = Some("biology".into());
        assert_eq!(
            topic_keywords(&slide),
            vec!["Plant", "cells", "have", "wall", "chloroplast", "makes", "sugar", "biology"]
        );
    }

    #[test]
    fn test_fallback_image() {
        let cell = SlideContent::new("植物细胞", "");
        assert_eq!(fallback_image(&cell), DefaultImage::PlantCell);
        let end = SlideContent::new("课程总结", "");
        assert_eq!(fallback_image(&end), DefaultImage::Conclusion);
        assert_eq!(fallback_image(&SlideContent::new("x", "")), DefaultImage::Default);
    }

    #[test]
    fn test_replace_slide_id_list() {
        let xml = r#"<p:presentation><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="1" cy="1"/><p:custShowLst><p:custShow/></p:custShowLst></p:presentation>"#;
        let out = replace_slide_id_list(xml, r#"<p:sldId id="256" r:id="rId9"/>"#).unwrap();
        assert!(out.contains(r#"r:id="rId9""#));
        assert!(!out.contains("rId2"));
        assert!(!out.contains("custShowLst"));

        let bare = r#"<p:presentation><p:sldSz cx="1" cy="1"/></p:presentation>"#;
        let out = replace_slide_id_list(bare, "").unwrap();
        assert!(out.starts_with("<p:presentation><p:sldIdLst></p:sldIdLst><p:sldSz"));
    }

    #[test]
    fn test_sections_follow_new_slide_ids() {
        let xml = concat!(
            r#"<p:presentation><p:extLst><p:ext uri="{521415D9-36F7-43E2-AB2F-B90AF26B5E84}">"#,
            r#"<p14:sectionLst xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main">"#,
            r#"<p14:section name="Intro" id="{A}"><p14:sldIdLst><p14:sldId id="256"/><p14:sldId id="257"/></p14:sldIdLst></p14:section>"#,
            r#"<p14:section name="Body" id="{B}"><p14:sldIdLst><p14:sldId id="258"/><p14:sldId id="259"/></p14:sldIdLst></p14:section>"#,
            r#"</p14:sectionLst></p:ext></p:extLst></p:presentation>"#
        );
        let out = rewrite_sections(xml, &[256, 257]);
        assert!(out.contains(r#"<p14:section name="Intro" id="{A}"><p14:sldIdLst><p14:sldId id="256"/><p14:sldId id="257"/></p14:sldIdLst></p14:section></p14:sectionLst>"#));
        assert!(!out.contains(r#"id="258""#), "stale ids remain: {}", out);
        assert!(!out.contains("Body"));
        assert!(out.ends_with("</p:ext></p:extLst></p:presentation>"));

        let plain = "<p:presentation><p:sldSz/></p:presentation>";
        assert_eq!(rewrite_sections(plain, &[256]), plain);
    }
}
