//! Template analysis and template filling, against decks synthesised in code.
use aippt::analyzer::{
    analyze_all_templates, analyze_package, load_or_analyze, metadata_path, save_metadata,
};
use aippt::builder::{DeckBuilder, Layout, SlideDraft};
use aippt::drawing::{inches, Geometry, Paragraph};
use aippt::images::DefaultImage;
use aippt::model::ContentType;
use aippt::slide::{load_slide, ShapeKind};
use aippt::{
    ImageService, NoTemplateGenerator, PptxPackage, SlideAssignment, SlideContent, TemplateFiller,
};
use std::path::Path;
use std::sync::Arc;

fn offline_images(dir: &Path) -> Arc<ImageService> {
    Arc::new(ImageService::offline(dir.join("default_images")))
}

/// Four-slide template: cover, keypoints, picture, closing.
async fn write_template(dir: &Path, name: &str) -> std::path::PathBuf {
    let slides = vec![
        SlideContent::new("模板封面", "副标题"),
        SlideContent::new("要点页", "说明").with_keypoints(["第一点", "第二点"]),
        SlideContent::new("图片页", "图片说明").with_layout("image"),
        SlideContent::new("总结", "结束语"),
    ];
    let package = NoTemplateGenerator::new(offline_images(dir))
        .build(&slides)
        .await;
    let path = dir.join(name);
    package.save(&path).expect("template should save");
    path
}

fn slide_texts(package: &PptxPackage, part: &str) -> String {
    load_slide(package, part)
        .expect("slide should parse")
        .shapes()
        .iter()
        .map(|s| s.text())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Analysis
// ============================================================================

#[tokio::test]
async fn test_analyze_tags_slides() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_template(dir.path(), "basic.pptx").await;
    let package = PptxPackage::open(&path).unwrap();

    let meta = analyze_package(&package, "basic").unwrap();
    assert_eq!(meta.slide_count, 4);
    assert_eq!(meta.slides[0].suitable_for, vec!["cover"]);
    assert!(meta.slides[3].supports(ContentType::Summary));
    assert!(meta.slides[2].has_image, "picture slide should be detected");
    assert!(meta.suitable_for["cover"]);
    assert_eq!(meta.desc, "basic模板");
}

#[tokio::test]
async fn test_sidecar_written_and_reused() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_template(dir.path(), "sidecar.pptx").await;

    let first = load_or_analyze(&path).unwrap();
    let sidecar = metadata_path(&path);
    assert!(sidecar.exists(), "analysis should write {}", sidecar.display());

    // A fresh sidecar is read back, including hand edits.
    let mut edited = first.clone();
    edited.desc = "蓝色商务风格".to_string();
    save_metadata(&path, &edited).unwrap();
    let second = load_or_analyze(&path).unwrap();
    assert_eq!(second.desc, "蓝色商务风格");
    assert_eq!(second.slide_count, first.slide_count);
}

#[tokio::test]
async fn test_corrupt_sidecar_is_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_template(dir.path(), "broken.pptx").await;
    std::fs::write(metadata_path(&path), "{ not json").unwrap();

    let meta = load_or_analyze(&path).unwrap();
    assert_eq!(meta.slide_count, 4);
    let text = std::fs::read_to_string(metadata_path(&path)).unwrap();
    assert!(text.contains("\"slide_count\": 4"));
}

#[tokio::test]
async fn test_analyze_all_skips_lock_and_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "a.pptx").await;
    write_template(dir.path(), "b.pptx").await;
    std::fs::write(dir.path().join("~$a.pptx"), b"lock").unwrap();
    std::fs::write(dir.path().join("broken.pptx"), b"not a zip").unwrap();

    let all = analyze_all_templates(dir.path()).unwrap();
    let names: Vec<&str> = all.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(dir.path().join("b.json").is_file());
    assert!(!dir.path().join("broken.json").exists());
}

#[test]
fn test_open_rejects_non_package() {
    let result = PptxPackage::from_bytes(b"definitely not a zip");
    assert!(result.is_err());
}

// ============================================================================
// Filling
// ============================================================================

#[tokio::test]
async fn test_fill_matches_outline_length() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path(), "fill.pptx").await;
    let output = dir.path().join("out.pptx");

    let outline = vec![
        SlideContent::new("细胞的结构", "高中生物"),
        SlideContent::new("细胞膜", "").with_keypoints(["磷脂双分子层", "蛋白质"]),
        SlideContent::new("细胞核", "遗传信息库"),
        SlideContent::new("线粒体", "有氧呼吸的主要场所"),
        SlideContent::new("叶绿体", "光合作用"),
        SlideContent::new("课堂总结", "回顾").with_kind("conclusion"),
    ];
    let filler = TemplateFiller::new(offline_images(dir.path()));
    let report = filler.fill(&template, &outline, &output).await.unwrap();

    assert_eq!(report.slide_count, 6);
    assert_eq!(report.source_slides.len(), 6);
    assert_eq!(report.content_types[0], ContentType::Cover);

    let package = PptxPackage::open(&output).unwrap();
    let parts = package.slide_parts().unwrap();
    assert_eq!(parts.len(), 6, "unused template slides should be dropped");

    for (part, slide) in parts.iter().zip(&outline) {
        let text = slide_texts(&package, part);
        assert!(
            text.contains(&slide.title),
            "slide {} should carry title {:?}, got {:?}",
            part,
            slide.title,
            text
        );
    }
    assert!(slide_texts(&package, &parts[1]).contains("磷脂双分子层"));
    assert!(!slide_texts(&package, &parts[0]).contains("模板封面"));
}

#[tokio::test]
async fn test_fill_places_tables() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path(), "table.pptx").await;
    let output = dir.path().join("table_out.pptx");

    let outline = vec![
        SlideContent::new("对比", ""),
        SlideContent::new("细胞器比较", "").with_table(vec![
            vec!["细胞器".into(), "功能".into()],
            vec!["线粒体".into(), "供能".into()],
        ]),
    ];
    let report = TemplateFiller::new(offline_images(dir.path()))
        .with_assignment(SlideAssignment::ByContentType)
        .fill(&template, &outline, &output)
        .await
        .unwrap();
    assert_eq!(report.tables_placed, 1);

    let package = PptxPackage::open(&output).unwrap();
    let parts = package.slide_parts().unwrap();
    let slide = load_slide(&package, &parts[1]).unwrap();
    assert!(slide.shapes().iter().any(|s| s.kind == ShapeKind::Table));
}

#[tokio::test]
async fn test_fill_replaces_picture_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let images = offline_images(dir.path());
    let logo = images.default_image(DefaultImage::Cover).unwrap();

    // A title slide with a small corner logo.
    let mut draft = SlideDraft::new(Layout::TitleOnly);
    draft
        .placeholder(r#"type="title""#, "Title 1", &[Paragraph::plain("标题")])
        .picture(
            logo,
            Geometry::new(inches(8.5), inches(0.2), inches(1.2), inches(1.2)),
        );
    let mut deck = DeckBuilder::new();
    deck.push(draft);
    let template = dir.path().join("logo.pptx");
    deck.finish().save(&template).unwrap();

    let output = dir.path().join("logo_out.pptx");
    let outline = vec![SlideContent::new("植物细胞", "细胞壁与叶绿体")];
    let report = TemplateFiller::new(images)
        .fill(&template, &outline, &output)
        .await
        .unwrap();
    assert_eq!(report.images_placed, 1);

    let package = PptxPackage::open(&output).unwrap();
    let parts = package.slide_parts().unwrap();
    let slide = load_slide(&package, &parts[0]).unwrap();
    let pictures: Vec<_> = slide
        .shapes()
        .iter()
        .filter(|s| s.kind == ShapeKind::Picture)
        .collect();
    assert_eq!(pictures.len(), 1, "the logo should be retargeted, not stacked");
    assert_ne!(pictures[0].embed.as_deref(), Some("rId2"));
}

#[tokio::test]
async fn test_fill_places_one_image_per_slide() {
    let dir = tempfile::tempdir().unwrap();
    let images = offline_images(dir.path());
    let logo = images.default_image(DefaultImage::Cover).unwrap();

    // Picture placeholder plus a corner logo: only the placeholder is filled.
    let mut draft = SlideDraft::new(Layout::TitleOnly);
    draft
        .placeholder(r#"type="title""#, "Title 1", &[Paragraph::plain("标题")])
        .placeholder(r#"type="pic" idx="1""#, "Picture Placeholder 2", &[])
        .picture(
            logo,
            Geometry::new(inches(8.5), inches(0.2), inches(1.2), inches(1.2)),
        );
    let mut deck = DeckBuilder::new();
    deck.push(draft);
    let template = dir.path().join("pic_ph.pptx");
    deck.finish().save(&template).unwrap();

    let output = dir.path().join("pic_ph_out.pptx");
    let outline = vec![SlideContent::new("植物细胞", "细胞壁与叶绿体").with_layout("image")];
    let report = TemplateFiller::new(images)
        .fill(&template, &outline, &output)
        .await
        .unwrap();
    assert_eq!(report.images_placed, 1);

    let package = PptxPackage::open(&output).unwrap();
    let parts = package.slide_parts().unwrap();
    let slide = load_slide(&package, &parts[0]).unwrap();
    let embeds: Vec<_> = slide
        .shapes()
        .iter()
        .filter(|s| s.kind == ShapeKind::Picture)
        .map(|s| s.embed.clone())
        .collect();
    assert_eq!(embeds.len(), 2, "placeholder picture plus the untouched logo");
    assert!(embeds.contains(&Some("rId2".to_string())), "logo kept: {:?}", embeds);
}

#[tokio::test]
async fn test_fill_rejects_empty_outline() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path(), "empty.pptx").await;
    let result = TemplateFiller::new(offline_images(dir.path()))
        .fill(&template, &[], dir.path().join("never.pptx"))
        .await;
    assert!(result.is_err());
}
