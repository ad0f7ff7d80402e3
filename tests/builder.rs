//! Decks built without a template, and backend fallback.
use aippt::builder::{image_deck, DeckBuilder, Layout, SlideDraft};
use aippt::drawing::Paragraph;
use aippt::html::{HtmlTemplateSet, INFO_FILE};
use aippt::images::DefaultImage;
use aippt::slide::{load_slide, ShapeKind};
use aippt::{
    Backend, HtmlEngine, ImageService, NoTemplateGenerator, PptGenerator, PptxPackage,
    RenderOptions, SlideContent, TemplateFiller,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn offline_images(dir: &Path) -> Arc<ImageService> {
    Arc::new(ImageService::offline(dir.join("default_images")))
}

fn shape_kinds(package: &PptxPackage, part: &str) -> Vec<ShapeKind> {
    load_slide(package, part)
        .expect("slide should parse")
        .shapes()
        .iter()
        .map(|s| s.kind)
        .collect()
}

fn slide_text(package: &PptxPackage, part: &str) -> String {
    load_slide(package, part)
        .expect("slide should parse")
        .shapes()
        .iter()
        .map(|s| s.text())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Without a template
// ============================================================================

#[tokio::test]
async fn test_every_entry_becomes_a_slide() {
    let dir = tempfile::tempdir().unwrap();
    let slides = vec![
        SlideContent::new("遗传与变异", "高中生物必修二"),
        SlideContent::new("孟德尔定律", "").with_keypoints(["分离定律", "自由组合定律"]),
        SlideContent::new("杂交实验", "豌豆").with_layout("image"),
        SlideContent::new("性状比例", "").with_table(vec![
            vec!["性状".into(), "比例".into()],
            vec!["显性".into(), "3".into()],
            vec!["隐性".into(), "1".into()],
        ]),
        SlideContent::new("总结", "分离与组合"),
    ];
    let output = dir.path().join("plain.pptx");
    NoTemplateGenerator::new(offline_images(dir.path()))
        .generate(&slides, &output)
        .await
        .unwrap();

    let package = PptxPackage::open(&output).unwrap();
    let parts = package.slide_parts().unwrap();
    assert_eq!(parts.len(), slides.len());

    assert!(slide_text(&package, &parts[0]).contains("高中生物必修二"));
    assert!(slide_text(&package, &parts[1]).contains("自由组合定律"));
    assert!(shape_kinds(&package, &parts[2]).contains(&ShapeKind::Picture));
    assert!(shape_kinds(&package, &parts[3]).contains(&ShapeKind::Table));
    assert!(slide_text(&package, &parts[4]).contains("分离与组合"));
}

#[tokio::test]
async fn test_blank_titles_get_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let slides = vec![SlideContent::new("", "副标题"), SlideContent::new("", "正文")];
    let package = NoTemplateGenerator::new(offline_images(dir.path()))
        .build(&slides)
        .await;
    let parts = package.slide_parts().unwrap();
    assert!(slide_text(&package, &parts[0]).contains("演示文稿"));
    assert!(slide_text(&package, &parts[1]).contains("总结"));
}

#[tokio::test]
async fn test_html_table_shows_error_box() {
    let dir = tempfile::tempdir().unwrap();
    let slides: Vec<SlideContent> = serde_json::from_value(json!([
        {"title": "封面"},
        {"title": "数据", "table": "<table><tr><td>1</td></tr></table>"},
        {"title": "结尾"}
    ]))
    .unwrap();
    let package = NoTemplateGenerator::new(offline_images(dir.path()))
        .build(&slides)
        .await;
    let parts = package.slide_parts().unwrap();
    assert!(slide_text(&package, &parts[1]).contains("表格创建失败"));
    assert!(!shape_kinds(&package, &parts[1]).contains(&ShapeKind::Table));
}

#[tokio::test]
async fn test_image_deck_covers_slides() {
    let dir = tempfile::tempdir().unwrap();
    let images = offline_images(dir.path());
    let shots = vec![
        images.default_image(DefaultImage::Cover).unwrap(),
        images.default_image(DefaultImage::Summary).unwrap(),
    ];
    let size = (12_192_000, 6_858_000);
    let package = image_deck(&shots, size);

    assert_eq!(package.slide_size(), size);
    let parts = package.slide_parts().unwrap();
    assert_eq!(parts.len(), 2);
    let slide = load_slide(&package, &parts[0]).unwrap();
    let picture = &slide.shapes()[0];
    assert_eq!(picture.kind, ShapeKind::Picture);
    let geom = picture.geometry.expect("picture should be positioned");
    assert_eq!((geom.cx, geom.cy), size);
}

// ============================================================================
// HTML engine
// ============================================================================

/// Cover, content and closing slides on a 16:9 deck; the content title is positioned.
fn write_html_template(dir: &Path) -> std::path::PathBuf {
    let mut deck = DeckBuilder::with_size((12_192_000, 6_858_000));
    let mut cover = SlideDraft::new(Layout::Title);
    cover.placeholder(r#"type="ctrTitle""#, "Title 1", &[Paragraph::plain("封面")]);
    deck.push(cover);
    let mut content = SlideDraft::new(Layout::TitleContent);
    content
        .placeholder(r#"type="title""#, "Title 1", &[Paragraph::plain("标题")])
        .placeholder(r#"idx="1""#, "Content Placeholder 2", &[Paragraph::plain("正文")]);
    deck.push(content);
    let mut closing = SlideDraft::new(Layout::TitleOnly);
    closing.placeholder(r#"type="title""#, "Title 1", &[Paragraph::plain("谢谢")]);
    deck.push(closing);

    let mut package = deck.finish();
    let parts = package.slide_parts().unwrap();
    let xml = package.part_str(&parts[1]).unwrap().replacen(
        "<p:spPr/>",
        r#"<p:spPr><a:xfrm><a:off x="1219200" y="685800"/><a:ext cx="9753600" cy="1371600"/></a:xfrm></p:spPr>"#,
        1,
    );
    package.set_part(parts[1].clone(), xml);
    let path = dir.join("lesson.pptx");
    package.save(&path).unwrap();
    path
}

#[tokio::test]
async fn test_convert_template_writes_pages() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_html_template(dir.path());
    let engine = HtmlEngine::new(dir.path().join("html"), offline_images(dir.path()));

    let set = engine.convert_template(&template).unwrap();
    let info = dir.path().join("html").join("lesson").join(INFO_FILE);
    assert!(info.is_file());
    let recorded: HtmlTemplateSet =
        serde_json::from_str(&std::fs::read_to_string(&info).unwrap()).unwrap();
    assert_eq!(recorded.slides.len(), 3);

    let purposes: Vec<Vec<String>> = set.slides.iter().map(|s| s.purposes.clone()).collect();
    assert_eq!(purposes, vec![vec!["cover"], vec!["content"], vec!["conclusion"]]);
    assert_eq!(set.templates["content"], vec!["content.html"]);

    let page = set.read_page("content.html").unwrap();
    assert!(
        page.contains("left:128px; top:72px; width:1024px; height:144px;"),
        "title should be scaled onto 1280x720: {}",
        page
    );
    assert!(page.contains("{{title}}"));
    assert!(set.dir.join("style.css").is_file());
}

#[tokio::test]
async fn test_fill_slides_reuses_converted_pages() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_html_template(dir.path());
    let engine = HtmlEngine::new(dir.path().join("html"), offline_images(dir.path()));

    let first = engine.convert_template(&template).unwrap();
    let page_path = first.dir.join("content.html");
    let edited = std::fs::read_to_string(&page_path)
        .unwrap()
        .replace("</body>", r#"<p class="footer">{{footer}}</p></body>"#);
    std::fs::write(&page_path, edited).unwrap();

    // A fresh conversion is reused as-is, including the hand edit.
    let second = engine.convert_template(&template).unwrap();
    assert_eq!(second, first);

    let slides = vec![
        SlideContent::new("细胞分裂", "有丝分裂"),
        SlideContent::new("分裂期", "前期 中期"),
        SlideContent::new("小结", "回顾").with_kind("conclusion"),
    ];
    let pages = engine.fill_slides(&second, &slides).await.unwrap();
    assert_eq!(pages.len(), 3);
    assert!(pages[1].contains("分裂期"));
    assert!(pages[1].contains(r#"<p class="footer"></p>"#));
    assert!(pages.iter().all(|p| !p.contains("{{")));
}

// ============================================================================
// Backend fallback
// ============================================================================

fn generator(dir: &Path) -> PptGenerator {
    let images = offline_images(dir);
    PptGenerator::new(
        HtmlEngine::new(dir.join("html_templates"), images.clone()),
        TemplateFiller::new(images.clone()),
        NoTemplateGenerator::new(images),
    )
}

#[tokio::test]
async fn test_falls_back_without_template() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("fallback.pptx");
    let slides = vec![SlideContent::new("光合作用", "叶绿体"), SlideContent::new("总结", "")];

    let outcome = generator(dir.path())
        .render(&slides, Some(&dir.path().join("missing.pptx")), &output, RenderOptions::all())
        .await
        .unwrap();
    assert_eq!(outcome.backend, Backend::NoTemplate);
    assert!(output.is_file());
}

#[tokio::test]
async fn test_fills_template_when_given() {
    let dir = tempfile::tempdir().unwrap();
    let images = offline_images(dir.path());
    let template = dir.path().join("base.pptx");
    NoTemplateGenerator::new(images)
        .generate(
            &[SlideContent::new("封面", "副标题"), SlideContent::new("结束", "谢谢")],
            &template,
        )
        .await
        .unwrap();

    let output = dir.path().join("filled.pptx");
    let options = RenderOptions {
        html: false,
        ..RenderOptions::all()
    };
    let outcome = generator(dir.path())
        .render(&[SlideContent::new("细胞", "结构")], Some(&template), &output, options)
        .await
        .unwrap();
    assert_eq!(outcome.backend, Backend::TemplateFill);
    assert_eq!(outcome.path, output);
}

#[tokio::test]
async fn test_no_backend_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let options = RenderOptions {
        html: false,
        template_fill: false,
        no_template: false,
    };
    let result = generator(dir.path())
        .render(
            &[SlideContent::new("x", "")],
            None,
            &dir.path().join("none.pptx"),
            options,
        )
        .await;
    assert!(result.is_err());
    assert!(!dir.path().join("none.pptx").exists());
}

#[tokio::test]
async fn test_empty_outline_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = generator(dir.path())
        .render(&[], None, &dir.path().join("empty.pptx"), RenderOptions::all())
        .await;
    assert!(result.is_err());
}
