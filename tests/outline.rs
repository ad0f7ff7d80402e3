//! Outline generation against a canned LLM.
use aippt::error::PptError;
use aippt::{KnowledgeRetriever, MockLlmClient, OutlineGenerator, OutlineRequest, SharedLlmClient};
use serde_json::json;
use std::sync::Arc;

const REPLY: &str = r#"以下是为您生成的大纲：
```json
[
  {"title": "细胞的结构", "content": "高中生物", "type": "cover"},
  {"title": "细胞膜", "content": "", "keypoints": ["磷脂双分子层", "蛋白质"], "layout": "keypoints"},
  {"title": "课堂总结", "content": "回顾本节内容", "type": "conclusion"}
]
```"#;

fn mock(reply: &str) -> Arc<MockLlmClient> {
    Arc::new(MockLlmClient::new().with_text_response(reply))
}

// ============================================================================
// Parsing
// ============================================================================

#[tokio::test]
async fn test_generate_parses_reply() {
    let llm = mock(REPLY);
    let generator = OutlineGenerator::new(llm.clone() as SharedLlmClient);

    let slides = generator
        .generate(&OutlineRequest::new("细胞的结构"))
        .await
        .unwrap();
    assert_eq!(slides.len(), 3);
    assert_eq!(slides[1].title, "细胞膜");
    assert_eq!(slides[1].keypoints.len(), 2);
    assert_eq!(slides[2].kind.as_deref(), Some("conclusion"));

    let requests = llm.requests();
    assert_eq!(requests.len(), 1, "one completion per outline");
    assert!(requests[0].0.contains("《细胞的结构》"));
    assert!(requests[0].0.contains("8页"), "default page count is 8");
}

#[tokio::test]
async fn test_generate_tolerates_loose_json() {
    let reply = "好的，{\u{201C}title\u{201D}: \u{201C}光合作用\u{201D}, \u{201C}content\u{201D}: \u{201C}叶绿体\u{201D},}";
    let generator = OutlineGenerator::new(mock(reply));

    let slides = generator
        .generate(&OutlineRequest::new("光合作用"))
        .await
        .unwrap();
    assert_eq!(slides.len(), 1);
    assert_eq!(slides[0].content, "叶绿体");
}

#[tokio::test]
async fn test_generate_requires_topic() {
    let llm = mock(REPLY);
    let generator = OutlineGenerator::new(llm.clone());

    let result = generator.generate(&OutlineRequest::new("  ")).await;
    assert!(matches!(result, Err(PptError::InvalidRequest(_))));
    assert!(llm.requests().is_empty(), "no LLM call without a topic");
}

// ============================================================================
// Prompt context
// ============================================================================

#[tokio::test]
async fn test_prompt_includes_knowledge_and_template() {
    let dir = tempfile::tempdir().unwrap();
    let biology = dir.path().join("knowledge").join("biology");
    std::fs::create_dir_all(&biology).unwrap();
    std::fs::write(
        biology.join("cell.json"),
        json!({
            "topic": "细胞的结构",
            "content": [{"title": "细胞核", "content": "细胞核是遗传信息库"}]
        })
        .to_string(),
    )
    .unwrap();

    let templates = dir.path().join("templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(
        templates.join("商务.json"),
        json!({
            "name": "商务",
            "desc": "蓝色商务风格",
            "slide_count": 0,
            "slide_width": 0,
            "slide_height": 0,
            "slides": []
        })
        .to_string(),
    )
    .unwrap();

    let llm = mock(REPLY);
    let generator = OutlineGenerator::new(llm.clone())
        .with_knowledge(Arc::new(KnowledgeRetriever::load(dir.path().join("knowledge"))))
        .with_template_dir(&templates);

    let request = OutlineRequest {
        pages: json!("精简"),
        subject: Some("生物".to_string()),
        template: Some("商务.pptx".to_string()),
        role: Some("生物老师".to_string()),
        deep_think: true,
        ..OutlineRequest::new("细胞")
    };
    generator.generate(&request).await.unwrap();

    let (prompt, config) = llm.requests().remove(0);
    assert!(prompt.contains("5页"));
    assert!(prompt.contains("演讲者角色：生物老师"));
    assert!(prompt.contains("模板风格：蓝色商务风格"));
    assert!(prompt.contains("细胞核是遗传信息库"), "knowledge context missing");
    assert_eq!(config.temperature, 0.7);
}

#[tokio::test]
async fn test_supplied_context_skips_knowledge_base() {
    let llm = mock(REPLY);
    let generator =
        OutlineGenerator::new(llm.clone()).with_knowledge(Arc::new(KnowledgeRetriever::empty()));

    let request = OutlineRequest {
        enhanced_context: Some("DNA是双螺旋结构".to_string()),
        ..OutlineRequest::new("DNA")
    };
    generator.generate(&request).await.unwrap();

    let prompt = &llm.requests()[0].0;
    assert!(prompt.contains("DNA是双螺旋结构"));
    assert!(!prompt.contains("不需要添加参考资料"));
}

#[test]
fn test_request_accepts_front_end_fields() {
    let request: OutlineRequest = serde_json::from_value(json!({
        "topic": "细胞",
        "pages": 10,
        "deepThink": "true",
        "webSearch": false,
        "subject": "生物"
    }))
    .unwrap();
    assert!(request.deep_think);
    assert!(!request.web_search);
    assert_eq!(request.pages, json!(10));
}
