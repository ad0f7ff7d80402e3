//! HTTP routes exercised through `warp::test`, with no LLM and no network.
use aippt::server::routes;
use aippt::{AppState, Config, NoTemplateGenerator, SlideContent};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use warp::http::StatusCode;

fn state(root: &Path) -> Arc<AppState> {
    Arc::new(AppState::new(Config::for_root(root), None).expect("state should build"))
}

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response should be JSON")
}

async fn write_template(state: &AppState, name: &str) {
    let slides = vec![
        SlideContent::new("模板封面", "副标题"),
        SlideContent::new("正文", "说明"),
        SlideContent::new("总结", "结束"),
    ];
    NoTemplateGenerator::new(state.images.clone())
        .generate(&slides, state.config.template_dir.join(name))
        .await
        .expect("template should save");
}

// ============================================================================
// Basics
// ============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request().path("/api/health").reply(&api).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body()), json!({"status": "ok"}));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request().path("/api/nothing").reply(&api).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res.body())["error"], "资源不存在");
}

#[tokio::test]
async fn test_resource_listing() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request()
        .path("/api/resource?type=custom")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body()).as_array().map(Vec::len), Some(1));

    let res = warp::test::request().path("/api/resource").reply(&api).await;
    assert_eq!(body_json(res.body()), json!([]));
}

// ============================================================================
// Templates
// ============================================================================

#[tokio::test]
async fn test_template_listing_and_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    write_template(&state, "蓝色.pptx").await;
    let api = routes(state.clone());

    let res = warp::test::request()
        .path("/api/aiPpt/ppt/templates")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res.body());
    assert_eq!(body["templates"], json!(["蓝色.pptx"]));
    assert_eq!(
        body["templateInfo"][0]["previewUrl"],
        "/api/aiPpt/ppt/template-preview/蓝色.pptx"
    );

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/ppt/analyze-template")
        .json(&json!({"template": "蓝色"}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK, "body: {:?}", res.body());
    let body = body_json(res.body());
    assert_eq!(body["templateInfo"]["slide_count"], 3);
    assert_eq!(body["jsonPath"], "/ppt_templates/蓝色.json");
    assert!(state.config.template_dir.join("蓝色.json").is_file());
}

#[tokio::test]
async fn test_analyze_missing_template() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/ppt/analyze-template")
        .json(&json!({"template": "ghost.pptx"}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res.body())["error"], "模板文件不存在: ghost.pptx");

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/ppt/analyze-template")
        .json(&json!({}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res.body())["error"], "缺少模板名称");
}

#[tokio::test]
async fn test_upload_stores_and_analyzes() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    let source = dir.path().join("source.pptx");
    NoTemplateGenerator::new(state.images.clone())
        .generate(&[SlideContent::new("封面", ""), SlideContent::new("总结", "")], &source)
        .await
        .unwrap();
    let api = routes(state.clone());

    let mut body = Vec::new();
    body.extend_from_slice(
        concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"lesson.pptx\"\r\n",
            "Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&std::fs::read(&source).unwrap());
    body.extend_from_slice(b"\r\n--XBOUNDARY--\r\n");

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/ppt/upload-template")
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(body)
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK, "body: {:?}", res.body());
    let reply = body_json(res.body());
    let stored = reply["template"].as_str().unwrap();
    assert!(stored.starts_with("lesson_") && stored.ends_with(".pptx"));
    assert!(reply["description"].as_str().unwrap().ends_with("模板"));
    assert!(state.config.template_dir.join(stored).is_file());
    let sidecar = stored.replace(".pptx", ".json");
    assert!(state.config.template_dir.join(sidecar).is_file());
}

#[tokio::test]
async fn test_template_preview() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    write_template(&state, "preview.pptx").await;
    let api = routes(state);

    let res = warp::test::request()
        .path("/api/aiPpt/ppt/template-preview/preview.pptx")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.body().starts_with(b"\x89PNG"), "generated preview should be a PNG");

    let res = warp::test::request()
        .path("/api/aiPpt/ppt/template-preview/none.pptx")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res.body())["error"], "模板文件不存在");
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_generate_without_template() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    let api = routes(state.clone());

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/gen-pptx-without-template")
        .json(&json!({
            "outline": [
                {"title": "细胞", "content": "生命的基本单位"},
                {"title": "细胞膜", "keypoints": ["磷脂", "蛋白质"]},
                {"title": "总结", "content": "回顾"}
            ],
            "template": "ignored.pptx"
        }))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK, "body: {:?}", res.body());
    let body = body_json(res.body());
    assert_eq!(body["backend"], "no_template");

    let url = body["pptUrl"].as_str().unwrap();
    let file = url.strip_prefix("/uploads/").expect("URL should point at uploads");
    assert!(file.starts_with("ppt_"));
    assert!(state.config.upload_dir.join(file).is_file());

    let res = warp::test::request().path(url).reply(&api).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["content-type"],
        "application/vnd.openxmlformats-officedocument.presentationml.presentation"
    );
}

#[tokio::test]
async fn test_standard_generation_fills_template() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    write_template(&state, "base.pptx").await;
    let api = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/gen-pptx-enhanced")
        .json(&json!({
            "outline": [{"title": "光合作用", "content": "叶绿体中进行"}],
            "template": "base.pptx",
            "topic": "光合作用"
        }))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK, "body: {:?}", res.body());
    assert_eq!(body_json(res.body())["backend"], "template_fill");
}

#[tokio::test]
async fn test_generation_requires_outline() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    for path in [
        "/api/aiPpt/gen-pptx-python",
        "/api/aiPpt/gen-educational-ppt",
        "/api/aiPpt/generate-html-ppt",
    ] {
        let res = warp::test::request()
            .method("POST")
            .path(path)
            .json(&json!({"outline": []}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(body_json(res.body())["error"], "缺少大纲数据");
    }
}

#[tokio::test]
async fn test_html_generation_needs_existing_template() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/generate-html-ppt")
        .json(&json!({"outline": [{"title": "a"}], "template": "missing"}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res.body())["error"], "模板不存在: missing");
}

#[tokio::test]
async fn test_outline_without_llm_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/generate-outline")
        .json(&json!({"topic": "细胞"}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(res.body())["error"].is_string());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request()
        .method("POST")
        .path("/api/knowledge/search")
        .header("content-type", "application/json")
        .body("{ not json")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Knowledge
// ============================================================================

#[tokio::test]
async fn test_knowledge_routes() {
    let dir = tempfile::tempdir().unwrap();
    let biology = dir.path().join("knowledge_base").join("biology");
    std::fs::create_dir_all(&biology).unwrap();
    std::fs::write(
        biology.join("cell.json"),
        json!({
            "topic": "细胞的结构",
            "content": [{"title": "细胞核", "content": "遗传信息库"}]
        })
        .to_string(),
    )
    .unwrap();
    let api = routes(state(dir.path()));

    let res = warp::test::request()
        .method("POST")
        .path("/api/knowledge/search")
        .json(&json!({"query": "细胞", "subject": "生物"}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res.body());
    assert_eq!(body["results"][0]["id"], "biology.cell");

    let res = warp::test::request()
        .method("POST")
        .path("/api/knowledge/search")
        .json(&json!({"query": " "}))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res.body())["error"], "缺少搜索关键词");

    let res = warp::test::request()
        .path("/api/knowledge/topic/biology.cell")
        .reply(&api)
        .await;
    assert_eq!(body_json(res.body())["topic"]["topic"], "细胞的结构");

    let res = warp::test::request()
        .path("/api/knowledge/topic/biology.none")
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = warp::test::request()
        .method("POST")
        .path("/api/aiPpt/enhance-with-rag")
        .json(&json!({"topic": "细胞", "subject": "生物", "keywords": ["细胞核"]}))
        .reply(&api)
        .await;
    let body = body_json(res.body());
    assert_eq!(body["hasContent"], true);
    assert!(body["relevantContent"].as_str().unwrap().contains("遗传信息库"));
}

// ============================================================================
// Files
// ============================================================================

#[tokio::test]
async fn test_delete_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path());
    let target = state.config.upload_dir.join("old.pptx");
    std::fs::write(&target, b"x").unwrap();
    let api = routes(state);

    let delete = |body: Value| {
        warp::test::request()
            .method("POST")
            .path("/api/aiPpt/delete-file")
            .json(&body)
    };

    let res = delete(json!({"filename": "old.pptx"})).reply(&api).await;
    assert_eq!(body_json(res.body())["message"], "文件已成功删除");
    assert!(!target.exists());

    let res = delete(json!({"filename": "old.pptx"})).reply(&api).await;
    assert_eq!(body_json(res.body())["message"], "文件不存在，无需删除");

    let res = delete(json!({"filename": "../config.toml"})).reply(&api).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res.body())["error"], "文件名包含非法字符");

    let res = delete(json!({})).reply(&api).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res.body())["error"], "请求数据为空或缺少文件名");
}
