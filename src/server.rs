//! HTTP API.
//!
//! Every JSON route runs a handler returning `Result<T, PptError>` and maps it
//! through [`json_response`]; failures become `{"error": message}` with the
//! status from [`PptError::status_code`]. Rejections that never reach a
//! handler get the same envelope from [`recover_rejection`].

use crate::analyzer::{analyze_template, metadata_path, save_metadata, template_stem, TemplateMetadata};
use crate::builder::NoTemplateGenerator;
use crate::config::Config;
use crate::error::PptError;
use crate::filler::TemplateFiller;
use crate::generator::{generate_ppt_filename, Backend, PptGenerator, RenderOptions};
use crate::html::HtmlEngine;
use crate::images::ImageService;
use crate::knowledge::KnowledgeRetriever;
use crate::llm::{create_llm_client, LlmConfig, SharedLlmClient};
use crate::model::SlideContent;
use crate::outline::{
    enhance_for_education, preprocess_outline, slides_from_values, OutlineGenerator,
    OutlineRequest,
};
use crate::package::PptxPackage;
use bytes::Buf;
use futures::{TryFutureExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};
use warp::filters::BoxedFilter;
use warp::http::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

const MAX_JSON_BYTES: u64 = 32 * 1024 * 1024;
const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
const PREVIEW_URL_PREFIX: &str = "/api/aiPpt/ppt/template-preview";

type Route = BoxedFilter<(Response,)>;

/// Services shared by every handler.
pub struct AppState {
    pub config: Config,
    pub images: Arc<ImageService>,
    pub knowledge: Arc<KnowledgeRetriever>,
    pub generator: PptGenerator,
    /// Absent when no LLM key is configured.
    pub outline: Option<OutlineGenerator>,
}

impl AppState {
    /// Creates the working directories and wires the services together.
    pub fn new(config: Config, llm: Option<SharedLlmClient>) -> Result<Self, PptError> {
        config.ensure_dirs()?;
        let images = Arc::new(ImageService::new(config.image_config()));
        let knowledge = Arc::new(KnowledgeRetriever::load(&config.knowledge_dir));
        info!(topics = knowledge.len(), dir = %config.knowledge_dir.display(), "knowledge base loaded");

        let html = HtmlEngine::new(&config.html_template_dir, images.clone())
            .with_browser(config.chrome_path.as_deref());
        if !html.browser_available() {
            warn!("no headless browser found, HTML rendering disabled");
        }
        let generator = PptGenerator::new(
            html,
            TemplateFiller::new(images.clone()),
            NoTemplateGenerator::new(images.clone()),
        );

        let outline = llm.map(|llm| {
            OutlineGenerator::new(llm)
                .with_knowledge(knowledge.clone())
                .with_images(images.clone())
                .with_template_dir(&config.template_dir)
        });
        if outline.is_none() {
            warn!("no LLM key configured, outline generation disabled");
        }

        Ok(Self {
            config,
            images,
            knowledge,
            generator,
            outline,
        })
    }

    /// State with an LLM client built from the configured endpoint and key.
    pub fn from_config(config: Config) -> Result<Self, PptError> {
        let llm = config.llm_key().map(|key| {
            create_llm_client(
                &config.llm_base_url,
                key,
                &config.llm_model,
                LlmConfig::default(),
            )
        });
        Self::new(config, llm)
    }

    /// Resolves a template name, with or without `.pptx`, inside the template directory.
    pub fn template_path(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if !is_safe_file_name(name) {
            return None;
        }
        let file = if name.to_lowercase().ends_with(".pptx") {
            name.to_string()
        } else {
            format!("{}.pptx", name)
        };
        let path = self.config.template_dir.join(file);
        path.is_file().then_some(path)
    }
}

/// Rejects empty names and anything that could leave the target directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// Keeps letters, digits, `-`, `_` and `.` of an uploaded file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || "-_.".contains(c) { c } else { '_' })
        .collect();
    cleaned.trim_matches('.').to_string()
}

/// Error body returned by every route.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip_serializing)]
    pub status: StatusCode,
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }
}

impl From<PptError> for ApiError {
    fn from(err: PptError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error = match err {
            PptError::NotFound(msg) | PptError::InvalidRequest(msg) => msg,
            other => other.to_string(),
        };
        ApiError { status, error }
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.error, "request failed");
        } else {
            warn!(status = %self.status, error = %self.error, "request rejected");
        }
        let status = self.status;
        warp::reply::with_status(warp::reply::json(&self), status).into_response()
    }
}

/// Serialises a handler result.
pub fn json_response<T: Serialize>(result: Result<T, PptError>) -> Response {
    match result {
        Ok(body) => warp::reply::json(&body).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

fn with_state(state: Arc<AppState>) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BYTES).and(warp::body::json())
}

/// The full filter tree, with CORS and error recovery.
pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["Content-Type", "Authorization"]);

    health_route()
        .or(template_routes(state.clone()))
        .unify()
        .or(generation_routes(state.clone()))
        .unify()
        .or(knowledge_routes(state.clone()))
        .unify()
        .or(file_routes(state))
        .unify()
        .recover(recover_rejection)
        .with(cors)
}

/// Runs the API until Ctrl-C.
pub async fn serve(state: Arc<AppState>) -> Result<(), PptError> {
    let addr = state.config.socket_addr();
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .map_err(|e| PptError::Http(format!("cannot bind {}: {}", addr, e)))?;
    info!(addr = %bound, "HTTP API listening");
    server.await;
    Ok(())
}

fn health_route() -> Route {
    warp::path!("api" / "health")
        .and(warp::get())
        .map(|| json_response::<Value>(Ok(json!({ "status": "ok" }))))
        .boxed()
}

fn template_routes(state: Arc<AppState>) -> Route {
    let list = warp::path!("api" / "aiPpt" / "ppt" / "templates")
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(list_templates)
        .map(json_response);

    let preview = warp::path!("api" / "aiPpt" / "ppt" / "template-preview" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(template_preview);

    let upload = warp::path!("api" / "aiPpt" / "ppt" / "upload-template")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_state(state.clone()))
        .then(upload_template)
        .map(json_response);

    let analyze_path = warp::path!("api" / "aiPpt" / "ppt" / "analyze-template").and(warp::post());
    let analyze_upload = analyze_path
        .clone()
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_state(state.clone()))
        .then(analyze_uploaded_template)
        .map(json_response);
    let analyze_existing = analyze_path
        .and(json_body::<TemplateRequest>())
        .and(with_state(state))
        .then(analyze_existing_template)
        .map(json_response);

    list.or(preview)
        .unify()
        .or(upload)
        .unify()
        .or(analyze_upload)
        .unify()
        .or(analyze_existing)
        .unify()
        .boxed()
}

fn generation_routes(state: Arc<AppState>) -> Route {
    let outline_path = warp::path!("api" / "aiPpt" / "generate-outline").and(warp::post());
    let outline_form = outline_path
        .clone()
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_state(state.clone()))
        .then(|form: FormData, state: Arc<AppState>| async move {
            match outline_request_from_form(form).await {
                Ok(request) => generate_outline(request, state).await,
                Err(e) => Err(e),
            }
        })
        .map(json_response);
    let outline_json = outline_path
        .and(json_body::<OutlineRequest>())
        .and(with_state(state.clone()))
        .then(generate_outline)
        .map(json_response);

    let deck = |name: &'static str, kind: DeckKind| {
        warp::path("api")
            .and(warp::path("aiPpt"))
            .and(warp::path(name))
            .and(warp::path::end())
            .and(warp::post())
            .and(json_body::<GenerateRequest>())
            .and(with_state(state.clone()))
            .then(move |request: GenerateRequest, state: Arc<AppState>| {
                generate_deck(request, state, kind)
            })
            .map(json_response)
    };

    outline_form
        .or(outline_json)
        .unify()
        .or(deck("gen-pptx-python", DeckKind::Standard))
        .unify()
        .or(deck("gen-pptx-without-template", DeckKind::WithoutTemplate))
        .unify()
        .or(deck("gen-pptx-enhanced", DeckKind::Enhanced))
        .unify()
        .or(deck("generate-html-ppt", DeckKind::Html))
        .unify()
        .or(deck("gen-educational-ppt", DeckKind::Educational))
        .unify()
        .boxed()
}

fn knowledge_routes(state: Arc<AppState>) -> Route {
    let rag = warp::path!("api" / "aiPpt" / "enhance-with-rag")
        .and(warp::post())
        .and(json_body::<RagRequest>())
        .and(with_state(state.clone()))
        .then(enhance_with_rag)
        .map(json_response);

    let search = warp::path!("api" / "knowledge" / "search")
        .and(warp::post())
        .and(json_body::<SearchRequest>())
        .and(with_state(state.clone()))
        .then(search_knowledge)
        .map(json_response);

    let topic = warp::path!("api" / "knowledge" / "topic" / String)
        .and(warp::get())
        .and(with_state(state))
        .then(knowledge_topic)
        .map(json_response);

    rag.or(search).unify().or(topic).unify().boxed()
}

fn file_routes(state: Arc<AppState>) -> Route {
    let config = &state.config;
    let uploads = warp::path("uploads")
        .and(warp::get())
        .and(warp::fs::dir(config.upload_dir.clone()))
        .map(download_response);
    let templates = warp::path("ppt_templates")
        .and(warp::get())
        .and(warp::fs::dir(config.template_dir.clone()))
        .map(download_response);
    let cached = warp::path("image_cache")
        .and(warp::get())
        .and(warp::fs::dir(config.image_cache_dir.clone()))
        .map(|file: warp::fs::File| file.into_response());
    let defaults = warp::path("default_images")
        .and(warp::get())
        .and(warp::fs::dir(config.default_image_dir.clone()))
        .map(|file: warp::fs::File| file.into_response());

    let delete = warp::path!("api" / "aiPpt" / "delete-file")
        .and(warp::post())
        .and(json_body::<DeleteRequest>())
        .and(with_state(state.clone()))
        .then(delete_file)
        .map(json_response);

    let resources = warp::path!("api" / "resource")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .map(|query: HashMap<String, String>| {
            let kind = query.get("type").map(String::as_str).unwrap_or("all");
            json_response::<Value>(Ok(sample_resources(kind)))
        });

    uploads
        .or(templates)
        .unify()
        .or(cached)
        .unify()
        .or(defaults)
        .unify()
        .or(delete)
        .unify()
        .or(resources)
        .unify()
        .boxed()
}

/// Maps rejections to the JSON error envelope.
pub async fn recover_rejection(rejection: Rejection) -> Result<Response, Rejection> {
    let err = if rejection.is_not_found() {
        ApiError::new(StatusCode::NOT_FOUND, "资源不存在")
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::new(StatusCode::BAD_REQUEST, format!("请求数据无效: {}", e))
    } else if let Some(e) = rejection.find::<warp::reject::PayloadTooLarge>() {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
    } else if let Some(e) = rejection.find::<warp::reject::UnsupportedMediaType>() {
        ApiError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
    } else if let Some(e) = rejection.find::<warp::reject::LengthRequired>() {
        ApiError::new(StatusCode::LENGTH_REQUIRED, e.to_string())
    } else if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = rejection.find::<warp::reject::MethodNotAllowed>() {
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, e.to_string())
    } else {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unhandled rejection: {:?}", rejection),
        )
    };
    Ok(err.into_response())
}

fn download_response(file: warp::fs::File) -> Response {
    let name = file
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let is_pptx = name.to_lowercase().ends_with(".pptx");
    let mut response = file.into_response();
    if is_pptx {
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(PPTX_CONTENT_TYPE));
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)) {
            headers.insert(CONTENT_DISPOSITION, value);
        }
    }
    response
}

fn preview_url(template_file: &str) -> String {
    format!("{}/{}", PREVIEW_URL_PREFIX, template_file)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path segments arrive percent-encoded.
fn decode_segment(segment: &str) -> String {
    url::form_urlencoded::parse(format!("v={}", segment.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| segment.to_string())
}

fn read_description(template: &Path) -> String {
    let sidecar = metadata_path(template);
    std::fs::read_to_string(&sidecar)
        .ok()
        .and_then(|text| serde_json::from_str::<TemplateMetadata>(&text).ok())
        .map(|meta| meta.desc)
        .unwrap_or_default()
}

/// Runs filesystem and analysis work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, PptError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PptError> + Send + 'static,
{
    spawn_blocking(work)
        .await
        .map_err(|e| PptError::Render(format!("后台任务失败: {}", e)))?
}

async fn list_templates(state: Arc<AppState>) -> Result<Value, PptError> {
    let dir = state.config.template_dir.clone();
    blocking(move || {
        let mut templates: Vec<String> = std::fs::read_dir(&dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| crate::analyzer::is_template_file(p))
            .map(|p| file_name_of(&p))
            .collect();
        templates.sort();

        let info: Vec<Value> = templates
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "description": read_description(&dir.join(name)),
                    "previewUrl": preview_url(name),
                })
            })
            .collect();
        Ok(json!({ "templates": templates, "templateInfo": info }))
    })
    .await
}

/// Stored preview, then the package thumbnail, then a generated card.
fn preview_image(state: &AppState, template: &Path) -> Result<(Vec<u8>, &'static str), PptError> {
    let stem = template_stem(template);
    for (ext, mime) in [("png", "image/png"), ("jpg", "image/jpeg")] {
        let stored = state.config.preview_dir().join(format!("{}.{}", stem, ext));
        if stored.is_file() {
            return Ok((std::fs::read(&stored)?, mime));
        }
    }
    let package = PptxPackage::open(template)?;
    if let Some(thumbnail) = package.part("docProps/thumbnail.jpeg") {
        return Ok((thumbnail.to_vec(), "image/jpeg"));
    }
    let card = image::RgbImage::from_pixel(320, 180, image::Rgb([224, 228, 236]));
    let mut buffer = Cursor::new(Vec::new());
    card.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok((buffer.into_inner(), "image/png"))
}

async fn template_preview(name: String, state: Arc<AppState>) -> Response {
    let name = decode_segment(&name);
    let Some(template) = state.template_path(&name) else {
        return ApiError::new(StatusCode::NOT_FOUND, "模板文件不存在").into_response();
    };
    match blocking(move || preview_image(&state, &template)).await {
        Ok((bytes, mime)) => {
            let mut response = Response::new(bytes.into());
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(mime));
            response
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

struct FormField {
    name: String,
    filename: Option<String>,
    data: Vec<u8>,
}

impl FormField {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

async fn read_form(form: FormData) -> Result<Vec<FormField>, PptError> {
    form.and_then(|part| {
        let name = part.name().to_string();
        let filename = part.filename().map(str::to_string);
        part.stream()
            .try_fold(Vec::new(), |mut acc, buf| async move {
                acc.extend_from_slice(buf.chunk());
                Ok(acc)
            })
            .map_ok(move |data| FormField {
                name,
                filename,
                data,
            })
    })
    .try_collect()
    .await
    .map_err(|e: warp::Error| PptError::InvalidRequest(format!("表单数据无效: {}", e)))
}

/// Saves an uploaded template as `{stem}_{unix time}.pptx`.
fn store_template(state: &AppState, fields: Vec<FormField>) -> Result<PathBuf, PptError> {
    let file = fields
        .into_iter()
        .find(|f| f.name == "file")
        .ok_or_else(|| PptError::InvalidRequest("未上传文件".to_string()))?;
    let original = file
        .filename
        .as_deref()
        .map(sanitize_file_name)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| PptError::InvalidRequest("未选择文件".to_string()))?;
    if !original.to_lowercase().ends_with(".pptx") {
        return Err(PptError::InvalidRequest("只支持PPTX文件上传".to_string()));
    }
    let stem = template_stem(Path::new(&original));
    let stored = format!("{}_{}.pptx", stem, chrono::Local::now().timestamp());
    let path = state.config.template_dir.join(&stored);
    std::fs::write(&path, &file.data)?;
    info!(template = %path.display(), bytes = file.data.len(), "template uploaded");
    Ok(path)
}

fn analyze_and_save(template: &Path) -> Result<TemplateMetadata, PptError> {
    let metadata = analyze_template(template)?;
    let sidecar = save_metadata(template, &metadata)?;
    info!(sidecar = %sidecar.display(), "template metadata saved");
    Ok(metadata)
}

fn analysis_body(template: &Path, metadata: TemplateMetadata) -> Value {
    let json_name = file_name_of(&metadata_path(template));
    json!({
        "success": true,
        "template": file_name_of(template),
        "templateInfo": metadata,
        "jsonPath": format!("/ppt_templates/{}", json_name),
    })
}

/// Stores an upload and analyzes it off the async workers.
async fn store_and_analyze(
    form: FormData,
    state: Arc<AppState>,
) -> Result<(PathBuf, TemplateMetadata), PptError> {
    let fields = read_form(form).await?;
    blocking(move || {
        let path = store_template(&state, fields)?;
        let metadata = analyze_and_save(&path)?;
        Ok((path, metadata))
    })
    .await
}

async fn upload_template(form: FormData, state: Arc<AppState>) -> Result<Value, PptError> {
    let (path, metadata) = store_and_analyze(form, state).await?;
    let name = file_name_of(&path);
    Ok(json!({
        "success": true,
        "template": name,
        "previewUrl": preview_url(&name),
        "description": metadata.desc,
    }))
}

async fn analyze_uploaded_template(form: FormData, state: Arc<AppState>) -> Result<Value, PptError> {
    let (path, metadata) = store_and_analyze(form, state).await?;
    Ok(analysis_body(&path, metadata))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemplateRequest {
    pub template: Option<String>,
}

async fn analyze_existing_template(
    request: TemplateRequest,
    state: Arc<AppState>,
) -> Result<Value, PptError> {
    let name = request
        .template
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| PptError::InvalidRequest("缺少模板名称".to_string()))?;
    let path = state
        .template_path(&name)
        .ok_or_else(|| PptError::NotFound(format!("模板文件不存在: {}", name)))?;
    let metadata = {
        let path = path.clone();
        blocking(move || analyze_and_save(&path)).await?
    };
    Ok(analysis_body(&path, metadata))
}

/// Builds an outline request from text form fields.
async fn outline_request_from_form(form: FormData) -> Result<OutlineRequest, PptError> {
    let fields: Map<String, Value> = read_form(form)
        .await?
        .into_iter()
        .filter(|f| f.filename.is_none())
        .map(|f| {
            let value = f.text();
            (f.name, Value::String(value))
        })
        .collect();
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| PptError::InvalidRequest(format!("请求数据无效: {}", e)))
}

async fn generate_outline(request: OutlineRequest, state: Arc<AppState>) -> Result<Value, PptError> {
    let generator = state.outline.as_ref().ok_or_else(|| {
        PptError::Llm("no API key configured (ALIYUN_API_KEY)".to_string())
    })?;
    let outline = generator.generate(&request).await?;
    Ok(json!({ "outline": outline }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeckKind {
    Standard,
    WithoutTemplate,
    Enhanced,
    Html,
    Educational,
}

impl DeckKind {
    fn file_prefix(self) -> &'static str {
        match self {
            DeckKind::Educational => "educational",
            DeckKind::Html => "html_ppt",
            _ => "ppt",
        }
    }

    fn options(self) -> RenderOptions {
        match self {
            DeckKind::WithoutTemplate => RenderOptions::only(Backend::NoTemplate),
            DeckKind::Enhanced => RenderOptions {
                html: false,
                template_fill: true,
                no_template: true,
            },
            _ => RenderOptions::all(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateRequest {
    pub outline: Option<Vec<Value>>,
    pub template: Option<String>,
    pub topic: Option<String>,
    pub subject: Option<String>,
}

async fn generate_deck(
    request: GenerateRequest,
    state: Arc<AppState>,
    kind: DeckKind,
) -> Result<Value, PptError> {
    let raw = request
        .outline
        .filter(|o| !o.is_empty())
        .ok_or_else(|| PptError::InvalidRequest("缺少大纲数据".to_string()))?;
    let topic = request.topic.unwrap_or_default();
    let subject = request.subject.unwrap_or_default();

    let template_name = request
        .template
        .filter(|t| !t.trim().is_empty() && kind != DeckKind::WithoutTemplate);
    let template = match template_name {
        Some(name) => match state.template_path(&name) {
            Some(path) => Some(path),
            None if kind == DeckKind::Html => {
                return Err(PptError::NotFound(format!("模板不存在: {}", name)));
            }
            None => {
                warn!(template = %name, "template not found, continuing without it");
                None
            }
        },
        None => None,
    };

    let slides: Vec<SlideContent> = match kind {
        DeckKind::Enhanced => preprocess_outline(&raw, &topic, "keypoints"),
        DeckKind::Educational => {
            enhance_for_education(preprocess_outline(&raw, &topic, "keypoints"), &topic, &subject)
        }
        _ => slides_from_values(&raw),
    };
    if slides.is_empty() {
        return Err(PptError::InvalidRequest("缺少大纲数据".to_string()));
    }
    info!(
        slides = slides.len(),
        template = ?template.as_ref().map(|t| t.display().to_string()),
        kind = ?kind,
        "generating deck"
    );

    let output = state.config.upload_dir.join(generate_ppt_filename(kind.file_prefix()));
    let outcome = state
        .generator
        .render(&slides, template.as_deref(), &output, kind.options())
        .await?;
    Ok(json!({
        "pptUrl": format!("/uploads/{}", file_name_of(&outcome.path)),
        "backend": outcome.backend,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RagRequest {
    pub topic: String,
    pub subject: String,
    pub keywords: Vec<String>,
}

async fn enhance_with_rag(request: RagRequest, state: Arc<AppState>) -> Result<Value, PptError> {
    if request.topic.trim().is_empty() {
        return Err(PptError::InvalidRequest("缺少主题".to_string()));
    }
    let query = format!("{} {}", request.topic, request.keywords.join(" "));
    let subject = Some(request.subject.as_str()).filter(|s| !s.is_empty());
    let content = state.knowledge.relevant_content(query.trim(), subject, 3000);
    info!(topic = %request.topic, chars = content.chars().count(), "knowledge context retrieved");
    Ok(json!({
        "success": true,
        "topic": request.topic,
        "subject": request.subject,
        "relevantContent": content,
        "hasContent": !content.trim().is_empty(),
    }))
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

async fn search_knowledge(request: SearchRequest, state: Arc<AppState>) -> Result<Value, PptError> {
    if request.query.trim().is_empty() {
        return Err(PptError::InvalidRequest("缺少搜索关键词".to_string()));
    }
    let results = state
        .knowledge
        .search(&request.query, request.subject.as_deref(), request.top_k);
    Ok(json!({ "success": true, "query": request.query, "results": results }))
}

async fn knowledge_topic(id: String, state: Arc<AppState>) -> Result<Value, PptError> {
    let topic = state.knowledge.retrieve_by_id(&decode_segment(&id))?;
    Ok(json!({ "success": true, "topic": topic }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteRequest {
    pub filename: Option<String>,
}

async fn delete_file(request: DeleteRequest, state: Arc<AppState>) -> Result<Value, PptError> {
    let name = request
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| PptError::InvalidRequest("请求数据为空或缺少文件名".to_string()))?;
    if !is_safe_file_name(&name) {
        return Err(PptError::InvalidRequest("文件名包含非法字符".to_string()));
    }
    let path = state.config.upload_dir.join(&name);
    if !path.exists() {
        info!(file = %name, "nothing to delete");
        return Ok(json!({ "success": true, "message": "文件不存在，无需删除" }));
    }
    tokio::fs::remove_file(&path).await?;
    info!(file = %name, "file deleted");
    Ok(json!({ "success": true, "message": "文件已成功删除" }))
}

fn sample_resources(kind: &str) -> Value {
    match kind {
        "custom" => json!([{
            "id": 1,
            "title": "示例定制资源",
            "desc": "这是一个示例的定制资源",
            "cover": "/default_images/default.jpg",
            "created_at": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }]),
        _ => json!([]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_names() {
        assert!(is_safe_file_name("deck.pptx"));
        assert!(!is_safe_file_name("../secret"));
        assert!(!is_safe_file_name("a/b.pptx"));
        assert!(!is_safe_file_name("a\\b.pptx"));
        assert!(!is_safe_file_name(""));
    }

    #[test]
    fn test_sanitize_upload_name() {
        assert_eq!(sanitize_file_name("C:\\decks\\my deck.pptx"), "my_deck.pptx");
        assert_eq!(sanitize_file_name("细胞模板.pptx"), "细胞模板.pptx");
        assert_eq!(sanitize_file_name("../x.pptx"), "x.pptx");
    }

    #[test]
    fn test_error_envelope() {
        let err = ApiError::from(PptError::InvalidRequest("缺少主题".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "缺少主题");
        let err = ApiError::from(PptError::Render("boom".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("%E7%BB%86%E8%83%9E.pptx"), "细胞.pptx");
        assert_eq!(decode_segment("a+b.pptx"), "a+b.pptx");
    }

    #[test]
    fn test_sample_resources() {
        assert_eq!(sample_resources("custom").as_array().map(Vec::len), Some(1));
        assert_eq!(sample_resources("undefined"), json!([]));
    }
}
