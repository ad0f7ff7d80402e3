//! Text completion over any rig-core `CompletionModel`.
//!
//! Outline generation only needs plain chat completion, so the client surface
//! is small: a system prompt, a user prompt and sampling settings. The default
//! backend is DashScope's OpenAI-compatible endpoint, reached through rig's
//! OpenRouter client with a custom base URL.
//!
//! # Example
//! ```ignore
//! use aippt::llm::{create_llm_client, LlmConfig};
//!
//! let llm = create_llm_client(DASHSCOPE_BASE_URL, &api_key, "qwen-max", LlmConfig::default());
//! let text = llm.complete("列出三个细胞器").await?;
//! ```

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::{AssistantContent, CompletionModel, CompletionRequest};
use rig::providers::openrouter;
use rig::OneOrMany;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::PptError;
use crate::prompts::SYSTEM_PROMPT;

/// DashScope's OpenAI-compatible endpoint.
pub const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Sampling settings for a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub system_prompt: String,
    pub temperature: f64,
    /// Nucleus sampling; sent as an extra request parameter when set.
    pub top_p: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            temperature: 0.9,
            top_p: Some(0.95),
            max_tokens: Some(4000),
        }
    }
}

impl LlmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp.clamp(0.0, 2.0);
        self
    }

    pub fn with_top_p(mut self, top_p: Option<f64>) -> Self {
        self.top_p = top_p.map(|p| p.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_tokens(mut self, tokens: Option<u64>) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Sampling used for outlines: tighter when the user asked for deep thinking.
    pub fn for_outline(deep_think: bool) -> Self {
        let (temperature, top_p) = if deep_think { (0.7, 0.8) } else { (0.9, 0.95) };
        Self::default()
            .with_temperature(temperature)
            .with_top_p(Some(top_p))
            .with_max_tokens(Some(4000))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Completes `prompt` with explicit settings, including the system prompt.
    async fn complete_with_config(
        &self,
        prompt: &str,
        config: &LlmConfig,
    ) -> Result<String, PptError>;

    /// Completes `prompt` with the client's own settings.
    async fn complete(&self, prompt: &str) -> Result<String, PptError> {
        let config = self.config().clone();
        self.complete_with_config(prompt, &config).await
    }

    /// Completes `prompt` under a different system prompt.
    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, PptError> {
        let config = self.config().clone().with_system_prompt(system);
        self.complete_with_config(prompt, &config).await
    }

    fn config(&self) -> &LlmConfig;
}

/// LLM client over any rig-core completion model.
pub struct LlmWrapper<M: CompletionModel> {
    model: Arc<M>,
    config: LlmConfig,
}

impl<M: CompletionModel> LlmWrapper<M> {
    pub fn new(model: M) -> Self {
        Self::with_config(model, LlmConfig::default())
    }

    pub fn with_config(model: M, config: LlmConfig) -> Self {
        Self {
            model: Arc::new(model),
            config,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn build_request(&self, prompt: &str, config: &LlmConfig) -> CompletionRequest {
        let mut builder = self
            .model
            .completion_request(prompt)
            .preamble(config.system_prompt.clone())
            .temperature(config.temperature);
        if let Some(max_tokens) = config.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(top_p) = config.top_p {
            builder = builder.additional_params(serde_json::json!({ "top_p": top_p }));
        }
        builder.build()
    }
}

fn extract_text_from_response(content: &OneOrMany<AssistantContent>) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            AssistantContent::Text(text) => Some(text.text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn floor_char_boundary(s: &str, pos: usize) -> usize {
    let mut idx = pos.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Cuts output that has fallen into a loop.
///
/// A sampled window repeating three or more times truncates at its second
/// occurrence; four identical consecutive lines truncate before the run.
pub fn detect_and_truncate_repetition(text: &str) -> String {
    const MARKER: &str = "\n\n[Note: Repetitive content detected and truncated]";
    if text.len() < 500 {
        return text.to_string();
    }

    for window in [30usize, 50, 80, 100] {
        if text.len() <= window * 4 {
            continue;
        }
        let samples = 10.min(text.len() / window);
        for i in 0..samples {
            let start = floor_char_boundary(text, text.len() / samples * i);
            let end = floor_char_boundary(text, start + window);
            if start >= end {
                continue;
            }
            let sample = &text[start..end];
            if sample.chars().filter(|c| !c.is_whitespace()).count() < sample.len() / 3 {
                continue;
            }
            if text.matches(sample).count() >= 3 {
                if let Some(first) = text.find(sample) {
                    let cut = floor_char_boundary(text, first + sample.len() * 2);
                    return format!("{}{}", &text[..cut], MARKER);
                }
            }
        }
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut run = 0;
    let mut previous = "";
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if line.len() < 10 {
            continue;
        }
        if line == previous {
            run += 1;
            if run >= 4 {
                return format!("{}{}", lines[..i - run].join("\n"), MARKER);
            }
        } else {
            run = 1;
            previous = line;
        }
    }
    text.to_string()
}

#[async_trait]
impl<M: CompletionModel + Send + Sync + 'static> LlmClient for LlmWrapper<M> {
    async fn complete_with_config(
        &self,
        prompt: &str,
        config: &LlmConfig,
    ) -> Result<String, PptError> {
        debug!(
            prompt_chars = prompt.chars().count(),
            temperature = config.temperature,
            top_p = ?config.top_p,
            "sending completion request"
        );
        let request = self.build_request(prompt, config);
        let response = self
            .model
            .completion(request)
            .await
            .map(|r| extract_text_from_response(&r.choice))
            .map_err(|e| PptError::Llm(e.to_string()))?;
        if response.trim().is_empty() {
            return Err(PptError::Llm("empty completion".to_string()));
        }
        Ok(detect_and_truncate_repetition(&response))
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }
}

/// Canned responses for tests. Records every prompt it receives.
pub struct MockLlmClient {
    pub text_response: String,
    config: LlmConfig,
    prompts: Mutex<Vec<(String, LlmConfig)>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            text_response: "A mock text response".to_string(),
            config: LlmConfig::default(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text_response(mut self, response: impl Into<String>) -> Self {
        self.text_response = response.into();
        self
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Prompts and settings seen so far, oldest first.
    pub fn requests(&self) -> Vec<(String, LlmConfig)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_with_config(
        &self,
        prompt: &str,
        config: &LlmConfig,
    ) -> Result<String, PptError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((prompt.to_string(), config.clone()));
        }
        Ok(self.text_response.clone())
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }
}

pub type SharedLlmClient = Arc<dyn LlmClient>;

/// Wraps any rig completion model as a shared client.
pub fn llm_client_from_model<M: CompletionModel + Send + Sync + 'static>(
    model: M,
    config: LlmConfig,
) -> SharedLlmClient {
    Arc::new(LlmWrapper::with_config(model, config))
}

/// Builds a client for an OpenAI-compatible endpoint such as DashScope.
pub fn create_llm_client(
    base_url: &str,
    api_key: &str,
    model: &str,
    config: LlmConfig,
) -> SharedLlmClient {
    let client = openrouter::Client::builder(api_key)
        .base_url(base_url.trim_end_matches('/'))
        .build();
    llm_client_from_model(client.completion_model(model), config)
}
