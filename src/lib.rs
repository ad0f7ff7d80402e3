//! Generates PowerPoint decks from LLM outlines.
//!
//! An outline is a list of [`SlideContent`] values. It comes from the LLM
//! through [`OutlineGenerator`] or from the caller as JSON, and is rendered
//! by one of three backends chosen by [`PptGenerator`]:
//!
//! - [`HtmlEngine`] converts the template to HTML pages, fills them and
//!   screenshots them with a headless browser;
//! - [`TemplateFiller`] clones and fills the slides of an arbitrary PPTX
//!   template, guided by the metadata from [`analyzer`];
//! - [`NoTemplateGenerator`] lays out slides from scratch.

pub mod analyzer;
pub mod builder;
pub mod classify;
pub mod cleanup;
pub mod config;
pub mod drawing;
pub mod error;
pub mod filler;
pub mod generator;
pub mod html;
pub mod images;
pub mod keywords;
pub mod knowledge;
pub mod llm;
pub mod model;
pub mod outline;
pub mod package;
pub mod prompts;
pub mod server;
pub mod slide;
pub mod xml;

// Re-export key types
pub use analyzer::{analyze_template, load_or_analyze, TemplateMetadata};
pub use builder::NoTemplateGenerator;
pub use config::Config;
pub use error::PptError;
pub use filler::{FillReport, SlideAssignment, TemplateFiller};
pub use generator::{generate_ppt_filename, Backend, PptGenerator, RenderOptions, RenderOutcome};
pub use html::HtmlEngine;
pub use images::{ImageConfig, ImageService};
pub use knowledge::KnowledgeRetriever;
pub use llm::{
    create_llm_client, llm_client_from_model, LlmClient, LlmConfig, LlmWrapper, MockLlmClient,
    SharedLlmClient,
};
pub use model::{ContentType, ImageRef, Keypoint, SlideContent, TableData};
pub use outline::{OutlineGenerator, OutlineRequest};
pub use package::PptxPackage;
pub use server::AppState;
