//! Backend selection for deck rendering.
//!
//! Backends are tried in order of fidelity: the HTML-intermediate pipeline,
//! direct template filling, and synthesis without a template. Each has a
//! precondition; a failing backend is logged and the next one runs. The
//! outcome names the backend that produced the file.

use crate::error::PptError;
use crate::filler::TemplateFiller;
use crate::builder::NoTemplateGenerator;
use crate::html::HtmlEngine;
use crate::model::SlideContent;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Html,
    TemplateFill,
    NoTemplate,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Html => "html",
            Backend::TemplateFill => "template_fill",
            Backend::NoTemplate => "no_template",
        })
    }
}

/// Which backends a request may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub html: bool,
    pub template_fill: bool,
    pub no_template: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl RenderOptions {
    pub fn all() -> Self {
        Self {
            html: true,
            template_fill: true,
            no_template: true,
        }
    }

    pub fn only(backend: Backend) -> Self {
        Self {
            html: backend == Backend::Html,
            template_fill: backend == Backend::TemplateFill,
            no_template: backend == Backend::NoTemplate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub path: PathBuf,
    pub backend: Backend,
}

/// `"{prefix}_{timestamp}_{8 hex chars}.pptx"`.
pub fn generate_ppt_filename(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.pptx",
        prefix,
        chrono::Local::now().format("%Y%m%d%H%M%S"),
        &id[..8]
    )
}

pub struct PptGenerator {
    html: HtmlEngine,
    filler: TemplateFiller,
    builder: NoTemplateGenerator,
}

impl PptGenerator {
    pub fn new(html: HtmlEngine, filler: TemplateFiller, builder: NoTemplateGenerator) -> Self {
        Self {
            html,
            filler,
            builder,
        }
    }

    pub fn html(&self) -> &HtmlEngine {
        &self.html
    }

    pub fn filler(&self) -> &TemplateFiller {
        &self.filler
    }

    pub fn builder(&self) -> &NoTemplateGenerator {
        &self.builder
    }

    pub async fn render(
        &self,
        slides: &[SlideContent],
        template: Option<&Path>,
        output: &Path,
        options: RenderOptions,
    ) -> Result<RenderOutcome, PptError> {
        if slides.is_empty() {
            return Err(PptError::InvalidRequest("缺少大纲数据".to_string()));
        }
        let template = template.filter(|t| t.is_file());
        let mut last_error: Option<PptError> = None;

        if options.html {
            match template {
                Some(t) if self.html.browser_available() => {
                    match self.html.generate(slides, t, output).await {
                        Ok(path) => return Ok(self.done(path, Backend::Html)),
                        Err(e) => {
                            warn!(backend = %Backend::Html, error = %e, "backend failed, falling back");
                            last_error = Some(e);
                        }
                    }
                }
                Some(_) => warn!(backend = %Backend::Html, "no headless browser, skipping"),
                None => info!(backend = %Backend::Html, "no template, skipping"),
            }
        }

        if options.template_fill {
            match template {
                Some(t) => match self.filler.fill(t, slides, output).await {
                    Ok(report) => {
                        info!(
                            images = report.images_placed,
                            tables = report.tables_placed,
                            "template filled"
                        );
                        return Ok(self.done(output.to_path_buf(), Backend::TemplateFill));
                    }
                    Err(e) => {
                        warn!(backend = %Backend::TemplateFill, error = %e, "backend failed, falling back");
                        last_error = Some(e);
                    }
                },
                None => info!(backend = %Backend::TemplateFill, "no template, skipping"),
            }
        }

        if options.no_template {
            match self.builder.generate(slides, output).await {
                Ok(()) => return Ok(self.done(output.to_path_buf(), Backend::NoTemplate)),
                Err(e) => {
                    warn!(backend = %Backend::NoTemplate, error = %e, "backend failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| PptError::Render("no rendering backend could run".to_string())))
    }

    fn done(&self, path: PathBuf, backend: Backend) -> RenderOutcome {
        info!(path = %path.display(), backend = %backend, "deck rendered");
        RenderOutcome { path, backend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_shape() {
        let name = generate_ppt_filename("generated");
        let parts: Vec<&str> = name.trim_end_matches(".pptx").split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "generated");
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2].len(), 8);
        assert!(name.ends_with(".pptx"));
    }

    #[test]
    fn test_render_options() {
        let only = RenderOptions::only(Backend::TemplateFill);
        assert!(only.template_fill && !only.html && !only.no_template);
        assert_eq!(RenderOptions::default(), RenderOptions::all());
    }
}
