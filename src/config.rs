//! Runtime configuration, from command-line flags or the environment.

use crate::error::PptError;
use crate::images::ImageConfig;
use crate::llm::DASHSCOPE_BASE_URL;
use clap::Args;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Port the HTTP API listens on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Generated decks are written here and served under `/uploads`.
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Templates and their JSON sidecars.
    #[arg(long, env = "TEMPLATE_FOLDER", default_value = "ppt_templates")]
    pub template_dir: PathBuf,

    #[arg(long, env = "KNOWLEDGE_FOLDER", default_value = "knowledge_base")]
    pub knowledge_dir: PathBuf,

    #[arg(long, env = "IMAGE_CACHE_FOLDER", default_value = "image_cache")]
    pub image_cache_dir: PathBuf,

    #[arg(long, env = "DEFAULT_IMAGE_FOLDER", default_value = "default_images")]
    pub default_image_dir: PathBuf,

    /// Converted HTML templates, one directory per PPTX template.
    #[arg(long, env = "HTML_TEMPLATE_FOLDER", default_value = "html_templates")]
    pub html_template_dir: PathBuf,

    /// Headless Chrome or Chromium used for HTML rendering.
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    #[arg(long, env = "LLM_BASE_URL", default_value = DASHSCOPE_BASE_URL)]
    pub llm_base_url: String,

    #[arg(long, env = "ALIYUN_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, env = "LLM_MODEL", default_value = "qwen-max")]
    pub llm_model: String,

    #[arg(long, env = "UNSPLASH_API_KEY", hide_env_values = true)]
    pub unsplash_key: Option<String>,

    #[arg(long, env = "BING_SEARCH_API_KEY", hide_env_values = true)]
    pub bing_key: Option<String>,

    #[arg(long, env = "PIXABAY_API_KEY", hide_env_values = true)]
    pub pixabay_key: Option<String>,

    #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true)]
    pub pexels_key: Option<String>,

    #[arg(long, env = "FLICKR_API_KEY", hide_env_values = true)]
    pub flickr_key: Option<String>,
}

impl Config {
    /// Configuration rooted at `root`, with no keys. Used by tests and tools.
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            port: 5000,
            host: IpAddr::from([127, 0, 0, 1]),
            upload_dir: root.join("uploads"),
            template_dir: root.join("ppt_templates"),
            knowledge_dir: root.join("knowledge_base"),
            image_cache_dir: root.join("image_cache"),
            default_image_dir: root.join("default_images"),
            html_template_dir: root.join("html_templates"),
            chrome_path: None,
            llm_base_url: DASHSCOPE_BASE_URL.to_string(),
            llm_api_key: None,
            llm_model: "qwen-max".to_string(),
            unsplash_key: None,
            bing_key: None,
            pixabay_key: None,
            pexels_key: None,
            flickr_key: None,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Directory of template preview images, inside the template directory.
    pub fn preview_dir(&self) -> PathBuf {
        self.template_dir.join("previews")
    }

    /// Image service settings. Empty keys count as absent.
    pub fn image_config(&self) -> ImageConfig {
        let key = |k: &Option<String>| k.clone().filter(|v| !v.trim().is_empty());
        ImageConfig {
            cache_dir: self.image_cache_dir.clone(),
            default_dir: self.default_image_dir.clone(),
            unsplash_key: key(&self.unsplash_key),
            bing_key: key(&self.bing_key),
            pixabay_key: key(&self.pixabay_key),
            pexels_key: key(&self.pexels_key),
            flickr_key: key(&self.flickr_key),
            aliyun_key: key(&self.llm_api_key),
        }
    }

    pub fn llm_key(&self) -> Option<&str> {
        self.llm_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn ensure_dirs(&self) -> Result<(), PptError> {
        for dir in [
            &self.upload_dir,
            &self.template_dir,
            &self.image_cache_dir,
            &self.default_image_dir,
            &self.html_template_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::create_dir_all(self.preview_dir())?;
        Ok(())
    }
}
