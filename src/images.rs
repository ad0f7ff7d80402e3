//! Image search, generation and the local default-image set.

use crate::error::PptError;
use crate::keywords::{contains_non_ascii, detect_topics, extract_keywords, translate_to_english};
use crate::model::{ImageRef, SlideContent};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);
const RELIABLE_DOMAINS: &[&str] = &[
    "unsplash.com",
    "pixabay.com",
    "pexels.com",
    "flickr.com",
    "bing.com",
];

/// A remote image search backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, PptError>;
}

async fn get_json(request: reqwest::RequestBuilder) -> Result<Value, PptError> {
    let response = request.timeout(SEARCH_TIMEOUT).send().await?;
    if !response.status().is_success() {
        return Err(PptError::Http(format!("status {}", response.status())));
    }
    Ok(response.json::<Value>().await?)
}

fn collect_strings(items: Option<&Value>, path: &[&str]) -> Vec<String> {
    items
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    path.iter()
                        .try_fold(item, |v, key| v.get(*key))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct UnsplashProvider {
    client: reqwest::Client,
    key: String,
}

#[async_trait]
impl ImageProvider for UnsplashProvider {
    fn name(&self) -> &'static str {
        "unsplash"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, PptError> {
        let per_page = max_results.to_string();
        let data = get_json(self.client.get("https://api.unsplash.com/search/photos").query(&[
            ("query", query),
            ("per_page", per_page.as_str()),
            ("client_id", self.key.as_str()),
            ("orientation", "landscape"),
        ]))
        .await?;
        Ok(collect_strings(data.get("results"), &["urls", "regular"]))
    }
}

pub struct BingProvider {
    client: reqwest::Client,
    key: String,
}

#[async_trait]
impl ImageProvider for BingProvider {
    fn name(&self) -> &'static str {
        "bing"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, PptError> {
        let per_page = max_results.to_string();
        let data = get_json(
            self.client
                .get("https://api.bing.microsoft.com/v7.0/images/search")
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .query(&[
                    ("q", query),
                    ("count", per_page.as_str()),
                    ("safeSearch", "Moderate"),
                    ("imageType", "Photo"),
                    ("aspect", "Wide"),
                ]),
        )
        .await?;
        Ok(collect_strings(data.get("value"), &["contentUrl"]))
    }
}

pub struct PixabayProvider {
    client: reqwest::Client,
    key: String,
}

#[async_trait]
impl ImageProvider for PixabayProvider {
    fn name(&self) -> &'static str {
        "pixabay"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, PptError> {
        // Pixabay rejects per_page below 3.
        let per_page = max_results.max(3).to_string();
        let data = get_json(self.client.get("https://pixabay.com/api/").query(&[
            ("key", self.key.as_str()),
            ("q", query),
            ("per_page", per_page.as_str()),
            ("image_type", "photo"),
            ("orientation", "horizontal"),
        ]))
        .await?;
        Ok(collect_strings(data.get("hits"), &["largeImageURL"]))
    }
}

pub struct PexelsProvider {
    client: reqwest::Client,
    key: String,
}

#[async_trait]
impl ImageProvider for PexelsProvider {
    fn name(&self) -> &'static str {
        "pexels"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, PptError> {
        let per_page = max_results.to_string();
        let data = get_json(
            self.client
                .get("https://api.pexels.com/v1/search")
                .header("Authorization", &self.key)
                .query(&[
                    ("query", query),
                    ("per_page", per_page.as_str()),
                    ("orientation", "landscape"),
                ]),
        )
        .await?;
        Ok(collect_strings(data.get("photos"), &["src", "large"]))
    }
}

pub struct FlickrProvider {
    client: reqwest::Client,
    key: String,
}

#[async_trait]
impl ImageProvider for FlickrProvider {
    fn name(&self) -> &'static str {
        "flickr"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, PptError> {
        let per_page = max_results.to_string();
        let data = get_json(
            self.client
                .get("https://www.flickr.com/services/rest/")
                .query(&[
                    ("method", "flickr.photos.search"),
                    ("api_key", self.key.as_str()),
                    ("text", query),
                    ("format", "json"),
                    ("nojsoncallback", "1"),
                    ("per_page", per_page.as_str()),
                    ("sort", "relevance"),
                    ("media", "photos"),
                    ("extras", "url_m"),
                ]),
        )
        .await?;
        Ok(collect_strings(
            data.get("photos").and_then(|p| p.get("photo")),
            &["url_m"],
        ))
    }
}

/// Keys and directories for the image service; absent keys disable providers.
#[derive(Debug, Clone, Default)]
pub struct ImageConfig {
    pub cache_dir: PathBuf,
    pub default_dir: PathBuf,
    pub unsplash_key: Option<String>,
    pub bing_key: Option<String>,
    pub pixabay_key: Option<String>,
    pub pexels_key: Option<String>,
    pub flickr_key: Option<String>,
    pub aliyun_key: Option<String>,
}

impl ImageConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, default_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            default_dir: default_dir.into(),
            ..Default::default()
        }
    }
}

/// Built-in fallback pictures, generated as flat colour cards on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultImage {
    Cover,
    Biology,
    Cell,
    PlantCell,
    AnimalCell,
    Summary,
    Conclusion,
    Default,
}

impl DefaultImage {
    pub const ALL: [DefaultImage; 8] = [
        DefaultImage::Cover,
        DefaultImage::Biology,
        DefaultImage::Cell,
        DefaultImage::PlantCell,
        DefaultImage::AnimalCell,
        DefaultImage::Summary,
        DefaultImage::Conclusion,
        DefaultImage::Default,
    ];

    /// Lookup key used when matching query keywords.
    pub fn key(&self) -> &'static str {
        match self {
            DefaultImage::Cover => "cover",
            DefaultImage::Biology => "biology",
            DefaultImage::Cell => "cell",
            DefaultImage::PlantCell => "plant",
            DefaultImage::AnimalCell => "animal",
            DefaultImage::Summary => "summary",
            DefaultImage::Conclusion => "conclusion",
            DefaultImage::Default => "default",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            DefaultImage::Cover => "cover.jpg",
            DefaultImage::Biology => "biology.jpg",
            DefaultImage::Cell => "cell.jpg",
            DefaultImage::PlantCell => "plant_cell.jpg",
            DefaultImage::AnimalCell => "animal_cell.jpg",
            DefaultImage::Summary => "summary.jpg",
            DefaultImage::Conclusion => "conclusion.jpg",
            DefaultImage::Default => "default.jpg",
        }
    }

    fn color(&self) -> [u8; 3] {
        match self {
            DefaultImage::Cover => [53, 152, 219],
            DefaultImage::Biology => [46, 204, 113],
            DefaultImage::Cell => [155, 89, 182],
            DefaultImage::PlantCell => [39, 174, 96],
            DefaultImage::AnimalCell => [231, 76, 60],
            DefaultImage::Summary => [241, 196, 15],
            DefaultImage::Conclusion => [230, 126, 34],
            DefaultImage::Default => [189, 195, 199],
        }
    }

    /// Default picture for a slide based on its type, layout and title.
    pub fn for_slide(slide: &SlideContent) -> DefaultImage {
        let kind = slide.kind.as_deref().unwrap_or_default().to_lowercase();
        let layout = slide.layout.as_deref().unwrap_or_default().to_lowercase();
        let title = slide.title.to_lowercase();
        if kind == "cover" || layout == "cover" {
            DefaultImage::Cover
        } else if kind == "summary" || kind == "conclusion" {
            DefaultImage::Summary
        } else if title.contains("cell") || title.contains("细胞") {
            if title.contains("plant") || title.contains("植物") {
                DefaultImage::PlantCell
            } else if title.contains("animal") || title.contains("动物") {
                DefaultImage::AnimalCell
            } else {
                DefaultImage::Cell
            }
        } else if title.contains("biology") || title.contains("生物") {
            DefaultImage::Biology
        } else {
            DefaultImage::Default
        }
    }
}

/// Text-to-image generation through DashScope's wanx model.
pub struct AliyunImageGenerator {
    client: reqwest::Client,
    key: String,
}

impl AliyunImageGenerator {
    const ENDPOINT: &'static str =
        "https://dashscope.aliyuncs.com/api/v1/services/aigc/text2image/image-generation";

    pub fn new(client: reqwest::Client, key: String) -> Self {
        Self { client, key }
    }

    /// Returns the URL of the generated image.
    pub async fn generate(&self, prompt: &str) -> Result<String, PptError> {
        let seed: u32 = rand::random::<u32>() % 10_000 + 1;
        let payload = serde_json::json!({
            "model": "wanx-v1",
            "input": { "prompt": format!("{}，高清，专业，适合PPT演示，简洁背景", prompt) },
            "parameters": {
                "style": "photographic",
                "n": 1,
                "size": "1024*1024",
                "seed": seed
            }
        });
        let response = self
            .client
            .post(Self::ENDPOINT)
            .bearer_auth(&self.key)
            .json(&payload)
            .timeout(GENERATION_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PptError::Image(format!(
                "image generation failed with status {}",
                response.status()
            )));
        }
        let data: Value = response.json().await?;
        data.pointer("/output/results/0/url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PptError::Image("image generation returned no url".to_string()))
    }
}

const MAX_CACHED_QUERIES: usize = 256;

/// Search results by query, oldest query evicted first.
struct SearchCache {
    capacity: usize,
    entries: HashMap<String, Vec<String>>,
    order: VecDeque<String>,
}

impl SearchCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<Vec<String>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, urls: Vec<String>) {
        if self.entries.insert(key.clone(), urls).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct ImageService {
    client: reqwest::Client,
    providers: Vec<Arc<dyn ImageProvider>>,
    generator: Option<AliyunImageGenerator>,
    cache: Mutex<SearchCache>,
    cache_dir: PathBuf,
    default_dir: PathBuf,
}

impl ImageService {
    pub fn new(config: ImageConfig) -> Self {
        let client = reqwest::Client::new();
        let mut providers: Vec<Arc<dyn ImageProvider>> = Vec::new();
        let non_empty = |k: &Option<String>| k.clone().filter(|k| !k.trim().is_empty());
        if let Some(key) = non_empty(&config.unsplash_key) {
            providers.push(Arc::new(UnsplashProvider { client: client.clone(), key }));
        }
        if let Some(key) = non_empty(&config.bing_key) {
            providers.push(Arc::new(BingProvider { client: client.clone(), key }));
        }
        if let Some(key) = non_empty(&config.pixabay_key) {
            providers.push(Arc::new(PixabayProvider { client: client.clone(), key }));
        }
        if let Some(key) = non_empty(&config.pexels_key) {
            providers.push(Arc::new(PexelsProvider { client: client.clone(), key }));
        }
        if let Some(key) = non_empty(&config.flickr_key) {
            providers.push(Arc::new(FlickrProvider { client: client.clone(), key }));
        }
        let generator = non_empty(&config.aliyun_key)
            .map(|key| AliyunImageGenerator::new(client.clone(), key));
        info!(
            providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            generation = generator.is_some(),
            "image service ready"
        );
        Self {
            client,
            providers,
            generator,
            cache: Mutex::new(SearchCache::new(MAX_CACHED_QUERIES)),
            cache_dir: config.cache_dir,
            default_dir: config.default_dir,
        }
    }

    /// Offline service: no providers, only default images.
    pub fn offline(default_dir: impl Into<PathBuf>) -> Self {
        let default_dir = default_dir.into();
        Self::new(ImageConfig::new(default_dir.join("cache"), default_dir))
    }

    pub fn with_providers(mut self, providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of a default image, generating the file when missing.
    pub fn default_image_path(&self, image: DefaultImage) -> Result<PathBuf, PptError> {
        let path = self.default_dir.join(image.file_name());
        if !path.exists() {
            std::fs::create_dir_all(&self.default_dir)?;
            let [r, g, b] = image.color();
            let card = image::RgbImage::from_pixel(800, 600, image::Rgb([r, g, b]));
            card.save_with_format(&path, image::ImageFormat::Jpeg)?;
            debug!(path = %path.display(), "generated default image");
        }
        Ok(path)
    }

    pub fn default_image(&self, image: DefaultImage) -> Result<Vec<u8>, PptError> {
        Ok(std::fs::read(self.default_image_path(image)?)?)
    }

    pub fn ensure_default_images(&self) -> Result<(), PptError> {
        for image in DefaultImage::ALL {
            self.default_image_path(image)?;
        }
        Ok(())
    }

    /// `file://` URL of the default image that best matches a query.
    pub fn default_image_for_query(&self, query: &str) -> String {
        let keywords = extract_keywords(&query.to_lowercase(), 5);
        let mut chosen = keywords.iter().find_map(|kw| {
            DefaultImage::ALL
                .iter()
                .find(|d| kw.contains(d.key()) || d.key().contains(kw.as_str()))
                .copied()
        });
        if chosen.is_none() {
            chosen = detect_topics(&keywords).into_iter().find_map(|t| match t {
                "生物" | "细胞" => Some(DefaultImage::Biology),
                "植物" => Some(DefaultImage::PlantCell),
                "动物" => Some(DefaultImage::AnimalCell),
                _ => None,
            });
        }
        let image = chosen.unwrap_or(DefaultImage::Default);
        let path = self
            .default_image_path(image)
            .unwrap_or_else(|_| self.default_dir.join(image.file_name()));
        let abs = std::fs::canonicalize(&path).unwrap_or(path);
        format!("file://{}", abs.display())
    }

    /// Search variants for a query, most specific first, without duplicates.
    pub fn query_variants(query: &str) -> Vec<String> {
        let keywords = extract_keywords(query, 5);
        let topics = detect_topics(&keywords);
        let mut variants = vec![query.to_string()];
        if let Some(first) = keywords.first() {
            let top3 = keywords.iter().take(3).cloned().collect::<Vec<_>>().join(" ");
            for topic in &topics {
                variants.push(format!("{} {}", topic, top3));
                variants.push(format!("{} {}", first, topic));
            }
        }
        if contains_non_ascii(query) {
            let english = translate_to_english(query);
            if !english.is_empty() && english != query {
                variants.push(english);
            }
        }
        if keywords.len() >= 2 {
            variants.push(format!("{} {}", keywords[0], keywords[1]));
        }
        if keywords.len() >= 3 {
            variants.push(format!("{} {} {}", keywords[0], keywords[1], keywords[2]));
        }
        variants.push(format!("{} high quality", query));
        variants.push(format!("{} high resolution", query));
        if let Some(topic) = topics.first() {
            variants.push(format!("{} illustration", topic));
            variants.push(format!("{} diagram", topic));
        }
        let mut seen = HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants
    }

    /// Orders URLs by keyword hits and source quality; short lists are kept as-is.
    pub fn rank_images(urls: Vec<String>, query: &str) -> Vec<String> {
        if urls.len() <= 3 {
            return urls;
        }
        let keywords = extract_keywords(query, 3);
        let score = |url: &str| -> i32 {
            let lower = url.to_lowercase();
            let mut s = 0;
            s += 2 * keywords.iter().filter(|k| lower.contains(k.as_str())).count() as i32;
            s += RELIABLE_DOMAINS.iter().filter(|d| url.contains(*d)).count() as i32;
            if lower.contains("thumb") || lower.contains("small") {
                s -= 1;
            }
            if lower.contains("watermark") {
                s -= 2;
            }
            s
        };
        let mut scored: Vec<(i32, String)> = urls.into_iter().map(|u| (score(&u), u)).collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, u)| u).collect()
    }

    pub async fn search_image(&self, query: &str, max_results: usize) -> Vec<String> {
        let cache_key = format!("{}_{}", query, max_results);
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(&cache_key)) {
            debug!(query, "image search cache hit");
            return hit;
        }

        let mut pending = FuturesUnordered::new();
        for variant in Self::query_variants(query) {
            for provider in &self.providers {
                let provider = Arc::clone(provider);
                let variant = variant.clone();
                pending.push(async move {
                    let result = provider.search(&variant, max_results).await;
                    (provider.name(), variant, result)
                });
            }
        }
        let mut urls: Vec<String> = Vec::new();
        while let Some((name, variant, result)) = pending.next().await {
            match result {
                Ok(found) => urls.extend(found),
                Err(e) => debug!(provider = name, query = %variant, error = %e, "image search failed"),
            }
            if urls.len() >= max_results * 2 {
                break;
            }
        }
        let mut seen = HashSet::new();
        urls.retain(|u| seen.insert(u.clone()));
        let mut urls = Self::rank_images(urls, query);
        urls.truncate(max_results);
        if urls.is_empty() {
            urls.push(self.default_image_for_query(query));
        }
        info!(query, found = urls.len(), "image search finished");
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(cache_key, urls.clone());
        }
        urls
    }

    /// Fetches image bytes from an http(s) or file URL, rejecting non-images.
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>, PptError> {
        let bytes = if let Some(path) = url.strip_prefix("file://") {
            tokio::fs::read(path).await?
        } else {
            let response = self
                .client
                .get(url)
                .timeout(DOWNLOAD_TIMEOUT)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(PptError::Http(format!(
                    "download of {} failed with status {}",
                    url,
                    response.status()
                )));
            }
            response.bytes().await?.to_vec()
        };
        if !infer::is_image(&bytes) {
            return Err(PptError::Image(format!("{} is not an image", url)));
        }
        Ok(bytes)
    }

    /// AI generation first, then keyword search, then the default image.
    /// Returns a URL or `file://` path.
    pub async fn generate_image(&self, prompt: &str, keywords: &[String]) -> String {
        if let Some(generator) = &self.generator {
            match generator.generate(prompt).await {
                Ok(url) => match self.cache_generated(&url).await {
                    Ok(path) => return format!("file://{}", path.display()),
                    Err(e) => {
                        warn!(error = %e, "caching generated image failed");
                        return url;
                    }
                },
                Err(e) => warn!(error = %e, "AI image generation failed"),
            }
        }
        let query = if keywords.is_empty() {
            prompt.to_string()
        } else {
            keywords.join(" ")
        };
        self.search_image(&query, 1)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| self.default_image_for_query(prompt))
    }

    async fn cache_generated(&self, url: &str) -> Result<PathBuf, PptError> {
        let bytes = self.download_image(url).await?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_dir.join(format!(
            "ai_generated_{}.jpg",
            chrono::Local::now().format("%Y%m%d%H%M%S%3f")
        ));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// The image the slide explicitly asks for, if it can be loaded.
    pub async fn user_image(&self, slide: &SlideContent) -> Option<Vec<u8>> {
        let explicit = slide
            .image_url
            .as_deref()
            .and_then(ImageRef::parse)
            .or_else(|| slide.image.clone());
        match explicit? {
            ImageRef::Url(url) if url.starts_with("data:") => decode_data_url(&url),
            ImageRef::Url(url) => match self.download_image(&url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(url = %url, error = %e, "slide image download failed");
                    None
                }
            },
            ImageRef::Path(path) => {
                let bytes = tokio::fs::read(&path).await.ok()?;
                infer::is_image(&bytes).then_some(bytes)
            }
            ImageRef::Description(_) => None,
        }
    }

    /// Search query assembled from a slide's title, type, layout, content and keypoints.
    pub fn slide_query(slide: &SlideContent) -> Option<String> {
        let mut keywords: Vec<String> = Vec::new();
        if !slide.title.is_empty() {
            keywords.extend(extract_keywords(&slide.title, 5));
        }
        if let Some(kind) = slide.kind.as_deref().map(str::to_lowercase) {
            match kind.as_str() {
                "cover" => keywords.push("cover".to_string()),
                "summary" | "conclusion" => keywords.push("summary".to_string()),
                _ => {}
            }
        }
        if slide.layout.as_deref().map(str::to_lowercase).as_deref() == Some("image") {
            keywords.push("illustration".to_string());
            keywords.push("diagram".to_string());
            if !slide.title.is_empty() {
                keywords.push(format!("{} diagram", slide.title));
                keywords.push(format!("{} illustration", slide.title));
            }
        }
        if !slide.content.is_empty() {
            keywords.extend(extract_keywords(&slide.content, 5));
        }
        if let Some(ImageRef::Description(desc)) = &slide.image {
            keywords.extend(extract_keywords(desc, 5));
        }
        let points = slide
            .keypoints
            .iter()
            .take(3)
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join(" ");
        keywords.extend(extract_keywords(&points, 5));
        let mut seen = HashSet::new();
        keywords.retain(|k| seen.insert(k.clone()));
        if keywords.is_empty() {
            return None;
        }
        Some(keywords.into_iter().take(7).collect::<Vec<_>>().join(" "))
    }

    /// Explicit image, then a keyword search, then the slide's default image.
    pub async fn image_for_slide(&self, slide: &SlideContent) -> Result<Vec<u8>, PptError> {
        if let Some(bytes) = self.user_image(slide).await {
            return Ok(bytes);
        }
        if let Some(query) = Self::slide_query(slide) {
            let urls = self.search_image(&query, 3).await;
            let choice = urls.choose(&mut rand::thread_rng()).cloned();
            if let Some(url) = choice {
                match self.download_image(&url).await {
                    Ok(bytes) => return Ok(bytes),
                    Err(e) => warn!(url = %url, error = %e, "image download failed"),
                }
            }
        }
        self.default_image(DefaultImage::for_slide(slide))
    }

    /// First downloadable result for a topic keyword search.
    pub async fn topic_image(&self, keywords: &[String]) -> Option<Vec<u8>> {
        if keywords.is_empty() {
            return None;
        }
        let query = keywords.iter().take(3).cloned().collect::<Vec<_>>().join(" ");
        for url in self.search_image(&query, 3).await {
            if let Ok(bytes) = self.download_image(&url).await {
                return Some(bytes);
            }
        }
        None
    }
}

fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    use base64::prelude::*;
    let (_, payload) = url.split_once(";base64,")?;
    BASE64_STANDARD.decode(payload.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(Vec<String>);

    #[async_trait]
    impl ImageProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<String>, PptError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_query_variants() {
        let variants = ImageService::query_variants("plant cell structure");
        assert_eq!(variants[0], "plant cell structure");
        assert!(variants.contains(&"plant cell structure high quality".to_string()));
        assert!(variants.contains(&"植物 illustration".to_string()));
        let unique: HashSet<_> = variants.iter().collect();
        assert_eq!(unique.len(), variants.len());
    }

    #[test]
    fn test_rank_images() {
        let urls = vec![
            "https://x.com/a_thumb.jpg".to_string(),
            "https://x.com/cell_watermark.jpg".to_string(),
            "https://images.unsplash.com/cell.jpg".to_string(),
            "https://x.com/other.jpg".to_string(),
        ];
        let ranked = ImageService::rank_images(urls, "cell");
        assert_eq!(ranked[0], "https://images.unsplash.com/cell.jpg");
        assert_eq!(ranked[3], "https://x.com/a_thumb.jpg");
    }

    #[test]
    fn test_default_for_slide() {
        let cell = SlideContent::new("植物细胞的结构", "");
        assert_eq!(DefaultImage::for_slide(&cell), DefaultImage::PlantCell);
        let cover = SlideContent::new("x", "").with_kind("cover");
        assert_eq!(DefaultImage::for_slide(&cover), DefaultImage::Cover);
    }

    #[tokio::test]
    async fn test_search_uses_providers_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let service = ImageService::offline(dir.path()).with_providers(vec![Arc::new(
            FixedProvider(vec!["https://a/1.jpg".into(), "https://a/2.jpg".into()]),
        )]);
        let urls = service.search_image("cells", 2).await;
        assert_eq!(urls, vec!["https://a/1.jpg", "https://a/2.jpg"]);
        assert_eq!(service.search_image("cells", 2).await, urls);
    }

    #[test]
    fn test_search_cache_evicts_oldest() {
        let mut cache = SearchCache::new(2);
        cache.insert("a_1".into(), vec!["https://a".into()]);
        cache.insert("b_1".into(), vec!["https://b".into()]);
        cache.insert("a_1".into(), vec!["https://a2".into()]);
        assert_eq!(cache.len(), 2);
        cache.insert("c_1".into(), vec!["https://c".into()]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a_1"), None);
        assert_eq!(cache.get("c_1"), Some(vec!["https://c".to_string()]));
    }

    #[tokio::test]
    async fn test_search_cache_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let service = ImageService::offline(dir.path());
        for i in 0..MAX_CACHED_QUERIES + 10 {
            service.search_image(&format!("topic {}", i), 1).await;
        }
        let cache = service.cache.lock().unwrap();
        assert_eq!(cache.len(), MAX_CACHED_QUERIES);
        assert!(cache.get("topic 0_1").is_none());
        assert!(cache.get(&format!("topic {}_1", MAX_CACHED_QUERIES + 9)).is_some());
    }

    #[tokio::test]
    async fn test_offline_search_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let service = ImageService::offline(dir.path());
        let urls = service.search_image("biology lesson", 3).await;
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("file://"));
        assert!(urls[0].ends_with("biology.jpg"));
        let bytes = service.download_image(&urls[0]).await.unwrap();
        assert!(infer::is_image(&bytes));
    }
}
