//! Keyword-matched retrieval over a directory of JSON topic files.

use crate::error::PptError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{error, info};

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TopicFile {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    content: Vec<KnowledgeItem>,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    path: PathBuf,
    topic: String,
    subject: String,
    summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub topic: String,
    pub subject: String,
    pub score: f64,
    pub content: Vec<KnowledgeItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicDocument {
    pub id: String,
    pub topic: String,
    pub subject: String,
    pub content: Vec<KnowledgeItem>,
}

/// Maps Chinese subject names onto knowledge-base directory names.
pub fn subject_alias(subject: &str) -> &str {
    match subject {
        "生物" => "biology",
        "数学" => "math",
        "物理" => "physics",
        "化学" => "chemistry",
        other => other,
    }
}

/// CJK ideographs as single tokens, followed by lowercase `\w+` words.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = NON_WORD.replace_all(text, " ");
    let mut tokens: Vec<String> = cleaned
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .map(String::from)
        .collect();
    let lower = cleaned.to_lowercase();
    tokens.extend(WORD.find_iter(&lower).map(|m| m.as_str().to_string()));
    tokens
}

/// Term-frequency overlap normalised by document length.
pub fn similarity(query: &[String], doc: &[String]) -> f64 {
    if query.is_empty() || doc.is_empty() {
        return 0.0;
    }
    let query_set: HashSet<&String> = query.iter().collect();
    let mut freq: HashMap<&String, usize> = HashMap::new();
    for token in doc {
        *freq.entry(token).or_insert(0) += 1;
    }
    let len = doc.len() as f64;
    let score: f64 = freq
        .iter()
        .filter(|(token, _)| query_set.contains(*token))
        .map(|(_, count)| *count as f64 / len)
        .sum();
    score / len.sqrt()
}

pub struct KnowledgeRetriever {
    index: BTreeMap<String, IndexEntry>,
}

impl KnowledgeRetriever {
    pub fn empty() -> Self {
        Self {
            index: BTreeMap::new(),
        }
    }

    /// Indexes `<dir>/<subject>/*.json`. A missing directory yields an empty index.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut index = BTreeMap::new();
        let Ok(subjects) = std::fs::read_dir(dir) else {
            info!(dir = %dir.display(), "knowledge base directory not found");
            return Self::empty();
        };
        for subject_dir in subjects.flatten() {
            let subject_path = subject_dir.path();
            if !subject_path.is_dir() {
                continue;
            }
            let subject = subject_dir.file_name().to_string_lossy().into_owned();
            let Ok(files) = std::fs::read_dir(&subject_path) else { continue };
            for file in files.flatten() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match read_topic(&path) {
                    Ok(data) => {
                        let stem = path
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        let summary = data
                            .content
                            .first()
                            .map(|c| c.content.clone())
                            .unwrap_or_default();
                        index.insert(
                            format!("{}.{}", subject, stem),
                            IndexEntry {
                                path: path.clone(),
                                topic: data.topic,
                                subject: subject.clone(),
                                summary,
                            },
                        );
                    }
                    Err(e) => error!(file = %path.display(), error = %e, "failed to load knowledge file"),
                }
            }
        }
        info!(topics = index.len(), "loaded knowledge index");
        Self { index }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn search(&self, query: &str, subject: Option<&str>, top_k: usize) -> Vec<SearchResult> {
        let query_tokens = tokenize(query);
        let subject = subject.filter(|s| !s.is_empty()).map(subject_alias);
        let mut scored: Vec<(&String, f64, &IndexEntry)> = self
            .index
            .iter()
            .filter(|(_, e)| subject.map(|s| e.subject == s).unwrap_or(true))
            .map(|(id, e)| {
                let title = similarity(&query_tokens, &tokenize(&e.topic));
                let summary = similarity(&query_tokens, &tokenize(&e.summary));
                (id, title * 1.5 + summary, e)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(top_k)
            .map(|(id, score, e)| SearchResult {
                id: id.clone(),
                topic: e.topic.clone(),
                subject: e.subject.clone(),
                score,
                content: load_content(&e.path),
            })
            .collect()
    }

    pub fn retrieve_by_id(&self, id: &str) -> Result<TopicDocument, PptError> {
        let entry = self
            .index
            .get(id)
            .ok_or_else(|| PptError::NotFound(format!("未找到ID为{}的主题", id)))?;
        Ok(TopicDocument {
            id: id.to_string(),
            topic: entry.topic.clone(),
            subject: entry.subject.clone(),
            content: load_content(&entry.path),
        })
    }

    /// Context block for an LLM prompt, bounded by a token budget.
    pub fn relevant_content(&self, query: &str, subject: Option<&str>, max_tokens: usize) -> String {
        let mut out = String::new();
        let mut used = 0usize;
        for result in self.search(query, subject, 3) {
            if result.score <= 0.0 {
                continue;
            }
            let heading = format!("### {}\n", result.topic);
            used += tokenize(&heading).len();
            out.push_str(&heading);
            for item in &result.content {
                let line = format!("- {}: {}\n", item.title, item.content);
                let cost = tokenize(&line).len();
                if used + cost > max_tokens {
                    break;
                }
                out.push_str(&line);
                used += cost;
            }
            if used >= max_tokens {
                break;
            }
        }
        out
    }
}

fn read_topic(path: &Path) -> Result<TopicFile, PptError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn load_content(path: &Path) -> Vec<KnowledgeItem> {
    match read_topic(path) {
        Ok(data) => data.content,
        Err(e) => {
            error!(file = %path.display(), error = %e, "failed to load topic content");
            Vec::new()
        }
    }
}
