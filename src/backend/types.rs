use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::jobs::JobState;

/// Opaque job identifier assigned by the backend.
///
/// The backend may hand out integers or strings; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => JobId(n.to_string()),
            Raw::Text(s) => JobId(s),
        })
    }
}

/// Request body for `POST search`.
#[derive(Debug, Serialize)]
pub struct SearchRequest {
    pub queries: Vec<String>,
    pub sources: Vec<String>,
    pub filters: WireFilters,
}

#[derive(Debug, Serialize)]
pub struct WireFilters {
    pub time_range: Option<String>,
    pub semantic_filter: bool,
    pub relevance_threshold: u8,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<RawResult>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub sources_status: BTreeMap<String, SourceStatus>,
    pub error: Option<String>,
}

/// Per-provider outcome reported alongside search results.
/// `Unknown` captures status words added by newer backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Error,
    Timeout,
    #[serde(other)]
    Unknown,
}

impl SourceStatus {
    pub fn is_success(self) -> bool {
        matches!(self, SourceStatus::Success)
    }
}

/// A search hit as the backend returns it, before normalization.
#[derive(Debug, Default, Deserialize)]
pub struct RawResult {
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    #[serde(alias = "published_at")]
    pub published: Option<String>,
    pub authors: Option<Authors>,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Providers report authors either as one string or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Authors {
    Joined(String),
    List(Vec<String>),
}

impl Authors {
    pub fn joined(self) -> String {
        match self {
            Authors::Joined(s) => s,
            Authors::List(names) => names.join(", "),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateJobRequest<'a> {
    pub source_ref: &'a str,
    pub label: &'a str,
}

/// Response from `POST download/create`. `status == "completed"` marks a cache hit.
#[derive(Debug, Deserialize)]
pub struct CreatedJob {
    pub download_id: JobId,
    pub status: Option<String>,
    pub error: Option<String>,
}

impl CreatedJob {
    pub fn is_cache_hit(&self) -> bool {
        self.status.as_deref().and_then(JobState::from_wire) == Some(JobState::Succeeded)
    }
}

/// Response from `GET download/status/{id}`.
#[derive(Debug, Deserialize)]
pub struct JobStatusReport {
    pub status: String,
    pub file_size: Option<u64>,
    pub progress: Option<f64>,
}

/// Response from `GET download/history`.
#[derive(Debug, Deserialize)]
pub struct DownloadHistoryResponse {
    #[serde(default)]
    pub downloads: Vec<DownloadRecord>,
    pub error: Option<String>,
}

/// A job the backend knows about, possibly created by another session.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRecord {
    pub id: JobId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    pub file_size: Option<u64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranslateRequest<'a> {
    pub text: &'a str,
    pub target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TranslateResponse {
    #[serde(alias = "translated_text")]
    pub translated: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    #[serde(default)]
    pub result_count: u64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeRequest<'a> {
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaperRequest<'a> {
    pub title: &'a str,
    #[serde(rename = "abstract")]
    pub abstract_: &'a str,
    pub snippet: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FullPaperRequest<'a> {
    pub arxiv_id: &'a str,
    pub title: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PaperAnalysis {
    #[serde(default)]
    pub abstract_summary: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub innovation: String,
    #[serde(default)]
    pub results: String,
    #[serde(default)]
    pub conclusion: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub error: Option<String>,
    pub detail: Option<String>,
}
