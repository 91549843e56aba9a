//! Contracts for the search/job/translation backend and the HTTP client implementing them.

mod client;
pub mod types;

pub use client::HttpBackend;
pub use types::JobId;

use std::future::Future;

use crate::lang::Lang;
use types::{
    CreatedJob, DownloadRecord, HistoryEntry, JobStatusReport, PaperAnalysis, SearchRequest, SearchResponse,
    Summary,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("backend rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("backend error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e)
        }
    }
}

/// Aggregated multi-provider search.
pub trait SearchBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError>;
}

/// Asynchronous document retrieval jobs.
///
/// Status futures are polled from the background polling task, so they must be `Send`.
pub trait JobBackend {
    fn create(
        &self,
        source_ref: &str,
        label: &str,
    ) -> impl Future<Output = Result<CreatedJob, BackendError>> + Send;

    fn status(&self, id: &JobId)
    -> impl Future<Output = Result<JobStatusReport, BackendError>> + Send;

    /// Every job the backend has recorded, newest first.
    fn list_jobs(&self) -> impl Future<Output = Result<Vec<DownloadRecord>, BackendError>> + Send;

    /// Navigation target for a finished job's artifact.
    fn file_url(&self, id: &JobId) -> String;
}

/// Single-text translation.
pub trait Translator {
    async fn translate(&self, text: &str, target: Lang) -> Result<String, BackendError>;
}

/// Persisted search history.
pub trait HistoryBackend {
    async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>, BackendError>;
    async fn clear_history(&self) -> Result<(), BackendError>;
}

/// AI analysis collaborators. Their output is only displayed, never interpreted.
pub trait AnalysisBackend {
    async fn summarize(&self, content: &str) -> Result<Summary, BackendError>;
    async fn analyze_paper(
        &self,
        title: &str,
        abstract_: &str,
        snippet: &str,
    ) -> Result<PaperAnalysis, BackendError>;
    async fn analyze_paper_full(
        &self,
        arxiv_id: &str,
        title: &str,
    ) -> Result<PaperAnalysis, BackendError>;
}
