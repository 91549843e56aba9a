use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{
    CreateJobRequest, CreatedJob, DownloadHistoryResponse, DownloadRecord, ErrorBody,
    FullPaperRequest, HistoryEntry, HistoryResponse, JobStatusReport, PaperAnalysis, PaperRequest,
    SearchRequest, SearchResponse, SummarizeRequest, Summary, TranslateRequest, TranslateResponse,
};
use super::{
    AnalysisBackend, BackendError, HistoryBackend, JobBackend, JobId, SearchBackend, Translator,
};
use crate::lang::Lang;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);
const CREATE_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(60);
const HISTORY_TIMEOUT: Duration = Duration::from_secs(10);
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(60);
/// Full-paper analysis downloads and reads the PDF server-side.
const FULL_PAPER_TIMEOUT: Duration = Duration::from_secs(180);

pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Job ids are interpolated as a single path segment.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+');

fn encode_segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT_ENCODE_SET).to_string()
}

/// JSON-over-HTTP client for every backend collaborator.
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<T, BackendError> {
        let response = request
            .header("User-Agent", crate::USER_AGENT)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("backend rate limited");
            return Err(BackendError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn classify_error(status: StatusCode, text: &str) -> BackendError {
    let message = match serde_json::from_str::<ErrorBody>(text) {
        Ok(ErrorBody {
            error: Some(error),
            detail,
        }) => match detail {
            Some(detail) => format!("{error}: {detail}"),
            None => error,
        },
        _ => {
            let end = text.floor_char_boundary(200);
            format!("HTTP {status}: {}", &text[..end])
        }
    };
    warn!(status = %status, %message, "backend error");
    BackendError::Api {
        code: status.as_u16(),
        message,
    }
}

/// A 200 response can still carry an `error` field.
fn reject_if_error(error: Option<String>) -> Result<(), BackendError> {
    match error {
        Some(e) if !e.trim().is_empty() => Err(BackendError::Rejected(e)),
        _ => Ok(()),
    }
}

impl SearchBackend for HttpBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        let response: SearchResponse = self
            .send_json(self.http.post(self.url("search")).json(request), SEARCH_TIMEOUT)
            .await?;
        debug!(
            results = response.results.len(),
            total = response.total,
            "search response received"
        );
        Ok(response)
    }
}

impl JobBackend for HttpBackend {
    async fn create(&self, source_ref: &str, label: &str) -> Result<CreatedJob, BackendError> {
        let body = CreateJobRequest { source_ref, label };
        let created: CreatedJob = self
            .send_json(
                self.http.post(self.url("download/create")).json(&body),
                CREATE_TIMEOUT,
            )
            .await?;
        reject_if_error(created.error.clone())?;
        Ok(created)
    }

    async fn status(&self, id: &JobId) -> Result<JobStatusReport, BackendError> {
        let path = format!("download/status/{}", encode_segment(id.as_str()));
        self.send_json(self.http.get(self.url(&path)), STATUS_TIMEOUT)
            .await
    }

    async fn list_jobs(&self) -> Result<Vec<DownloadRecord>, BackendError> {
        let response: DownloadHistoryResponse = self
            .send_json(self.http.get(self.url("download/history")), HISTORY_TIMEOUT)
            .await?;
        reject_if_error(response.error)?;
        Ok(response.downloads)
    }

    fn file_url(&self, id: &JobId) -> String {
        self.url(&format!("download/file/{}", encode_segment(id.as_str())))
    }
}

impl Translator for HttpBackend {
    async fn translate(&self, text: &str, target: Lang) -> Result<String, BackendError> {
        let body = TranslateRequest {
            text,
            target_lang: target.code(),
        };
        let response: TranslateResponse = self
            .send_json(
                self.http.post(self.url("translate")).json(&body),
                TRANSLATE_TIMEOUT,
            )
            .await?;
        reject_if_error(response.error)?;
        response
            .translated
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BackendError::Decode("translation missing from response".into()))
    }
}

impl HistoryBackend for HttpBackend {
    async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>, BackendError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let response: HistoryResponse = self
            .send_json(
                self.http.get(self.url(&format!("history?limit={limit}"))),
                HISTORY_TIMEOUT,
            )
            .await?;
        Ok(response.history)
    }

    async fn clear_history(&self) -> Result<(), BackendError> {
        let _: serde_json::Value = self
            .send_json(self.http.delete(self.url("history")), HISTORY_TIMEOUT)
            .await?;
        Ok(())
    }
}

impl AnalysisBackend for HttpBackend {
    async fn summarize(&self, content: &str) -> Result<Summary, BackendError> {
        let summary: Summary = self
            .send_json(
                self.http
                    .post(self.url("analysis/summarize"))
                    .json(&SummarizeRequest { content }),
                ANALYSIS_TIMEOUT,
            )
            .await?;
        reject_if_error(summary.error.clone())?;
        Ok(summary)
    }

    async fn analyze_paper(
        &self,
        title: &str,
        abstract_: &str,
        snippet: &str,
    ) -> Result<PaperAnalysis, BackendError> {
        let body = PaperRequest {
            title,
            abstract_,
            snippet,
        };
        let analysis: PaperAnalysis = self
            .send_json(
                self.http.post(self.url("analysis/paper")).json(&body),
                ANALYSIS_TIMEOUT,
            )
            .await?;
        reject_if_error(analysis.error.clone())?;
        Ok(analysis)
    }

    async fn analyze_paper_full(
        &self,
        arxiv_id: &str,
        title: &str,
    ) -> Result<PaperAnalysis, BackendError> {
        let body = FullPaperRequest { arxiv_id, title };
        let analysis: PaperAnalysis = self
            .send_json(
                self.http.post(self.url("analysis/paper-full")).json(&body),
                FULL_PAPER_TIMEOUT,
            )
            .await?;
        reject_if_error(analysis.error.clone())?;
        Ok(analysis)
    }
}
