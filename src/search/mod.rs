//! Search orchestration: one aggregated request per invocation, normalized into the
//! selection store.

mod query;
mod record;

pub use query::{
    Category, DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_SOURCES, KNOWN_SOURCES, SearchFilters,
    SearchQuery, TimeRange,
};
pub use record::ResultRecord;

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::backend::types::SourceStatus;
use crate::backend::{BackendError, SearchBackend};
use crate::selection::ResultSelectionStore;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("search failed: {0}")]
    Request(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    /// Hit count reported by the backend.
    pub total: u64,
    /// Records installed after de-duplication and the category filter.
    pub shown: usize,
    pub sources_status: BTreeMap<String, SourceStatus>,
}

pub struct SearchOrchestrator<S> {
    backend: S,
}

impl<S: SearchBackend> SearchOrchestrator<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Runs one search and installs its results into `store`, replacing whatever was there.
    ///
    /// The selection is cleared first, even when the query is then rejected as empty. On
    /// a failed request the store is left with an empty list so stale results never stay
    /// visible; an empty query sends nothing and keeps the current list.
    pub async fn search(
        &self,
        query: &SearchQuery,
        store: &mut ResultSelectionStore,
    ) -> Result<SearchSummary, SearchError> {
        store.deselect_all();
        let terms = query.cleaned_terms();
        if terms.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        info!(terms = ?terms, sources = ?query.effective_sources(), "search");

        let response = match self.backend.search(&query.to_request(terms)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "search failed, clearing results");
                store.replace_results(Vec::new());
                return Err(e.into());
            }
        };
        if let Some(error) = response.error.filter(|e| !e.trim().is_empty()) {
            warn!(%error, "search rejected, clearing results");
            store.replace_results(Vec::new());
            return Err(BackendError::Rejected(error).into());
        }

        let category = query.filters.category;
        let records: Vec<ResultRecord> = record::normalize(response.results)
            .into_iter()
            .filter(|r| category.matches(&r.category))
            .collect();

        for (source, status) in response
            .sources_status
            .iter()
            .filter(|(_, s)| !s.is_success())
        {
            warn!(%source, ?status, "provider did not answer cleanly");
        }

        let summary = SearchSummary {
            total: response.total,
            shown: records.len(),
            sources_status: response.sources_status,
        };
        store.replace_results(records);
        info!(total = summary.total, shown = summary.shown, "search complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::{RawResult, SearchRequest, SearchResponse};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockSearch {
        responses: Mutex<VecDeque<Result<SearchResponse, BackendError>>>,
        requests: Mutex<Vec<(Vec<String>, Vec<String>)>>,
    }

    impl MockSearch {
        fn new(responses: Vec<Result<SearchResponse, BackendError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl SearchBackend for MockSearch {
        async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.queries.clone(), request.sources.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(BackendError::Timeout))
        }
    }

    fn hit(url: &str, category: &str) -> RawResult {
        RawResult {
            title: Some(format!("title of {url}")),
            url: Some(url.into()),
            category: Some(category.into()),
            source: Some("duckduckgo".into()),
            ..Default::default()
        }
    }

    fn response(results: Vec<RawResult>) -> SearchResponse {
        SearchResponse {
            total: results.len() as u64,
            results,
            sources_status: BTreeMap::from([
                ("duckduckgo".to_string(), SourceStatus::Success),
                ("arxiv".to_string(), SourceStatus::Timeout),
            ]),
            error: None,
        }
    }

    #[tokio::test]
    async fn installs_normalized_results() {
        let mock = MockSearch::new(vec![Ok(response(vec![
            hit("https://a.com/", "blog"),
            hit("https://b.com/", "academic"),
        ]))]);
        let orchestrator = SearchOrchestrator::new(mock);
        let mut store = ResultSelectionStore::new();

        let summary = orchestrator
            .search(&SearchQuery::new(["rust", "tokio"]), &mut store)
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.shown, 2);
        assert_eq!(summary.sources_status["arxiv"], SourceStatus::Timeout);
        assert_eq!(store.results()[0].id, "https://a.com/");

        let requests = orchestrator.backend.requests.lock().unwrap();
        assert_eq!(requests[0].0, ["rust", "tokio"]);
        assert_eq!(requests[0].1, ["duckduckgo", "arxiv"]);
    }

    #[tokio::test]
    async fn category_filter_applies_after_normalization() {
        let mock = MockSearch::new(vec![Ok(response(vec![
            hit("https://a.com/", "blog"),
            hit("https://b.com/", "academic"),
            hit("https://c.com/", "academic"),
        ]))]);
        let orchestrator = SearchOrchestrator::new(mock);
        let mut store = ResultSelectionStore::new();
        let query = SearchQuery {
            filters: SearchFilters {
                category: Category::Academic,
                ..Default::default()
            },
            ..SearchQuery::new(["x"])
        };

        let summary = orchestrator.search(&query, &mut store).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.shown, 2);
        assert!(store.results().iter().all(|r| r.category == "academic"));
    }

    #[tokio::test]
    async fn fresh_search_clears_selection() {
        let mock = MockSearch::new(vec![
            Ok(response(vec![hit("https://a.com/", "blog")])),
            Ok(response(vec![hit("https://a.com/", "blog")])),
        ]);
        let orchestrator = SearchOrchestrator::new(mock);
        let mut store = ResultSelectionStore::new();

        orchestrator
            .search(&SearchQuery::new(["x"]), &mut store)
            .await
            .unwrap();
        store.select_all();
        assert_eq!(store.selected_count(), 1);

        orchestrator
            .search(&SearchQuery::new(["x"]), &mut store)
            .await
            .unwrap();
        assert_eq!(store.selected_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn failure_leaves_empty_results() {
        let mock = MockSearch::new(vec![
            Ok(response(vec![hit("https://a.com/", "blog")])),
            Err(BackendError::Api {
                code: 500,
                message: "Search failed".into(),
            }),
        ]);
        let orchestrator = SearchOrchestrator::new(mock);
        let mut store = ResultSelectionStore::new();

        orchestrator
            .search(&SearchQuery::new(["x"]), &mut store)
            .await
            .unwrap();
        store.select_all();

        let err = orchestrator
            .search(&SearchQuery::new(["y"]), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Request(_)));
        assert!(store.is_empty());
        assert_eq!(store.selected_count(), 0);
    }

    #[tokio::test]
    async fn error_field_in_body_is_a_failure() {
        let mut rejected = response(vec![hit("https://a.com/", "blog")]);
        rejected.error = Some("query is required".into());
        let orchestrator = SearchOrchestrator::new(MockSearch::new(vec![Ok(rejected)]));
        let mut store = ResultSelectionStore::new();

        let err = orchestrator
            .search(&SearchQuery::new(["x"]), &mut store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("query is required"), "got: {err}");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_request() {
        let orchestrator = SearchOrchestrator::new(MockSearch::new(vec![Ok(response(vec![
            hit("https://a.com/", "blog"),
            hit("https://b.com/", "blog"),
        ]))]));
        let mut store = ResultSelectionStore::new();
        orchestrator
            .search(&SearchQuery::new(["x"]), &mut store)
            .await
            .unwrap();
        store.select_all();

        let err = orchestrator
            .search(&SearchQuery::new(["  ", ""]), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));
        assert_eq!(orchestrator.backend.request_count(), 1);
        assert_eq!(store.selected_count(), 0);
        assert_eq!(store.len(), 2);
    }
}
