use clap::ValueEnum;

use crate::backend::types::{SearchRequest, WireFilters};

pub const DEFAULT_SOURCES: &[&str] = &["duckduckgo", "arxiv"];
pub const KNOWN_SOURCES: &[&str] = &["duckduckgo", "arxiv", "scholar", "zhihu"];
pub const DEFAULT_RELEVANCE_THRESHOLD: u8 = 40;
pub const MAX_RELEVANCE_THRESHOLD: u8 = 100;

/// Client-side category filter applied after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Category {
    #[default]
    All,
    Academic,
    Qa,
    Blog,
    Forum,
    Webpage,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::All => "all",
            Category::Academic => "academic",
            Category::Qa => "qa",
            Category::Blog => "blog",
            Category::Forum => "forum",
            Category::Webpage => "webpage",
        }
    }

    pub fn matches(self, category: &str) -> bool {
        self == Category::All || category == self.as_str()
    }
}

/// Recency window forwarded to the providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    pub category: Category,
    pub time_range: Option<TimeRange>,
    /// Let the backend drop hits scored below `relevance_threshold` (0-100).
    pub semantic_filter: bool,
    pub relevance_threshold: u8,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            category: Category::All,
            time_range: None,
            semantic_filter: true,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }
}

/// One search invocation: one or more terms, the providers to ask, and filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub sources: Vec<String>,
    pub filters: SearchFilters,
}

impl SearchQuery {
    pub fn new<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Trimmed, non-blank, de-duplicated terms in input order.
    pub fn cleaned_terms(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for term in self.terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if !out.iter().any(|seen| seen == term) {
                out.push(term.to_string());
            }
        }
        out
    }

    /// Requested providers, or the defaults when none were named.
    pub fn effective_sources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for source in self
            .sources
            .iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
        {
            if !out.contains(&source) {
                out.push(source);
            }
        }
        if out.is_empty() {
            DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
        } else {
            out
        }
    }

    pub(crate) fn to_request(&self, terms: Vec<String>) -> SearchRequest {
        SearchRequest {
            queries: terms,
            sources: self.effective_sources(),
            filters: WireFilters {
                time_range: self.filters.time_range.map(|t| t.as_str().to_string()),
                semantic_filter: self.filters.semantic_filter,
                relevance_threshold: self.filters.relevance_threshold.min(MAX_RELEVANCE_THRESHOLD),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaned_terms_drop_blanks_and_repeats() {
        let q = SearchQuery::new([" rust ", "", "tokio", "rust", "   "]);
        assert_eq!(q.cleaned_terms(), ["rust", "tokio"]);
    }

    #[test]
    fn sources_default_when_unset() {
        let q = SearchQuery::new(["x"]);
        assert_eq!(q.effective_sources(), ["duckduckgo", "arxiv"]);
    }

    #[test]
    fn sources_are_normalized() {
        let q = SearchQuery {
            sources: vec!["ArXiv".into(), "arxiv".into(), " zhihu ".into()],
            ..SearchQuery::new(["x"])
        };
        assert_eq!(q.effective_sources(), ["arxiv", "zhihu"]);
    }

    #[test]
    fn request_carries_filters() {
        let q = SearchQuery {
            filters: SearchFilters {
                time_range: Some(TimeRange::Month),
                semantic_filter: false,
                relevance_threshold: 250,
                ..Default::default()
            },
            ..SearchQuery::new(["x"])
        };
        let req = q.to_request(q.cleaned_terms());
        assert_eq!(req.queries, ["x"]);
        assert_eq!(req.filters.time_range.as_deref(), Some("month"));
        assert!(!req.filters.semantic_filter);
        assert_eq!(req.filters.relevance_threshold, 100);
    }

    #[test]
    fn category_all_matches_everything() {
        assert!(Category::All.matches("forum"));
        assert!(Category::Academic.matches("academic"));
        assert!(!Category::Academic.matches("blog"));
    }
}
