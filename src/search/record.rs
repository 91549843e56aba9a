use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::backend::types::RawResult;

const DEFAULT_CATEGORY: &str = "webpage";

/// One normalized search hit. `id` is unique within its result list.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub category: String,
    pub source: String,
    pub published_at: Option<String>,
    pub authors: Option<String>,
    pub extra: Map<String, Value>,
}

impl ResultRecord {
    /// Provider document id usable to request a download, if this hit has one.
    pub fn download_ref(&self) -> Option<&str> {
        if self.source != "arxiv" {
            return None;
        }
        self.extra
            .get("arxiv_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Canonical form of a result URL: parsed, fragment dropped. Unparseable URLs are kept trimmed.
pub(crate) fn canonical_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            Some(parsed.to_string())
        }
        Err(_) => Some(raw.to_string()),
    }
}

/// Turns raw hits into records with unique ids. Every hit is kept.
///
/// A record's id is its canonical URL, or `result-<index>` without one. An id already
/// taken by an earlier record gets `#<index>` appended (and a counter if that is taken too).
pub(crate) fn normalize(raw: Vec<RawResult>) -> Vec<ResultRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.len());

    for (index, hit) in raw.into_iter().enumerate() {
        let url = hit.url.unwrap_or_default();
        let base = match canonical_url(&url) {
            Some(canonical) => canonical,
            None => format!("result-{index}"),
        };
        let id = unique_id(&mut seen, base, index);

        records.push(ResultRecord {
            id,
            title: non_blank(hit.title).unwrap_or_default(),
            snippet: non_blank(hit.snippet).unwrap_or_default(),
            url: url.trim().to_string(),
            category: non_blank(hit.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            source: non_blank(hit.source).unwrap_or_default(),
            published_at: non_blank(hit.published),
            authors: hit.authors.map(|a| a.joined()).filter(|a| !a.trim().is_empty()),
            extra: hit.extra,
        });
    }

    records
}

fn unique_id(seen: &mut HashSet<String>, base: String, index: usize) -> String {
    if seen.insert(base.clone()) {
        return base;
    }
    let mut candidate = format!("{base}#{index}");
    let mut n = 1;
    while !seen.insert(candidate.clone()) {
        candidate = format!("{base}#{index}-{n}");
        n += 1;
    }
    candidate
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(url: Option<&str>, title: &str) -> RawResult {
        RawResult {
            title: Some(title.into()),
            url: url.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn id_comes_from_canonical_url() {
        let records = normalize(vec![raw(Some(" https://Example.com/a#section "), "A")]);
        assert_eq!(records[0].id, "https://example.com/a");
        assert_eq!(records[0].url, "https://Example.com/a#section");
    }

    #[test]
    fn missing_url_uses_positional_id() {
        let records = normalize(vec![
            raw(Some("https://a.com/"), "A"),
            raw(None, "B"),
            raw(Some("   "), "C"),
        ]);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["https://a.com/", "result-1", "result-2"]);
    }

    #[test]
    fn repeated_urls_are_kept_with_distinct_ids() {
        let records = normalize(vec![
            raw(Some("https://a.com/x"), "first"),
            raw(Some("https://a.com/x#again"), "second"),
            raw(Some("https://b.com/"), "third"),
        ]);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["https://a.com/x", "https://a.com/x#1", "https://b.com/"]);
        assert_eq!(records[1].title, "second");
    }

    #[test]
    fn same_paper_from_two_providers_keeps_download_ref() {
        let mut web = raw(Some("https://arxiv.org/abs/2401.00001"), "Paper");
        web.source = Some("duckduckgo".into());
        let mut paper = raw(Some("https://arxiv.org/abs/2401.00001"), "Paper");
        paper.source = Some("arxiv".into());
        paper
            .extra
            .insert("arxiv_id".into(), Value::String("2401.00001".into()));

        let records = normalize(vec![web, paper]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].download_ref(), None);
        assert_eq!(records[1].download_ref(), Some("2401.00001"));
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn positional_id_never_swallows_another_hit() {
        let records = normalize(vec![raw(Some("result-1"), "A"), raw(None, "B")]);
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(records[0].id, "result-1");
        assert_eq!(records[1].id, "result-1#1");
    }

    #[test]
    fn suffixed_ids_stay_unique() {
        let records = normalize(vec![
            raw(Some("https://a.com/"), "A"),
            raw(Some("https://a.com/#1"), "B"),
            raw(Some("https://a.com/"), "C"),
        ]);
        let ids: HashSet<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn missing_category_defaults_to_webpage() {
        let records = normalize(vec![raw(Some("https://a.com/"), "A")]);
        assert_eq!(records[0].category, "webpage");
    }

    #[test]
    fn download_ref_only_for_arxiv() {
        let mut hit = raw(Some("https://arxiv.org/abs/2401.00001"), "Paper");
        hit.source = Some("arxiv".into());
        hit.extra
            .insert("arxiv_id".into(), Value::String("2401.00001".into()));
        let records = normalize(vec![hit]);
        assert_eq!(records[0].download_ref(), Some("2401.00001"));

        let mut other = records[0].clone();
        other.source = "duckduckgo".into();
        assert_eq!(other.download_ref(), None);
    }
}
