//! The current result list and the user's selection over it.

use std::collections::{BTreeMap, HashSet};

use crate::search::ResultRecord;

/// Owns the displayed results and the ids selected among them.
///
/// The selection is always a subset of the result ids: every operation that changes the
/// list also prunes or resets the selection in the same call.
#[derive(Debug, Default)]
pub struct ResultSelectionStore {
    results: Vec<ResultRecord>,
    selected: HashSet<String>,
}

impl ResultSelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new result list. The previous selection never carries over.
    pub fn replace_results(&mut self, results: Vec<ResultRecord>) {
        self.selected.clear();
        self.results = results;
    }

    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Flips one id. Ids not in the current list are ignored.
    pub fn toggle(&mut self, id: &str) {
        if !self.selected.remove(id) && self.contains(id) {
            self.selected.insert(id.to_string());
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.results.iter().map(|r| r.id.clone()).collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn invert(&mut self) {
        self.selected = self
            .results
            .iter()
            .filter(|r| !self.selected.contains(&r.id))
            .map(|r| r.id.clone())
            .collect();
    }

    /// Adds every record matching `predicate` to the selection.
    pub fn select_where(&mut self, predicate: impl Fn(&ResultRecord) -> bool) {
        for record in self.results.iter().filter(|r| predicate(r)) {
            self.selected.insert(record.id.clone());
        }
    }

    /// Drops the selected records from the list and clears the selection. Returns how many
    /// records were removed.
    pub fn remove_selected(&mut self) -> usize {
        let before = self.results.len();
        let selected = std::mem::take(&mut self.selected);
        self.results.retain(|r| !selected.contains(&r.id));
        before - self.results.len()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Selected records in list order.
    pub fn selected_records(&self) -> Vec<&ResultRecord> {
        self.results
            .iter()
            .filter(|r| self.selected.contains(&r.id))
            .collect()
    }

    /// Records per category, plus an `"all"` entry with the list length.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        counts.insert("all".to_string(), self.results.len());
        for record in &self.results {
            *counts.entry(record.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn contains(&self, id: &str) -> bool {
        self.results.iter().any(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, category: &str) -> ResultRecord {
        ResultRecord {
            id: id.into(),
            title: format!("title {id}"),
            snippet: String::new(),
            url: String::new(),
            category: category.into(),
            source: "duckduckgo".into(),
            published_at: None,
            authors: None,
            extra: Default::default(),
        }
    }

    fn store_with(n: usize) -> ResultSelectionStore {
        let mut store = ResultSelectionStore::new();
        store.replace_results((0..n).map(|i| record(&format!("r{i}"), "webpage")).collect());
        store
    }

    fn selected_ids(store: &ResultSelectionStore) -> Vec<String> {
        store.selected_records().iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn even_toggles_restore_selection() {
        let mut store = store_with(4);
        store.toggle("r1");
        let before = selected_ids(&store);

        for _ in 0..4 {
            store.toggle("r2");
        }
        assert_eq!(selected_ids(&store), before);

        store.toggle("r1");
        store.toggle("r1");
        assert_eq!(selected_ids(&store), before);
    }

    #[test]
    fn toggle_ignores_unknown_ids() {
        let mut store = store_with(2);
        store.toggle("nope");
        assert_eq!(store.selected_count(), 0);
    }

    #[test]
    fn double_invert_is_identity() {
        let mut store = store_with(5);
        store.toggle("r0");
        store.toggle("r3");
        let before = selected_ids(&store);

        store.invert();
        assert_eq!(selected_ids(&store), ["r1", "r2", "r4"]);
        store.invert();
        assert_eq!(selected_ids(&store), before);
    }

    #[test]
    fn select_three_then_all_then_none() {
        let mut store = store_with(10);
        let mut sizes = Vec::new();

        for id in ["r1", "r4", "r7"] {
            store.toggle(id);
        }
        sizes.push(store.selected_count());
        store.select_all();
        sizes.push(store.selected_count());
        store.deselect_all();
        sizes.push(store.selected_count());

        assert_eq!(sizes, [3, 10, 0]);
    }

    #[test]
    fn remove_selected_prunes_list_and_clears_selection() {
        let mut store = store_with(5);
        store.toggle("r1");
        store.toggle("r3");

        assert_eq!(store.remove_selected(), 2);
        assert_eq!(store.selected_count(), 0);
        let ids: Vec<_> = store.results().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["r0", "r2", "r4"]);
    }

    #[test]
    fn replacing_results_clears_selection() {
        let mut store = store_with(3);
        store.select_all();

        store.replace_results(vec![record("r0", "academic")]);
        assert_eq!(store.selected_count(), 0);
        assert!(!store.is_selected("r0"));
    }

    #[test]
    fn selected_records_follow_list_order() {
        let mut store = store_with(6);
        for id in ["r5", "r0", "r3"] {
            store.toggle(id);
        }
        assert_eq!(selected_ids(&store), ["r0", "r3", "r5"]);
    }

    #[test]
    fn select_where_adds_matches() {
        let mut store = ResultSelectionStore::new();
        store.replace_results(vec![
            record("a", "academic"),
            record("b", "blog"),
            record("c", "academic"),
        ]);
        store.select_where(|r| r.category == "academic");
        assert_eq!(selected_ids(&store), ["a", "c"]);
    }

    #[test]
    fn category_counts_include_all() {
        let mut store = ResultSelectionStore::new();
        store.replace_results(vec![
            record("a", "academic"),
            record("b", "blog"),
            record("c", "academic"),
        ]);
        let counts = store.category_counts();
        assert_eq!(counts["all"], 3);
        assert_eq!(counts["academic"], 2);
        assert_eq!(counts["blog"], 1);
    }
}
