//! Batch export of the selected results: sequential translate-if-needed, then a
//! spreadsheet-friendly table.

mod table;

pub use table::{BOM, HEADERS, build_artifact, file_name};

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::backend::Translator;
use crate::lang::Lang;
use crate::search::ResultRecord;
use crate::selection::ResultSelectionStore;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing selected to export")]
    EmptySelection,

    #[error("could not build export table: {0}")]
    Serialize(String),

    #[error("could not save export: {0}")]
    Save(#[from] std::io::Error),
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Serialize(e.to_string())
    }
}

/// One table row: a record's fields with its text possibly translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub title: String,
    pub content: String,
    pub url: String,
    pub source: String,
    pub category: String,
    pub published: Option<String>,
    pub authors: Option<String>,
}

impl ExportRow {
    fn original(record: &ResultRecord) -> Self {
        Self {
            title: record.title.clone(),
            content: record.snippet.clone(),
            url: record.url.clone(),
            source: record.source.clone(),
            category: record.category.clone(),
            published: record.published_at.clone(),
            authors: record.authors.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Translated,
    /// Already in the target language.
    Skipped,
    /// Translation failed; the original text was kept.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedItem {
    pub index: usize,
    pub outcome: ItemOutcome,
    pub row: ExportRow,
}

/// Run state of one export invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportBatchState {
    pub running: bool,
    pub completed: usize,
    pub total: usize,
}

impl ExportBatchState {
    /// `round(completed / total * 100)`, held at 99 until the last item so 100 is
    /// reported exactly once.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.completed as f64 / self.total as f64 * 100.0).round() as u8;
        if self.completed < self.total {
            pct.min(99)
        } else {
            100
        }
    }
}

/// Walks the selected records one at a time. At most one translation call is in flight.
pub struct TranslationPass<'a, T> {
    translator: &'a T,
    target: Lang,
    items: std::iter::Enumerate<std::vec::IntoIter<&'a ResultRecord>>,
    state: ExportBatchState,
}

impl<'a, T: Translator> TranslationPass<'a, T> {
    pub fn new(translator: &'a T, target: Lang, items: Vec<&'a ResultRecord>) -> Self {
        let total = items.len();
        Self {
            translator,
            target,
            items: items.into_iter().enumerate(),
            state: ExportBatchState {
                running: total > 0,
                completed: 0,
                total,
            },
        }
    }

    pub fn state(&self) -> ExportBatchState {
        self.state
    }

    /// Processes the next record. Returns `None` once every record has been handled.
    pub async fn next_outcome(&mut self) -> Option<ProcessedItem> {
        let Some((index, record)) = self.items.next() else {
            self.state.running = false;
            return None;
        };

        let text = item_text(record);
        let mut row = ExportRow::original(record);
        let outcome = if self.target.is_predominant_in(&text) {
            debug!(index, "already in target language, skipping");
            ItemOutcome::Skipped
        } else {
            match self.translator.translate(&text, self.target).await {
                Ok(translated) => {
                    let (title, content) = split_translation(record, &translated);
                    row.title = title;
                    row.content = content;
                    ItemOutcome::Translated
                }
                Err(e) => {
                    warn!(index, url = %record.url, error = %e, "translation failed, keeping original");
                    ItemOutcome::Fallback
                }
            }
        };

        self.state.completed = index + 1;
        if self.state.completed == self.state.total {
            self.state.running = false;
        }
        Some(ProcessedItem {
            index,
            outcome,
            row,
        })
    }
}

/// Title and snippet travel as one text, title on the first line.
fn item_text(record: &ResultRecord) -> String {
    match (record.title.is_empty(), record.snippet.is_empty()) {
        (_, true) => record.title.clone(),
        (true, false) => record.snippet.clone(),
        (false, false) => format!("{}\n{}", record.title, record.snippet),
    }
}

fn split_translation(record: &ResultRecord, translated: &str) -> (String, String) {
    let translated = translated.trim();
    match (record.title.is_empty(), record.snippet.is_empty()) {
        (_, true) => (translated.to_string(), String::new()),
        (true, false) => (String::new(), translated.to_string()),
        (false, false) => match translated.split_once('\n') {
            Some((title, content)) => (title.trim().to_string(), content.trim().to_string()),
            None => (record.title.clone(), translated.to_string()),
        },
    }
}

/// Finished export table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Where a finished artifact is handed off for the user to keep.
pub trait ArtifactSink {
    async fn save(&self, artifact: &Artifact) -> Result<PathBuf, std::io::Error>;
}

/// Writes artifacts into a directory, replacing a same-named file.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactSink for DirectorySink {
    async fn save(&self, artifact: &Artifact) -> Result<PathBuf, std::io::Error> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&artifact.file_name);
        tokio::fs::write(&path, &artifact.bytes).await?;
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    pub translated: usize,
    pub skipped: usize,
    pub fallbacks: usize,
}

pub struct BatchExportPipeline<T, K> {
    translator: T,
    sink: K,
    target: Lang,
}

impl<T: Translator, K: ArtifactSink> BatchExportPipeline<T, K> {
    pub fn new(translator: T, sink: K, target: Lang) -> Self {
        Self {
            translator,
            sink,
            target,
        }
    }

    /// Exports the store's selection in list order.
    ///
    /// `on_progress` sees the batch state after every item, before the next one starts.
    /// Translation failures only downgrade their item; the export fails only when the
    /// table cannot be built or saved.
    pub async fn export(
        &self,
        store: &ResultSelectionStore,
        mut on_progress: impl FnMut(ExportBatchState),
    ) -> Result<ExportReport, ExportError> {
        let selected = store.selected_records();
        if selected.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        info!(items = selected.len(), lang = self.target.code(), "export started");

        let mut pass = TranslationPass::new(&self.translator, self.target, selected);
        let mut rows = Vec::with_capacity(pass.state().total);
        let (mut translated, mut skipped, mut fallbacks) = (0, 0, 0);

        while let Some(item) = pass.next_outcome().await {
            match item.outcome {
                ItemOutcome::Translated => translated += 1,
                ItemOutcome::Skipped => skipped += 1,
                ItemOutcome::Fallback => fallbacks += 1,
            }
            rows.push(item.row);
            on_progress(pass.state());
        }

        let artifact = build_artifact(&rows, chrono::Local::now().date_naive())?;
        let path = self.sink.save(&artifact).await?;

        if fallbacks > 0 {
            warn!(fallbacks, "some items kept their original text");
        }
        info!(path = %path.display(), rows = rows.len(), translated, skipped, "export complete");
        Ok(ExportReport {
            path,
            rows: rows.len(),
            translated,
            skipped,
            fallbacks,
        })
    }
}
