use std::fmt::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use sift::backend::types::{HistoryEntry, PaperAnalysis, SourceStatus, Summary};
use sift::jobs::{Job, JobState};
use sift::lang::Lang;
use sift::search::{Category, SearchFilters, SearchQuery, SearchSummary, TimeRange};
use sift::selection::ResultSelectionStore;

#[derive(Debug, Parser)]
#[command(
    name = "sift",
    version,
    about = "Multi-provider search with result selection, translated export, and tracked downloads"
)]
pub struct Cli {
    /// Backend base URL (overrides SIFT_API_BASE)
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Download status poll interval in milliseconds (overrides SIFT_POLL_INTERVAL_MS)
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    /// Where finished downloads are saved (overrides SIFT_DOWNLOAD_DIR)
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,

    /// Where export tables are written (overrides SIFT_EXPORT_DIR)
    #[arg(long, global = true)]
    pub export_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search every selected provider and list the results
    Search(SearchArgs),
    /// Search, select results, translate, and write a spreadsheet table
    Export(ExportArgs),
    /// Start a document download and wait until it finishes
    Download(DownloadArgs),
    /// List downloads the backend has on record
    Downloads(DownloadsArgs),
    /// Show or clear the search history
    History(HistoryArgs),
    /// Ask the backend to analyze content
    #[command(subcommand)]
    Analyze(AnalyzeCommand),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search terms; each one becomes a separate query
    #[arg(required = true)]
    pub terms: Vec<String>,

    /// Provider to ask (repeatable; defaults to duckduckgo and arxiv)
    #[arg(long = "source", short = 's')]
    pub sources: Vec<String>,

    #[arg(long, value_enum, default_value_t = Category::All)]
    pub category: Category,

    #[arg(long, value_enum)]
    pub time_range: Option<TimeRange>,

    /// Disable backend relevance filtering
    #[arg(long)]
    pub no_semantic: bool,

    /// Relevance threshold, 0-100
    #[arg(long, default_value_t = sift::search::DEFAULT_RELEVANCE_THRESHOLD,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub threshold: u8,
}

impl SearchArgs {
    pub fn to_query(&self) -> SearchQuery {
        SearchQuery {
            terms: self.terms.clone(),
            sources: self.sources.clone(),
            filters: SearchFilters {
                category: self.category,
                time_range: self.time_range,
                semantic_filter: !self.no_semantic,
                relevance_threshold: self.threshold,
            },
        }
    }
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// 1-based result numbers to toggle, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "all")]
    pub select: Vec<usize>,

    /// Select every result
    #[arg(long)]
    pub all: bool,

    /// Invert the selection after --select / --all
    #[arg(long)]
    pub invert: bool,

    /// Target language for translation
    #[arg(long, value_enum, default_value_t = Lang::Zh)]
    pub lang: Lang,
}

impl ExportArgs {
    /// Applies the selection flags in order: toggles or select-all, then invert.
    /// Returns the numbers that did not match a result.
    pub fn apply_selection(&self, store: &mut ResultSelectionStore) -> Vec<usize> {
        let mut unknown = Vec::new();
        if self.all {
            store.select_all();
        } else {
            for &n in &self.select {
                let id = n
                    .checked_sub(1)
                    .and_then(|i| store.results().get(i))
                    .map(|r| r.id.clone());
                match id {
                    Some(id) => store.toggle(&id),
                    None => unknown.push(n),
                }
            }
        }
        if self.invert {
            store.invert();
        }
        unknown
    }
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Provider document reference, e.g. an arXiv id
    pub source_ref: String,

    /// Human-readable label, also used for the saved file name
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Debug, Args)]
pub struct DownloadsArgs {
    /// Keep polling unfinished downloads until they settle
    #[arg(long)]
    pub watch: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of entries to show (1-100)
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Delete the stored history instead of listing it
    #[arg(long)]
    pub clear: bool,
}

#[derive(Debug, Subcommand)]
pub enum AnalyzeCommand {
    /// Summarize free text
    Summarize {
        content: String,
    },
    /// Analyze a paper from its title and abstract
    Paper {
        #[arg(long)]
        title: String,
        #[arg(long = "abstract", default_value = "")]
        abstract_: String,
        #[arg(long, default_value = "")]
        snippet: String,
    },
    /// Analyze a paper's full text (slow)
    PaperFull {
        arxiv_id: String,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Translate a piece of text
    Translate {
        text: String,
        #[arg(long, value_enum, default_value_t = Lang::Zh)]
        lang: Lang,
    },
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn status_word(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Success => "ok",
        SourceStatus::Error => "error",
        SourceStatus::Timeout => "timeout",
        SourceStatus::Unknown => "unknown",
    }
}

pub fn format_results(store: &ResultSelectionStore, summary: &SearchSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} results shown ({} reported by providers)",
        summary.shown, summary.total
    );
    if !summary.sources_status.is_empty() {
        let providers: Vec<String> = summary
            .sources_status
            .iter()
            .map(|(source, status)| format!("{source}: {}", status_word(*status)))
            .collect();
        let _ = writeln!(out, "Providers: {}", providers.join(", "));
    }
    let counts: Vec<String> = store
        .category_counts()
        .iter()
        .filter(|(category, _)| category.as_str() != "all")
        .map(|(category, n)| format!("{category} {n}"))
        .collect();
    if !counts.is_empty() {
        let _ = writeln!(out, "Categories: {}", counts.join(", "));
    }

    for (i, record) in store.results().iter().enumerate() {
        let mark = if store.is_selected(&record.id) { "*" } else { " " };
        let title = if record.title.is_empty() {
            "(untitled)"
        } else {
            record.title.as_str()
        };
        let _ = writeln!(
            out,
            "\n{mark}{:>3}. {title} [{} | {}]",
            i + 1,
            record.source,
            record.category
        );
        if !record.url.is_empty() {
            let _ = writeln!(out, "      {}", record.url);
        }
        if let Some(authors) = &record.authors {
            let _ = writeln!(out, "      {authors}");
        }
        if !record.snippet.is_empty() {
            let _ = writeln!(out, "      {}", truncate(&record.snippet, 200));
        }
        if let Some(reference) = record.download_ref() {
            let _ = writeln!(out, "      download: sift download {reference}");
        }
    }
    out
}

pub fn format_job(job: &Job) -> String {
    let mut line = format!("{} [{}] {}", job.id, job.state.label(), job.label);
    match (job.state, job.progress) {
        (JobState::Running, Some(p)) => {
            let _ = write!(line, " {p}%");
        }
        (JobState::Running, None) => line.push_str(" (progress unknown)"),
        _ => {}
    }
    if job.size_bytes > 0 {
        let _ = write!(line, " {}", format_size(job.size_bytes));
    }
    line
}

pub fn format_jobs(jobs: &[Job]) -> String {
    if jobs.is_empty() {
        return "No downloads recorded.\n".to_string();
    }
    let mut out = String::new();
    for job in jobs {
        let _ = writeln!(out, "{}", format_job(job));
    }
    out
}

pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No search history.".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{}  {}  ({} results)",
            if entry.timestamp.is_empty() {
                "-"
            } else {
                entry.timestamp.as_str()
            },
            entry.query,
            entry.result_count
        );
    }
    out
}

pub fn format_summary(summary: &Summary) -> String {
    let mut out = summary.summary.clone();
    if !summary.key_points.is_empty() {
        out.push_str("\n\nKey points:");
        for point in &summary.key_points {
            let _ = write!(out, "\n- {point}");
        }
    }
    out
}

pub fn format_analysis(analysis: &PaperAnalysis) -> String {
    let sections = [
        ("Summary", &analysis.abstract_summary),
        ("Method", &analysis.method),
        ("Innovation", &analysis.innovation),
        ("Results", &analysis.results),
        ("Conclusion", &analysis.conclusion),
    ];
    let mut out = String::new();
    for (heading, body) in sections {
        if !body.trim().is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            let _ = write!(out, "## {heading}\n{}", body.trim());
        }
    }
    if out.is_empty() {
        out.push_str("(no analysis returned)");
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift::backend::JobId;
    use sift::search::ResultRecord;

    fn record(id: &str) -> ResultRecord {
        ResultRecord {
            id: id.into(),
            title: format!("title {id}"),
            snippet: String::new(),
            url: format!("https://{id}.com/"),
            category: "blog".into(),
            source: "duckduckgo".into(),
            published_at: None,
            authors: None,
            extra: Default::default(),
        }
    }

    fn store_with(n: usize) -> ResultSelectionStore {
        let mut store = ResultSelectionStore::new();
        store.replace_results((0..n).map(|i| record(&format!("r{i}"))).collect());
        store
    }

    fn export_args(args: &[&str]) -> ExportArgs {
        let argv = ["sift", "export"].into_iter().chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Export(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(2_621_440), "2.5 MB");
    }

    #[test]
    fn select_numbers_are_one_based() {
        let args = export_args(&["rust", "--select", "1,3,9"]);
        let mut store = store_with(4);

        let unknown = args.apply_selection(&mut store);
        assert_eq!(unknown, [9]);
        assert!(store.is_selected("r0"));
        assert!(store.is_selected("r2"));
        assert_eq!(store.selected_count(), 2);
    }

    #[test]
    fn invert_runs_after_select() {
        let args = export_args(&["rust", "--select", "2", "--invert"]);
        let mut store = store_with(3);
        args.apply_selection(&mut store);
        assert!(!store.is_selected("r1"));
        assert_eq!(store.selected_count(), 2);
    }

    #[test]
    fn select_and_all_conflict() {
        let err = Cli::try_parse_from(["sift", "export", "x", "--all", "--select", "1"]);
        assert!(err.is_err());
    }

    #[test]
    fn search_args_build_query() {
        let cli = Cli::try_parse_from([
            "sift",
            "search",
            "attention",
            "transformer",
            "--source",
            "arxiv",
            "--category",
            "academic",
            "--time-range",
            "year",
            "--no-semantic",
            "--threshold",
            "70",
        ])
        .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        let query = args.to_query();
        assert_eq!(query.terms, ["attention", "transformer"]);
        assert_eq!(query.sources, ["arxiv"]);
        assert_eq!(query.filters.category, Category::Academic);
        assert_eq!(query.filters.time_range, Some(TimeRange::Year));
        assert!(!query.filters.semantic_filter);
        assert_eq!(query.filters.relevance_threshold, 70);
    }

    #[test]
    fn threshold_above_100_is_rejected() {
        assert!(Cli::try_parse_from(["sift", "search", "x", "--threshold", "101"]).is_err());
    }

    #[test]
    fn running_job_without_progress_says_unknown() {
        let job = Job {
            id: JobId::new("7"),
            label: "paper".into(),
            state: JobState::Running,
            size_bytes: 0,
            progress: None,
        };
        assert_eq!(format_job(&job), "7 [downloading] paper (progress unknown)");

        let done = Job {
            state: JobState::Succeeded,
            size_bytes: 2_621_440,
            ..job
        };
        assert!(format_job(&done).ends_with("2.5 MB"));
    }

    #[test]
    fn jobs_list_one_per_line() {
        let job = |id: &str, state| Job {
            id: JobId::new(id),
            label: format!("paper {id}"),
            state,
            size_bytes: 0,
            progress: None,
        };
        let text = format_jobs(&[job("2", JobState::Pending), job("1", JobState::Failed)]);
        assert_eq!(text, "2 [pending] paper 2\n1 [failed] paper 1\n");
        assert_eq!(format_jobs(&[]), "No downloads recorded.\n");
    }

    #[test]
    fn downloads_watch_flag_parses() {
        let cli = Cli::try_parse_from(["sift", "downloads", "--watch"]).unwrap();
        assert!(matches!(cli.command, Command::Downloads(DownloadsArgs { watch: true })));
    }

    #[test]
    fn results_mark_selected_rows() {
        let mut store = store_with(2);
        store.toggle("r1");
        let summary = SearchSummary {
            total: 5,
            shown: 2,
            sources_status: [("arxiv".to_string(), SourceStatus::Timeout)].into(),
        };
        let text = format_results(&store, &summary);
        assert!(text.contains("2 results shown (5 reported by providers)"));
        assert!(text.contains("arxiv: timeout"));
        assert!(text.contains("*  2. title r1"));
        assert!(text.contains("   1. title r0"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("注意力机制", 2), "注意...");
        assert_eq!(truncate("short", 10), "short");
    }
}
