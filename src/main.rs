mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tracing::{info, warn};

use cli::{
    AnalyzeCommand, Cli, Command, DownloadArgs, DownloadsArgs, ExportArgs, HistoryArgs, SearchArgs,
};
use sift::backend::{AnalysisBackend, HistoryBackend, HttpBackend, Translator};
use sift::config::Config;
use sift::export::{BatchExportPipeline, DirectorySink};
use sift::jobs::{DownloadManager, JobState, SaveToDirectory};
use sift::search::SearchOrchestrator;
use sift::selection::ResultSelectionStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for requests without their own timeout, i.e. artifact downloads.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_REDIRECTS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("sift=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().with_overrides(
        cli.api_base,
        cli.poll_interval_ms,
        cli.download_dir,
        cli.export_dir,
    );

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    let backend = HttpBackend::new(http, &config.api_base);
    info!(api = %config.api_base, "backend configured");

    match cli.command {
        Command::Search(args) => search(backend, &args).await,
        Command::Export(args) => export(backend, &config, &args).await,
        Command::Download(args) => download(backend, &config, args).await,
        Command::Downloads(args) => downloads(backend, &config, &args).await,
        Command::History(args) => history(&backend, &args).await,
        Command::Analyze(command) => analyze(&backend, command).await,
    }
}

async fn search(backend: HttpBackend, args: &SearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = SearchOrchestrator::new(backend);
    let mut store = ResultSelectionStore::new();
    let summary = orchestrator.search(&args.to_query(), &mut store).await?;
    print!("{}", cli::format_results(&store, &summary));
    Ok(())
}

async fn export(
    backend: HttpBackend,
    config: &Config,
    args: &ExportArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = SearchOrchestrator::new(backend.clone());
    let mut store = ResultSelectionStore::new();
    let summary = orchestrator
        .search(&args.search.to_query(), &mut store)
        .await?;

    let unknown = args.apply_selection(&mut store);
    if !unknown.is_empty() {
        warn!(?unknown, results = store.len(), "ignoring result numbers out of range");
    }
    print!("{}", cli::format_results(&store, &summary));

    let pipeline = BatchExportPipeline::new(
        backend,
        DirectorySink::new(&config.export_dir),
        args.lang,
    );
    let report = pipeline
        .export(&store, |state| {
            info!(
                completed = state.completed,
                total = state.total,
                percent = state.percent(),
                "export progress"
            );
        })
        .await?;

    println!(
        "\nExported {} rows to {} ({} translated, {} already in target language, {} kept original)",
        report.rows,
        report.path.display(),
        report.translated,
        report.skipped,
        report.fallbacks
    );
    Ok(())
}

async fn download(
    backend: HttpBackend,
    config: &Config,
    args: DownloadArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let saver = Arc::new(SaveToDirectory::new(
        backend.http().clone(),
        &config.download_dir,
    ));
    let manager = DownloadManager::new(backend, saver.clone(), config.poll_interval);

    let label = args.label.unwrap_or_else(|| args.source_ref.clone());
    let job = manager.create_job(&args.source_ref, &label).await?;
    println!("{}", cli::format_job(&job));

    tokio::select! {
        _ = manager.wait_until_settled() => {}
        _ = tokio::signal::ctrl_c() => {
            manager.remove_job(&job.id);
            warn!(job = %job.id, "interrupted, stopped tracking download");
        }
    }
    saver.finish().await;

    let Some(job) = manager.get(&job.id) else {
        return Err("download interrupted".into());
    };
    println!("{}", cli::format_job(&job));
    match job.state {
        JobState::Succeeded => {
            println!("File: {}", manager.file_url(&job.id));
            Ok(())
        }
        _ => Err(format!("download {} did not complete", job.id).into()),
    }
}

async fn downloads(
    backend: HttpBackend,
    config: &Config,
    args: &DownloadsArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let saver = Arc::new(SaveToDirectory::new(
        backend.http().clone(),
        &config.download_dir,
    ));
    let manager = DownloadManager::new(backend, saver, config.poll_interval);
    manager.load_history().await?;
    print!("{}", cli::format_jobs(&manager.jobs()));

    if args.watch && manager.active_count() > 0 {
        tokio::select! {
            _ = manager.wait_until_settled() => {}
            _ = tokio::signal::ctrl_c() => warn!("interrupted, stopped watching downloads"),
        }
        println!();
        print!("{}", cli::format_jobs(&manager.jobs()));
    }
    Ok(())
}

async fn history(
    backend: &HttpBackend,
    args: &HistoryArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.clear {
        backend.clear_history().await?;
        println!("Search history cleared.");
    } else {
        let entries = backend.history(args.limit).await?;
        print!("{}", cli::format_history(&entries));
    }
    Ok(())
}

async fn analyze(
    backend: &HttpBackend,
    command: AnalyzeCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = match command {
        AnalyzeCommand::Summarize { content } => {
            cli::format_summary(&backend.summarize(&content).await?)
        }
        AnalyzeCommand::Paper {
            title,
            abstract_,
            snippet,
        } => cli::format_analysis(&backend.analyze_paper(&title, &abstract_, &snippet).await?),
        AnalyzeCommand::PaperFull { arxiv_id, title } => {
            info!(%arxiv_id, "full-text analysis can take a few minutes");
            cli::format_analysis(&backend.analyze_paper_full(&arxiv_id, &title).await?)
        }
        AnalyzeCommand::Translate { text, lang } => backend.translate(&text, lang).await?,
    };
    println!("{text}");
    Ok(())
}
