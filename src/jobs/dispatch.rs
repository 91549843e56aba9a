use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{Job, JobState};
use crate::backend::JobId;

const MAX_FILE_STEM_CHARS: usize = 80;

/// One-shot side effect run when a job this session started has finished successfully.
pub trait AutoAction: Send + Sync {
    fn fire(&self, job: &Job, file_url: &str);
}

/// Ids whose success should still trigger the auto-action.
///
/// Membership is consumed on the firing transition, so a job fires at most once no matter
/// how many refresh cycles observe it.
#[derive(Debug, Default)]
pub struct AutoActionDispatcher {
    eligible: HashSet<JobId>,
}

impl AutoActionDispatcher {
    pub fn mark_eligible(&mut self, id: JobId) {
        self.eligible.insert(id);
    }

    pub fn revoke(&mut self, id: &JobId) -> bool {
        self.eligible.remove(id)
    }

    pub fn is_eligible(&self, id: &JobId) -> bool {
        self.eligible.contains(id)
    }

    /// Returns true exactly once per eligible id, on its transition into `Succeeded`.
    pub fn take_on_transition(&mut self, id: &JobId, prev: JobState, next: JobState) -> bool {
        prev != JobState::Succeeded && next == JobState::Succeeded && self.eligible.remove(id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("file request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("file request failed: status {0}")]
    Status(u16),

    #[error("could not write file: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches a finished job's artifact and writes it into a local directory.
pub struct SaveToDirectory {
    http: Client,
    dir: PathBuf,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl SaveToDirectory {
    pub fn new(http: Client, dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            dir: dir.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Waits for every save started so far.
    pub async fn finish(&self) {
        let handles: Vec<_> = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "save task did not complete");
            }
        }
    }
}

impl AutoAction for SaveToDirectory {
    fn fire(&self, job: &Job, file_url: &str) {
        let http = self.http.clone();
        let url = file_url.to_string();
        let target = self.dir.join(file_name_for(job));
        let id = job.id.clone();
        let handle = tokio::spawn(async move {
            match save(&http, &url, &target).await {
                Ok(bytes) => info!(job = %id, path = %target.display(), bytes, "artifact saved"),
                Err(e) => warn!(job = %id, error = %e, "artifact save failed"),
            }
        });
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}

async fn save(http: &Client, url: &str, target: &Path) -> Result<usize, SaveError> {
    let response = http
        .get(url)
        .header("User-Agent", crate::USER_AGENT)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SaveError::Status(status.as_u16()));
    }
    let body = response.bytes().await?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, &body).await?;
    Ok(body.len())
}

/// `<label>-<id>.pdf`, so jobs sharing a label never overwrite each other.
fn file_name_for(job: &Job) -> String {
    let id = sanitize(job.id.as_str(), MAX_FILE_STEM_CHARS);
    let stem = sanitize(&job.label, MAX_FILE_STEM_CHARS);
    match (stem.is_empty(), id.is_empty()) {
        (true, _) => format!("download-{id}.pdf"),
        (false, true) => format!("{stem}.pdf"),
        (false, false) => format!("{stem}-{id}.pdf"),
    }
}

fn sanitize(raw: &str, max_chars: usize) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(max_chars)
        .collect();
    cleaned.trim_matches(|c| c == '_' || c == '.').to_string()
}
