//! Download job tracking: creation, status polling, and one-shot completion actions.

pub mod dispatch;
pub mod scheduler;
pub mod store;

pub use dispatch::{AutoAction, SaveToDirectory};
pub use scheduler::PollingScheduler;
pub use store::JobStore;

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, JobBackend, JobId};
use store::Applied;

/// Lifecycle of a job. Variant order is the forward direction of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Maps the backend's status words.
    pub fn from_wire(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => Some(JobState::Pending),
            "downloading" | "running" => Some(JobState::Running),
            "completed" | "succeeded" => Some(JobState::Succeeded),
            "failed" | "error" => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "downloading",
            JobState::Succeeded => "completed",
            JobState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub label: String,
    pub state: JobState,
    /// Known once the job has succeeded; 0 before.
    pub size_bytes: u64,
    /// Backend-reported percentage while running. `None` when the backend reports none.
    pub progress: Option<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("could not start download: {0}")]
    Creation(#[from] BackendError),

    #[error("could not load download history: {0}")]
    History(#[source] BackendError),
}

/// Outcome counts of one `refresh_all` cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub queried: usize,
    pub updated: usize,
    pub failed: usize,
    pub fired: usize,
}

struct Shared<B> {
    backend: B,
    store: Mutex<JobStore>,
    scheduler: Mutex<PollingScheduler>,
    action: Arc<dyn AutoAction>,
    active: watch::Sender<usize>,
}

/// Creates download jobs, polls them to completion, and fires the auto-action once per job.
///
/// Cheap to clone; clones share one store and one poll timer. The timer runs exactly while
/// at least one job is pending or running.
pub struct DownloadManager<B> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for DownloadManager<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B> DownloadManager<B>
where
    B: JobBackend + Send + Sync + 'static,
{
    pub fn new(backend: B, action: Arc<dyn AutoAction>, poll_interval: Duration) -> Self {
        let (active, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                backend,
                store: Mutex::new(JobStore::new()),
                scheduler: Mutex::new(PollingScheduler::new(poll_interval)),
                action,
                active,
            }),
        }
    }

    fn store(&self) -> MutexGuard<'_, JobStore> {
        self.shared
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a job on the backend. Nothing is tracked when the backend call fails.
    pub async fn create_job(&self, source_ref: &str, label: &str) -> Result<Job, JobError> {
        let created = self
            .shared
            .backend
            .create(source_ref, label)
            .await
            .inspect_err(|e| warn!(source_ref, error = %e, "job creation failed"))?;

        let (job, fire) = self.store().insert_created(&created, label);
        info!(job = %job.id, label, cached = fire.is_some(), "job created");
        if let Some(job) = fire {
            self.fire(&job);
        }
        self.reevaluate();
        Ok(job)
    }

    /// Queries every pending or running job concurrently and applies each answer once.
    /// A failing query only affects its own job; it is retried on the next cycle.
    pub async fn refresh_all(&self) -> RefreshReport {
        let ids = self.store().active_ids();
        let mut report = RefreshReport {
            queried: ids.len(),
            ..Default::default()
        };
        if ids.is_empty() {
            self.reevaluate();
            return report;
        }

        let queries = ids.iter().map(|id| async move {
            let outcome = self.shared.backend.status(id).await;
            (id, outcome)
        });
        let outcomes = join_all(queries).await;

        let mut due = Vec::new();
        {
            let mut store = self.store();
            for (id, outcome) in outcomes {
                match outcome {
                    Ok(status) => match store.apply_status(id, &status) {
                        Applied::Updated { fire } => {
                            report.updated += 1;
                            due.extend(fire);
                        }
                        Applied::Unrecognized(word) => {
                            report.failed += 1;
                            warn!(job = %id, status = %word, "unrecognized job status");
                        }
                        Applied::Missing => debug!(job = %id, "job removed while polling"),
                        Applied::Unchanged => {}
                    },
                    Err(e) => {
                        report.failed += 1;
                        warn!(job = %id, error = %e, "status query failed, retrying next cycle");
                    }
                }
            }
        }

        report.fired = due.len();
        for job in &due {
            self.fire(job);
        }
        self.reevaluate();
        debug!(?report, "refresh cycle complete");
        report
    }

    /// Stops tracking a job and cancels its pending auto-action. Idempotent.
    pub fn remove_job(&self, id: &JobId) -> bool {
        let removed = self.store().remove(id);
        if removed {
            info!(job = %id, "job removed");
        }
        self.reevaluate();
        removed
    }

    /// Tracks the jobs the backend already has on record and returns how many were added.
    ///
    /// Jobs this session is already tracking keep their state and eligibility. Adopted
    /// jobs are polled while unfinished but never run the auto-action.
    pub async fn load_history(&self) -> Result<usize, JobError> {
        let records = self
            .shared
            .backend
            .list_jobs()
            .await
            .map_err(JobError::History)?;

        let mut adopted = 0;
        {
            let mut store = self.store();
            // The backend lists newest first; adopting oldest first keeps that order.
            for record in records.into_iter().rev() {
                let Some(state) = JobState::from_wire(&record.status) else {
                    warn!(job = %record.id, status = %record.status, "skipping job with unknown status");
                    continue;
                };
                let size_bytes = match state {
                    JobState::Succeeded => record.file_size.unwrap_or(0),
                    _ => 0,
                };
                let job = Job {
                    id: record.id,
                    label: record.title,
                    state,
                    size_bytes,
                    progress: None,
                };
                if store.adopt(job) {
                    adopted += 1;
                }
            }
        }

        info!(adopted, "download history loaded");
        self.reevaluate();
        Ok(adopted)
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.store().jobs().to_vec()
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.store().get(id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.store().active_count()
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_active()
    }

    pub fn file_url(&self, id: &JobId) -> String {
        self.shared.backend.file_url(id)
    }

    /// Resolves once no job is pending or running.
    pub async fn wait_until_settled(&self) {
        let mut active = self.shared.active.subscribe();
        // The sender lives in `shared`, which `self` keeps alive.
        let _ = active.wait_for(|n| *n == 0).await;
    }

    fn fire(&self, job: &Job) {
        let url = self.shared.backend.file_url(&job.id);
        info!(job = %job.id, "running completion action");
        self.shared.action.fire(job, &url);
    }

    /// Starts or stops the poll timer to match the store. Runs after every store mutation.
    fn reevaluate(&self) {
        let store = self.store();
        let active = store.active_count();
        let mut scheduler = self
            .shared
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if active == 0 {
            scheduler.stop();
        } else if !scheduler.is_active() {
            let weak = Arc::downgrade(&self.shared);
            scheduler.start(move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(shared) => {
                            DownloadManager { shared }.refresh_all().await;
                            ControlFlow::Continue(())
                        }
                        None => ControlFlow::Break(()),
                    }
                }
            });
        }
        drop(scheduler);
        drop(store);
        self.shared.active.send_replace(active);
    }
}
