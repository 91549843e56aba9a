use tracing::debug;

use super::dispatch::AutoActionDispatcher;
use super::{Job, JobState};
use crate::backend::JobId;
use crate::backend::types::{CreatedJob, JobStatusReport};

/// Result of applying one status report to the store.
#[derive(Debug, PartialEq)]
pub enum Applied {
    /// The job was removed while its query was in flight.
    Missing,
    /// The job is terminal or the report carried nothing new.
    Unchanged,
    /// The backend answered with a status word this client does not know.
    Unrecognized(String),
    /// The job changed. `fire` holds the job when its auto-action is now due.
    Updated { fire: Option<Job> },
}

/// Every tracked job, newest first, plus the auto-action eligibility set.
///
/// All job writes go through `insert_created`, `apply_status`, and `remove`.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Vec<Job>,
    dispatcher: AutoActionDispatcher,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly created job. Returns the job and, on a cache hit, the job again
    /// as the auto-action to fire right away.
    pub fn insert_created(&mut self, created: &CreatedJob, label: &str) -> (Job, Option<Job>) {
        let state = if created.is_cache_hit() {
            JobState::Succeeded
        } else {
            JobState::Pending
        };
        let job = Job {
            id: created.download_id.clone(),
            label: label.to_string(),
            state,
            size_bytes: 0,
            progress: None,
        };

        if self.remove(&job.id) {
            debug!(job = %job.id, "backend reused a job id, replacing entry");
        }
        self.jobs.insert(0, job.clone());

        if state == JobState::Succeeded {
            (job.clone(), Some(job))
        } else {
            self.dispatcher.mark_eligible(job.id.clone());
            (job, None)
        }
    }

    pub fn apply_status(&mut self, id: &JobId, report: &JobStatusReport) -> Applied {
        let Some(next) = JobState::from_wire(&report.status) else {
            return Applied::Unrecognized(report.status.clone());
        };
        let Some(job) = self.jobs.iter_mut().find(|j| &j.id == id) else {
            return Applied::Missing;
        };
        if job.state.is_terminal() {
            return Applied::Unchanged;
        }

        let before = job.clone();
        let prev = job.state;
        // Pending after Running is a stale answer; keep the later state.
        if next >= prev {
            job.state = next;
        }
        match job.state {
            JobState::Running => {
                if let Some(reported) = report.progress {
                    let reported = reported.round().clamp(0.0, 100.0) as u8;
                    job.progress = Some(job.progress.map_or(reported, |p| p.max(reported)));
                }
            }
            JobState::Succeeded => {
                job.size_bytes = report.file_size.unwrap_or(0);
            }
            JobState::Pending | JobState::Failed => {}
        }

        if *job == before {
            return Applied::Unchanged;
        }

        let fire = self
            .dispatcher
            .take_on_transition(id, prev, job.state)
            .then(|| job.clone());
        Applied::Updated { fire }
    }

    /// Deletes a job and its auto-action eligibility. Returns whether it existed.
    pub fn remove(&mut self, id: &JobId) -> bool {
        self.dispatcher.revoke(id);
        let before = self.jobs.len();
        self.jobs.retain(|j| &j.id != id);
        self.jobs.len() != before
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn active_ids(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|j| !j.state.is_terminal())
            .map(|j| j.id.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|j| !j.state.is_terminal()).count()
    }

    pub fn is_eligible(&self, id: &JobId) -> bool {
        self.dispatcher.is_eligible(id)
    }

    /// Tracks a job that this session did not create. It is polled but never auto-fires.
    /// Returns false, leaving the store untouched, when the id is already tracked.
    pub fn adopt(&mut self, job: Job) -> bool {
        if self.get(&job.id).is_some() {
            return false;
        }
        self.jobs.insert(0, job);
        true
    }
}
