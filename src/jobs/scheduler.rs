use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Owns the single repeating poll timer.
///
/// `start` is a no-op while a timer is alive, so repeated start conditions never stack timers.
#[derive(Debug)]
pub struct PollingScheduler {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl PollingScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawns the timer task. `tick` runs once per period, first after one full period,
    /// and ends the timer by returning `Break`. Returns false if a timer was already running.
    pub fn start<F, Fut>(&mut self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.is_active() {
            return false;
        }
        let period = self.period;
        debug!(period_ms = period.as_millis() as u64, "polling started");
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick().await.is_break() {
                    break;
                }
            }
        }));
        true
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("polling stopped");
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
