use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::job::{ComputeJob, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Terminal record of one run, retained for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub summary: Option<RunSummary>,
    pub started_at: i64,
    pub finished_at: i64,
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Shared run state. The scheduler owns the transitions; the API reads it and
/// rejects triggers while a run is active. A finished run drops straight back
/// to idle — only its outcome is retained.
#[derive(Default)]
pub struct JobState {
    running: AtomicBool,
    last_outcome: Mutex<Option<RunOutcome>>,
}

impl JobState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Idle → Running. False when a run is already active — the caller must
    /// not start one.
    pub fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Running → (Completed | Failed) → Idle.
    pub fn finish(&self, outcome: RunOutcome) {
        *self.last_outcome.lock().unwrap() = Some(outcome);
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.last_outcome.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// JobScheduler
// ---------------------------------------------------------------------------

/// Drives the compute job: one run per schedule tick plus on-demand triggers
/// from the HTTP API, never more than one run at a time. The loop itself is
/// serial, so the CAS guard only fires on triggers raced in from outside.
pub struct JobScheduler {
    job: ComputeJob,
    state: Arc<JobState>,
    trigger_rx: mpsc::Receiver<()>,
    interval_secs: u64,
}

impl JobScheduler {
    pub fn new(
        job: ComputeJob,
        state: Arc<JobState>,
        trigger_rx: mpsc::Receiver<()>,
        interval_secs: u64,
    ) -> Self {
        Self { job, state, trigger_rx, interval_secs }
    }

    pub async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        ticker.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => self.execute("schedule").await,
                Some(_) = self.trigger_rx.recv() => self.execute("manual").await,
            }
        }
    }

    async fn execute(&self, origin: &str) {
        if !self.state.try_begin() {
            warn!(origin, "run rejected: another run is active");
            return;
        }

        let started_at = now_secs();
        info!(origin, "compute run triggered");

        let outcome = match self.job.run().await {
            Ok(summary) => {
                info!(
                    status = "completed",
                    candidates = summary.candidates,
                    batches = summary.batches,
                    "compute run completed"
                );
                RunOutcome {
                    status: RunStatus::Completed,
                    error: None,
                    summary: Some(summary),
                    started_at,
                    finished_at: now_secs(),
                }
            }
            Err(e) => {
                error!(status = "failed", error = %e, "compute run failed");
                RunOutcome {
                    status: RunStatus::Failed,
                    error: Some(e.to_string()),
                    summary: None,
                    started_at,
                    finished_at: now_secs(),
                }
            }
        };

        self.state.finish(outcome);
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
