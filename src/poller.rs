//! Fixed-cadence polling of the session's current job.
//!
//! One [`Poller`] task runs per session. On every tick it reads the current
//! job id, fetches that job's snapshot and merges it into the session. Ticks
//! never overlap: the next tick is only awaited once the previous fetch has
//! settled. Failed fetches are logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::GradingService;
use crate::error::TrainerError;
use crate::jobs::{Job, JobId, MergeOutcome};
use crate::session::SharedSession;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No current job.
    Idle,
    Merged { job_id: JobId, outcome: MergeOutcome },
    Failed { job_id: JobId },
}

pub struct Poller {
    service: Arc<dyn GradingService>,
    session: SharedSession,
    interval: Duration,
    updates: Option<mpsc::Sender<Job>>,
}

impl Poller {
    pub fn new(service: Arc<dyn GradingService>, session: SharedSession, interval: Duration) -> Self {
        Self {
            service,
            session,
            interval,
            updates: None,
        }
    }

    /// Send every applied snapshot (as stored after the merge) to `tx`.
    pub fn with_updates(mut self, tx: mpsc::Sender<Job>) -> Self {
        self.updates = Some(tx);
        self
    }

    /// Run one poll cycle.
    pub async fn tick(&self) -> TickOutcome {
        let Some(job_id) = self.session.read().await.poll_target() else {
            return TickOutcome::Idle;
        };

        let snapshot = match self.service.get_job(&job_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                match &e {
                    // The service may not expose a job right after submission.
                    TrainerError::JobNotFound(_) => {
                        tracing::debug!(job_id = %job_id, "Job not visible yet")
                    }
                    _ => tracing::info!(job_id = %job_id, error = %e, "Poll failed, retrying next tick"),
                }
                return TickOutcome::Failed { job_id };
            }
        };

        // The job may have stopped being current while the fetch was in
        // flight; merging is still safe because absent ids are dropped and
        // regressions are rejected.
        let (outcome, stored) = {
            let mut session = self.session.write().await;
            let outcome = session.apply_snapshot(&job_id, snapshot);
            (outcome, session.job(&job_id).cloned())
        };

        match &outcome {
            MergeOutcome::Applied => {
                tracing::debug!(job_id = %job_id, "Snapshot applied");
                if let (Some(tx), Some(job)) = (&self.updates, stored) {
                    if tx.send(job).await.is_err() {
                        tracing::debug!("Update receiver dropped");
                    }
                }
            }
            MergeOutcome::Dropped => {
                tracing::debug!(job_id = %job_id, "Snapshot for removed job dropped")
            }
            MergeOutcome::Stale => tracing::debug!(job_id = %job_id, "Stale snapshot rejected"),
        }

        TickOutcome::Merged { job_id, outcome }
    }

    /// Tick at the configured cadence until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Poller stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Start the poll loop on the runtime. The returned handle stops it; it is
    /// also stopped when `parent` is cancelled.
    pub fn spawn(self, parent: &CancellationToken) -> PollerHandle {
        let token = parent.child_token();
        let task = tokio::spawn(self.run(token.clone()));
        PollerHandle { token, task }
    }
}

/// Handle to a spawned [`Poller`].
pub struct PollerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling and wait for an in-flight tick to settle.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Poller task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
