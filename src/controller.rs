//! User intents that create, adopt, select and cancel jobs.

use std::sync::Arc;

use crate::api::{GradingService, SubmitMode, SubmitRequest};
use crate::catalog::Task;
use crate::config::ClientConfig;
use crate::error::{Result, TrainerError};
use crate::jobs::{Job, JobId};
use crate::session::SharedSession;

/// Returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: JobId,
    pub task_id: String,
}

pub struct SubmissionController {
    service: Arc<dyn GradingService>,
    session: SharedSession,
    code_max_bytes: usize,
}

impl SubmissionController {
    pub fn new(service: Arc<dyn GradingService>, session: SharedSession, config: &ClientConfig) -> Self {
        Self {
            service,
            session,
            code_max_bytes: config.code_max_bytes,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Check submission preconditions without touching the network.
    pub fn validate(&self, task: Option<&Task>, code: &str) -> Result<()> {
        if task.is_none() {
            return Err(TrainerError::Validation("no task selected".to_string()));
        }
        if code.is_empty() {
            return Err(TrainerError::Validation("code is empty".to_string()));
        }
        if code.len() > self.code_max_bytes {
            return Err(TrainerError::Validation(format!(
                "code is {} bytes, limit is {}",
                code.len(),
                self.code_max_bytes
            )));
        }
        Ok(())
    }

    /// Submit `code` for `task` in check mode.
    pub async fn submit(&self, task: Option<&Task>, code: &str) -> Result<JobHandle> {
        self.submit_with_mode(task, code, SubmitMode::Check).await
    }

    /// Submit the session's selected task with the editor contents.
    pub async fn submit_selected(&self, mode: SubmitMode) -> Result<JobHandle> {
        let (task, code) = {
            let session = self.session.read().await;
            (session.selected_task().cloned(), session.editor().to_string())
        };
        self.submit_with_mode(task.as_ref(), &code, mode).await
    }

    /// Create a job and make it current. Nothing in the session changes
    /// unless the service accepted the submission.
    pub async fn submit_with_mode(
        &self,
        task: Option<&Task>,
        code: &str,
        mode: SubmitMode,
    ) -> Result<JobHandle> {
        self.validate(task, code)?;
        let task = task.ok_or_else(|| TrainerError::Validation("no task selected".to_string()))?;

        let request = SubmitRequest {
            task_id: task.id.clone(),
            code: code.to_string(),
            mode,
        };
        let job_id = match self.service.submit(&request).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "Submission failed");
                return Err(e);
            }
        };

        if let Err(e) = self.session.write().await.track(Job::queued(job_id.clone())) {
            tracing::error!(job_id = %job_id, error = %e, "Service reused a job id");
            return Err(e);
        }

        tracing::info!(job_id = %job_id, task_id = %task.id, %mode, "Job submitted");
        Ok(JobHandle {
            id: job_id,
            task_id: task.id.clone(),
        })
    }

    /// Adopt a job created elsewhere: fetch its snapshot, register it and
    /// make it current. Already-registered jobs are simply reselected.
    pub async fn track(&self, job_id: &JobId) -> Result<Job> {
        let existing = self.session.read().await.job(job_id).cloned();
        if let Some(job) = existing {
            self.session.write().await.set_current(Some(job_id.clone()));
            return Ok(job);
        }

        let snapshot = self.service.get_job(job_id).await?;
        let mut session = self.session.write().await;
        match session.track(snapshot.clone()) {
            Ok(()) => Ok(snapshot),
            // Registered concurrently while the fetch was in flight.
            Err(TrainerError::DuplicateId(_)) => {
                session.set_current(Some(job_id.clone()));
                session.job(job_id).cloned().ok_or_else(|| TrainerError::JobNotFound(job_id.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Make a registered job current again. Returns false for unknown ids.
    pub async fn select(&self, job_id: &JobId) -> bool {
        let mut session = self.session.write().await;
        if session.job(job_id).is_none() {
            return false;
        }
        session.set_current(Some(job_id.clone()));
        true
    }

    /// Best-effort cancellation. On a positive acknowledgement the job is
    /// removed and stops being current; otherwise nothing changes locally.
    pub async fn cancel(&self, job_id: &JobId) -> bool {
        match self.service.cancel_job(job_id).await {
            Ok(true) => {
                let removed = self.session.write().await.remove_job(job_id);
                tracing::info!(job_id = %job_id, was_registered = removed.is_some(), "Job cancelled");
                true
            }
            Ok(false) => {
                tracing::info!(job_id = %job_id, "Service declined cancellation");
                false
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Cancellation failed");
                false
            }
        }
    }
}
