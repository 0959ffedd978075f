//! Mutable state of one client session.
//!
//! The session owns the job registry, the "current job" pointer shared by
//! submission, polling and cancellation, the selected task and the editor
//! buffer. It is shared as [`SharedSession`]; callers never hold the lock
//! across a network call, so each method below is atomic for observers.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::catalog::Task;
use crate::error::Result;
use crate::jobs::{Job, JobId, JobRegistry, JobState, MergeOutcome};

pub type SharedSession = Arc<RwLock<Session>>;

#[derive(Debug, Default)]
pub struct Session {
    registry: JobRegistry,
    current: Option<JobId>,
    selected_task: Option<Task>,
    editor: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_editor(code: impl Into<String>) -> Self {
        Self {
            editor: code.into(),
            ..Self::default()
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    /// All jobs in insertion order.
    pub fn jobs(&self) -> Vec<Job> {
        self.registry.list()
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.registry.get(id)
    }

    pub fn current(&self) -> Option<&JobId> {
        self.current.as_ref()
    }

    /// Make `id` the job receiving live updates. Passing `None` idles the
    /// poller. Ids unknown to the registry are ignored.
    pub fn set_current(&mut self, id: Option<JobId>) {
        match id {
            Some(id) if !self.registry.contains(&id) => {
                tracing::warn!(job_id = %id, "Ignoring unknown job as current");
            }
            other => self.current = other,
        }
    }

    /// Id the poller should fetch on its next tick: the current job, as long
    /// as it is still registered. Terminal jobs keep being fetched so that
    /// corrected results reach the registry.
    pub fn poll_target(&self) -> Option<JobId> {
        self.current
            .as_ref()
            .filter(|id| self.registry.contains(id))
            .cloned()
    }

    /// Register a job and make it current, displacing any previous current
    /// job from polling without removing it.
    pub fn track(&mut self, job: Job) -> Result<()> {
        let id = job.id.clone();
        self.registry.insert(job)?;
        if let Some(previous) = self.current.replace(id.clone()) {
            tracing::debug!(previous = %previous, current = %id, "Current job displaced");
        }
        Ok(())
    }

    /// Fold a polled snapshot into the registry. When the job transitions
    /// into `done`, the editor buffer is replaced with the job's output.
    pub fn apply_snapshot(&mut self, id: &JobId, snapshot: Job) -> MergeOutcome {
        let was_done = matches!(
            self.registry.get(id).map(|j| &j.state),
            Some(JobState::Done { .. })
        );

        let outcome = self.registry.merge(id, snapshot);
        if outcome != MergeOutcome::Applied || was_done {
            return outcome;
        }

        if let Some(Job {
            state: JobState::Done { result },
            ..
        }) = self.registry.get(id)
        {
            self.editor = result.editor_output().to_string();
        }
        outcome
    }

    /// Remove a job. Clears the current pointer when it referred to it.
    pub fn remove_job(&mut self, id: &JobId) -> Option<Job> {
        let removed = self.registry.remove(id);
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        removed
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.selected_task.as_ref()
    }

    /// Select a task. An empty editor is seeded with the task's starter code.
    pub fn select_task(&mut self, task: Option<Task>) {
        if let Some(starter) = task.as_ref().and_then(|t| t.starter_code.as_ref()) {
            if self.editor.trim().is_empty() {
                self.editor = starter.clone();
            }
        }
        self.selected_task = task;
    }

    pub fn editor(&self) -> &str {
        &self.editor
    }

    pub fn set_editor(&mut self, code: impl Into<String>) {
        self.editor = code.into();
    }
}
