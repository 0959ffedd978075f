use crate::error::{Result, TrainerError};
use crate::jobs::job::{Job, JobId};

/// Result of folding a polled snapshot into the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The snapshot replaced the stored record.
    Applied,
    /// No record with this id; the job was removed locally.
    Dropped,
    /// The snapshot would move the job backwards and was ignored.
    Stale,
}

/// Ordered collection of the jobs known to this session.
///
/// Iteration order is insertion order. Records are never evicted; they leave
/// only through [`JobRegistry::remove`].
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &JobId) -> Option<usize> {
        self.jobs.iter().position(|j| &j.id == id)
    }

    /// Append a job at the tail. Fails if the id is already present.
    pub fn insert(&mut self, job: Job) -> Result<()> {
        if self.contains(&job.id) {
            return Err(TrainerError::DuplicateId(job.id));
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Replace the stored record for `id` with `snapshot`.
    ///
    /// Absent ids are dropped. Snapshots that would regress the stored state
    /// are rejected; everything else replaces the record wholesale.
    pub fn merge(&mut self, id: &JobId, snapshot: Job) -> MergeOutcome {
        match self.try_merge(id, snapshot) {
            Ok(true) => MergeOutcome::Applied,
            Ok(false) => MergeOutcome::Dropped,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring stale snapshot");
                MergeOutcome::Stale
            }
        }
    }

    fn try_merge(&mut self, id: &JobId, mut snapshot: Job) -> Result<bool> {
        let Some(idx) = self.position(id) else {
            return Ok(false);
        };
        let stored = &mut self.jobs[idx];
        if !stored.state.admits(&snapshot.state) {
            return Err(TrainerError::StaleSnapshot {
                job_id: id.clone(),
                stored: stored.state.name(),
                incoming: snapshot.state.name(),
            });
        }
        // The registry key is authoritative even if the payload disagrees.
        snapshot.id = id.clone();
        *stored = snapshot;
        Ok(true)
    }

    /// Remove a job. Returns the removed record, if any.
    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        self.position(id).map(|idx| self.jobs.remove(idx))
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.position(id).is_some()
    }

    /// Snapshot of all jobs in insertion order.
    pub fn list(&self) -> Vec<Job> {
        self.jobs.clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::job::{JobResult, JobState, Verdict};

    fn snapshot(id: &str, state: JobState) -> Job {
        let mut job = Job::queued(JobId::new(id));
        job.state = state;
        job
    }

    fn done_ok() -> JobState {
        JobState::Done {
            result: JobResult {
                verdict: Verdict::Accepted,
                stdout: "ok".to_string(),
                stderr: String::new(),
                compile_log: String::new(),
                time_ms: 3.0,
                test_results: Vec::new(),
            },
        }
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut registry = JobRegistry::new();
        registry.insert(Job::queued("j1".into())).unwrap();
        let err = registry.insert(Job::queued("j1".into())).unwrap_err();
        assert!(matches!(err, TrainerError::DuplicateId(id) if id.as_str() == "j1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn merge_keeps_insertion_order() {
        let mut registry = JobRegistry::new();
        for id in ["a", "b", "c"] {
            registry.insert(Job::queued(id.into())).unwrap();
        }
        let outcome = registry.merge(&"b".into(), snapshot("b", done_ok()));
        assert_eq!(outcome, MergeOutcome::Applied);

        let ids: Vec<String> = registry.list().into_iter().map(|j| j.id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(registry.get(&"b".into()).unwrap().state.name(), "done");
    }

    #[test]
    fn merge_uses_registry_key() {
        let mut registry = JobRegistry::new();
        registry.insert(Job::queued("j1".into())).unwrap();
        registry.merge(&"j1".into(), snapshot("other", JobState::Running { running_for_ms: None }));
        assert!(registry.contains(&"j1".into()));
        assert!(!registry.contains(&"other".into()));
    }

    #[test]
    fn remove_returns_record() {
        let mut registry = JobRegistry::new();
        registry.insert(Job::queued("j1".into())).unwrap();
        assert!(registry.remove(&"j1".into()).is_some());
        assert!(registry.remove(&"j1".into()).is_none());
        assert!(registry.is_empty());
    }
}
