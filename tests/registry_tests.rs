//! Registry merge ordering tests.
//!
//! Snapshots may arrive out of order; these tests check that the stored
//! state only ever moves forward along queued -> running -> done|error.


use test_harness::{done_with, errored, job_in, running};
use trainer_client::{Job, JobId, JobRegistry, JobState, MergeOutcome, TrainerError};

fn rank(state: &JobState) -> u8 {
    match state {
        JobState::Queued { .. } => 0,
        JobState::Running { .. } => 1,
        JobState::Done { .. } | JobState::Error { .. } => 2,
    }
}

fn all_states() -> Vec<JobState> {
    vec![
        JobState::queued(),
        running(10),
        done_with(&["1\n"], ""),
        errored("boom"),
    ]
}

#[test]
fn test_no_merge_sequence_regresses_state() {
    let states = all_states();
    let n = states.len();

    // Every sequence of four snapshots drawn from the four states.
    for code in 0..n.pow(4) {
        let mut registry = JobRegistry::new();
        registry.insert(Job::queued(JobId::new("j"))).unwrap();
        let id = JobId::new("j");

        let mut c = code;
        for _ in 0..4 {
            let next = states[c % n].clone();
            c /= n;

            let before = registry.get(&id).unwrap().state.clone();
            let outcome = registry.merge(&id, job_in("j", next.clone()));
            let after = registry.get(&id).unwrap().state.clone();

            assert!(
                rank(&after) >= rank(&before),
                "sequence {} regressed {} -> {}",
                code,
                before.name(),
                after.name()
            );
            if before.is_terminal() {
                assert_eq!(
                    after.name(),
                    before.name(),
                    "terminal state changed kind in sequence {}",
                    code
                );
            }
            if outcome == MergeOutcome::Applied {
                assert_eq!(after, next);
            } else {
                assert_eq!(after, before);
            }
        }
    }
}

#[test]
fn test_out_of_order_running_after_done_is_rejected() {
    let mut registry = JobRegistry::new();
    let id = JobId::new("j1");
    registry.insert(Job::queued(id.clone())).unwrap();

    assert_eq!(
        registry.merge(&id, job_in("j1", done_with(&["3\n"], ""))),
        MergeOutcome::Applied
    );
    assert_eq!(registry.merge(&id, job_in("j1", running(50))), MergeOutcome::Stale);

    let job = registry.get(&id).unwrap();
    assert_eq!(job.state.name(), "done");
    assert_eq!(job.result().unwrap().test_results[0].actual, "3\n");
}

#[test]
fn test_merge_for_absent_id_is_a_no_op() {
    let mut registry = JobRegistry::new();
    registry.insert(Job::queued(JobId::new("j1"))).unwrap();

    let outcome = registry.merge(&JobId::new("ghost"), job_in("ghost", running(5)));
    assert_eq!(outcome, MergeOutcome::Dropped);
    assert_eq!(registry.len(), 1);
    assert!(registry.get(&JobId::new("ghost")).is_none());
}

#[test]
fn test_inserted_job_lists_as_queued_without_result() {
    let mut registry = JobRegistry::new();
    registry.insert(Job::queued(JobId::new("a"))).unwrap();
    registry.insert(Job::queued(JobId::new("b"))).unwrap();

    let jobs = registry.list();
    let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    for job in &jobs {
        assert_eq!(job.state.name(), "queued");
        assert!(job.result().is_none());
    }
}

#[test]
fn test_duplicate_insert_is_rejected_and_keeps_existing() {
    let mut registry = JobRegistry::new();
    let id = JobId::new("j1");
    registry.insert(Job::queued(id.clone())).unwrap();
    registry.merge(&id, job_in("j1", running(20)));

    let err = registry.insert(Job::queued(id.clone())).unwrap_err();
    assert!(matches!(err, TrainerError::DuplicateId(ref dup) if dup == &id));
    assert_eq!(registry.get(&id).unwrap().state.name(), "running");
}

#[test]
fn test_same_state_snapshot_replaces_details() {
    let mut registry = JobRegistry::new();
    let id = JobId::new("j1");
    registry.insert(Job::queued(id.clone())).unwrap();

    registry.merge(&id, job_in("j1", running(10)));
    registry.merge(&id, job_in("j1", running(40)));
    assert_eq!(
        registry.get(&id).unwrap().state,
        JobState::Running {
            running_for_ms: Some(40)
        }
    );
}

#[test]
fn test_snapshot_id_is_overridden_by_registry_key() {
    let mut registry = JobRegistry::new();
    let id = JobId::new("j1");
    registry.insert(Job::queued(id.clone())).unwrap();

    registry.merge(&id, job_in("other", running(1)));
    assert!(registry.get(&id).is_some());
    assert!(registry.get(&JobId::new("other")).is_none());
}

#[test]
fn test_remove_then_merge_does_not_resurrect() {
    let mut registry = JobRegistry::new();
    let id = JobId::new("j1");
    registry.insert(Job::queued(id.clone())).unwrap();

    assert!(registry.remove(&id).is_some());
    assert_eq!(
        registry.merge(&id, job_in("j1", done_with(&["x"], ""))),
        MergeOutcome::Dropped
    );
    assert!(registry.is_empty());
}
