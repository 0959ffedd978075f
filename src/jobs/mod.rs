pub mod job;
pub mod registry;

pub use job::{Job, JobId, JobResult, JobState, TestOutcome, Verdict};
pub use registry::{JobRegistry, MergeOutcome};
