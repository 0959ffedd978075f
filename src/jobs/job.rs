use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque job identifier assigned by the grading service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "OK")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "CE")]
    CompileError,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
}

impl Verdict {
    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Accepted => "OK",
            Verdict::WrongAnswer => "WA",
            Verdict::CompileError => "CE",
            Verdict::RuntimeError => "RE",
            Verdict::TimeLimitExceeded => "TLE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "Accepted"),
            Verdict::WrongAnswer => write!(f, "Wrong Answer"),
            Verdict::CompileError => write!(f, "Compile Error"),
            Verdict::RuntimeError => write!(f, "Runtime Error"),
            Verdict::TimeLimitExceeded => write!(f, "Timeout"),
        }
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_num: u32,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    pub time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub verdict: Verdict,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub compile_log: String,
    #[serde(default)]
    pub time_ms: f64,
    #[serde(default)]
    pub test_results: Vec<TestOutcome>,
}

impl JobResult {
    /// Text that replaces the editor buffer once a job is done: the last
    /// test's actual output, or raw stdout when that is empty or absent.
    pub fn editor_output(&self) -> &str {
        match self.test_results.last() {
            Some(test) if !test.actual.is_empty() => &test.actual,
            _ => &self.stdout,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }
}

/// Lifecycle state of a job, with the data that only exists in that state.
/// Queue positions are zero-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobState {
    Queued {
        queue_position: Option<u32>,
        eta_ms: Option<u64>,
    },
    Running {
        running_for_ms: Option<u64>,
    },
    Done {
        result: JobResult,
    },
    Error {
        message: Option<String>,
        result: Option<JobResult>,
    },
}

impl JobState {
    pub fn queued() -> Self {
        JobState::Queued {
            queue_position: None,
            eta_ms: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Queued { .. } => "queued",
            JobState::Running { .. } => "running",
            JobState::Done { .. } => "done",
            JobState::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done { .. } | JobState::Error { .. })
    }

    /// Whether a record in this state may be replaced by a snapshot in `next`.
    ///
    /// States only move forward along `queued -> running -> done|error`.
    /// A snapshot in the same state is always admitted; terminal states admit
    /// nothing else.
    pub fn admits(&self, next: &JobState) -> bool {
        match (self, next) {
            (JobState::Queued { .. }, _) => true,
            (JobState::Running { .. }, JobState::Queued { .. }) => false,
            (JobState::Running { .. }, _) => true,
            (JobState::Done { .. }, JobState::Done { .. }) => true,
            (JobState::Error { .. }, JobState::Error { .. }) => true,
            (JobState::Done { .. } | JobState::Error { .. }, _) => false,
        }
    }

    pub fn result(&self) -> Option<&JobResult> {
        match self {
            JobState::Done { result } => Some(result),
            JobState::Error { result, .. } => result.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    #[serde(flatten)]
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Provisional record for a freshly accepted submission.
    pub fn queued(id: JobId) -> Self {
        Self::queued_at(id, Utc::now())
    }

    pub fn queued_at(id: JobId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            state: JobState::queued(),
            created_at,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.state.result()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
