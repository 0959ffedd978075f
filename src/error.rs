use serde::Deserialize;
use thiserror::Error;

use crate::jobs::JobId;

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed job snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("Stale snapshot for job {job_id}: {stored} -> {incoming}")]
    StaleSnapshot {
        job_id: JobId,
        stored: &'static str,
        incoming: &'static str,
    },

    #[error("Job {0} is already registered")]
    DuplicateId(JobId),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error body produced by the grading service (`{"detail": "..."}`).
#[derive(Deserialize)]
struct DetailBody {
    detail: serde_json::Value,
}

impl TrainerError {
    pub async fn from_response(response: reqwest::Response) -> TrainerError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response text".to_string());

        TrainerError::Http {
            status,
            message: Self::extract_detail(&body),
        }
    }

    /// Pull the human-readable `detail` out of an error body, falling back to
    /// the raw body.
    fn extract_detail(body: &str) -> String {
        match serde_json::from_str::<DetailBody>(body) {
            Ok(DetailBody {
                detail: serde_json::Value::String(s),
            }) => s,
            Ok(DetailBody { detail }) => detail.to_string(),
            Err(_) => body.trim().to_string(),
        }
    }

    /// Transport and server failures are non-fatal: callers report them and
    /// keep local state as it was.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TrainerError::Transport(_) | TrainerError::Http { .. } | TrainerError::MalformedSnapshot(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TrainerError::Http { status, .. } => Some(*status),
            TrainerError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrainerError>;
