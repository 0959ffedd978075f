//! JSON bodies exchanged with the grading service.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Task;
use crate::error::TrainerError;
use crate::jobs::{Job, JobId, JobResult, JobState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    /// Compile and run against the task's tests.
    #[default]
    Check,
    /// Compile and run once without tests.
    Run,
}

impl fmt::Display for SubmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitMode::Check => write!(f, "check"),
            SubmitMode::Run => write!(f, "run"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub task_id: String,
    pub code: String,
    pub mode: SubmitMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDetailResponse {
    pub statement: String,
    pub meta: Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub workers: u32,
    pub queue_size: u32,
    pub jobs_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireJobState {
    Queued,
    Running,
    Done,
    Error,
}

/// One polled read of a job, as sent by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub state: WireJobState,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub eta_ms: Option<u64>,
    #[serde(default)]
    pub running_for_ms: Option<u64>,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TryFrom<JobStatusResponse> for Job {
    type Error = TrainerError;

    fn try_from(resp: JobStatusResponse) -> Result<Self, Self::Error> {
        // Fields that belong to other states are discarded here.
        let state = match resp.state {
            WireJobState::Queued => JobState::Queued {
                queue_position: resp.queue_position,
                eta_ms: resp.eta_ms,
            },
            WireJobState::Running => JobState::Running {
                running_for_ms: resp.running_for_ms,
            },
            WireJobState::Done => JobState::Done {
                result: resp.result.ok_or_else(|| {
                    TrainerError::MalformedSnapshot(format!(
                        "job {} is done but carries no result",
                        resp.job_id
                    ))
                })?,
            },
            WireJobState::Error => JobState::Error {
                message: resp.error_message,
                result: resp.result,
            },
        };

        Ok(Job {
            id: resp.job_id,
            state,
            created_at: resp.created_at,
            started_at: resp.started_at,
            finished_at: resp.finished_at,
        })
    }
}

/// Timestamps arrive either as RFC 3339 or as naive ISO-8601. Naive values
/// carry no offset and are assumed to be UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            Err(_) => raw
                .parse::<NaiveDateTime>()
                .map(|naive| Utc.from_utc_datetime(&naive)),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => parse(&raw).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Verdict;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parse_naive_timestamp_as_utc() {
        let dt = timestamp::parse("2024-03-01T12:30:05.250000").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 1));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (12, 30, 5));
        assert_eq!(dt.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn parse_rfc3339_timestamp() {
        let dt = timestamp::parse("2024-03-01T14:30:05+02:00").unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn queued_snapshot_keeps_queue_fields_only() {
        let resp: JobStatusResponse = serde_json::from_str(
            r#"{"job_id":"j1","state":"queued","created_at":"2024-03-01T12:00:00",
                "queue_position":2,"eta_ms":4500,"running_for_ms":99}"#,
        )
        .unwrap();
        let job = Job::try_from(resp).unwrap();
        assert_eq!(
            job.state,
            JobState::Queued {
                queue_position: Some(2),
                eta_ms: Some(4500)
            }
        );
    }

    #[test]
    fn done_snapshot_carries_result() {
        let resp: JobStatusResponse = serde_json::from_str(
            r#"{"job_id":"j1","state":"done","created_at":"2024-03-01T12:00:00",
                "started_at":"2024-03-01T12:00:01","finished_at":"2024-03-01T12:00:02",
                "result":{"verdict":"WA","stdout":"","stderr":"","compile_log":"","time_ms":12.5,
                  "test_results":[{"test_num":1,"passed":false,"expected":"3","actual":"4","time_ms":1.0}]}}"#,
        )
        .unwrap();
        let job = Job::try_from(resp).unwrap();
        let result = job.result().unwrap();
        assert_eq!(result.verdict, Verdict::WrongAnswer);
        assert_eq!(result.test_results.len(), 1);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn done_snapshot_without_result_is_malformed() {
        let resp: JobStatusResponse = serde_json::from_str(
            r#"{"job_id":"j1","state":"done","created_at":"2024-03-01T12:00:00"}"#,
        )
        .unwrap();
        assert!(matches!(
            Job::try_from(resp),
            Err(TrainerError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn error_snapshot_keeps_message() {
        let resp: JobStatusResponse = serde_json::from_str(
            r#"{"job_id":"j1","state":"error","created_at":"2024-03-01T12:00:00",
                "error_message":"Cancelled by user","result":null}"#,
        )
        .unwrap();
        let job = Job::try_from(resp).unwrap();
        assert_eq!(
            job.state,
            JobState::Error {
                message: Some("Cancelled by user".to_string()),
                result: None
            }
        );
    }

    #[test]
    fn submit_request_serializes_mode() {
        let body = serde_json::to_value(SubmitRequest {
            task_id: "t1".to_string(),
            code: "x".to_string(),
            mode: SubmitMode::default(),
        })
        .unwrap();
        assert_eq!(body["mode"], "check");
    }
}
