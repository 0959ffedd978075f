//! Access to the remote grading service.
//!
//! [`GradingService`] is the seam between the job-tracking core and the
//! network. [`HttpGradingService`] talks to the real service over HTTP/JSON;
//! tests substitute scripted implementations.

pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::catalog::Task;
use crate::error::Result;
use crate::jobs::{Job, JobId};

pub use http::HttpGradingService;
pub use types::{HealthResponse, SubmitMode, SubmitRequest};

#[async_trait]
pub trait GradingService: Send + Sync {
    /// Summaries of every available task. Statements are usually absent.
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Full task including its statement.
    async fn get_task(&self, task_id: &str) -> Result<Task>;

    /// Create a job and return the id the service assigned to it.
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId>;

    /// Latest snapshot of a job.
    async fn get_job(&self, job_id: &JobId) -> Result<Job>;

    /// Ask the service to cancel a job. `Ok(false)` means the service refused,
    /// typically because the job already left the queue.
    async fn cancel_job(&self, job_id: &JobId) -> Result<bool>;

    async fn health(&self) -> Result<HealthResponse>;
}
