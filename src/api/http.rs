use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::types::{
    CancelResponse, HealthResponse, JobStatusResponse, SubmitRequest, SubmitResponse,
    TaskDetailResponse,
};
use crate::api::GradingService;
use crate::catalog::Task;
use crate::config::ClientConfig;
use crate::error::{Result, TrainerError};
use crate::jobs::{Job, JobId};

/// HTTP/JSON client for the grading service.
#[derive(Debug, Clone)]
pub struct HttpGradingService {
    client: Client,
    base_url: String,
}

impl HttpGradingService {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = ClientBuilder::new();
        if let Some(ms) = config.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
        })
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    async fn handle_response_status(response: Response) -> Result<Response> {
        if !response.status().is_success() {
            return Err(TrainerError::from_response(response).await);
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self.build_url(endpoint);
        tracing::debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        let response = Self::handle_response_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GradingService for HttpGradingService {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.get_json("/tasks").await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        match self
            .get_json::<TaskDetailResponse>(&format!("/tasks/{}", task_id))
            .await
        {
            Ok(detail) => {
                let mut task = detail.meta;
                task.statement = Some(detail.statement);
                Ok(task)
            }
            Err(TrainerError::Http { status: 404, .. }) => {
                Err(TrainerError::TaskNotFound(task_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<JobId> {
        let url = self.build_url("/submit");
        tracing::debug!(%url, task_id = %request.task_id, mode = %request.mode, "POST");
        let response = self.client.post(&url).json(request).send().await?;
        let response = Self::handle_response_status(response).await?;
        let body: SubmitResponse = response.json().await?;
        Ok(body.job_id)
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Job> {
        match self
            .get_json::<JobStatusResponse>(&format!("/jobs/{}", job_id))
            .await
        {
            Ok(snapshot) => Job::try_from(snapshot),
            Err(TrainerError::Http { status: 404, .. }) => {
                Err(TrainerError::JobNotFound(job_id.clone()))
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<bool> {
        let url = self.build_url(&format!("/jobs/{}", job_id));
        tracing::debug!(%url, "DELETE");
        let response = self.client.delete(&url).send().await?;

        // The service answers 400 for jobs that are already running or done.
        if response.status() == StatusCode::BAD_REQUEST {
            let err = TrainerError::from_response(response).await;
            tracing::debug!(job_id = %job_id, error = %err, "Cancellation refused");
            return Ok(false);
        }

        let response = Self::handle_response_status(response).await?;
        let body: CancelResponse = response.json().await?;
        if let Some(message) = &body.message {
            tracing::debug!(job_id = %job_id, detail = %message, "Cancellation acknowledged");
        }
        Ok(body.cancelled)
    }

    async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/health").await
    }
}
