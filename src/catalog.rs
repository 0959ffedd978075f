//! Read-only cache of the service's task catalog.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::GradingService;
use crate::error::{Result, TrainerError};

fn default_kind() -> String {
    "io".to_string()
}

/// A programming exercise as published by the grading service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// Grouping label used to organise tasks.
    pub module: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub time_limit_ms: u64,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub starter_code: Option<String>,
    /// Problem statement. Listings normally omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// Caches the task list for the session and fetches statements on demand.
pub struct TaskCatalog {
    service: Arc<dyn GradingService>,
    tasks: Option<Vec<Task>>,
    statements: HashMap<String, String>,
}

impl TaskCatalog {
    pub fn new(service: Arc<dyn GradingService>) -> Self {
        Self {
            service,
            tasks: None,
            statements: HashMap::new(),
        }
    }

    /// Task summaries, fetched on first use and reused afterwards.
    pub async fn list_tasks(&mut self) -> Result<&[Task]> {
        if self.tasks.is_none() {
            return self.refresh_tasks().await;
        }
        Ok(self.tasks.as_deref().unwrap_or_default())
    }

    /// Re-fetch the task list. On failure the previous list is kept.
    pub async fn refresh_tasks(&mut self) -> Result<&[Task]> {
        let tasks = self.service.list_tasks().await?;
        tracing::debug!(count = tasks.len(), "Fetched task list");
        Ok(self.tasks.insert(tasks).as_slice())
    }

    /// Look a task up by id, fetching the list first if needed. Tasks missing
    /// from the listing are requested individually.
    pub async fn task(&mut self, task_id: &str) -> Result<Task> {
        if let Some(task) = self.list_tasks().await?.iter().find(|t| t.id == task_id) {
            return Ok(task.clone());
        }
        let task = self.service.get_task(task_id).await?;
        if let Some(statement) = &task.statement {
            self.statements.insert(task.id.clone(), statement.clone());
        }
        Ok(task)
    }

    /// Statement for `task`: the embedded one if present, otherwise fetched
    /// once and cached.
    pub async fn statement(&mut self, task: &Task) -> Result<String> {
        if let Some(statement) = &task.statement {
            return Ok(statement.clone());
        }
        if let Some(statement) = self.statements.get(&task.id) {
            return Ok(statement.clone());
        }

        let detail = self.service.get_task(&task.id).await?;
        let statement = detail
            .statement
            .ok_or_else(|| TrainerError::TaskNotFound(task.id.clone()))?;
        self.statements.insert(task.id.clone(), statement.clone());
        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_deserializes_listing_entry() {
        let task: Task = serde_json::from_str(
            r#"{"id":"hello","title":"Hello","module":"basics","time_limit_ms":2000,"memory_mb":256}"#,
        )
        .unwrap();
        assert_eq!(task.kind, "io");
        assert_eq!(task.memory_mb, Some(256));
        assert!(task.statement.is_none());
        assert!(task.starter_code.is_none());
    }

    #[test]
    fn task_reads_type_field() {
        let task: Task = serde_json::from_str(
            r#"{"id":"f","title":"F","module":"m","type":"func","time_limit_ms":1,"starter_code":"pub fn main() void {}"}"#,
        )
        .unwrap();
        assert_eq!(task.kind, "func");
        assert_eq!(task.starter_code.as_deref(), Some("pub fn main() void {}"));
    }
}
