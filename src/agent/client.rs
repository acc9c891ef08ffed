//! HTTP client for the agent side of the dispatch protocol.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::core::{Task, TaskId, TaskResult};
use crate::Result;

#[derive(Deserialize)]
struct TaskEnvelope {
    task: Task,
}

#[derive(Deserialize)]
struct ResultEnvelope {
    result: f64,
}

/// Talks to the orchestrator's `/internal` routes.
#[derive(Debug, Clone)]
pub struct DispatchClient {
    http: reqwest::Client,
    base_url: String,
}

impl DispatchClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask for a ready task. `None` when the orchestrator has nothing.
    pub async fn fetch_task(&self) -> Result<Option<Task>> {
        let resp = self
            .http
            .get(format!("{}/internal/task", self.base_url))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: TaskEnvelope = resp.error_for_status()?.json().await?;
        Ok(Some(envelope.task))
    }

    /// Result of a completed task. `None` when it is unknown or has no
    /// value yet.
    pub async fn task_result(&self, id: TaskId) -> Result<Option<f64>> {
        let resp = self
            .http
            .get(format!("{}/internal/task/result/{}", self.base_url, id))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: ResultEnvelope = resp.error_for_status()?.json().await?;
        Ok(Some(envelope.result))
    }

    pub async fn post_result(&self, report: &TaskResult) -> Result<()> {
        self.http
            .post(format!("{}/internal/task", self.base_url))
            .json(report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
