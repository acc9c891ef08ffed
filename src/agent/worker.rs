//! A single agent loop: pull, compute, report.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::client::DispatchClient;
use crate::agent::{AgentEvent, AgentId};
use crate::config::WorkerConfig;
use crate::core::{Operand, Task, TaskResult};
use crate::Result;

/// Counters returned when an agent stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub completed: usize,
    pub failed: usize,
}

impl std::ops::Add for AgentStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            completed: self.completed + rhs.completed,
            failed: self.failed + rhs.failed,
        }
    }
}

pub struct Agent {
    id: AgentId,
    client: DispatchClient,
    config: WorkerConfig,
    event_tx: Option<mpsc::Sender<AgentEvent>>,
}

impl Agent {
    pub fn new(client: DispatchClient, config: WorkerConfig) -> Self {
        Self {
            id: AgentId::new(),
            client,
            config,
            event_tx: None,
        }
    }

    pub fn with_events(mut self, event_tx: mpsc::Sender<AgentEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Poll until `cancel` fires.
    ///
    /// Transport errors are logged and retried after the poll interval. A
    /// task interrupted by cancellation is not reported; its lease expires
    /// and the orchestrator hands it out again.
    pub async fn run(self, cancel: CancellationToken) -> AgentStats {
        info!(agent = %self.id.short(), "agent started");
        let mut stats = AgentStats::default();

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                fetched = self.client.fetch_task() => fetched,
            };

            let task = match fetched {
                Ok(Some(task)) => task,
                Ok(None) => {
                    if !self.idle(&cancel, self.config.poll_interval()).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(agent = %self.id.short(), "fetch failed: {}", e);
                    if !self.idle(&cancel, self.config.poll_interval()).await {
                        break;
                    }
                    continue;
                }
            };

            self.emit(AgentEvent::Started {
                agent_id: self.id,
                task_id: task.id,
            })
            .await;

            let report = tokio::select! {
                _ = cancel.cancelled() => break,
                report = self.execute(&task) => report,
            };
            let report = match report {
                Ok(report) => report,
                Err(e) => {
                    warn!(agent = %self.id.short(), task_id = %task.id, "could not resolve operands: {}", e);
                    continue;
                }
            };

            if let Err(e) = self.client.post_result(&report).await {
                warn!(agent = %self.id.short(), task_id = %task.id, "post failed: {}", e);
                continue;
            }

            match &report.error {
                None => {
                    stats.completed += 1;
                    self.emit(AgentEvent::Completed {
                        agent_id: self.id,
                        task_id: task.id,
                        value: report.value,
                    })
                    .await;
                }
                Some(error) => {
                    stats.failed += 1;
                    self.emit(AgentEvent::Failed {
                        agent_id: self.id,
                        task_id: task.id,
                        error: error.clone(),
                    })
                    .await;
                }
            }
        }

        self.emit(AgentEvent::Stopped { agent_id: self.id }).await;
        info!(
            agent = %self.id.short(),
            completed = stats.completed,
            failed = stats.failed,
            "agent stopped"
        );
        stats
    }

    /// Wait `duration` unless cancelled first. Returns false on cancel.
    async fn idle(&self, cancel: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    async fn resolve(&self, operand: Operand) -> Result<Option<f64>> {
        match operand {
            Operand::Literal(value) => Ok(Some(value)),
            Operand::Task(dep) => self.client.task_result(dep).await,
        }
    }

    /// Resolve operands, wait the operation's latency and compute.
    ///
    /// Arithmetic failures and operands without a value become a report
    /// with `error` set rather than an `Err`.
    pub async fn execute(&self, task: &Task) -> Result<TaskResult> {
        let lhs = self.resolve(task.arg1).await?;
        let rhs = self.resolve(task.arg2).await?;
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Ok(TaskResult::failure(task.id, "operand result unavailable"));
        };

        tokio::time::sleep(self.config.operation_delay(task.operation)).await;

        let report = match task.operation.apply(lhs, rhs) {
            Ok(value) => TaskResult::success(task.id, value),
            Err(e) => TaskResult::failure(task.id, &e.to_string()),
        };
        debug!(
            agent = %self.id.short(),
            task_id = %task.id,
            value = report.value,
            error = ?report.error,
            "computed {} {} {}",
            lhs,
            task.operation,
            rhs
        );
        Ok(report)
    }
}
