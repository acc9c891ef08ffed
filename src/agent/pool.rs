//! Agent pool: runs several agents against one orchestrator.

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::client::DispatchClient;
use crate::agent::worker::{Agent, AgentStats};
use crate::agent::AgentEvent;
use crate::config::WorkerConfig;

/// Runs `computing_power` agents until cancelled.
///
/// # Example
///
/// ```ignore
/// use tokio_util::sync::CancellationToken;
/// use calcflow::agent::AgentPool;
/// use calcflow::config::WorkerConfig;
///
/// let cancel = CancellationToken::new();
/// let stats = AgentPool::new(WorkerConfig::default()).run(cancel).await;
/// ```
pub struct AgentPool {
    config: WorkerConfig,
    event_tx: Option<mpsc::Sender<AgentEvent>>,
}

impl AgentPool {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            event_tx: None,
        }
    }

    /// Forward every agent's events to `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<AgentEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Number of agents the pool will start.
    pub fn size(&self) -> usize {
        self.config.computing_power.max(1)
    }

    /// Run every agent until `cancel` fires and return the summed stats.
    pub async fn run(self, cancel: CancellationToken) -> AgentStats {
        let client = DispatchClient::new(&self.config.orchestrator_url);
        info!(
            "Starting {} agents against {}",
            self.size(),
            client.base_url()
        );

        let handles: Vec<_> = (0..self.size())
            .map(|_| {
                let mut agent = Agent::new(client.clone(), self.config.clone());
                if let Some(tx) = &self.event_tx {
                    agent = agent.with_events(tx.clone());
                }
                tokio::spawn(agent.run(cancel.clone()))
            })
            .collect();

        let mut total = AgentStats::default();
        for joined in join_all(handles).await {
            match joined {
                Ok(stats) => total = total + stats,
                Err(e) => warn!("Agent task panicked: {}", e),
            }
        }
        info!(
            "Agent pool stopped: {} completed, {} failed",
            total.completed, total.failed
        );
        total
    }
}
