//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Running an orchestrator on an ephemeral port
//! - Computing tasks in-process the way an agent would
//! - Waiting for expressions to finish

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use calcflow::actors::{ActorHandle, LeaseReaperActor};
use calcflow::api;
use calcflow::config::WorkerConfig;
use calcflow::core::{Expression, ExpressionId, Operand, Task, TaskResult};
use calcflow::orchestration::Dispatcher;
use calcflow::store::UpdateOutcome;

/// Tolerance for comparing computed floats.
pub const EPSILON: f64 = 1e-9;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// An orchestrator bound to 127.0.0.1 on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dispatcher: Dispatcher,
    pub shutdown: CancellationToken,
    server: JoinHandle<calcflow::Result<()>>,
    reaper: Option<ActorHandle>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(Dispatcher::with_capacity(100), None).await
    }

    /// Start with a lease reaper that requeues tasks held longer than `lease`.
    pub async fn start_with_lease(lease: Duration) -> Self {
        Self::start_with(Dispatcher::with_capacity(100), Some(lease)).await
    }

    pub async fn start_with(dispatcher: Dispatcher, lease: Option<Duration>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let shutdown = CancellationToken::new();

        let reaper = lease.map(|lease| {
            LeaseReaperActor::new(dispatcher.clone(), lease)
                .with_interval(Duration::from_millis(10))
                .spawn(&shutdown)
        });
        let server = tokio::spawn(api::serve(listener, dispatcher.clone(), shutdown.clone()));

        Self {
            addr,
            dispatcher,
            shutdown,
            server,
            reaper,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Worker settings pointed at this server with no simulated latency.
    pub fn worker_config(&self, computing_power: usize) -> WorkerConfig {
        WorkerConfig {
            orchestrator_url: self.url(),
            computing_power,
            poll_interval_ms: 5,
            ..WorkerConfig::default()
        }
        .with_uniform_delay(0)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Some(reaper) = self.reaper {
            reaper.stop().await;
        }
        self.server
            .await
            .expect("Server task panicked")
            .expect("Server returned an error");
    }
}

/// Resolve operands against the dispatcher and apply the operation.
pub async fn compute(dispatcher: &Dispatcher, task: &Task) -> TaskResult {
    let mut values = [0.0; 2];
    for (slot, operand) in values.iter_mut().zip([task.arg1, task.arg2]) {
        *slot = match operand {
            Operand::Literal(v) => v,
            Operand::Task(dep) => dispatcher
                .task_result(&dep.to_string())
                .await
                .expect("Dependency should be completed before dispatch"),
        };
    }
    match task.operation.apply(values[0], values[1]) {
        Ok(value) => TaskResult::success(task.id, value),
        Err(e) => TaskResult::failure(task.id, &e.to_string()),
    }
}

/// Pull everything ready, post results in the chosen order, repeat until
/// the queue is drained. Returns every update outcome.
pub async fn drive(dispatcher: &Dispatcher, reverse: bool) -> Vec<UpdateOutcome> {
    let mut outcomes = Vec::new();
    loop {
        let mut batch = Vec::new();
        while let Some(task) = dispatcher.pull().await {
            batch.push(task);
        }
        if batch.is_empty() {
            return outcomes;
        }
        if reverse {
            batch.reverse();
        }
        for task in &batch {
            let report = compute(dispatcher, task).await;
            outcomes.push(
                dispatcher
                    .post_result(&report)
                    .await
                    .expect("Posting a dispatched task should succeed"),
            );
        }
    }
}

/// Poll until the expression leaves Pending/Computing or `timeout` passes.
pub async fn wait_for_finished(
    dispatcher: &Dispatcher,
    id: ExpressionId,
    timeout: Duration,
) -> Expression {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let expression = dispatcher
            .expression(id)
            .await
            .expect("Expression should exist");
        if expression.is_finished() || tokio::time::Instant::now() >= deadline {
            return expression;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
