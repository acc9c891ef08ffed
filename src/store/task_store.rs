//! In-memory store for expressions and tasks.
//!
//! All state sits behind one `tokio::sync::Mutex`. Every method takes the
//! lock once, does a bounded amount of work and releases it; nothing waits
//! on another task while holding it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::{Expression, ExpressionId, Task, TaskId, TaskResult};
use crate::error::{Error, Result};
use crate::store::queue::{is_ready, PendingQueue, ScanDecision};

/// Default bound on the pending queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// What a result post did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The task was completed; its expression still has open tasks.
    Recorded,
    /// The last open task completed and the expression resolved.
    ExpressionDone { id: ExpressionId, result: f64 },
    /// The expression moved to Error, either because the agent reported an
    /// error or because evaluating the tree failed.
    ExpressionFailed { id: ExpressionId, reason: String },
    /// The task had already been completed; nothing changed.
    AlreadyCompleted,
}

#[derive(Debug)]
struct StoreState {
    expressions: HashMap<ExpressionId, Expression>,
    tasks: HashMap<TaskId, Task>,
    /// Task ids per owning expression, in insertion order.
    expression_tasks: HashMap<ExpressionId, Vec<TaskId>>,
    pending: PendingQueue,
    /// Tasks handed out and not yet reported, with their dispatch time.
    in_flight: HashMap<TaskId, Instant>,
}

impl StoreState {
    fn enqueue(&mut self, task: Task) -> Result<()> {
        self.pending.push(task.id)?;
        self.expression_tasks
            .entry(task.id.expression())
            .or_default()
            .push(task.id);
        self.tasks.insert(task.id, task);
        Ok(())
    }

    fn all_tasks_completed(&self, id: ExpressionId) -> bool {
        self.expression_tasks
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .all(|t| self.tasks.get(t).map(|t| t.completed).unwrap_or(false))
            })
            .unwrap_or(true)
    }
}

/// Single source of truth for expressions and tasks.
///
/// Share it behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct TaskStore {
    inner: Mutex<StoreState>,
    next_expression_id: AtomicU64,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl TaskStore {
    /// Create an empty store whose pending queue holds at most
    /// `queue_capacity` tasks.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StoreState {
                expressions: HashMap::new(),
                tasks: HashMap::new(),
                expression_tasks: HashMap::new(),
                pending: PendingQueue::new(queue_capacity),
                in_flight: HashMap::new(),
            }),
            next_expression_id: AtomicU64::new(1),
        }
    }

    /// Allocate the next expression id. Ids start at 1 and never repeat.
    pub fn next_expression_id(&self) -> ExpressionId {
        ExpressionId(self.next_expression_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Insert or replace an expression by id.
    pub async fn add_expression(&self, expression: Expression) {
        let mut state = self.inner.lock().await;
        state.expressions.insert(expression.id, expression);
    }

    pub async fn get_expression(&self, id: ExpressionId) -> Option<Expression> {
        let state = self.inner.lock().await;
        state.expressions.get(&id).cloned()
    }

    /// Snapshot of every expression, in no particular order.
    pub async fn list_expressions(&self) -> Vec<Expression> {
        let state = self.inner.lock().await;
        state.expressions.values().cloned().collect()
    }

    /// Insert one task and enqueue it for dispatch.
    ///
    /// # Errors
    /// Returns [`Error::QueueFull`] when the pending queue is at capacity; the
    /// task is not stored in that case.
    pub async fn add_task(&self, task: Task) -> Result<()> {
        let mut state = self.inner.lock().await;
        state.enqueue(task)
    }

    /// Insert every task of one compiled expression under a single lock.
    ///
    /// Either all tasks are stored and enqueued, or none are.
    ///
    /// # Errors
    /// Returns [`Error::QueueFull`] when the queue lacks room for all of them.
    pub async fn add_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        let mut state = self.inner.lock().await;
        if tasks.len() > state.pending.remaining() {
            return Err(Error::QueueFull {
                capacity: state.pending.capacity(),
            });
        }
        for task in tasks {
            state.enqueue(task)?;
        }
        Ok(())
    }

    /// Pull one ready task off the pending queue.
    ///
    /// Scans at most the current queue length. Not-ready tasks go to the
    /// back; tasks that are already completed, unknown, or belong to a
    /// finished expression are dropped. A task whose expression is not
    /// registered yet is dispatched or requeued on readiness alone. The returned task is recorded as in
    /// flight for lease redelivery.
    pub async fn get_pending_task(&self) -> Option<Task> {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        let tasks = &state.tasks;
        let expressions = &state.expressions;

        let picked = state.pending.scan(|id| {
            let Some(task) = tasks.get(id) else {
                return ScanDecision::Drop;
            };
            if task.completed {
                return ScanDecision::Drop;
            }
            // A task may be queued before its expression is registered;
            // only a known, finished expression retires it.
            let finished = expressions
                .get(&id.expression())
                .map(|e| e.is_finished())
                .unwrap_or(false);
            if finished {
                debug!(task_id = %id, "dropping task of finished expression");
                return ScanDecision::Drop;
            }
            if is_ready(task, tasks) {
                ScanDecision::Dispatch
            } else {
                ScanDecision::Requeue
            }
        })?;

        state.in_flight.insert(picked, Instant::now());
        state.tasks.get(&picked).cloned()
    }

    /// Whether every task-valued operand of `task` has completed.
    pub async fn is_ready(&self, task: &Task) -> bool {
        let state = self.inner.lock().await;
        is_ready(task, &state.tasks)
    }

    /// Apply an agent's report.
    ///
    /// Completing the last open task of an expression evaluates the
    /// expression's own tree from scratch; task results only signal that
    /// the expression is finished and never feed the final value. An
    /// evaluation failure moves the expression to Error but the update
    /// itself still succeeds.
    ///
    /// Reports for an already completed task are ignored and return
    /// [`UpdateOutcome::AlreadyCompleted`].
    ///
    /// # Errors
    /// - [`Error::MissingTaskId`] when the report has no task id
    /// - [`Error::MalformedTaskId`] when the id is not `task-expr-<n>-<m>`
    /// - [`Error::TaskNotFound`] when no such task exists
    /// - [`Error::ExpressionNotFound`] when the owning expression is gone
    pub async fn update_task(&self, report: &TaskResult) -> Result<UpdateOutcome> {
        if report.task_id.trim().is_empty() {
            return Err(Error::MissingTaskId);
        }
        let id: TaskId = report.task_id.trim().parse()?;
        let expression_id = id.expression();

        let mut guard = self.inner.lock().await;
        let state = &mut *guard;

        let task = state
            .tasks
            .get_mut(&id)
            .ok_or_else(|| Error::TaskNotFound(report.task_id.clone()))?;
        if task.completed {
            debug!(task_id = %id, "ignoring repeated result");
            return Ok(UpdateOutcome::AlreadyCompleted);
        }
        if !state.expressions.contains_key(&expression_id) {
            return Err(Error::ExpressionNotFound(expression_id));
        }

        match &report.error {
            Some(reason) => task.fail(reason),
            None => task.complete(report.value),
        }
        state.in_flight.remove(&id);

        let all_completed = state.all_tasks_completed(expression_id);
        let Some(expression) = state.expressions.get_mut(&expression_id) else {
            return Err(Error::ExpressionNotFound(expression_id));
        };
        if expression.is_finished() {
            return Ok(UpdateOutcome::Recorded);
        }

        if let Some(reason) = &report.error {
            warn!(task_id = %id, expression_id = %expression_id, reason = %reason, "task failed");
            expression.fail(reason)?;
            return Ok(UpdateOutcome::ExpressionFailed {
                id: expression_id,
                reason: reason.clone(),
            });
        }

        if !all_completed {
            return Ok(UpdateOutcome::Recorded);
        }

        let evaluated = match expression.node.as_ref() {
            Some(node) => node.evaluate().map_err(|e| e.to_string()),
            None => Err("expression has no compiled tree".to_string()),
        };
        match evaluated {
            Ok(result) => {
                expression.complete(result)?;
                info!(expression_id = %expression_id, result, "expression done");
                Ok(UpdateOutcome::ExpressionDone {
                    id: expression_id,
                    result,
                })
            }
            Err(reason) => {
                expression.fail(&reason)?;
                warn!(expression_id = %expression_id, reason = %reason, "expression failed");
                Ok(UpdateOutcome::ExpressionFailed {
                    id: expression_id,
                    reason,
                })
            }
        }
    }

    pub async fn get_task(&self, id: TaskId) -> Option<Task> {
        let state = self.inner.lock().await;
        state.tasks.get(&id).cloned()
    }

    /// Result of a completed task, by raw id.
    ///
    /// # Errors
    /// - [`Error::MalformedTaskId`] / [`Error::TaskNotFound`] for bad ids
    /// - [`Error::TaskNotCompleted`] while the task is open, or when it
    ///   completed with an error and so has no value
    pub async fn task_result(&self, raw_id: &str) -> Result<f64> {
        let id: TaskId = raw_id.parse()?;
        let state = self.inner.lock().await;
        let task = state
            .tasks
            .get(&id)
            .ok_or_else(|| Error::TaskNotFound(raw_id.to_string()))?;
        match (task.completed, task.result) {
            (true, Some(value)) => Ok(value),
            _ => Err(Error::TaskNotCompleted(raw_id.to_string())),
        }
    }

    /// Every task still awaiting a result, sorted by id.
    ///
    /// Tasks of an expression that already finished are left out; they
    /// will never be dispatched again.
    pub async fn incomplete_tasks(&self) -> Vec<Task> {
        let state = self.inner.lock().await;
        let mut open: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| !t.completed)
            .filter(|t| {
                !state
                    .expressions
                    .get(&t.id.expression())
                    .map(|e| e.is_finished())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        open.sort_by_key(|t| t.id);
        open
    }

    /// Put tasks dispatched longer than `lease` ago and still open back on
    /// the pending queue. Returns how many were requeued.
    ///
    /// Stops early when the queue fills; the rest stay in flight and are
    /// retried on the next call.
    pub async fn requeue_expired(&self, lease: Duration) -> usize {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        let now = Instant::now();

        let mut expired: Vec<TaskId> = state
            .in_flight
            .iter()
            .filter(|(_, dispatched)| now.duration_since(**dispatched) >= lease)
            .map(|(id, _)| *id)
            .collect();
        expired.sort();

        let mut requeued = 0;
        for id in expired {
            let open = state.tasks.get(&id).map(|t| !t.completed).unwrap_or(false);
            if !open {
                state.in_flight.remove(&id);
                continue;
            }
            if state.pending.contains(&id) {
                state.in_flight.remove(&id);
                continue;
            }
            if state.pending.push(id).is_err() {
                warn!(task_id = %id, "pending queue full, lease redelivery deferred");
                break;
            }
            state.in_flight.remove(&id);
            requeued += 1;
        }
        if requeued > 0 {
            info!(count = requeued, "requeued tasks with expired leases");
        }
        requeued
    }

    /// Number of tasks waiting in the pending queue.
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Ids of tasks handed out and not yet reported.
    pub async fn in_flight(&self) -> HashSet<TaskId> {
        self.inner.lock().await.in_flight.keys().copied().collect()
    }
}
