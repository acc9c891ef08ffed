//! Dispatcher: the submit / pull / post-result surface over the task store.
//!
//! Submission runs the whole compiler pipeline before returning, so by the
//! time a caller sees an id the expression is either already resolved,
//! rejected, or has its tasks queued.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::compiler::compile_expression;
use crate::core::{Expression, ExpressionId, Task, TaskGraph, TaskResult};
use crate::error::{Error, Result};
use crate::store::{TaskStore, UpdateOutcome};

/// Cloneable handle shared by the HTTP layer, in-process agents and the
/// lease reaper.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<TaskStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    /// Create a dispatcher over a fresh store with the given queue bound.
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self::new(Arc::new(TaskStore::new(queue_capacity)))
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Submit an expression.
    ///
    /// The expression is stored before anything else happens, so even a
    /// rejected submission stays queryable under its id with status Error.
    /// A single literal resolves immediately without producing tasks.
    ///
    /// # Errors
    /// - [`Error::Compile`] when the text fails to compile; carries the id
    /// - [`Error::QueueFull`] when the tasks do not fit in the pending queue
    /// - [`Error::Validation`] when the compiled task graph is inconsistent
    pub async fn submit(&self, source: &str) -> Result<ExpressionId> {
        let id = self.store.next_expression_id();
        let mut expression = Expression::new(id, source);

        let compiled = match compile_expression(id, source) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(expression_id = %id, error = %e, "expression rejected");
                expression.fail(&e.to_string())?;
                self.store.add_expression(expression).await;
                return Err(Error::Compile { id, source: e });
            }
        };

        if let Err(e) = TaskGraph::build(&compiled.tasks) {
            expression.fail(&e.to_string())?;
            self.store.add_expression(expression).await;
            return Err(e);
        }

        if compiled.tasks.is_empty() {
            match compiled.tree.evaluate() {
                Ok(value) => expression.complete(value)?,
                Err(e) => expression.fail(&e.to_string())?,
            }
            expression.node = Some(compiled.tree);
            info!(expression_id = %id, "literal expression resolved on submit");
            self.store.add_expression(expression).await;
            return Ok(id);
        }

        let task_count = compiled.tasks.len();
        expression.start_computing(compiled.tree)?;
        self.store.add_expression(expression.clone()).await;

        if let Err(e) = self.store.add_tasks(compiled.tasks).await {
            warn!(expression_id = %id, error = %e, "could not queue tasks");
            expression.fail(&e.to_string())?;
            self.store.add_expression(expression).await;
            return Err(e);
        }

        info!(expression_id = %id, tasks = task_count, "expression queued");
        Ok(id)
    }

    /// Hand out one ready task, if any.
    pub async fn pull(&self) -> Option<Task> {
        let task = self.store.get_pending_task().await;
        if let Some(task) = &task {
            debug!(task_id = %task.id, "task dispatched");
        }
        task
    }

    /// Record an agent's report.
    pub async fn post_result(&self, report: &TaskResult) -> Result<UpdateOutcome> {
        let outcome = self.store.update_task(report).await?;
        debug!(task_id = %report.task_id, ?outcome, "result recorded");
        Ok(outcome)
    }

    /// # Errors
    /// Returns [`Error::ExpressionNotFound`] for an unknown id.
    pub async fn expression(&self, id: ExpressionId) -> Result<Expression> {
        self.store
            .get_expression(id)
            .await
            .ok_or(Error::ExpressionNotFound(id))
    }

    /// All expressions, sorted by id.
    pub async fn expressions(&self) -> Vec<Expression> {
        let mut all = self.store.list_expressions().await;
        all.sort_by_key(|e| e.id);
        all
    }

    /// Tasks not yet completed, sorted by id.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        self.store.incomplete_tasks().await
    }

    pub async fn task_result(&self, raw_id: &str) -> Result<f64> {
        self.store.task_result(raw_id).await
    }

    /// Redeliver tasks whose lease ran out. See [`TaskStore::requeue_expired`].
    pub async fn requeue_expired(&self, lease: Duration) -> usize {
        self.store.requeue_expired(lease).await
    }
}
