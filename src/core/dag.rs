//! Task DAG (Directed Acyclic Graph) for one compiled expression.
//!
//! The store decides readiness dynamically from operand references, so the
//! graph is not needed for dispatch. It is built once per compiled task list
//! to prove the list is well formed: every referenced task exists and the
//! references contain no cycle. It also offers ordering and readiness views
//! used by diagnostics and tests.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Dependency graph of a task list. An edge `a -> b` means `b` consumes
/// the result of `a`.
pub struct TaskGraph {
    graph: DiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Build and validate the graph for a task list.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if:
    /// - Two tasks share an id
    /// - An operand references a task that is not in the list
    /// - The references form a cycle
    pub fn build(tasks: &[Task]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for task in tasks {
            if index.contains_key(&task.id) {
                return Err(Error::Validation(format!("Duplicate task {}", task.id)));
            }
            index.insert(task.id, graph.add_node(task.id));
        }

        for task in tasks {
            let to = index[&task.id];
            for dep in task.dependencies() {
                let from = index.get(&dep).ok_or_else(|| {
                    Error::Validation(format!(
                        "Task {} references unknown task {}",
                        task.id, dep
                    ))
                })?;
                graph.add_edge(*from, to, ());
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(Error::Validation(
                "Task references form a cycle".to_string(),
            ));
        }

        Ok(Self { graph, index })
    }

    /// Get the number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependency edges in the graph.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = match self.index.get(id) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, direction)
                .filter_map(|n| self.graph.node_weight(n).copied())
                .collect(),
            None => Vec::new(),
        };
        ids.sort();
        ids.dedup();
        ids
    }

    /// Tasks whose results `id` consumes.
    pub fn dependencies(&self, id: &TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Tasks that consume the result of `id`.
    pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// The task producing the expression's final value: the only task no
    /// other task depends on. `None` for an empty graph.
    pub fn root(&self) -> Option<TaskId> {
        self.graph
            .node_indices()
            .find(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .and_then(|n| self.graph.node_weight(n).copied())
    }

    /// Get all tasks ready to execute given a set of completed tasks.
    ///
    /// A task is ready if it is not completed and every task it depends on
    /// is. Results are sorted by id.
    pub fn ready_tasks(&self, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        let mut ready: Vec<TaskId> = self
            .graph
            .node_indices()
            .filter_map(|node| {
                let id = self.graph.node_weight(node)?;
                if completed.contains(id) {
                    return None;
                }
                let deps_satisfied = self
                    .graph
                    .neighbors_directed(node, Direction::Incoming)
                    .all(|dep| {
                        self.graph
                            .node_weight(dep)
                            .map(|dep_id| completed.contains(dep_id))
                            .unwrap_or(false)
                    });
                deps_satisfied.then_some(*id)
            })
            .collect();
        ready.sort();
        ready
    }

    /// Check if every task in the graph is in the completed set.
    pub fn all_complete(&self, completed: &HashSet<TaskId>) -> bool {
        self.index.keys().all(|id| completed.contains(id))
    }

    /// Get tasks in an order where each task follows its dependencies.
    ///
    /// # Errors
    /// Returns an error if the graph contains a cycle (never the case for a
    /// graph produced by [`TaskGraph::build`]).
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let at = self
                .graph
                .node_weight(cycle.node_id())
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Error::Validation(format!("Cycle detected at task: {}", at))
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|node| self.graph.node_weight(node).copied())
            .collect())
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
