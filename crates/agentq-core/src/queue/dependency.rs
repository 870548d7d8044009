//! Task dependency graph.
//!
//! Design:
//! - Forward edges: task -> tasks it depends on (waits for)
//! - Reverse edges: task -> tasks that depend on it
//! - Invariant: edges and reverse_edges are kept in sync
//!
//! Submission is the only place edges are created, and a dependency may only
//! name a task that already exists, so a well-formed document cannot contain
//! a cycle. The cycle check still runs on every submission because documents
//! live on disk and can be edited out-of-band.

use std::collections::{HashMap, HashSet};

use crate::domain::{Task, TaskId, TaskStatus};
use crate::error::QueueError;

/// Dependency graph over task ids.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Forward edges: task -> tasks it depends on.
    edges: HashMap<TaskId, HashSet<TaskId>>,

    /// Reverse edges: task -> tasks waiting for it.
    reverse_edges: HashMap<TaskId, HashSet<TaskId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from every task's `dependencies` field.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut graph = Self::new();
        for task in tasks {
            for dep in &task.dependencies {
                graph.add_dependency(task.id.clone(), dep.clone());
            }
        }
        graph
    }

    /// Record that `task` depends on `depends_on`.
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        self.reverse_edges
            .entry(depends_on.clone())
            .or_default()
            .insert(task.clone());
        self.edges.entry(task).or_default().insert(depends_on);
    }

    pub fn has_dependencies(&self, task: &TaskId) -> bool {
        self.edges.get(task).is_some_and(|deps| !deps.is_empty())
    }

    pub fn dependencies_of(&self, task: &TaskId) -> Vec<TaskId> {
        self.edges
            .get(task)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Tasks waiting on `completed`. Callers must still check the waiters'
    /// other dependencies.
    pub fn waiting_on(&self, completed: &TaskId) -> Vec<TaskId> {
        self.reverse_edges
            .get(completed)
            .map(|waiting| waiting.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Find a cycle, if any. Three-color depth-first search; returns the
    /// nodes on the first cycle found, in dependency order.
    pub fn find_cycle(&self) -> Option<Vec<TaskId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: HashMap<&TaskId, Color> = HashMap::new();
        for node in self.edges.keys() {
            if colors.get(node).copied().unwrap_or(Color::White) != Color::White {
                continue;
            }

            // Iterative DFS; the explicit stack carries (node, visited-marker)
            // frames so nodes can be blackened on the way out.
            let mut stack: Vec<(&TaskId, bool)> = vec![(node, false)];
            let mut path: Vec<&TaskId> = Vec::new();

            while let Some((current, expanded)) = stack.pop() {
                if expanded {
                    colors.insert(current, Color::Black);
                    path.pop();
                    continue;
                }
                if colors.get(current).copied().unwrap_or(Color::White) == Color::Black {
                    continue;
                }
                colors.insert(current, Color::Gray);
                path.push(current);
                stack.push((current, true));

                if let Some(deps) = self.edges.get(current) {
                    for dep in deps {
                        match colors.get(dep).copied().unwrap_or(Color::White) {
                            Color::Gray => {
                                // Cycle closed at `dep`: slice the current path.
                                let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                                return Some(path[start..].iter().map(|n| (*n).clone()).collect());
                            }
                            Color::White => stack.push((dep, false)),
                            Color::Black => {}
                        }
                    }
                }
            }
        }
        None
    }
}

/// Submission-time check: every dependency must name an existing task
/// (dangling references rejected) and the combined graph must stay acyclic.
pub fn validate_submission(
    tasks: &[Task],
    new_id: &TaskId,
    dependencies: &[TaskId],
) -> Result<(), QueueError> {
    if dependencies.is_empty() {
        return Ok(());
    }
    for dep in dependencies {
        if !tasks.iter().any(|t| &t.id == dep) {
            return Err(QueueError::DanglingDependency(dep.clone()));
        }
    }

    let mut graph = DependencyGraph::from_tasks(tasks);
    for dep in dependencies {
        graph.add_dependency(new_id.clone(), dep.clone());
    }
    if let Some(cycle) = graph.find_cycle() {
        return Err(QueueError::DependencyCycle(cycle));
    }
    Ok(())
}

/// Dependencies of `task` that have not reached COMPLETED. Assignment is
/// gated on this being empty.
pub fn unmet_dependencies(tasks: &[Task], task: &Task) -> Vec<TaskId> {
    task.dependencies
        .iter()
        .filter(|dep| {
            tasks
                .iter()
                .find(|t| &&t.id == dep)
                .is_none_or(|t| t.status != TaskStatus::Completed)
        })
        .cloned()
        .collect()
}
