#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! In-memory task graph built from decomposer output. Ids here are local to
//! the decomposition; the scheduler maps them to datastore ids on insert.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{ArchitectError, Result};
use crate::types::{RiskLevel, TaskStatus};

/// One task as produced by the decomposer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_risk")]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub blocked_by: Vec<i64>,
    #[serde(skip, default = "default_status")]
    pub status: TaskStatus,
    #[serde(skip)]
    pub assigned_to: Option<String>,
}

const fn default_risk() -> RiskLevel {
    RiskLevel::Medium
}

const fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

/// A `blocks` dependency: `from` must complete before `to` is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone)]
pub struct TaskGraph {
    pub tasks: Vec<TaskSpec>,
    pub edges: Vec<Edge>,
}

impl TaskGraph {
    /// Derives edges from each task's `blocked_by` list and rejects cyclic
    /// graphs. All tasks enter with status `pending`.
    pub fn build(mut tasks: Vec<TaskSpec>) -> Result<Self> {
        let known: HashSet<i64> = tasks.iter().map(|t| t.id).collect();
        if known.len() != tasks.len() {
            return Err(ArchitectError::InvalidDag(
                "duplicate task ids in decomposition".to_string(),
            ));
        }

        let mut edges = Vec::new();
        for task in &tasks {
            for &dep in &task.blocked_by {
                if !known.contains(&dep) {
                    return Err(ArchitectError::InvalidDag(format!(
                        "task {} blocked by unknown task {dep}",
                        task.id
                    )));
                }
                edges.push(Edge {
                    from: dep,
                    to: task.id,
                });
            }
        }

        for task in &mut tasks {
            task.status = TaskStatus::Pending;
            task.assigned_to = None;
        }

        let graph = Self { tasks, edges };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Kahn's algorithm; any leftover node means a cycle.
    fn check_acyclic(&self) -> Result<()> {
        let mut indegree: HashMap<i64, usize> =
            self.tasks.iter().map(|t| (t.id, 0)).collect();
        let mut successors: HashMap<i64, Vec<i64>> = HashMap::new();
        for edge in &self.edges {
            *indegree.entry(edge.to).or_insert(0) += 1;
            successors.entry(edge.from).or_default().push(edge.to);
        }

        let mut queue: VecDeque<i64> = indegree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut visited = 0usize;
        while let Some(id) = queue.pop_front() {
            visited += 1;
            for succ in successors.get(&id).into_iter().flatten() {
                if let Some(deg) = indegree.get_mut(succ) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(*succ);
                    }
                }
            }
        }

        if visited == self.tasks.len() {
            Ok(())
        } else {
            Err(ArchitectError::InvalidDag(
                "dependency edges form a cycle".to_string(),
            ))
        }
    }

    /// Tasks that are pending, unassigned and have every blocker completed.
    /// Ascending by id for a deterministic tiebreak.
    #[must_use]
    pub fn ready_tasks(&self) -> Vec<&TaskSpec> {
        let completed: HashSet<i64> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id)
            .collect();

        let mut ready: Vec<&TaskSpec> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && t.assigned_to.is_none())
            .filter(|t| {
                self.edges
                    .iter()
                    .filter(|e| e.to == t.id)
                    .all(|e| completed.contains(&e.from))
            })
            .collect();
        ready.sort_by_key(|t| t.id);
        ready
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn spec(id: i64, blocked_by: Vec<i64>) -> TaskSpec {
        TaskSpec {
            id,
            title: format!("task {id}"),
            description: String::new(),
            risk_level: RiskLevel::Low,
            blocked_by,
            status: TaskStatus::Pending,
            assigned_to: None,
        }
    }

    #[test]
    fn single_task_is_immediately_ready() {
        let graph = TaskGraph::build(vec![spec(1, vec![])]).unwrap();
        let ready: Vec<i64> = graph.ready_tasks().iter().map(|t| t.id).collect();
        assert_eq!(ready, vec![1]);
    }

    #[test]
    fn chain_releases_in_order() {
        let mut graph = TaskGraph::build(vec![spec(1, vec![]), spec(2, vec![1])]).unwrap();
        let ready: Vec<i64> = graph.ready_tasks().iter().map(|t| t.id).collect();
        assert_eq!(ready, vec![1]);

        graph.tasks[0].status = TaskStatus::Completed;
        let ready: Vec<i64> = graph.ready_tasks().iter().map(|t| t.id).collect();
        assert_eq!(ready, vec![2]);
    }

    #[test]
    fn diamond_releases_middle_pair_then_join() {
        // A -> B, A -> C, B -> D, C -> D
        let mut graph = TaskGraph::build(vec![
            spec(1, vec![]),
            spec(2, vec![1]),
            spec(3, vec![1]),
            spec(4, vec![2, 3]),
        ])
        .unwrap();

        assert_eq!(
            graph.ready_tasks().iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![1]
        );

        graph.tasks[0].status = TaskStatus::Completed;
        assert_eq!(
            graph.ready_tasks().iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![2, 3]
        );

        graph.tasks[1].status = TaskStatus::Completed;
        assert!(graph.ready_tasks().iter().all(|t| t.id != 4));

        graph.tasks[2].status = TaskStatus::Completed;
        assert_eq!(
            graph.ready_tasks().iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![4]
        );
    }

    #[test]
    fn assigned_tasks_are_not_ready() {
        let mut graph = TaskGraph::build(vec![spec(1, vec![])]).unwrap();
        graph.tasks[0].assigned_to = Some("agent".to_string());
        assert!(graph.ready_tasks().is_empty());
    }

    #[test]
    fn cycle_is_rejected() {
        let err = TaskGraph::build(vec![spec(1, vec![2]), spec(2, vec![1])]).unwrap_err();
        assert!(matches!(err, ArchitectError::InvalidDag(_)));
    }

    #[test]
    fn self_loop_is_rejected() {
        let err = TaskGraph::build(vec![spec(1, vec![1])]).unwrap_err();
        assert!(matches!(err, ArchitectError::InvalidDag(_)));
    }

    #[test]
    fn unknown_blocker_is_rejected() {
        let err = TaskGraph::build(vec![spec(1, vec![99])]).unwrap_err();
        assert!(matches!(err, ArchitectError::InvalidDag(_)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = TaskGraph::build(vec![spec(1, vec![]), spec(1, vec![])]).unwrap_err();
        assert!(matches!(err, ArchitectError::InvalidDag(_)));
    }
}
