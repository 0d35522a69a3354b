//! Scenario coverage for the in-memory task graph and the decomposer seam.

use std::path::Path;

use architect::dag::{TaskGraph, TaskSpec};
use architect::decompose::{DecomposeFuture, Decomposer};
use architect::{ArchitectError, RiskLevel, TaskStatus};

fn spec(id: i64, title: &str, blocked_by: Vec<i64>) -> TaskSpec {
    TaskSpec {
        id,
        title: title.to_string(),
        description: format!("{title} description"),
        risk_level: RiskLevel::Low,
        blocked_by,
        status: TaskStatus::Pending,
        assigned_to: None,
    }
}

fn complete(graph: &mut TaskGraph, id: i64) {
    for task in &mut graph.tasks {
        if task.id == id {
            task.status = TaskStatus::Completed;
        }
    }
}

fn ready_ids(graph: &TaskGraph) -> Vec<i64> {
    graph.ready_tasks().iter().map(|t| t.id).collect()
}

#[test]
fn single_task_happy_path_readiness() {
    let graph = TaskGraph::build(vec![spec(1, "only", vec![])]).unwrap();
    assert_eq!(ready_ids(&graph), vec![1]);
}

#[test]
fn linear_chain_releases_successor_on_completion() {
    let mut graph =
        TaskGraph::build(vec![spec(1, "first", vec![]), spec(2, "second", vec![1])]).unwrap();

    assert_eq!(ready_ids(&graph), vec![1]);
    complete(&mut graph, 1);
    assert_eq!(ready_ids(&graph), vec![2]);
    complete(&mut graph, 2);
    assert!(ready_ids(&graph).is_empty());
}

#[test]
fn diamond_spawns_join_only_after_both_sides() {
    let mut graph = TaskGraph::build(vec![
        spec(1, "a", vec![]),
        spec(2, "b", vec![1]),
        spec(3, "c", vec![1]),
        spec(4, "d", vec![2, 3]),
    ])
    .unwrap();

    assert_eq!(ready_ids(&graph), vec![1]);

    complete(&mut graph, 1);
    assert_eq!(ready_ids(&graph), vec![2, 3]);

    complete(&mut graph, 2);
    assert_eq!(ready_ids(&graph), vec![3]);

    complete(&mut graph, 3);
    assert_eq!(ready_ids(&graph), vec![4]);
}

#[test]
fn readiness_tiebreak_is_ascending_by_id() {
    let graph = TaskGraph::build(vec![
        spec(5, "e", vec![]),
        spec(2, "b", vec![]),
        spec(9, "i", vec![]),
    ])
    .unwrap();
    assert_eq!(ready_ids(&graph), vec![2, 5, 9]);
}

/// The decomposer is a one-operation seam; a fake slots in for tests.
struct FixedDecomposer {
    tasks: Vec<TaskSpec>,
}

impl Decomposer for FixedDecomposer {
    fn decompose<'a>(&'a self, _prompt: &'a str, _project_dir: &'a Path) -> DecomposeFuture<'a> {
        let tasks = self.tasks.clone();
        Box::pin(async move { TaskGraph::build(tasks) })
    }
}

#[tokio::test]
async fn fake_decomposer_produces_a_schedulable_graph() {
    let decomposer = FixedDecomposer {
        tasks: vec![spec(1, "scaffold", vec![]), spec(2, "tests", vec![1])],
    };
    let graph = decomposer.decompose("anything", Path::new(".")).await.unwrap();
    assert_eq!(graph.tasks.len(), 2);
    assert_eq!(ready_ids(&graph), vec![1]);
}

#[tokio::test]
async fn fake_decomposer_surfaces_cycles_as_invalid_dag() {
    let decomposer = FixedDecomposer {
        tasks: vec![spec(1, "a", vec![2]), spec(2, "b", vec![1])],
    };
    let err = decomposer
        .decompose("anything", Path::new("."))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchitectError::InvalidDag(_)));
}
