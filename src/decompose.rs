#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Natural-language decomposer adapter. Shells out to an external planner
//! process and turns its JSON answer into a validated task graph.

use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tokio::process::Command;
use tracing::debug;

use crate::dag::{TaskGraph, TaskSpec};
use crate::error::{ArchitectError, Result};

pub type DecomposeFuture<'a> = Pin<Box<dyn Future<Output = Result<TaskGraph>> + Send + 'a>>;

/// Seam for the external planner so tests can substitute a fake.
pub trait Decomposer {
    fn decompose<'a>(&'a self, prompt: &'a str, project_dir: &'a Path) -> DecomposeFuture<'a>;
}

#[derive(Debug, Deserialize)]
struct DecompositionResponse {
    tasks: Vec<TaskSpec>,
}

fn planner_prompt(prompt: &str) -> String {
    format!(
        r#"You are a task decomposition agent. Given the following user request,
decompose it into a set of tasks that can be executed in parallel where possible.

Output ONLY valid JSON in this exact format:
{{
  "tasks": [
    {{
      "id": 1,
      "title": "short title",
      "description": "detailed description of what to implement",
      "risk_level": "low|medium|high",
      "blocked_by": []
    }}
  ]
}}

Rules:
- Each task should be independently implementable in its own git branch
- Use blocked_by to express dependencies (array of task IDs)
- Tasks with no blocked_by can run in parallel immediately
- Keep tasks focused: one module/feature per task
- Include verification/testing as separate tasks where appropriate

User request: {prompt}"#
    )
}

/// Extracts the first JSON object carrying a `tasks` array from output that
/// may contain chatter around it.
fn extract_tasks_json(output: &str) -> Option<Value> {
    for (idx, _) in output.char_indices().filter(|&(_, c)| c == '{') {
        let mut stream = serde_json::Deserializer::from_str(&output[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if value
                .get("tasks")
                .map(Value::is_array)
                .unwrap_or(false)
            {
                return Some(value);
            }
        }
    }
    None
}

/// Decomposes by invoking the planner CLI (`claude --print`) in the project
/// directory. The `CLAUDECODE` marker is stripped from the environment so
/// the child does not detect itself as nested.
pub struct ClaudeDecomposer {
    program: String,
}

impl ClaudeDecomposer {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, prompt: &str, project_dir: &Path) -> Result<TaskGraph> {
        let output = Command::new(&self.program)
            .arg("--print")
            .arg(planner_prompt(prompt))
            .current_dir(project_dir)
            .env_remove("CLAUDECODE")
            .output()
            .await
            .map_err(|e| ArchitectError::Decomposition(format!("planner spawn failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchitectError::Decomposition(format!(
                "planner exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(bytes = stdout.len(), "planner output received");

        let value = extract_tasks_json(&stdout).ok_or_else(|| {
            ArchitectError::Decomposition("no JSON object with a tasks array in planner output".to_string())
        })?;
        let response: DecompositionResponse = serde_json::from_value(value)
            .map_err(|e| ArchitectError::Decomposition(format!("malformed tasks JSON: {e}")))?;

        TaskGraph::build(response.tasks)
    }
}

impl Default for ClaudeDecomposer {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl Decomposer for ClaudeDecomposer {
    fn decompose<'a>(&'a self, prompt: &'a str, project_dir: &'a Path) -> DecomposeFuture<'a> {
        Box::pin(self.run(prompt, project_dir))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_surrounding_chatter() {
        let output = r#"Sure, here is the plan you asked for:

{"tasks": [{"id": 1, "title": "build", "description": "d", "risk_level": "low", "blocked_by": []}]}

Let me know if you want changes."#;
        let value = extract_tasks_json(output).unwrap();
        assert_eq!(value["tasks"][0]["id"], 1);
    }

    #[test]
    fn skips_decoy_objects_without_tasks() {
        let output = r#"{"note": "not it"} and then {"tasks": []} trailing"#;
        let value = extract_tasks_json(output).unwrap();
        assert!(value["tasks"].as_array().unwrap().is_empty());
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_tasks_json("I could not produce a plan.").is_none());
        assert!(extract_tasks_json("{\"tasks\": \"not an array\"}").is_none());
    }

    #[test]
    fn parsed_specs_build_a_graph() {
        let output = r#"{"tasks": [
            {"id": 1, "title": "api", "description": "", "risk_level": "low", "blocked_by": []},
            {"id": 2, "title": "tests", "description": "", "risk_level": "medium", "blocked_by": [1]}
        ]}"#;
        let value = extract_tasks_json(output).unwrap();
        let response: DecompositionResponse = serde_json::from_value(value).unwrap();
        let graph = TaskGraph::build(response.tasks).unwrap();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.ready_tasks()[0].id, 1);
    }

    #[test]
    fn planner_prompt_embeds_request_and_format() {
        let prompt = planner_prompt("add a login page");
        assert!(prompt.contains("add a login page"));
        assert!(prompt.contains("\"blocked_by\""));
        assert!(prompt.contains("risk_level"));
    }
}
