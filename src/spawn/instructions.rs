#![forbid(unsafe_code)]

//! Per-workspace instructions document, materialized as `CLAUDE.md` in the
//! agent's worktree before launch.

use crate::types::{AgentId, Task};

const INSTRUCTIONS_TEMPLATE: &str = r#"# Agent Instructions

You are agent `{agent_id}` working on task #{task_id}: "{task_title}"

## Your Task
{task_description}

## Communication Protocol
You have access to the `architect-pg` MCP server. Use it continuously:

1. **On start:** Call `read_context` for your domain. Call `read_messages` to see recent chat.
2. **When you discover something:** Call `write_context` immediately.
3. **When you make a decision:** Call `write_decision` with rationale.
4. **When you're blocked:** Call `post_message` with channel='blockers' and msg_type='blocker'.
5. **When you complete work:** Call `update_task` with status='completed' and a summary. Then call `post_message` on 'general' with msg_type='update'.
6. **Periodically:** Call `heartbeat` so the orchestrator knows you're alive.

## Before Making Architectural Decisions
Always call `check_decisions` for the relevant domain first. If a conflicting decision exists,
call `post_message` with msg_type='question' rather than overriding.

## Git
You are working in worktree: `{worktree_path}`
Branch: `{branch_name}`
Commit your work frequently with clear messages.

## Project Conventions
{project_conventions}
"#;

/// Expands the embedded template for one agent and task. Project-wide
/// conventions come from the repository's own CLAUDE.md when present.
#[must_use]
pub fn generate_instructions(
    agent_id: &AgentId,
    task: &Task,
    branch_name: &str,
    worktree_path: &str,
    project_conventions: &str,
) -> String {
    INSTRUCTIONS_TEMPLATE
        .replace("{agent_id}", agent_id.value())
        .replace("{task_id}", &task.id.to_string())
        .replace("{task_title}", &task.title)
        .replace("{task_description}", &task.description)
        .replace("{worktree_path}", worktree_path)
        .replace("{branch_name}", branch_name)
        .replace("{project_conventions}", project_conventions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RiskLevel, TaskStatus};

    #[test]
    fn instructions_embed_agent_task_and_conventions() {
        let task = Task {
            id: 42,
            title: "Implement auth".to_string(),
            description: "Build the authentication module with JWT support.".to_string(),
            status: TaskStatus::InProgress,
            assigned_to: None,
            risk_level: RiskLevel::Medium,
            output: None,
            parent_id: None,
        };
        let agent_id = AgentId::new("abc12345-6789-0000-0000-000000000000");

        let content = generate_instructions(
            &agent_id,
            &task,
            "agent/abc12345/task-42",
            "/tmp/worktrees/agent-abc12345",
            "Use Rust 2021.",
        );

        for expected in [
            "abc12345-6789-0000-0000-000000000000",
            "task #42",
            "Implement auth",
            "Build the authentication module",
            "agent/abc12345/task-42",
            "/tmp/worktrees/agent-abc12345",
            "Use Rust 2021.",
            "architect-pg",
        ] {
            assert!(content.contains(expected), "missing {expected:?}");
        }
    }
}
