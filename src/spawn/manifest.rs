#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Per-workspace tool-server manifest (`.mcp.json`). The agent process reads
//! it to launch the coordination tool server with its identity in the
//! environment.

use serde_json::json;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::AgentId;

const TOOL_BINARY_NAME: &str = "architect-tools";

/// Resolution chain for the tool-server binary: explicit path if it exists,
/// then the installed location under `~/.architect/bin`, then colocated with
/// the running orchestrator executable, then the explicit value as-is so a
/// later spawn fails with a clear error.
#[must_use]
pub fn resolve_tool_binary(explicit: &str) -> PathBuf {
    if !explicit.is_empty() {
        if let Ok(abs) = std::path::absolute(explicit) {
            if abs.exists() {
                return abs;
            }
        }
    }

    if let Some(home) = std::env::var_os("HOME") {
        let installed = Path::new(&home)
            .join(".architect")
            .join("bin")
            .join(TOOL_BINARY_NAME);
        if installed.exists() {
            return installed;
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let colocated = dir.join(TOOL_BINARY_NAME);
            if colocated.exists() {
                return colocated;
            }
        }
    }

    if explicit.is_empty() {
        PathBuf::from(TOOL_BINARY_NAME)
    } else {
        PathBuf::from(explicit)
    }
}

/// Renders `.mcp.json` declaring the `architect-pg` server with the agent's
/// identity, branch and datastore DSN passed through the environment.
pub fn generate_manifest(
    agent_id: &AgentId,
    branch_name: &str,
    tool_binary: &Path,
    database_url: &str,
) -> Result<String> {
    let manifest = json!({
        "mcpServers": {
            "architect-pg": {
                "command": tool_binary.to_string_lossy(),
                "env": {
                    "ARCHITECT_AGENT_ID": agent_id.value(),
                    "ARCHITECT_BRANCH": branch_name,
                    "ARCHITECT_DB_URL": database_url,
                }
            }
        }
    });
    Ok(serde_json::to_string_pretty(&manifest)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn manifest_declares_server_and_identity() {
        let agent_id = AgentId::new("agent-123");
        let rendered = generate_manifest(
            &agent_id,
            "agent/abc12345/task-1",
            Path::new("/usr/local/bin/architect-tools"),
            "postgres://localhost/test",
        )
        .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let server = &parsed["mcpServers"]["architect-pg"];
        assert_eq!(server["command"], "/usr/local/bin/architect-tools");
        assert_eq!(server["env"]["ARCHITECT_AGENT_ID"], "agent-123");
        assert_eq!(server["env"]["ARCHITECT_BRANCH"], "agent/abc12345/task-1");
        assert_eq!(server["env"]["ARCHITECT_DB_URL"], "postgres://localhost/test");
    }

    #[test]
    fn missing_explicit_path_falls_back_to_bare_name() {
        let resolved = resolve_tool_binary("");
        assert!(resolved.to_string_lossy().contains(TOOL_BINARY_NAME));
    }
}
