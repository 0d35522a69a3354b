use std::time::Duration;

use architect::spawn::{resolve_tool_binary, SpawnConfig};
use architect::{ArchitectError, Result};

use crate::cli::Cli;

pub struct OrchestratorConfig {
    pub project_dir: std::path::PathBuf,
    pub database_url: String,
    pub spawn: SpawnConfig,
    pub heartbeat_timeout: Duration,
    pub planner_program: String,
}

/// Resolves the prompt: exactly one of --prompt / --prompt-file.
async fn resolve_prompt(cli: &Cli) -> Result<String> {
    match (&cli.prompt, &cli.prompt_file) {
        (Some(prompt), None) => Ok(prompt.clone()),
        (None, Some(path)) => tokio::fs::read_to_string(path).await.map_err(|e| {
            ArchitectError::Config(format!("cannot read prompt file {}: {e}", path.display()))
        }),
        (Some(_), Some(_)) => Err(ArchitectError::Config(
            "--prompt and --prompt-file are mutually exclusive".to_string(),
        )),
        (None, None) => Err(ArchitectError::Config(
            "one of --prompt or --prompt-file is required".to_string(),
        )),
    }
}

/// Project-wide conventions embedded into each agent's instructions.
async fn project_conventions(project_dir: &std::path::Path) -> String {
    tokio::fs::read_to_string(project_dir.join("CLAUDE.md"))
        .await
        .unwrap_or_default()
}

pub async fn load(cli: &Cli) -> Result<(OrchestratorConfig, String)> {
    let prompt = resolve_prompt(cli).await?;
    let conventions = project_conventions(&cli.project).await;

    let config = OrchestratorConfig {
        project_dir: cli.project.clone(),
        database_url: cli.db.clone(),
        spawn: SpawnConfig {
            agent_program: cli.agent_program.clone(),
            tool_binary: resolve_tool_binary(&cli.mcp_pg),
            database_url: cli.db.clone(),
            project_conventions: conventions,
        },
        heartbeat_timeout: Duration::from_secs(cli.heartbeat_timeout),
        planner_program: cli.planner_program.clone(),
    };
    Ok((config, prompt))
}
