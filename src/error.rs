#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

use thiserror::Error;

/// Stable error-code strings surfaced in tool-facade error envelopes.
pub mod code {
    pub const INVALID: &str = "INVALID";
    pub const NOTFOUND: &str = "NOTFOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const DEPENDENCY: &str = "DEPENDENCY";
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Error, Debug)]
pub enum ArchitectError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    #[error("Invalid task graph: {0}")]
    InvalidDag(String),

    #[error("Task {task_id} is not assigned to this agent")]
    NotAssigned { task_id: i64 },

    #[error("Agent {agent_id} is not registered")]
    AgentNotRegistered { agent_id: String },

    #[error("Failed to spawn agent process: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArchitectError {
    /// Protocol error code for this error, used by the tool facade envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ArchitectError::Config(_) => code::INVALID,
            ArchitectError::Database(_) | ArchitectError::Sqlx(_) => code::INTERNAL,
            ArchitectError::Decomposition(_) => code::INVALID,
            ArchitectError::InvalidDag(_) => code::INVALID,
            ArchitectError::NotAssigned { .. } => code::UNAUTHORIZED,
            ArchitectError::AgentNotRegistered { .. } => code::NOTFOUND,
            ArchitectError::Spawn(_) => code::DEPENDENCY,
            ArchitectError::Io(_) => code::DEPENDENCY,
            ArchitectError::Serialization(_) => code::INVALID,
            ArchitectError::Internal(_) => code::INTERNAL,
        }
    }

    /// True for errors that should abort the orchestrator run entirely.
    /// Agent-specific failures are expected and never fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ArchitectError::Config(_)
                | ArchitectError::Decomposition(_)
                | ArchitectError::InvalidDag(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ArchitectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(ArchitectError::Config("bad dsn".into()).is_fatal());
        assert!(ArchitectError::InvalidDag("cycle".into()).is_fatal());
        assert!(!ArchitectError::NotAssigned { task_id: 3 }.is_fatal());
        assert!(!ArchitectError::AgentNotRegistered {
            agent_id: "a".into()
        }
        .is_fatal());
    }

    #[test]
    fn protocol_codes() {
        assert_eq!(
            ArchitectError::NotAssigned { task_id: 1 }.code(),
            code::UNAUTHORIZED
        );
        assert_eq!(
            ArchitectError::AgentNotRegistered {
                agent_id: "x".into()
            }
            .code(),
            code::NOTFOUND
        );
    }
}
