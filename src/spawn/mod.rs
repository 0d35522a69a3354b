mod instructions;
mod manifest;
mod registry;
mod session;
mod worktree;

pub use instructions::generate_instructions;
pub use manifest::{generate_manifest, resolve_tool_binary};
pub use registry::AgentRegistry;
pub use session::{spawn_ready, spawn_session, SpawnConfig};
pub use worktree::{create_worktree, remove_worktree};
