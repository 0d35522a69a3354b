mod envelope;
mod tools;

pub use envelope::{ToolEnvelope, ToolError, ToolRequest};
pub use tools::PgToolFacade;

use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::error::Result;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Seam for the coordination tool surface so tests can substitute a fake.
/// One operation: a named call with named arguments.
pub trait ToolFacade {
    fn handle_tool_call<'a>(&'a self, name: &'a str, args: &'a Map<String, Value>)
        -> ToolFuture<'a>;
}

/// Serves the facade over stdin/stdout: one JSON request per line in, one
/// envelope per line out. Agent processes drive this through the
/// per-workspace manifest.
pub async fn serve_stdio<F: ToolFacade>(facade: &F) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let envelope = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => {
                match facade.handle_tool_call(&request.tool, &request.args).await {
                    Ok(data) => ToolEnvelope::success(request.rid, data),
                    Err(error) => {
                        warn!(tool = %request.tool, %error, "tool call failed");
                        ToolEnvelope::failure(request.rid, &error)
                    }
                }
            }
            Err(error) => ToolEnvelope::failure(
                None,
                &crate::error::ArchitectError::Serialization(error),
            ),
        };

        let mut response = serde_json::to_vec(&envelope)?;
        response.push(b'\n');
        stdout.write_all(&response).await?;
        stdout.flush().await?;
    }

    Ok(())
}
