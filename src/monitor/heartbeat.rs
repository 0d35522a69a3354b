#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Liveness sweep: agents stop heartbeating when their process dies without
//! the completion watcher seeing it (machine crash, kill -9, orchestrator
//! restart). The sweep flips them to dead and returns their tasks.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::db::CoordDb;
use crate::error::Result;
use crate::types::DeadAgent;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(120);

/// One sweep pass: mark stale agents dead and reclaim their tasks so the
/// next readiness recompute re-offers them.
pub async fn sweep_heartbeats(db: &CoordDb, timeout: Duration) -> Result<Vec<DeadAgent>> {
    let dead = db.mark_dead_agents(timeout).await?;
    for agent in &dead {
        info!(agent = agent.agent_id.short(), "agent detected as dead");
        if let Some(task_id) = agent.current_task_id {
            match db.reclaim_task(task_id).await {
                Ok(()) => info!(
                    task = task_id,
                    agent = agent.agent_id.short(),
                    "reclaimed task from dead agent"
                ),
                Err(e) => warn!(task = task_id, %e, "failed to reclaim task"),
            }
        }
    }
    Ok(dead)
}

/// Periodic sweep loop; returns when the shutdown token fires.
pub async fn monitor_heartbeats(db: CoordDb, timeout: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // interval fires immediately; skip that first tick so a freshly started
    // orchestrator does not sweep before agents have heartbeated once.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                if let Err(e) = sweep_heartbeats(&db, timeout).await {
                    warn!(%e, "heartbeat sweep failed");
                }
            }
        }
    }
}
