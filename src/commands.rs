use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use architect::db::{ensure_database, run_listener, BusEvent};
use architect::decompose::{ClaudeDecomposer, Decomposer};
use architect::monitor::{handle_events, monitor_heartbeats};
use architect::spawn::{spawn_ready, AgentRegistry};
use architect::{CoordDb, Result};

use crate::cli::Cli;
use crate::config;

/// Wires SIGINT/SIGTERM to the root shutdown token.
fn install_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(%e, "cannot install SIGTERM handler");
                let _ = ctrl_c.await;
                info!("received interrupt, shutting down");
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => info!("received interrupt, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
        shutdown.cancel();
    });
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let (config, prompt) = config::load(&cli).await?;

    let shutdown = CancellationToken::new();
    install_signal_handler(shutdown.clone());

    ensure_database(&config.database_url).await?;
    let db = CoordDb::connect(&config.database_url).await?;
    db.run_migrations().await?;

    // Event bus: one long-lived subscription connection feeding a bounded
    // channel. A listener failure at startup is fatal; runtime drops are
    // retried inside the loop.
    let (event_tx, event_rx) = mpsc::channel::<BusEvent>(100);
    let listener_url = config.database_url.clone();
    let listener_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = run_listener(&listener_url, event_tx, listener_shutdown.clone()).await {
            error!(%e, "notification listener failed");
            listener_shutdown.cancel();
        }
    });

    tokio::spawn(monitor_heartbeats(
        db.clone(),
        config.heartbeat_timeout,
        shutdown.clone(),
    ));

    info!(prompt = %prompt, "decomposing prompt");
    let decomposer = ClaudeDecomposer::new(config.planner_program.clone());
    let graph = decomposer.decompose(&prompt, &config.project_dir).await?;
    info!(tasks = graph.tasks.len(), "decomposition complete");

    // Write the DAG to the datastore, mapping decomposition-local ids to
    // datastore ids.
    let mut id_map: HashMap<i64, i64> = HashMap::with_capacity(graph.tasks.len());
    for task in &graph.tasks {
        let db_id = db
            .insert_task(&task.title, &task.description, task.risk_level)
            .await?;
        id_map.insert(task.id, db_id);
        info!(local = task.id, db = db_id, title = %task.title, "inserted task");
    }
    for edge in &graph.edges {
        if let (Some(&from), Some(&to)) = (id_map.get(&edge.from), id_map.get(&edge.to)) {
            db.insert_edge(from, to).await?;
        }
    }

    let registry = Arc::new(AgentRegistry::new());
    let spawned = spawn_ready(
        &db,
        &registry,
        &config.project_dir,
        &config.spawn,
        &shutdown,
    )
    .await?;
    info!(spawned, "spawned initial agents");

    info!("entering event loop");
    handle_events(
        &db,
        &registry,
        event_rx,
        &config.project_dir,
        &config.spawn,
        &shutdown,
    )
    .await;

    info!("orchestrator shutdown complete");
    Ok(())
}
