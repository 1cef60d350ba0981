//! Dual-loop runtime.
//!
//! Two long-lived tasks: the snapshot worker and the orchestration
//! loop. They share nothing but the ledger and the snapshot cache.
//! User decisions arrive over the decision channel and are applied
//! between ticks. Shutdown is cooperative: cancelling the token lets
//! the in-flight cycle finish, then both tasks exit.

use crate::orchestrator::Orchestrator;
use martin_feed::SnapshotWorker;
use martin_notify::DecisionReceiver;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the engine until `shutdown` is cancelled.
pub async fn run(
    orchestrator: Arc<Orchestrator>,
    snapshot_worker: SnapshotWorker,
    mut decisions: DecisionReceiver,
    shutdown: CancellationToken,
) {
    let snapshot_task = tokio::spawn(snapshot_worker.run(shutdown.child_token()));

    let mut interval = tokio::time::interval(Duration::from_secs(
        orchestrator.config().tick_secs,
    ));
    // An overrunning cycle delays the next tick; ticks never pile up.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_secs = orchestrator.config().tick_secs,
        "Orchestration loop started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = chrono::Utc::now().timestamp();
                orchestrator.run_cycle(now).await;
            }
            Some(decision) = decisions.recv() => {
                let now = chrono::Utc::now().timestamp();
                orchestrator.handle_decision(decision, now).await;
            }
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, orchestration loop stopping");
                break;
            }
        }
    }

    // The snapshot worker sees the same cancellation.
    let _ = snapshot_task.await;
    info!("Engine stopped");
}
