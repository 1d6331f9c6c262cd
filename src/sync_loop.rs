//! The Sync Loop: a single long-running task that ticks the Provisioner and
//! Drift Healer on a fixed interval (§4.5).
//!
//! Uses `tokio::select!` over an interval timer and a [`CancellationToken`]
//! rather than a global `AtomicBool` flag — the stop-signal shape in
//! `elisplash-paw`'s `start_bridge`/`stop_bridge`, generalized onto a value
//! owned by [`BridgeContext`] instead of a process-wide static.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::context::BridgeContext;
use crate::drift;
use crate::provisioner;

/// Run the Sync Loop until `cancellation` fires. The first tick runs
/// immediately (no initial `SYNC_INTERVAL_SECONDS` wait before the first
/// reconciliation).
pub async fn run(ctx: Arc<BridgeContext>, cancellation: CancellationToken) {
    let mut ticker = interval(Duration::from_secs(ctx.config.sync_interval_seconds));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_tick(&ctx).await;
            }
            _ = cancellation.cancelled() => {
                tracing::info!("sync loop cancelled; finishing in-flight tick state");
                break;
            }
        }
    }
}

#[tracing::instrument(skip(ctx))]
async fn run_tick(ctx: &BridgeContext) {
    provisioner::run_cycle(ctx).await;
    drift::run_cycle(ctx).await;

    let snapshot = ctx.metrics.snapshot();
    tracing::info!(
        agents_seen = snapshot.agents_seen,
        users_created = snapshot.users_created,
        rooms_created = snapshot.rooms_created,
        renames = snapshot.renames,
        drift_fixes = snapshot.drift_fixes,
        errors = snapshot.errors,
        "sync loop tick complete"
    );

    let ttl = ctx.config.event_dedupe_ttl_seconds as i64;
    if let Err(error) = ctx.store.vacuum_events(ttl).await {
        tracing::warn!(%error, "failed to vacuum processed_events");
    }
}
