//! The `/health` HTTP surface (§6a). Grounded on
//! `scarnecchia-numina/pattern_server`'s `handlers/health.rs` shape
//! (`async fn health_check() -> Json<HealthResponse>`), but `uptime` is
//! computed from the real `Instant` captured at process start rather than
//! left as a hardcoded placeholder — operators depend on this field.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::context::BridgeContext;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    agents: usize,
    space_id: Option<String>,
    uptime: u64,
    dedupe_events: usize,
}

async fn health_check(State(ctx): State<Arc<BridgeContext>>) -> Json<HealthResponse> {
    let agents = ctx.store.all_mappings().await.map(|m| m.len()).unwrap_or_default();
    let space_id = ctx.store.get_space().await.ok().flatten().map(|s| s.space_id);
    let dedupe_events = ctx.store.count_events().await.unwrap_or_default();

    let status = if space_id.is_some() { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        agents,
        space_id,
        uptime: ctx.uptime_seconds(),
        dedupe_events,
    })
}

/// Bind and run the `/health` HTTP server until `cancellation` fires.
pub async fn serve(ctx: Arc<BridgeContext>, cancellation: CancellationToken) {
    let bind_addr = ctx.config.health_bind_addr.clone();
    let app = Router::new().route("/health", get(health_check)).with_state(ctx);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, bind_addr, "failed to bind health server");
            return;
        }
    };

    tracing::info!(bind_addr, "health server listening");
    let serve_result = axum::serve(listener, app).with_graceful_shutdown(async move {
        cancellation.cancelled().await;
    }).await;

    if let Err(error) = serve_result {
        tracing::error!(%error, "health server exited with error");
    }
}
