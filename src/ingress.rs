//! Event Ingress (§4.6): long-polls `/sync` as the bridge's `letta` core
//! identity, filters the raw timeline down to messages the Router actually
//! needs to see, and pushes them onto a bounded channel the Router worker
//! pool consumes.
//!
//! Follows `elisplash-paw`'s `run_sync_loop` shape: an initial zero-timeout
//! sync to establish `next_batch` without replaying history, then a loop of
//! `GET /sync?since=...&timeout=5000` with transport errors logged and
//! handled by a short sleep-and-continue rather than terminating the task.
//! Rooms the bot is invited to are auto-joined, as both `elisplash-paw` and
//! the `matrixbot-ezlogin` echo-bot example do.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::context::BridgeContext;
use crate::matrix::types::SyncFilter;
use crate::router;

/// Capacity of the channel between Event Ingress and the Router worker
/// pool. Event Ingress blocks on `send` once this fills, implementing the
/// backpressure contract from §5 rather than buffering unboundedly.
const INGRESS_CHANNEL_CAPACITY: usize = 256;

const SYNC_TIMEOUT: Duration = Duration::from_secs(5);
const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// A filtered, deduplicated inbound message handed to the Router.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub room_id: String,
    pub sender: String,
    pub body: String,
    /// The raw `m.room.message` content, so the Router/Contextualizer can
    /// read `m.letta.*` metadata fields without re-parsing.
    pub content: serde_json::Value,
}

/// Run Event Ingress until `cancellation` fires: long-poll `/sync`, filter,
/// and dispatch to a fixed-size Router worker pool.
pub async fn run(ctx: Arc<BridgeContext>, cancellation: CancellationToken) {
    let (tx, rx) = mpsc::channel(INGRESS_CHANNEL_CAPACITY);
    let rx = Arc::new(Mutex::new(rx));
    router::spawn_workers(ctx.clone(), rx, cancellation.clone());

    let letta_user_id = format!("@{}:{}", ctx.config.matrix_username, ctx.config.matrix_server_name);
    let token = match ctx.matrix.login(&ctx.config.matrix_username, &ctx.config.matrix_password).await {
        Ok(token) => token,
        Err(error) => {
            tracing::error!(%error, "event ingress failed to log in; cannot start");
            return;
        }
    };

    let startup_ts = chrono::Utc::now().timestamp_millis();
    let filter = SyncFilter::messages_only();

    // Initial zero-timeout sync to establish `next_batch` without replaying
    // history into the channel.
    let mut since = match ctx.matrix.sync(&token, None, &filter, Duration::ZERO).await {
        Ok(response) => Some(response.next_batch),
        Err(error) => {
            tracing::error!(%error, "initial sync failed");
            None
        }
    };

    loop {
        if cancellation.is_cancelled() {
            tracing::info!("event ingress cancelled");
            break;
        }

        let response = tokio::select! {
            result = ctx.matrix.sync(&token, since.as_deref(), &filter, SYNC_TIMEOUT) => result,
            _ = cancellation.cancelled() => break,
        };

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "sync request failed; retrying after backoff");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };
        since = Some(response.next_batch);

        for (room_id, room) in &response.rooms.join {
            for event in &room.timeline.events {
                if event.event_type != "m.room.message" {
                    continue;
                }
                if let Some(message) =
                    filter_event(&ctx, room_id, event, &letta_user_id, startup_ts).await
                {
                    if tx.send(message).await.is_err() {
                        tracing::error!("router channel closed; dropping inbound message");
                    }
                }
            }
        }

        for (room_id, room) in &response.rooms.invite {
            let is_invited = room
                .invite_state
                .events
                .iter()
                .any(|e| e.event_type == "m.room.member" && e.state_key.as_deref() == Some(letta_user_id.as_str()));
            if is_invited {
                if let Err(error) = ctx.matrix.join_room_with_backoff(&token, room_id).await {
                    tracing::warn!(room_id, %error, "failed to auto-join invited room");
                }
            }
        }
    }
}

async fn filter_event(
    ctx: &BridgeContext,
    room_id: &str,
    event: &crate::matrix::types::RoomEvent,
    letta_user_id: &str,
    startup_ts: i64,
) -> Option<InboundMessage> {
    if event.origin_server_ts < startup_ts {
        return None;
    }

    match ctx.store.is_duplicate_event(&event.event_id).await {
        Ok(true) => return None,
        Ok(false) => {}
        Err(error) => {
            tracing::error!(%error, event_id = %event.event_id, "dedupe check failed; dropping event to be safe");
            return None;
        }
    }

    if event.sender == letta_user_id {
        return None;
    }

    if event.content.get("m.letta_historical").and_then(|v| v.as_bool()) == Some(true) {
        return None;
    }

    match ctx.store.get_mapping_by_room(room_id).await {
        Ok(Some(mapping)) if mapping.matrix_user_id == event.sender => return None,
        Ok(_) => {}
        Err(error) => {
            tracing::error!(%error, room_id, "mapping lookup failed during self-loop filter");
        }
    }

    let body = event.content.get("body").and_then(|v| v.as_str())?.to_string();

    Some(InboundMessage {
        room_id: room_id.to_string(),
        sender: event.sender.clone(),
        body,
        content: event.content.clone(),
    })
}
