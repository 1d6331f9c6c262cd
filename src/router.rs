//! Router (§4.7): relays inbound Matrix messages to their mapped Letta
//! agent, and the agent's reply back into the room as that agent's own
//! Matrix identity.
//!
//! A fixed-size pool of `tokio::spawn`ed workers share one `mpsc::Receiver`
//! end (wrapped in an `Arc<Mutex<_>>>`, since only one consumer may hold a
//! tokio channel receiver at a time) — the same bounded-channel,
//! fixed-consumer-pool shape `scarnecchia-numina`'s `pattern_discord::bot`
//! uses for group-response streaming, adapted here from a broadcast stream
//! to a plain work queue. A per-agent `tokio::sync::Mutex` (looked up in a
//! lazily-populated `DashMap`) brackets the Letta call and the Matrix reply
//! send, so an agent's conversation is never raced against itself.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::BridgeContext;
use crate::contextualizer;
use crate::ingress::InboundMessage;
use crate::matrix::types::TextMessageContent;

/// Default size of the Router worker pool (§5).
pub const DEFAULT_WORKER_COUNT: usize = 16;

type AgentLocks = DashMap<String, Arc<Mutex<()>>>;

/// Spawn [`DEFAULT_WORKER_COUNT`] Router workers pulling from `receiver`
/// until `cancellation` fires.
pub fn spawn_workers(
    ctx: Arc<BridgeContext>,
    receiver: Arc<Mutex<mpsc::Receiver<InboundMessage>>>,
    cancellation: CancellationToken,
) {
    let agent_locks: Arc<AgentLocks> = Arc::new(DashMap::new());

    for worker_id in 0..DEFAULT_WORKER_COUNT {
        let ctx = ctx.clone();
        let receiver = receiver.clone();
        let agent_locks = agent_locks.clone();
        let cancellation = cancellation.clone();

        tokio::spawn(async move {
            loop {
                let message = {
                    let mut guard = receiver.lock().await;
                    tokio::select! {
                        message = guard.recv() => message,
                        _ = cancellation.cancelled() => None,
                    }
                };

                let Some(message) = message else {
                    tracing::debug!(worker_id, "router worker shutting down");
                    break;
                };

                handle_message(&ctx, &agent_locks, message).await;
            }
        });
    }
}

fn agent_lock(locks: &AgentLocks, agent_id: &str) -> Arc<Mutex<()>> {
    locks.entry(agent_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
}

#[tracing::instrument(skip(ctx, locks, message), fields(room_id = %message.room_id))]
async fn handle_message(ctx: &BridgeContext, locks: &AgentLocks, message: InboundMessage) {
    let mapping = match ctx.store.get_mapping_by_room(&message.room_id).await {
        Ok(Some(mapping)) => mapping,
        Ok(None) => {
            tracing::warn!(room_id = %message.room_id, "no agent mapping for room; dropping message");
            return;
        }
        Err(error) => {
            tracing::error!(%error, "mapping lookup failed; dropping message");
            return;
        }
    };

    let prompt = contextualizer::rewrite_if_inter_agent(&message);

    let lock = agent_lock(locks, &mapping.agent_id);
    let _permit = lock.lock().await;

    let agent_id = match mapping.agent_id.parse::<crate::types::LettaId>() {
        Ok(id) => id,
        Err(error) => {
            tracing::error!(%error, agent_id = %mapping.agent_id, "stored agent_id is not a valid LettaId");
            return;
        }
    };

    let reply = match ctx.letta.messages().send_from(&agent_id, &prompt, &message.sender).await {
        Ok(Some(reply)) => reply,
        Ok(None) => {
            tracing::warn!(agent_id = %mapping.agent_id, "agent produced no assistant reply");
            return;
        }
        Err(error) => {
            tracing::error!(agent_id = %mapping.agent_id, %error, "letta send_message failed");
            return;
        }
    };

    send_reply(ctx, &mapping, &reply).await;
}

async fn send_reply(ctx: &BridgeContext, mapping: &crate::store::AgentMapping, reply: &str) {
    let room_id = match &mapping.room_id {
        Some(room_id) => room_id,
        None => {
            tracing::error!(agent_id = %mapping.agent_id, "mapping has no room_id; cannot send reply");
            return;
        }
    };

    let txn_id = Uuid::new_v4().to_string();
    let content = TextMessageContent::text(reply);

    let token = match agent_token(ctx, mapping).await {
        Ok(token) => token,
        Err(error) => {
            tracing::error!(agent_id = %mapping.agent_id, %error, "could not obtain token for agent identity");
            return;
        }
    };

    match ctx.matrix.send_message(&token, room_id, &txn_id, &content).await {
        Ok(_) => {}
        Err(error) if error.is_auth_failure() => {
            tracing::warn!(agent_id = %mapping.agent_id, "auth failure sending reply; retrying once after relogin");
            ctx.matrix.forget_token(&mapping.matrix_user_id);
            match agent_token(ctx, mapping).await {
                Ok(token) => {
                    // Reusing the same txn_id keeps this retry idempotent against a
                    // partially-applied first attempt.
                    if let Err(error) = ctx.matrix.send_message(&token, room_id, &txn_id, &content).await {
                        tracing::error!(agent_id = %mapping.agent_id, %error, "relogin retry also failed; dropping reply rather than falling back to the letta bot identity");
                    }
                }
                Err(error) => {
                    tracing::error!(agent_id = %mapping.agent_id, %error, "relogin failed; dropping reply");
                }
            }
        }
        Err(error) => {
            tracing::error!(agent_id = %mapping.agent_id, %error, "failed to send reply");
        }
    }
}

async fn agent_token(ctx: &BridgeContext, mapping: &crate::store::AgentMapping) -> crate::error::BridgeResult<String> {
    if let Some(token) = ctx.matrix.cached_token(&mapping.matrix_user_id) {
        return Ok(token);
    }
    Ok(ctx.matrix.login(&mapping.matrix_user_id, &mapping.matrix_password).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_lock_is_stable_across_lookups() {
        let locks: AgentLocks = DashMap::new();
        let a = agent_lock(&locks, "agent-1");
        let b = agent_lock(&locks, "agent-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_agent_lock_differs_across_agents() {
        let locks: AgentLocks = DashMap::new();
        let a = agent_lock(&locks, "agent-1");
        let b = agent_lock(&locks, "agent-2");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
