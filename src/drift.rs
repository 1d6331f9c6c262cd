//! Drift Healer (§4.9): every Sync Loop tick, reconciles persisted room
//! identity against what's actually observed on the Matrix side. Live
//! Matrix state is the source of truth for *room identity*; the store
//! remains the source of truth for *agent identity*.

use crate::context::BridgeContext;
use crate::provisioner::Metrics;

#[tracing::instrument(skip(ctx))]
pub async fn run_cycle(ctx: &BridgeContext) {
    let mappings = match ctx.store.all_mappings().await {
        Ok(mappings) => mappings,
        Err(error) => {
            tracing::error!(%error, "drift healer failed to list mappings");
            return;
        }
    };

    for mapping in mappings {
        if !mapping.room_created {
            continue;
        }
        if let Err(error) = heal_mapping(ctx, mapping).await {
            tracing::error!(%error, "drift healer step failed");
            Metrics::inc(&ctx.metrics.errors);
        }
    }
}

async fn heal_mapping(ctx: &BridgeContext, mut mapping: crate::store::AgentMapping) -> crate::error::BridgeResult<()> {
    let token = if let Some(token) = ctx.matrix.cached_token(&mapping.matrix_user_id) {
        token
    } else {
        ctx.matrix
            .login(&mapping.matrix_user_id, &mapping.matrix_password)
            .await?
    };

    let joined = ctx.matrix.joined_rooms(&token).await?;
    let expected_room = mapping.room_id.as_deref();

    if expected_room.is_some_and(|room_id| joined.iter().any(|r| r == room_id)) {
        return Ok(());
    }

    let expected_suffix = format!("{}{}", mapping.agent_name, crate::provisioner::ROOM_NAME_SUFFIX);
    let mut candidate = None;
    for room_id in &joined {
        if let Ok(state) = ctx.matrix.get_room_state(&token, room_id).await {
            let has_matching_name = state.iter().any(|event| {
                event.event_type == "m.room.name"
                    && event
                        .content
                        .get("name")
                        .and_then(|n| n.as_str())
                        .is_some_and(|name| name == expected_suffix)
            });
            if has_matching_name {
                candidate = Some(room_id.clone());
                break;
            }
        }
    }

    match candidate {
        Some(room_id) => {
            tracing::warn!(
                agent_id = %mapping.agent_id,
                old_room_id = ?mapping.room_id,
                new_room_id = %room_id,
                "correcting drifted room_id"
            );
            mapping.room_id = Some(room_id);
            ctx.store.upsert_mapping(mapping).await?;
            Metrics::inc(&ctx.metrics.drift_fixes);
        }
        None => {
            tracing::warn!(
                agent_id = %mapping.agent_id,
                "no candidate room found for agent; marking room_created=false for re-creation"
            );
            mapping.room_created = false;
            ctx.store.upsert_mapping(mapping).await?;
        }
    }

    Ok(())
}
