//! Reconciles the Letta agent roster against Matrix identities and rooms
//! (§4.4). Runs once per Sync Loop tick; each per-agent step is independent
//! and a failure in one never aborts the cycle for the rest.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::BridgeContext;
use crate::matrix::types::{CreateRoomRequest, StateEventInput};
use crate::store::AgentMapping;
use crate::types::AgentState;

/// Matrix localpart suffix every agent room carries, so rename handling can
/// replace only the base name.
pub(crate) const ROOM_NAME_SUFFIX: &str = " - Letta Agent Chat";

/// Per-tick counters surfaced on `/health` and logged at cycle end.
#[derive(Debug, Default)]
pub struct Metrics {
    pub agents_seen: AtomicU64,
    pub users_created: AtomicU64,
    pub rooms_created: AtomicU64,
    pub renames: AtomicU64,
    pub drift_fixes: AtomicU64,
    pub errors: AtomicU64,
}

impl Metrics {
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            agents_seen: self.agents_seen.load(Ordering::Relaxed),
            users_created: self.users_created.load(Ordering::Relaxed),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            renames: self.renames.load(Ordering::Relaxed),
            drift_fixes: self.drift_fixes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    pub agents_seen: u64,
    pub users_created: u64,
    pub rooms_created: u64,
    pub renames: u64,
    pub drift_fixes: u64,
    pub errors: u64,
}

/// Derive an agent's Matrix user ID localpart. Pure function of `agent_id`
/// and the homeserver's server name — never a function of the agent's
/// (mutable, possibly duplicated) display name.
///
/// `agent_id` carries Letta's own `agent-` type prefix (a [`crate::types::LettaId`]
/// rendered as `agent-<uuid>`); that prefix is stripped before the `@agent_`
/// Matrix localpart is built, so the two `agent` tags don't double up.
pub fn derive_matrix_user_id(agent_id: &str, server_name: &str) -> String {
    let suffix = agent_id.strip_prefix("agent-").unwrap_or(agent_id);
    let localpart = suffix.replace('-', "_");
    format!("@agent_{localpart}:{server_name}")
}

/// Generate a per-agent Matrix password. Outside `DEV_MODE` this is a fresh
/// random value every time a mapping is first created; inside `DEV_MODE` it
/// is deterministic (`dev-{agent_id}`) so fixture-driven runs are
/// reproducible without persisting a secret anywhere but the store (§9 open
/// question).
fn generate_password(agent_id: &str, dev_mode: bool) -> String {
    if dev_mode {
        return format!("dev-{agent_id}");
    }
    use rand::distributions::Alphanumeric;
    use rand::Rng;
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

/// Run one reconciliation cycle against the current Letta agent roster.
#[tracing::instrument(skip(ctx))]
pub async fn run_cycle(ctx: &BridgeContext) {
    let agents = match ctx.letta.agents().list_all().await {
        Ok(agents) => agents,
        Err(error) => {
            tracing::error!(%error, "failed to list Letta agents; skipping this cycle");
            Metrics::inc(&ctx.metrics.errors);
            return;
        }
    };

    if let Err(error) = ensure_space(ctx).await {
        tracing::error!(%error, step = "ensure_space", "provisioner step failed");
        Metrics::inc(&ctx.metrics.errors);
    }

    let mut seen_ids = std::collections::HashSet::new();
    for agent in &agents {
        Metrics::inc(&ctx.metrics.agents_seen);
        seen_ids.insert(agent.id.to_string());
        if let Err(error) = provision_agent(ctx, agent).await {
            tracing::error!(agent_id = %agent.id, %error, "provisioner step failed for agent");
            Metrics::inc(&ctx.metrics.errors);
        }
    }

    match ctx.store.all_mappings().await {
        Ok(mappings) => {
            for mapping in mappings {
                if !seen_ids.contains(&mapping.agent_id) {
                    tracing::warn!(
                        agent_id = %mapping.agent_id,
                        "mapping has no corresponding Letta agent; retaining (orphan)"
                    );
                }
            }
        }
        Err(error) => tracing::error!(%error, "failed to list stored mappings"),
    }
}

async fn ensure_space(ctx: &BridgeContext) -> crate::error::BridgeResult<()> {
    if ctx.store.get_space().await?.is_some() {
        return Ok(());
    }

    let admin_token = admin_token(ctx).await?;
    let request = CreateRoomRequest {
        name: Some("Letta Agents".to_string()),
        creation_content: Some(serde_json::json!({ "type": "m.space" })),
        ..Default::default()
    };
    let space_id = ctx.matrix.create_room(&admin_token, &request).await?;
    ctx.store.set_space(space_id.clone()).await?;
    tracing::info!(space_id, "created Letta Agents space");
    Ok(())
}

async fn admin_token(ctx: &BridgeContext) -> crate::error::BridgeResult<String> {
    let admin_user = format!("@{}:{}", ctx.config.matrix_admin_username, ctx.config.matrix_server_name);
    if let Some(token) = ctx.matrix.cached_token(&admin_user) {
        return Ok(token);
    }
    Ok(ctx
        .matrix
        .login(&ctx.config.matrix_admin_username, &ctx.config.matrix_admin_password)
        .await?)
}

async fn provision_agent(ctx: &BridgeContext, agent: &AgentState) -> crate::error::BridgeResult<()> {
    let agent_id = agent.id.to_string();
    let mut mapping = match ctx.store.get_mapping(&agent.id).await? {
        Some(mapping) => mapping,
        None => {
            let matrix_user_id = derive_matrix_user_id(&agent_id, &ctx.config.matrix_server_name);
            let mapping = AgentMapping {
                agent_id: agent_id.clone(),
                agent_name: agent.name.clone(),
                matrix_user_id,
                matrix_password: generate_password(&agent_id, ctx.config.dev_mode),
                room_id: None,
                created: false,
                room_created: false,
                space_bound: false,
                invitation_status: std::collections::HashMap::new(),
            };
            ctx.store.upsert_mapping(mapping.clone()).await?;
            mapping
        }
    };

    if !mapping.created {
        let admin_token = admin_token(ctx).await?;
        let localpart = mapping
            .matrix_user_id
            .trim_start_matches('@')
            .split(':')
            .next()
            .unwrap_or(&mapping.matrix_user_id)
            .to_string();
        match ctx
            .matrix
            .register_user_admin(&admin_token, &localpart, &mapping.matrix_password, &agent.name)
            .await
        {
            Ok(_) => {
                mapping.created = true;
                ctx.store.upsert_mapping(mapping.clone()).await?;
                Metrics::inc(&ctx.metrics.users_created);
            }
            Err(error) => return Err(error.into()),
        }
    }

    if !mapping.room_created {
        let agent_token = ctx
            .matrix
            .login(&mapping.matrix_user_id, &mapping.matrix_password)
            .await?;
        let request = CreateRoomRequest {
            name: Some(format!("{}{ROOM_NAME_SUFFIX}", agent.name)),
            preset: Some("private_chat"),
            invite: core_user_ids(ctx),
            is_direct: Some(false),
            initial_state: vec![StateEventInput {
                event_type: "m.room.guest_access".to_string(),
                state_key: String::new(),
                content: serde_json::json!({ "guest_access": "forbidden" }),
            }],
            ..Default::default()
        };
        let room_id = ctx.matrix.create_room(&agent_token, &request).await?;
        mapping.room_id = Some(room_id);
        mapping.room_created = true;
        ctx.store.upsert_mapping(mapping.clone()).await?;
        Metrics::inc(&ctx.metrics.rooms_created);
    }

    if let Some(room_id) = mapping.room_id.clone() {
        let mut dirty = false;

        if !mapping.space_bound {
            if let Some(space) = ctx.store.get_space().await? {
                let admin_token = admin_token(ctx).await?;
                match ctx
                    .matrix
                    .add_room_to_space(&admin_token, &space.space_id, &room_id, &ctx.config.matrix_server_name)
                    .await
                {
                    Ok(_) => {
                        mapping.space_bound = true;
                        dirty = true;
                    }
                    Err(error) => tracing::warn!(agent_id = %agent_id, %error, "failed to bind room to space"),
                }
            }
        }

        for core_user in core_user_ids(ctx) {
            let status = mapping.invitation_status.get(&core_user).cloned();
            if status.as_deref() != Some("joined") {
                if let Err(error) = invite_and_join_core_user(ctx, &room_id, &core_user).await {
                    tracing::warn!(agent_id = %agent_id, user = %core_user, %error, "core user invite/join failed");
                } else {
                    mapping.invitation_status.insert(core_user, "joined".to_string());
                    dirty = true;
                }
            }
        }

        if dirty {
            ctx.store.upsert_mapping(mapping.clone()).await?;
        }
    }

    if mapping.agent_name != agent.name {
        let admin_token = admin_token(ctx).await?;
        if let Some(room_id) = &mapping.room_id {
            if let Err(error) = ctx
                .matrix
                .set_room_name(&admin_token, room_id, &format!("{}{ROOM_NAME_SUFFIX}", agent.name))
                .await
            {
                tracing::warn!(agent_id = %agent_id, %error, "failed to rename room");
            }
        }
        if let Err(error) = ctx
            .matrix
            .set_displayname(&admin_token, &mapping.matrix_user_id, &agent.name)
            .await
        {
            tracing::warn!(agent_id = %agent_id, %error, "failed to rename display name");
        }
        mapping.agent_name = agent.name.clone();
        ctx.store.upsert_mapping(mapping).await?;
        Metrics::inc(&ctx.metrics.renames);
    }

    Ok(())
}

fn core_user_ids(ctx: &BridgeContext) -> Vec<String> {
    vec![
        format!("@{}:{}", ctx.config.matrix_admin_username, ctx.config.matrix_server_name),
        format!("@{}:{}", ctx.config.matrix_username, ctx.config.matrix_server_name),
        format!("@{}:{}", ctx.config.matrixadmin_username, ctx.config.matrix_server_name),
    ]
}

async fn invite_and_join_core_user(
    ctx: &BridgeContext,
    room_id: &str,
    user_id: &str,
) -> crate::error::BridgeResult<()> {
    let admin_token = admin_token(ctx).await?;
    ctx.matrix.invite(&admin_token, room_id, user_id).await?;

    let localpart = user_id.trim_start_matches('@').split(':').next().unwrap_or(user_id);
    let token = if let Some(token) = ctx.matrix.cached_token(user_id) {
        token
    } else if localpart == ctx.config.matrix_admin_username {
        admin_token.clone()
    } else if localpart == ctx.config.matrixadmin_username {
        ctx.matrix.login(&ctx.config.matrixadmin_username, &ctx.config.matrixadmin_password).await?
    } else {
        ctx.matrix.login(&ctx.config.matrix_username, &ctx.config.matrix_password).await?
    };
    ctx.matrix.join_room_with_backoff(&token, room_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_matrix_user_id_replaces_dashes() {
        let user_id = derive_matrix_user_id("agent-1234-5678", "example.org");
        assert_eq!(user_id, "@agent_1234_5678:example.org");
    }

    #[test]
    fn test_derive_matrix_user_id_strips_agent_prefix_without_doubling() {
        // Scenario S1's literal: agent id "agent-A" must map to "@agent_A",
        // not "@agent_agent_A".
        let user_id = derive_matrix_user_id("agent-A", "example.org");
        assert_eq!(user_id, "@agent_A:example.org");
    }

    #[test]
    fn test_derive_matrix_user_id_is_pure_function_of_id() {
        let a = derive_matrix_user_id("abc-123", "example.org");
        let b = derive_matrix_user_id("abc-123", "example.org");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dev_mode_password_is_deterministic() {
        let a = generate_password("agent-123", true);
        let b = generate_password("agent-123", true);
        assert_eq!(a, b);
        assert_eq!(a, "dev-agent-123");
    }

    #[test]
    fn test_non_dev_mode_password_is_random() {
        let a = generate_password("agent-123", false);
        let b = generate_password("agent-123", false);
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_metrics_snapshot_reflects_increments() {
        let metrics = Metrics::default();
        Metrics::inc(&metrics.agents_seen);
        Metrics::inc(&metrics.agents_seen);
        Metrics::inc(&metrics.errors);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.agents_seen, 2);
        assert_eq!(snapshot.errors, 1);
    }
}
