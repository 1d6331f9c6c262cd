//! Wiremock-backed integration tests for the Provisioner reconciliation
//! scenarios (S1, S2, S3), plus a store-only test for the wrong-agent
//! routing guard (S5). Mirrors the teacher's `wiremock` + table-of-mocks
//! integration test style.

use std::collections::HashMap;

use letta_matrix_bridge::config::Config;
use letta_matrix_bridge::context::BridgeContext;
use letta_matrix_bridge::provisioner::{derive_matrix_user_id, run_cycle};
use letta_matrix_bridge::store::AgentMapping;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn percent_decode(segment: &str) -> String {
    url::form_urlencoded::parse(segment.as_bytes())
        .map(|(k, v)| if v.is_empty() { k.into_owned() } else { format!("{k}{v}") })
        .collect::<Vec<_>>()
        .join("")
}

fn slugify(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// A syntactically valid `LettaId` string (`agent-<uuid>`) for test fixture
/// agent `n`, since `AgentState::id` round-trips through `LettaId::FromStr`.
fn agent_uuid_id(n: u32) -> String {
    format!("agent-00000000-0000-0000-0000-{n:012}")
}

async fn mount_matrix_mocks(matrix: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/_matrix/client/v3/login"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or_default();
            let user = body["identifier"]["user"]
                .as_str()
                .unwrap_or("@unknown:example.org")
                .to_string();
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": format!("tok-{user}"),
                "user_id": user,
            }))
        })
        .mount(matrix)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/_synapse/admin/v2/users/.+$"))
        .respond_with(|req: &Request| {
            let segment = req.url.path().rsplit('/').next().unwrap_or("unknown");
            ResponseTemplate::new(200).set_body_json(json!({ "name": percent_decode(segment) }))
        })
        .mount(matrix)
        .await;

    Mock::given(method("POST"))
        .and(path("/_matrix/client/v3/createRoom"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or_default();
            let name = body["name"].as_str().unwrap_or("room").to_string();
            ResponseTemplate::new(200).set_body_json(json!({ "room_id": format!("!{}:example.org", slugify(&name)) }))
        })
        .mount(matrix)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/[^/]+/state/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$stateevent" })))
        .mount(matrix)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/rooms/[^/]+/invite$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(matrix)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/_matrix/client/v3/join/.+$"))
        .respond_with(|req: &Request| {
            let segment = req.url.path().rsplit('/').next().unwrap_or("!room:example.org");
            ResponseTemplate::new(200).set_body_json(json!({ "room_id": percent_decode(segment) }))
        })
        .mount(matrix)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/_matrix/client/v3/profile/.+/displayname$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(matrix)
        .await;
}

fn agents_fixture(agents: &[(&str, &str)]) -> serde_json::Value {
    json!(agents
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect::<Vec<_>>())
}

async fn mount_letta_agents(letta: &MockServer, agents: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v1/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agents))
        .mount(letta)
        .await;
}

async fn test_context(matrix: &MockServer, letta: &MockServer) -> std::sync::Arc<BridgeContext> {
    let data_dir = tempfile::tempdir().unwrap();
    let config = Config {
        matrix_homeserver_url: matrix.uri(),
        matrix_server_name: "example.org".to_string(),
        matrix_admin_username: "admin".to_string(),
        matrix_admin_password: "adminpass".to_string(),
        matrix_username: "letta".to_string(),
        matrix_password: "lettapass".to_string(),
        matrixadmin_username: "matrixadmin".to_string(),
        matrixadmin_password: "matrixadminpass".to_string(),
        letta_api_url: letta.uri(),
        letta_token: None,
        data_dir: data_dir.path().to_string_lossy().into_owned(),
        sync_interval_seconds: 60,
        event_dedupe_ttl_seconds: 3600,
        health_bind_addr: "127.0.0.1:0".to_string(),
        dev_mode: true,
    };
    // Outlives the context: the sqlite file must stay put for the test's duration.
    std::mem::forget(data_dir);
    BridgeContext::new(config).await.unwrap()
}

/// S1 — cold start, one agent: after one cycle the agent has a mapping with
/// a derived Matrix user ID, a created account, and a created room bound
/// into exactly one space.
#[tokio::test]
async fn s1_cold_start_single_agent_is_fully_provisioned() {
    let matrix = MockServer::start().await;
    let letta = MockServer::start().await;
    mount_matrix_mocks(&matrix).await;
    let agent_id = agent_uuid_id(1);
    mount_letta_agents(&letta, agents_fixture(&[(agent_id.as_str(), "Alpha")])).await;

    let ctx = test_context(&matrix, &letta).await;
    run_cycle(&ctx).await;

    let mapping = ctx.store.get_mapping(&agent_id.parse().unwrap()).await.unwrap();
    let mapping = mapping.expect("agent should have been provisioned");
    // Literal expected value per scenario S1's formula (the "agent-" type
    // prefix is stripped before the "@agent_" localpart is built, so the two
    // tags don't double up).
    assert_eq!(
        mapping.matrix_user_id,
        "@agent_00000000_0000_0000_0000_000000000001:example.org"
    );
    assert!(mapping.created);
    assert!(mapping.room_created);
    assert!(mapping.room_id.is_some());

    let space = ctx.store.get_space().await.unwrap();
    assert!(space.is_some(), "a Letta Agents space should have been created");
}

/// S2 — duplicate discovery: two distinct agent IDs that happen to share a
/// display name still get distinct Matrix identities and distinct mappings.
/// Room ID uniqueness is deliberately not asserted.
#[tokio::test]
async fn s2_duplicate_agent_names_get_distinct_identities() {
    let matrix = MockServer::start().await;
    let letta = MockServer::start().await;
    mount_matrix_mocks(&matrix).await;
    let id1 = agent_uuid_id(11);
    let id2 = agent_uuid_id(12);
    mount_letta_agents(
        &letta,
        agents_fixture(&[(id1.as_str(), "letta-cli-agent"), (id2.as_str(), "letta-cli-agent")]),
    )
    .await;

    let ctx = test_context(&matrix, &letta).await;
    run_cycle(&ctx).await;

    let mapping1 = ctx.store.get_mapping(&id1.parse().unwrap()).await.unwrap().unwrap();
    let mapping2 = ctx.store.get_mapping(&id2.parse().unwrap()).await.unwrap().unwrap();

    assert_ne!(mapping1.matrix_user_id, mapping2.matrix_user_id);
    assert!(mapping1.created && mapping1.room_created);
    assert!(mapping2.created && mapping2.room_created);
}

/// S3 — rename: a pre-existing mapping whose Letta agent has been renamed
/// picks up the new name, room name, and display name after one cycle, with
/// the Matrix user ID left untouched.
#[tokio::test]
async fn s3_rename_propagates_in_one_cycle() {
    let matrix = MockServer::start().await;
    let letta = MockServer::start().await;
    mount_matrix_mocks(&matrix).await;
    let agent_id = agent_uuid_id(21);
    mount_letta_agents(&letta, agents_fixture(&[(agent_id.as_str(), "Beta")])).await;

    let ctx = test_context(&matrix, &letta).await;
    let original_user_id = derive_matrix_user_id(&agent_id, "example.org");
    ctx.store
        .upsert_mapping(AgentMapping {
            agent_id: agent_id.clone(),
            agent_name: "Alpha".to_string(),
            matrix_user_id: original_user_id.clone(),
            matrix_password: "dev-agent".to_string(),
            room_id: Some("!r:example.org".to_string()),
            created: true,
            room_created: true,
            space_bound: true,
            invitation_status: HashMap::new(),
        })
        .await
        .unwrap();

    run_cycle(&ctx).await;

    let mapping = ctx.store.get_mapping(&agent_id.parse().unwrap()).await.unwrap().unwrap();
    assert_eq!(mapping.agent_name, "Beta");
    assert_eq!(mapping.matrix_user_id, original_user_id, "renaming must never change the Matrix user ID");

    let requests = matrix.received_requests().await.unwrap();
    let room_name_set = requests.iter().any(|req| {
        req.method.as_str() == "PUT"
            && req.url.path().contains("/state/m.room.name/")
            && String::from_utf8_lossy(&req.body).contains("Beta - Letta Agent Chat")
    });
    assert!(room_name_set, "expected a m.room.name state event containing the new name");

    let displayname_set = requests.iter().any(|req| {
        req.method.as_str() == "PUT"
            && req.url.path().ends_with("/displayname")
            && String::from_utf8_lossy(&req.body).contains("Beta")
    });
    assert!(displayname_set, "expected a displayname update containing the new name");
}

/// Invariant 6 — idempotent reconciliation: running a second cycle over an
/// unchanged agent roster performs no further Matrix writes and leaves the
/// mapping byte-for-byte identical.
#[tokio::test]
async fn invariant_6_repeat_cycle_over_unchanged_agent_is_a_no_op() {
    let matrix = MockServer::start().await;
    let letta = MockServer::start().await;
    mount_matrix_mocks(&matrix).await;
    let agent_id = agent_uuid_id(31);
    mount_letta_agents(&letta, agents_fixture(&[(agent_id.as_str(), "Gamma")])).await;

    let ctx = test_context(&matrix, &letta).await;
    run_cycle(&ctx).await;

    let mapping_after_first = ctx.store.get_mapping(&agent_id.parse().unwrap()).await.unwrap().unwrap();
    let requests_after_first = matrix.received_requests().await.unwrap().len();

    run_cycle(&ctx).await;

    let mapping_after_second = ctx.store.get_mapping(&agent_id.parse().unwrap()).await.unwrap().unwrap();
    let requests_after_second = matrix.received_requests().await.unwrap().len();

    assert_eq!(mapping_after_first, mapping_after_second, "unchanged agent must not mutate its mapping");
    assert_eq!(requests_after_first, requests_after_second, "unchanged agent must trigger no further Matrix requests");
}

/// S5 — wrong-agent routing guard: among many mappings, looking a room up
/// by ID returns only that room's own agent, never a neighbor's.
#[tokio::test]
async fn s5_routing_guard_holds_across_many_mappings() {
    let matrix = MockServer::start().await;
    let letta = MockServer::start().await;
    mount_matrix_mocks(&matrix).await;
    mount_letta_agents(&letta, agents_fixture(&[])).await;
    let ctx = test_context(&matrix, &letta).await;

    for i in 0..56 {
        let agent_id = format!("agent-{i}");
        ctx.store
            .upsert_mapping(AgentMapping {
                agent_id: agent_id.clone(),
                agent_name: format!("Agent {i}"),
                matrix_user_id: derive_matrix_user_id(&agent_id, "example.org"),
                matrix_password: "dev".to_string(),
                room_id: Some(format!("!room{i}:example.org")),
                created: true,
                room_created: true,
                space_bound: true,
                invitation_status: HashMap::new(),
            })
            .await
            .unwrap();
    }

    let target = ctx.store.get_mapping_by_room("!room50:example.org").await.unwrap();
    let target = target.expect("room50 should have a mapping");
    assert_eq!(target.agent_id, "agent-50");

    for i in 0..56 {
        if i == 50 {
            continue;
        }
        let other = ctx
            .store
            .get_mapping_by_room(&format!("!room{i}:example.org"))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(other.agent_id, "agent-50", "room{i} must never resolve to agent-50's mapping");
    }
}
