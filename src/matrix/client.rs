//! Matrix Client-Server API client.
//!
//! Grounded on [`crate::client::LettaClient`]'s HTTP-verb-method-plus-retry
//! shape, but the Matrix side has a wrinkle the Letta side doesn't: the
//! bridge speaks as many different Matrix identities (an admin account, a
//! bot account per agent), not one fixed bearer token. Every authenticated
//! call therefore takes an explicit `token`, and [`MatrixClient`] itself is
//! shared (behind an `Arc`) across all of them, caching access tokens by
//! Matrix user ID so repeat calls skip the login round-trip.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::error::MatrixError;
use super::types::{
    AdminPutUserRequest, AdminPutUserResponse, CreateRoomRequest, CreateRoomResponse,
    JoinedRoomsResponse, LoginRequest, LoginResponse, RegisterAuth, RegisterRequest,
    RegisterResponse, RoomEvent, RoomNameContent, SendEventResponse, SpaceChildContent,
    SpaceParentContent, StateEventInput, SyncFilter, SyncResponse, TextMessageContent,
    WhoamiResponse,
};
use crate::retry::{retry_with_config, RetryConfig};

type MatrixResult<T> = Result<T, MatrixError>;

/// Golden-ratio backoff base used when retrying a room join — mirrors the
/// backoff curve bridge/echo bots commonly use against `M_FORBIDDEN` races
/// right after an invite is sent (the invite hasn't propagated to every
/// worker on the homeserver's federation queue yet).
const JOIN_BACKOFF_BASE: f64 = 1.618_033_988_749_895;
const JOIN_BACKOFF_MAX_ATTEMPTS: u32 = 16;

/// Configuration for constructing a [`MatrixClient`].
#[derive(Debug, Clone)]
pub struct MatrixClientConfig {
    pub homeserver_url: Url,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl MatrixClientConfig {
    pub fn new(homeserver_url: Url) -> Self {
        Self {
            homeserver_url,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Builder for [`MatrixClient`], following the same shape as
/// [`crate::client::ClientBuilder`].
pub struct MatrixClientBuilder {
    config: MatrixClientConfig,
}

impl MatrixClientBuilder {
    pub fn new(homeserver_url: Url) -> Self {
        Self {
            config: MatrixClientConfig::new(homeserver_url),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> MatrixResult<MatrixClient> {
        MatrixClient::new(self.config)
    }
}

/// A client for the Matrix Client-Server API, shared across every identity
/// the bridge operates (admin account, per-agent bot accounts).
pub struct MatrixClient {
    http: reqwest::Client,
    homeserver_url: Url,
    retry: RetryConfig,
    /// Matrix user ID -> cached access token.
    tokens: RwLock<HashMap<String, String>>,
}

impl MatrixClient {
    pub fn new(config: MatrixClientConfig) -> MatrixResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            homeserver_url: config.homeserver_url,
            retry: config.retry,
            tokens: RwLock::new(HashMap::new()),
        })
    }

    pub fn builder(homeserver_url: Url) -> MatrixClientBuilder {
        MatrixClientBuilder::new(homeserver_url)
    }

    fn url(&self, path: &str) -> MatrixResult<Url> {
        Ok(self.homeserver_url.join(path)?)
    }

    /// Cached access token for `user_id`, if this client has logged it in
    /// (or had one set via [`Self::set_token`]) since the process started.
    pub fn cached_token(&self, user_id: &str) -> Option<String> {
        self.tokens.read().unwrap().get(user_id).cloned()
    }

    /// Seed the token cache directly, e.g. with a token loaded from the
    /// state store rather than obtained via a fresh login.
    pub fn set_token(&self, user_id: impl Into<String>, token: impl Into<String>) {
        self.tokens.write().unwrap().insert(user_id.into(), token.into());
    }

    /// Drop a cached token, e.g. after a call comes back 401 — the caller
    /// should re-login and retry rather than keep using a dead token.
    pub fn forget_token(&self, user_id: &str) {
        self.tokens.write().unwrap().remove(user_id);
    }

    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        query: Option<&[(&str, String)]>,
        body: Option<&impl Serialize>,
    ) -> MatrixResult<reqwest::Response> {
        let mut url = self.url(path)?;
        if let Some(query) = query {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let mut req = self.http.request(method, url);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        Ok(req.send().await?)
    }

    /// Issue a request and decode the JSON body, translating non-2xx
    /// responses into [`MatrixError::Api`].
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        query: Option<&[(&str, String)]>,
        body: Option<&impl Serialize>,
    ) -> MatrixResult<T> {
        let response = self.send_raw(method, path, token, query, body).await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after_ms = status
                .eq(&StatusCode::TOO_MANY_REQUESTS)
                .then(|| {
                    response
                        .headers()
                        .get("retry-after")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok().map(|secs| secs * 1000))
                })
                .flatten();
            let text = response.text().await.unwrap_or_default();
            return Err(MatrixError::from_response(status.as_u16(), &text, retry_after_ms));
        }

        Ok(response.json().await?)
    }

    /// Log in with a password and cache the resulting access token under its
    /// user ID. Returns the token.
    pub async fn login(&self, user_id: &str, password: &str) -> MatrixResult<String> {
        let request = LoginRequest::password(user_id, password);
        let response: LoginResponse = retry_with_config(&self.retry, || {
            self.request(Method::POST, "_matrix/client/v3/login", None, None, Some(&request))
        })
        .await?;

        self.set_token(response.user_id, response.access_token.clone());
        Ok(response.access_token)
    }

    /// Register a new account via the `m.login.dummy` flow (appropriate for
    /// homeservers with open or admin-API-gated registration).
    pub async fn register(&self, username: &str, password: &str) -> MatrixResult<RegisterResponse> {
        let request = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            auth: RegisterAuth::dummy(),
            initial_device_display_name: "letta-matrix-bridge".to_string(),
            inhibit_login: false,
        };
        let response: RegisterResponse = retry_with_config(&self.retry, || {
            self.request(Method::POST, "_matrix/client/v3/register", None, None, Some(&request))
        })
        .await?;

        if let Some(token) = &response.access_token {
            self.set_token(response.user_id.clone(), token.clone());
        }
        Ok(response)
    }

    /// Return the Matrix user ID a token is valid for; also a cheap
    /// liveness check for a cached token.
    pub async fn whoami(&self, token: &str) -> MatrixResult<String> {
        let response: WhoamiResponse = self
            .request::<WhoamiResponse>(
                Method::GET,
                "_matrix/client/v3/account/whoami",
                Some(token),
                None,
                None::<&()>,
            )
            .await?;
        Ok(response.user_id)
    }

    pub async fn create_room(&self, token: &str, request: &CreateRoomRequest) -> MatrixResult<String> {
        let response: CreateRoomResponse = retry_with_config(&self.retry, || {
            self.request(
                Method::POST,
                "_matrix/client/v3/createRoom",
                Some(token),
                None,
                Some(request),
            )
        })
        .await?;
        Ok(response.room_id)
    }

    pub async fn invite(&self, token: &str, room_id: &str, user_id: &str) -> MatrixResult<()> {
        #[derive(Serialize)]
        struct InviteBody<'a> {
            user_id: &'a str,
        }
        let path = format!("_matrix/client/v3/rooms/{room_id}/invite");
        retry_with_config(&self.retry, || {
            self.request::<serde_json::Value>(
                Method::POST,
                &path,
                Some(token),
                None,
                Some(&InviteBody { user_id }),
            )
        })
        .await?;
        Ok(())
    }

    /// Join a room, or accept a pending invite. Not retried automatically —
    /// callers racing an invite's federation propagation should use
    /// [`Self::join_room_with_backoff`] instead.
    pub async fn join_room(&self, token: &str, room_id_or_alias: &str) -> MatrixResult<String> {
        let path = format!(
            "_matrix/client/v3/join/{}",
            urlencoding_component(room_id_or_alias)
        );
        let response: CreateRoomResponse = self
            .request(Method::POST, &path, Some(token), None, Some(&serde_json::json!({})))
            .await?;
        Ok(response.room_id)
    }

    /// Join a room, retrying with golden-ratio backoff while the homeserver
    /// returns `M_FORBIDDEN` — the window between an invite landing in the
    /// invitee's `/sync` and the join actually being accepted.
    pub async fn join_room_with_backoff(&self, token: &str, room_id: &str) -> MatrixResult<()> {
        let mut attempt = 0u32;
        loop {
            match self.join_room(token, room_id).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_forbidden() && attempt < JOIN_BACKOFF_MAX_ATTEMPTS => {
                    let secs = JOIN_BACKOFF_BASE.powi(attempt as i32).min(60.0);
                    tracing::warn!(room_id, attempt, seconds = secs, "join forbidden, backing off");
                    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn leave_room(&self, token: &str, room_id: &str) -> MatrixResult<()> {
        let path = format!("_matrix/client/v3/rooms/{room_id}/leave");
        self.request::<serde_json::Value>(Method::POST, &path, Some(token), None, Some(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    pub async fn send_state_event(
        &self,
        token: &str,
        room_id: &str,
        event: &StateEventInput,
    ) -> MatrixResult<String> {
        let path = format!(
            "_matrix/client/v3/rooms/{room_id}/state/{}/{}",
            event.event_type, event.state_key
        );
        let response: SendEventResponse = retry_with_config(&self.retry, || {
            self.request(Method::PUT, &path, Some(token), None, Some(&event.content))
        })
        .await?;
        Ok(response.event_id)
    }

    /// Send a text message, idempotently keyed by `txn_id` — safe to retry
    /// without risking a duplicate if the bridge crashes mid-send and
    /// replays the same inbound/outbound pair after restart.
    pub async fn send_message(
        &self,
        token: &str,
        room_id: &str,
        txn_id: &str,
        content: &TextMessageContent,
    ) -> MatrixResult<String> {
        let path = format!("_matrix/client/v3/rooms/{room_id}/send/m.room.message/{txn_id}");
        let response: SendEventResponse = retry_with_config(&self.retry, || {
            self.request(Method::PUT, &path, Some(token), None, Some(content))
        })
        .await?;
        Ok(response.event_id)
    }

    /// Provision a ghost user via the Synapse admin API, logging in as
    /// `admin_token`. `M_USER_IN_USE`-equivalent (a 200 with an existing
    /// account) is the common case for a user the bridge has already
    /// created in a previous run — Synapse's admin `PUT` is idempotent, so
    /// this never needs a separate "already exists" branch.
    pub async fn register_user_admin(
        &self,
        admin_token: &str,
        user_id: &str,
        password: &str,
        displayname: &str,
    ) -> MatrixResult<String> {
        let path = format!("_synapse/admin/v2/users/{user_id}");
        let request = AdminPutUserRequest {
            password: password.to_string(),
            displayname: displayname.to_string(),
            admin: false,
        };
        let response: AdminPutUserResponse = retry_with_config(&self.retry, || {
            self.request(Method::PUT, &path, Some(admin_token), None, Some(&request))
        })
        .await?;
        Ok(response.name)
    }

    /// List the rooms `token`'s identity has joined.
    pub async fn joined_rooms(&self, token: &str) -> MatrixResult<Vec<String>> {
        let response: JoinedRoomsResponse = self
            .request(
                Method::GET,
                "_matrix/client/v3/joined_rooms",
                Some(token),
                None,
                None::<&()>,
            )
            .await?;
        Ok(response.joined_rooms)
    }

    /// Fetch the full current state of a room.
    pub async fn get_room_state(&self, token: &str, room_id: &str) -> MatrixResult<Vec<RoomEvent>> {
        let path = format!("_matrix/client/v3/rooms/{room_id}/state");
        self.request(Method::GET, &path, Some(token), None, None::<&()>).await
    }

    /// Set `m.room.name` on a room.
    pub async fn set_room_name(&self, token: &str, room_id: &str, name: &str) -> MatrixResult<String> {
        let event = StateEventInput {
            event_type: "m.room.name".to_string(),
            state_key: String::new(),
            content: serde_json::to_value(RoomNameContent { name: name.to_string() })?,
        };
        self.send_state_event(token, room_id, &event).await
    }

    /// Idempotently bind `room_id` into `space_id`: set `m.space.child` on
    /// the space and `m.space.parent` on the room.
    pub async fn add_room_to_space(
        &self,
        admin_token: &str,
        space_id: &str,
        room_id: &str,
        server_name: &str,
    ) -> MatrixResult<()> {
        let child_event = StateEventInput {
            event_type: "m.space.child".to_string(),
            state_key: room_id.to_string(),
            content: serde_json::to_value(SpaceChildContent {
                via: vec![server_name.to_string()],
                suggested: Some(false),
                order: None,
            })?,
        };
        self.send_state_event(admin_token, space_id, &child_event).await?;

        let parent_event = StateEventInput {
            event_type: "m.space.parent".to_string(),
            state_key: space_id.to_string(),
            content: serde_json::to_value(SpaceParentContent {
                via: vec![server_name.to_string()],
                canonical: true,
            })?,
        };
        self.send_state_event(admin_token, room_id, &parent_event).await?;

        Ok(())
    }

    pub async fn set_displayname(&self, token: &str, user_id: &str, name: &str) -> MatrixResult<()> {
        #[derive(Serialize)]
        struct DisplaynameBody<'a> {
            displayname: &'a str,
        }
        let path = format!("_matrix/client/v3/profile/{user_id}/displayname");
        self.request::<serde_json::Value>(
            Method::PUT,
            &path,
            Some(token),
            None,
            Some(&DisplaynameBody { displayname: name }),
        )
        .await?;
        Ok(())
    }

    /// Long-poll `/sync`. `since` is `None` only on the very first call
    /// (initial sync, no timeout applied so it returns immediately).
    pub async fn sync(
        &self,
        token: &str,
        since: Option<&str>,
        filter: &SyncFilter,
        timeout: Duration,
    ) -> MatrixResult<SyncResponse> {
        let filter_json = serde_json::to_string(filter)?;
        let timeout_ms = if since.is_some() { timeout.as_millis() as u64 } else { 0 };
        let mut query = vec![
            ("filter".to_string(), filter_json),
            ("timeout".to_string(), timeout_ms.to_string()),
        ];
        if let Some(since) = since {
            query.push(("since".to_string(), since.to_string()));
        }
        let query_refs: Vec<(&str, String)> =
            query.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

        // /sync is long-lived by design; the request itself should not be
        // retried with the default (short) backoff policy — a network blip
        // just means the next loop iteration re-issues the same `since`.
        self.request(
            Method::GET,
            "_matrix/client/v3/sync",
            Some(token),
            Some(&query_refs),
            None::<&()>,
        )
        .await
    }
}

/// Percent-encode a single path segment (room IDs contain `!` and `:`,
/// which must be escaped to appear inside a URL path segment).
fn urlencoding_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
