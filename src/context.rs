//! Explicit, owned application context — resolves the "Global mutable
//! manager" redesign flag by replacing any `static`/`OnceLock` singleton
//! with a plain struct constructed once in `main` and passed by `Arc` into
//! every long-running task.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::AuthConfig;
use crate::client::{ClientBuilder, LettaClient};
use crate::config::Config;
use crate::error::{BridgeError, BridgeResult};
use crate::health;
use crate::matrix::{MatrixClient, MatrixClientBuilder};
use crate::provisioner::Metrics;
use crate::store::StateStore;
use crate::sync_loop;

/// Everything the bridge's background tasks need, constructed once at
/// startup and shared by reference for the life of the process.
pub struct BridgeContext {
    pub matrix: MatrixClient,
    pub letta: LettaClient,
    pub store: StateStore,
    pub config: Config,
    pub metrics: Arc<Metrics>,
    pub started_at: Instant,
}

impl BridgeContext {
    /// Build the context: open the state store, construct the Matrix and
    /// Letta clients, and log in the bridge's own `letta` identity so
    /// Event Ingress can start syncing immediately.
    pub async fn new(config: Config) -> BridgeResult<Arc<Self>> {
        config.validate()?;

        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = Path::new(&config.data_dir).join("bridge.sqlite3");
        let store = StateStore::open(&db_path).await?;

        let homeserver_url = Url::parse(&config.matrix_homeserver_url)
            .map_err(|e| BridgeError::config(format!("invalid MATRIX_HOMESERVER_URL: {e}")))?;
        let matrix = MatrixClientBuilder::new(homeserver_url).build()?;

        let mut letta_builder = ClientBuilder::new().base_url(&config.letta_api_url);
        if let Some(token) = &config.letta_token {
            letta_builder = letta_builder.auth(AuthConfig::bearer(token.clone()));
        }
        let letta = letta_builder.build()?;

        Ok(Arc::new(Self {
            matrix,
            letta,
            store,
            config,
            metrics: Arc::new(Metrics::default()),
            started_at: Instant::now(),
        }))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Run the bridge until shutdown. Thin wrapper around [`run`] so
    /// callers can write `ctx.run().await` against the `Arc<Self>` `new`
    /// returns, without needing to import the free function separately.
    pub async fn run(self: Arc<Self>) -> miette::Result<()> {
        run(self).await
    }
}

/// Run the bridge until a shutdown signal (`SIGINT`/`SIGTERM`) arrives:
/// spawns the Sync Loop, Event Ingress + Router, and the `/health` server as
/// sibling tasks sharing one [`CancellationToken`], then waits for all three
/// to wind down.
pub async fn run(ctx: Arc<BridgeContext>) -> miette::Result<()> {
    let cancellation = CancellationToken::new();

    let health_task = tokio::spawn(health::serve(ctx.clone(), cancellation.clone()));
    let sync_task = tokio::spawn(sync_loop::run(ctx.clone(), cancellation.clone()));
    let ingress_task = tokio::spawn(crate::ingress::run(ctx.clone(), cancellation.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
        _ = cancellation.cancelled() => {}
    }
    cancellation.cancel();

    let _ = tokio::join!(health_task, sync_task, ingress_task);
    tracing::info!("bridge shut down cleanly");
    Ok(())
}
