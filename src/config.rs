//! Process configuration, loaded once from the environment at startup.
//!
//! Generalizes the teacher's `cli::Args` pattern (one field per
//! `#[arg(long, env = "...")]`) from a single `LETTA_BASE_URL`/`LETTA_API_KEY`
//! pair to the bridge's full environment surface. `Config::parse()` is called
//! exactly once, in `main`; nothing downstream reads `std::env` again.

use clap::Parser;

use crate::error::{BridgeError, BridgeResult};

/// Minimum allowed `SYNC_INTERVAL_SECONDS` — below this the bridge would
/// risk repeating the login storm (~200 logins/sec, 76% homeserver CPU)
/// that forced the interval up from its historical 0.5s default.
pub const MIN_SYNC_INTERVAL_SECONDS: u64 = 10;

/// Bridge process configuration, bound to environment variables via `clap`.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Bridges Letta agents onto a Matrix homeserver")]
pub struct Config {
    /// Base URL of the Matrix homeserver's client-server API.
    #[arg(long, env = "MATRIX_HOMESERVER_URL")]
    pub matrix_homeserver_url: String,

    /// The homeserver's server name, used to construct Matrix user IDs
    /// (`@agent_<id>:<server_name>`).
    #[arg(long, env = "MATRIX_SERVER_NAME")]
    pub matrix_server_name: String,

    /// Username of the Matrix admin account used for user/room provisioning.
    #[arg(long, env = "MATRIX_ADMIN_USERNAME")]
    pub matrix_admin_username: String,

    /// Password of the Matrix admin account.
    #[arg(long, env = "MATRIX_ADMIN_PASSWORD")]
    pub matrix_admin_password: String,

    /// Username of the bridge's own "letta" Matrix identity — the account
    /// that actually joins agent rooms and relays messages.
    #[arg(long, env = "MATRIX_USERNAME")]
    pub matrix_username: String,

    /// Password of the bridge's "letta" Matrix identity.
    #[arg(long, env = "MATRIX_PASSWORD")]
    pub matrix_password: String,

    /// Username of the third core identity (`matrixadmin`), invited into
    /// every agent room alongside `admin` and `letta`.
    #[arg(long, env = "MATRIXADMIN_USERNAME", default_value = "matrixadmin")]
    pub matrixadmin_username: String,

    /// Password of the `matrixadmin` core identity.
    #[arg(long, env = "MATRIXADMIN_PASSWORD")]
    pub matrixadmin_password: String,

    /// Base URL of the Letta server's REST API.
    #[arg(long, env = "LETTA_API_URL", default_value = "http://localhost:8283")]
    pub letta_api_url: String,

    /// Bearer token for the Letta API, if the server requires one.
    #[arg(long, env = "LETTA_TOKEN")]
    pub letta_token: Option<String>,

    /// Directory holding the bridge's sqlite state store.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Seconds between Provisioner reconciliation passes.
    #[arg(long, env = "SYNC_INTERVAL_SECONDS", default_value_t = 60)]
    pub sync_interval_seconds: u64,

    /// TTL, in seconds, for entries in the processed-events dedupe table.
    #[arg(long, env = "EVENT_DEDUPE_TTL_SECONDS", default_value_t = 3600)]
    pub event_dedupe_ttl_seconds: u64,

    /// Bind address for the `/health` HTTP server.
    #[arg(long, env = "HEALTH_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub health_bind_addr: String,

    /// Use well-known, fixed passwords for generated agent identities
    /// instead of securely-random ones. Only for local/test use; refused
    /// outside of it unless credentials are also non-empty.
    #[arg(long, env = "DEV_MODE", default_value_t = false)]
    pub dev_mode: bool,
}

impl Config {
    /// Validate cross-field invariants that `clap` can't express on its own.
    /// Called once, right after [`Config::parse`], before any task is
    /// spawned — a validation failure is fatal at startup, never mid-cycle.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.sync_interval_seconds < MIN_SYNC_INTERVAL_SECONDS {
            return Err(BridgeError::config(format!(
                "SYNC_INTERVAL_SECONDS must be >= {MIN_SYNC_INTERVAL_SECONDS} (got {})",
                self.sync_interval_seconds
            )));
        }

        if !self.dev_mode {
            if self.matrix_admin_password.is_empty()
                || self.matrix_password.is_empty()
                || self.matrixadmin_password.is_empty()
            {
                return Err(BridgeError::config(
                    "MATRIX_ADMIN_PASSWORD, MATRIX_PASSWORD and MATRIXADMIN_PASSWORD must be set outside DEV_MODE",
                ));
            }
        }

        if self.matrix_homeserver_url.parse::<url::Url>().is_err() {
            return Err(BridgeError::config(format!(
                "MATRIX_HOMESERVER_URL is not a valid URL: {}",
                self.matrix_homeserver_url
            )));
        }

        if self.letta_api_url.parse::<url::Url>().is_err() {
            return Err(BridgeError::config(format!(
                "LETTA_API_URL is not a valid URL: {}",
                self.letta_api_url
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            matrix_homeserver_url: "https://matrix.example.org".to_string(),
            matrix_server_name: "example.org".to_string(),
            matrix_admin_username: "admin".to_string(),
            matrix_admin_password: "adminpass".to_string(),
            matrix_username: "letta".to_string(),
            matrix_password: "lettapass".to_string(),
            matrixadmin_username: "matrixadmin".to_string(),
            matrixadmin_password: "matrixadminpass".to_string(),
            letta_api_url: "http://localhost:8283".to_string(),
            letta_token: None,
            data_dir: "./data".to_string(),
            sync_interval_seconds: 60,
            event_dedupe_ttl_seconds: 3600,
            health_bind_addr: "0.0.0.0:8080".to_string(),
            dev_mode: false,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_sync_interval_below_floor() {
        let mut config = base_config();
        config.sync_interval_seconds = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_credentials_outside_dev_mode() {
        let mut config = base_config();
        config.matrix_password = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_empty_credentials_in_dev_mode() {
        let mut config = base_config();
        config.matrix_password = String::new();
        config.dev_mode = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_homeserver_url() {
        let mut config = base_config();
        config.matrix_homeserver_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
