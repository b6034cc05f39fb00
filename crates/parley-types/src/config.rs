//! Gateway configuration.
//!
//! `GatewayConfig` represents the `config.toml` in the Parley data directory.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the gateway.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// HMAC secret used to sign and verify bearer tokens. Empty means
    /// "use the generated key in the data directory".
    #[serde(default)]
    pub jwt_secret: String,

    /// Lifetime of tokens minted by `parley token`.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Upper bound on any single call to the identity service, group
    /// directory, or message log.
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,

    /// Maximum message length in characters.
    #[serde(default = "default_max_content_len")]
    pub max_content_len: usize,

    #[serde(default = "default_history_default_limit")]
    pub history_default_limit: u32,

    #[serde(default = "default_history_max_limit")]
    pub history_max_limit: u32,

    /// Capacity of each connection's outbound frame queue.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// User ids allowed to delete messages.
    #[serde(default)]
    pub admin_users: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_token_ttl_secs() -> u64 {
    86_400
}

fn default_collaborator_timeout_ms() -> u64 {
    5_000
}

fn default_max_content_len() -> usize {
    4_000
}

fn default_history_default_limit() -> u32 {
    50
}

fn default_history_max_limit() -> u32 {
    200
}

fn default_outbound_buffer() -> usize {
    256
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            max_content_len: default_max_content_len(),
            history_default_limit: default_history_default_limit(),
            history_max_limit: default_history_max_limit(),
            outbound_buffer: default_outbound_buffer(),
            admin_users: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn collaborator_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.collaborator_timeout_ms)
    }
}
