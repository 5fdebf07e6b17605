// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so misspelled keys fail at
//! startup instead of being ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroupdeskConfig {
    /// Routing, locking, and retry behaviour.
    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub intercom: IntercomConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Inbound HTTP server for Intercom webhooks.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Routing core settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Default tracing filter. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds before an abandoned provisioning lock expires.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// How long a contended message waits before re-reading the binding.
    #[serde(default = "default_contention_wait_ms")]
    pub contention_wait_ms: u64,

    /// Lifetime of a cached user -> contact mapping.
    #[serde(default = "default_contact_ttl_secs")]
    pub contact_ttl_secs: u64,

    /// Failed deliveries before a queued message is dead-lettered.
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    /// Interval of the pending-queue retry sweep.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Prepended to every support reply posted into a group.
    #[serde(default = "default_support_prefix")]
    pub support_prefix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            lock_ttl_secs: default_lock_ttl_secs(),
            contention_wait_ms: default_contention_wait_ms(),
            contact_ttl_secs: default_contact_ttl_secs(),
            max_delivery_attempts: default_max_delivery_attempts(),
            retry_interval_secs: default_retry_interval_secs(),
            support_prefix: default_support_prefix(),
        }
    }
}

impl RelayConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn contention_wait(&self) -> Duration {
        Duration::from_millis(self.contention_wait_ms)
    }

    pub fn contact_ttl(&self) -> Duration {
        Duration::from_secs(self.contact_ttl_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lock_ttl_secs() -> u64 {
    30
}

fn default_contention_wait_ms() -> u64 {
    1000
}

fn default_contact_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_delivery_attempts() -> u32 {
    5
}

fn default_retry_interval_secs() -> u64 {
    30
}

fn default_support_prefix() -> String {
    "[Support] ".to_string()
}

/// Telegram bot settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token from @BotFather. Required by `serve`.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// Intercom REST and webhook settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntercomConfig {
    /// Workspace access token. Required by `serve`.
    #[serde(default)]
    pub access_token: Option<String>,

    /// App client secret used to verify `X-Hub-Signature` on webhooks.
    /// Unsigned webhooks are accepted when unset.
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Value of the `Intercom-Version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for IntercomConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            client_secret: None,
            api_base: default_api_base(),
            api_version: default_api_version(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.intercom.io".to_string()
}

fn default_api_version() -> String {
    "2.11".to_string()
}

/// SQLite storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("groupdesk").join("groupdesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("groupdesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Webhook HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve Prometheus metrics at `GET /metrics`.
    #[serde(default)]
    pub metrics: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_defaults() {
        let relay = RelayConfig::default();
        assert_eq!(relay.lock_ttl(), Duration::from_secs(30));
        assert_eq!(relay.contention_wait(), Duration::from_secs(1));
        assert_eq!(relay.contact_ttl(), Duration::from_secs(86_400));
        assert_eq!(relay.max_delivery_attempts, 5);
        assert_eq!(relay.support_prefix, "[Support] ");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: GroupdeskConfig = toml::from_str("").unwrap();
        assert!(config.telegram.bot_token.is_none());
        assert_eq!(config.intercom.api_base, "https://api.intercom.io");
        assert_eq!(config.webhook.port, 3000);
        assert!(!config.webhook.metrics);
    }
}
