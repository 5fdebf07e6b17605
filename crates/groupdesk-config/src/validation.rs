// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization. All failures are collected.

use crate::diagnostic::ConfigError;
use crate::model::GroupdeskConfig;

pub fn validate_config(config: &GroupdeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let host = config.webhook.host.trim();
    if host.is_empty() {
        fail("webhook.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "webhook.host `{host}` is not a valid IP address or hostname"
        ));
    }

    let relay = &config.relay;
    for (key, value) in [
        ("relay.lock_ttl_secs", relay.lock_ttl_secs),
        ("relay.contact_ttl_secs", relay.contact_ttl_secs),
        ("relay.retry_interval_secs", relay.retry_interval_secs),
        (
            "relay.max_delivery_attempts",
            u64::from(relay.max_delivery_attempts),
        ),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    // The contention wait must finish well before the lock can expire.
    if relay.contention_wait_ms >= relay.lock_ttl_secs.saturating_mul(1000) && relay.lock_ttl_secs > 0
    {
        fail(format!(
            "relay.contention_wait_ms ({}) must be shorter than relay.lock_ttl_secs ({}s)",
            relay.contention_wait_ms, relay.lock_ttl_secs
        ));
    }

    if !config.intercom.api_base.starts_with("http://")
        && !config.intercom.api_base.starts_with("https://")
    {
        fail(format!(
            "intercom.api_base `{}` must be an http(s) URL",
            config.intercom.api_base
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
