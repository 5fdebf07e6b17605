// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use groupdesk_config::model::RelayConfig;

/// Runtime knobs of the routing core, derived from `[relay]`.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Sleep before a contended message re-reads the binding.
    pub contention_wait: Duration,
    pub contact_ttl: Duration,
    /// Failed deliveries after which a message is dead-lettered.
    pub max_delivery_attempts: u32,
    pub support_prefix: String,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            contention_wait: config.contention_wait(),
            contact_ttl: config.contact_ttl(),
            max_delivery_attempts: config.max_delivery_attempts,
            support_prefix: config.support_prefix.clone(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}
