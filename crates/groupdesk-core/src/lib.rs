// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Groupdesk relay.
//!
//! Defines the message envelope, binding and queue types, the error type, and
//! the trait seams between the routing core, the platform adapters, and the
//! backing store.

pub mod error;
pub mod traits;
pub mod types;

pub use error::RelayError;
pub use types::{
    AdapterType, BridgeEvent, EventSender, GroupBinding, HealthStatus, Message, MessageId,
    Platform, QueuedMessage,
};

pub use traits::{
    BindingStore, ConversationPlatform, GroupLock, PendingQueue, PluginAdapter, SourcePlatform,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_error_has_all_variants() {
        let _config = RelayError::Config("test".into());
        let _storage = RelayError::storage(std::io::Error::other("test"));
        let _validation = RelayError::Validation("test".into());
        let _platform = RelayError::platform(Platform::Intercom, "test");
        let _not_found = RelayError::NotFound("contact".into());
        let _timeout = RelayError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = RelayError::Internal("test".into());
    }

    #[test]
    fn platform_error_display_names_platform() {
        let err = RelayError::platform(Platform::Telegram, "chat not found");
        assert_eq!(err.to_string(), "telegram error: chat not found");
        assert!(!err.is_storage());
        assert!(RelayError::storage(std::io::Error::other("down")).is_storage());
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Source,
            AdapterType::Conversation,
            AdapterType::Storage,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_source<T: SourcePlatform>() {}
        fn _assert_conversation<T: ConversationPlatform>() {}
        fn _assert_bindings<T: BindingStore>() {}
        fn _assert_lock<T: GroupLock>() {}
        fn _assert_queue<T: PendingQueue>() {}
    }
}
