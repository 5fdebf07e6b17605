// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache-first mapping from source users to conversation-platform contacts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use groupdesk_core::types::{ContactProfile, Sender};
use groupdesk_core::{BindingStore, ConversationPlatform, RelayError};

pub struct ContactResolver {
    store: Arc<dyn BindingStore>,
    platform: Arc<dyn ConversationPlatform>,
    ttl: Duration,
}

impl ContactResolver {
    pub fn new(
        store: Arc<dyn BindingStore>,
        platform: Arc<dyn ConversationPlatform>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            platform,
            ttl,
        }
    }

    /// Returns the contact id for `sender`.
    ///
    /// A cache read error counts as a miss. A failed cache write is logged and
    /// the resolved id is still returned.
    pub async fn resolve(&self, sender: &Sender) -> Result<String, RelayError> {
        match self.store.get_contact(&sender.id).await {
            Ok(Some(contact_id)) => return Ok(contact_id),
            Ok(None) => {}
            Err(e) => warn!(user_id = %sender.id, error = %e, "contact cache read failed"),
        }

        let contact_id = self
            .platform
            .resolve_or_create_contact(&sender.id, &ContactProfile::from(sender))
            .await?;
        debug!(user_id = %sender.id, contact_id = %contact_id, "contact resolved");

        if let Err(e) = self
            .store
            .save_contact(&sender.id, &contact_id, self.ttl)
            .await
        {
            warn!(user_id = %sender.id, error = %e, "contact cache write failed");
        }
        Ok(contact_id)
    }

    /// Drops the cached mapping so the next message re-resolves the contact.
    pub async fn invalidate(&self, user_id: &str) {
        if let Err(e) = self.store.invalidate_contact(user_id).await {
            warn!(user_id, error = %e, "contact cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupdesk_test_utils::fixtures::group_message;
    use groupdesk_test_utils::{MemoryStore, MockConversationPlatform};

    fn resolver(
        store: &Arc<MemoryStore>,
        platform: &Arc<MockConversationPlatform>,
    ) -> ContactResolver {
        ContactResolver::new(store.clone(), platform.clone(), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn second_lookup_hits_cache() {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(MockConversationPlatform::new());
        let contacts = resolver(&store, &platform);
        let sender = group_message("1", "-1", "Ops", "hi").sender;

        assert_eq!(contacts.resolve(&sender).await.unwrap(), "contact-42");
        assert_eq!(contacts.resolve(&sender).await.unwrap(), "contact-42");
        assert_eq!(platform.contact_calls(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_remote_lookup() {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(MockConversationPlatform::new());
        let contacts = resolver(&store, &platform);
        let sender = group_message("1", "-1", "Ops", "hi").sender;

        contacts.resolve(&sender).await.unwrap();
        contacts.invalidate(&sender.id).await;
        contacts.resolve(&sender).await.unwrap();
        assert_eq!(platform.contact_calls(), 2);
    }

    #[tokio::test]
    async fn cache_outage_falls_back_to_platform() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_contacts(true);
        let platform = Arc::new(MockConversationPlatform::new());
        let contacts = resolver(&store, &platform);
        let sender = group_message("1", "-1", "Ops", "hi").sender;

        assert_eq!(contacts.resolve(&sender).await.unwrap(), "contact-42");
    }

    #[tokio::test]
    async fn platform_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(MockConversationPlatform::new());
        platform.set_fail_contacts(true);
        let contacts = resolver(&store, &platform);
        let sender = group_message("1", "-1", "Ops", "hi").sender;

        assert!(contacts.resolve(&sender).await.is_err());
    }
}
