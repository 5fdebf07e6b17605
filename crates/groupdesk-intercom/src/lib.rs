// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intercom conversation adapter for Groupdesk.
//!
//! [`IntercomPlatform`] implements [`ConversationPlatform`] over the REST
//! API. The [`webhook`] module receives teammate replies.

pub mod client;
pub mod types;
pub mod webhook;

use async_trait::async_trait;
use groupdesk_config::model::IntercomConfig;
use groupdesk_core::error::RelayError;
use groupdesk_core::traits::{ConversationPlatform, PluginAdapter};
use groupdesk_core::types::{
    AdapterType, ContactProfile, ConversationMetadata, HealthStatus, Platform, RemoteConversation,
};
use tracing::{debug, info, warn};

use crate::client::{ContactCreation, IntercomClient};
use crate::types::attribute_string;

/// Custom attribute holding the bound group id.
pub const GROUP_ID_ATTRIBUTE: &str = "group_id";

/// Intercom adapter implementing [`ConversationPlatform`].
pub struct IntercomPlatform {
    client: IntercomClient,
}

impl IntercomPlatform {
    /// Creates a new Intercom adapter.
    ///
    /// Requires `config.access_token` to be set.
    pub fn new(config: &IntercomConfig) -> Result<Self, RelayError> {
        let token = config
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                RelayError::Config("intercom.access_token is required for the Intercom adapter".into())
            })?;

        let client = IntercomClient::new(token, &config.api_version, &config.api_base)?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: IntercomClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &IntercomClient {
        &self.client
    }
}

#[async_trait]
impl PluginAdapter for IntercomPlatform {
    fn name(&self) -> &str {
        "intercom"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Conversation
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        match self.client.me().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("Intercom unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        debug!("Intercom adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl ConversationPlatform for IntercomPlatform {
    async fn create_conversation(
        &self,
        contact_id: &str,
        display_name: &str,
        initial_text: &str,
        metadata: &ConversationMetadata,
    ) -> Result<String, RelayError> {
        let conversation_id = self
            .client
            .create_conversation(contact_id, initial_text)
            .await?;
        info!(
            conversation_id = %conversation_id,
            group_id = %metadata.group_id,
            opened_by = display_name,
            "Intercom conversation created"
        );

        let attributes = serde_json::json!({
            "group_name": metadata.group_name,
            "group_id": metadata.group_id,
            "first_message_time": metadata.first_message_time.to_rfc3339(),
        });
        // Tagging never fails the create: the conversation already exists.
        if let Err(e) = self
            .client
            .set_custom_attributes(&conversation_id, &attributes)
            .await
        {
            warn!(
                conversation_id = %conversation_id,
                error = %e,
                "failed to tag conversation with group attributes"
            );
        }

        Ok(conversation_id)
    }

    async fn send_reply(
        &self,
        conversation_id: &str,
        text: &str,
        contact_id: &str,
    ) -> Result<(), RelayError> {
        self.client
            .reply_as_user(conversation_id, contact_id, text)
            .await
    }

    async fn find_conversation_by_group_id(
        &self,
        group_id: &str,
    ) -> Result<Option<RemoteConversation>, RelayError> {
        let found = self
            .client
            .search_conversations(GROUP_ID_ATTRIBUTE, group_id)
            .await?;
        Ok(found.into_iter().next().map(|record| RemoteConversation {
            group_id: attribute_string(&record.custom_attributes, GROUP_ID_ATTRIBUTE),
            id: record.id,
        }))
    }

    async fn resolve_or_create_contact(
        &self,
        user_id: &str,
        profile: &ContactProfile,
    ) -> Result<String, RelayError> {
        if let Some(id) = self.client.find_contact(user_id).await? {
            return Ok(id);
        }

        match self
            .client
            .create_contact(user_id, &profile.display_name)
            .await?
        {
            ContactCreation::Created(id) => {
                debug!(user_id, contact_id = %id, "created Intercom contact");
                Ok(id)
            }
            ContactCreation::Conflict => self.client.find_contact(user_id).await?.ok_or_else(|| {
                RelayError::platform(
                    Platform::Intercom,
                    format!("contact for user {user_id} conflicted but cannot be found"),
                )
            }),
        }
    }
}
