// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of the support-conversation platform.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ContactProfile, ConversationMetadata, RemoteConversation};

/// Creates and replies to support conversations, and resolves contacts.
#[async_trait]
pub trait ConversationPlatform: PluginAdapter {
    /// Opens a new conversation authored by `contact_id`, seeded with
    /// `initial_text`, and tags it with `metadata`. Returns the conversation id.
    async fn create_conversation(
        &self,
        contact_id: &str,
        display_name: &str,
        initial_text: &str,
        metadata: &ConversationMetadata,
    ) -> Result<String, RelayError>;

    /// Appends a user reply to an existing conversation.
    async fn send_reply(
        &self,
        conversation_id: &str,
        text: &str,
        contact_id: &str,
    ) -> Result<(), RelayError>;

    /// Searches for a conversation previously tagged with `group_id`.
    async fn find_conversation_by_group_id(
        &self,
        group_id: &str,
    ) -> Result<Option<RemoteConversation>, RelayError>;

    /// Returns the contact id for `user_id`, creating the contact if needed.
    ///
    /// Must tolerate concurrent creation of the same contact.
    async fn resolve_or_create_contact(
        &self,
        user_id: &str,
        profile: &ContactProfile,
    ) -> Result<String, RelayError>;
}
