// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of the group-chat platform.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::MessageId;

/// Delivers text and attachments into a group chat.
///
/// The inbound side is not part of this trait: source adapters publish
/// [`BridgeEvent`](crate::types::BridgeEvent)s onto the router channel.
#[async_trait]
pub trait SourcePlatform: PluginAdapter {
    /// Sends a text message to the group, optionally as a reply.
    async fn send(
        &self,
        group_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<MessageId, RelayError>;

    /// Sends a file by URL to the group with an optional caption.
    async fn send_attachment(
        &self,
        group_id: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, RelayError>;
}
