// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope, binding, and queue types shared by the relay crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RelayError;

/// Platform-assigned identifier for a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays in the relay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Source,
    Conversation,
    Storage,
}

/// The platform a message or sender belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// The group-chat side (source platform).
    Telegram,
    /// The support-conversation side.
    Intercom,
}

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    pub platform: Platform,
    pub display_name: String,
    #[serde(default)]
    pub handle: Option<String>,
}

/// Coarse attachment classification used to pick the outbound send method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
    Audio,
    Video,
}

/// A file referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Normalized unit of routing produced by the inbound adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    /// Telegram chat id. Always set for Telegram messages; extracted from
    /// conversation custom attributes for Intercom messages when present.
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    /// Intercom conversation id, set on messages from the conversation platform.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

/// The routing fields a message needs before it can trigger provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingTarget<'a> {
    pub group_id: &'a str,
    pub group_name: &'a str,
}

impl Message {
    /// Returns the group routing fields, or a validation error when either is
    /// missing or blank.
    pub fn routing_target(&self) -> Result<RoutingTarget<'_>, RelayError> {
        let group_id = self
            .group_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RelayError::Validation(format!("message {} has no group_id", self.id)))?;
        let group_name = self
            .group_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                RelayError::Validation(format!("message {} has no group_name", self.id))
            })?;
        Ok(RoutingTarget {
            group_id,
            group_name,
        })
    }
}

/// The durable association between one group and one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBinding {
    pub group_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub last_message_id: Option<String>,
}

/// A buffered message together with its queue position and retry count.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    /// Store-assigned sequence, strictly increasing in arrival order.
    pub seq: i64,
    pub message: Message,
    /// Number of failed delivery attempts so far.
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// A message that exceeded the retry ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub group_id: String,
    pub message: Message,
    pub attempts: u32,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Profile used when creating a contact on the conversation platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactProfile {
    pub user_id: String,
    pub display_name: String,
    pub handle: Option<String>,
}

impl From<&Sender> for ContactProfile {
    fn from(sender: &Sender) -> Self {
        Self {
            user_id: sender.id.clone(),
            display_name: sender.display_name.clone(),
            handle: sender.handle.clone(),
        }
    }
}

/// Custom attributes attached to a freshly created conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub group_name: String,
    pub group_id: String,
    pub first_message_time: DateTime<Utc>,
}

/// A conversation found on the conversation platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConversation {
    pub id: String,
    pub group_id: Option<String>,
}

/// Typed events published by the inbound adapters onto the router channel.
#[derive(Debug)]
pub enum BridgeEvent {
    /// A normalized inbound message.
    Message(Message),
    /// A non-fatal adapter failure, logged by the router.
    Error { platform: Platform, error: RelayError },
}

/// Sending half of the router's inbound channel.
pub type EventSender = tokio::sync::mpsc::Sender<BridgeEvent>;
