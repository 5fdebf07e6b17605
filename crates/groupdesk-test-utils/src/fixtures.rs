// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message builders.

use chrono::Utc;
use groupdesk_core::types::{Attachment, AttachmentKind, Message, Platform, Sender};

/// A Telegram group message from user `42` ("Alice").
pub fn group_message(id: &str, group_id: &str, group_name: &str, text: &str) -> Message {
    Message {
        id: id.to_string(),
        text: text.to_string(),
        sender: Sender {
            id: "42".to_string(),
            platform: Platform::Telegram,
            display_name: "Alice".to_string(),
            handle: Some("alice".to_string()),
        },
        group_id: Some(group_id.to_string()),
        group_name: Some(group_name.to_string()),
        conversation_id: None,
        attachments: Vec::new(),
        timestamp: Utc::now(),
    }
}

/// An admin reply arriving from Intercom for `conversation_id`.
pub fn support_reply(id: &str, conversation_id: &str, text: &str) -> Message {
    Message {
        id: id.to_string(),
        text: text.to_string(),
        sender: Sender {
            id: "admin-1".to_string(),
            platform: Platform::Intercom,
            display_name: "Support".to_string(),
            handle: None,
        },
        group_id: None,
        group_name: None,
        conversation_id: Some(conversation_id.to_string()),
        attachments: Vec::new(),
        timestamp: Utc::now(),
    }
}

/// An image attachment at `url`.
pub fn image(url: &str) -> Attachment {
    Attachment {
        kind: AttachmentKind::Image,
        url: url.to_string(),
        name: None,
    }
}
