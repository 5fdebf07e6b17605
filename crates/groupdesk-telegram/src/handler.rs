// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound filtering and envelope conversion.
//!
//! Decides whether a Telegram update belongs to the relay (group chats only,
//! human senders only) and converts it into a platform-neutral
//! [`groupdesk_core::Message`].

use groupdesk_core::types::{Attachment, Message as Envelope, Platform, Sender};
use teloxide::types::Message;

/// Checks whether the message was posted in a group or supergroup.
///
/// Private chats and channels return `false`.
pub fn is_group(msg: &Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

/// Checks whether the message was sent by a bot, including this one.
///
/// Messages without a sender (anonymous admins, service posts) count as bot
/// traffic.
pub fn is_from_bot(msg: &Message) -> bool {
    msg.from.as_ref().is_none_or(|u| u.is_bot)
}

/// Returns true when the update should be published to the router.
pub fn should_relay(msg: &Message) -> bool {
    is_group(msg) && !is_from_bot(msg)
}

/// Text body of the message: the text itself, or the media caption.
pub fn body(msg: &Message) -> Option<&str> {
    msg.text().or_else(|| msg.caption())
}

/// Converts a Telegram group message into a relay envelope.
///
/// Returns `None` when there is nothing to relay (no text and no
/// attachments, e.g. stickers or service messages).
pub fn to_envelope(msg: &Message, attachments: Vec<Attachment>) -> Option<Envelope> {
    let text = body(msg).unwrap_or_default().to_string();
    if text.trim().is_empty() && attachments.is_empty() {
        return None;
    }

    let sender = match msg.from.as_ref() {
        Some(user) => Sender {
            id: user.id.0.to_string(),
            platform: Platform::Telegram,
            display_name: user.full_name(),
            handle: user.username.clone(),
        },
        None => Sender {
            id: "unknown".to_string(),
            platform: Platform::Telegram,
            display_name: "Unknown".to_string(),
            handle: None,
        },
    };

    Some(Envelope {
        id: msg.id.0.to_string(),
        text,
        sender,
        group_id: Some(msg.chat.id.0.to_string()),
        group_name: msg.chat.title().map(str::to_string),
        conversation_id: None,
        attachments,
        timestamp: msg.date,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use groupdesk_core::types::AttachmentKind;

    pub(crate) fn make_group_message(extra: serde_json::Value) -> Message {
        let mut json = serde_json::json!({
            "message_id": 17,
            "date": 1700000000i64,
            "chat": {
                "id": -100123i64,
                "type": "supergroup",
                "title": "Acme Ops",
            },
            "from": {
                "id": 4242u64,
                "is_bot": false,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "username": "ada",
            },
        });
        if let (Some(base), Some(extra)) = (json.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(json).expect("failed to deserialize mock group message")
    }

    fn make_private_message(text: &str) -> Message {
        let json = serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": {
                "id": 4242i64,
                "type": "private",
                "first_name": "Ada",
            },
            "from": {
                "id": 4242u64,
                "is_bot": false,
                "first_name": "Ada",
            },
            "text": text,
        });
        serde_json::from_value(json).expect("failed to deserialize mock private message")
    }

    #[test]
    fn group_messages_are_relayed() {
        let msg = make_group_message(serde_json::json!({"text": "hello"}));
        assert!(is_group(&msg));
        assert!(should_relay(&msg));
    }

    #[test]
    fn plain_groups_count_as_groups() {
        let msg = make_group_message(serde_json::json!({
            "chat": {"id": -42i64, "type": "group", "title": "Small team"},
            "text": "hi",
        }));
        assert!(is_group(&msg));
    }

    #[test]
    fn private_chats_are_ignored() {
        let msg = make_private_message("hello");
        assert!(!is_group(&msg));
        assert!(!should_relay(&msg));
    }

    #[test]
    fn bot_senders_are_ignored() {
        let msg = make_group_message(serde_json::json!({
            "from": {"id": 1u64, "is_bot": true, "first_name": "Helper"},
            "text": "beep",
        }));
        assert!(is_from_bot(&msg));
        assert!(!should_relay(&msg));
    }

    #[test]
    fn envelope_maps_group_and_sender() {
        let msg = make_group_message(serde_json::json!({"text": "printer is down"}));
        let env = to_envelope(&msg, vec![]).unwrap();

        assert_eq!(env.id, "17");
        assert_eq!(env.text, "printer is down");
        assert_eq!(env.group_id.as_deref(), Some("-100123"));
        assert_eq!(env.group_name.as_deref(), Some("Acme Ops"));
        assert_eq!(env.sender.id, "4242");
        assert_eq!(env.sender.display_name, "Ada Lovelace");
        assert_eq!(env.sender.handle.as_deref(), Some("ada"));
        assert_eq!(env.sender.platform, Platform::Telegram);
        assert!(env.conversation_id.is_none());
        assert_eq!(env.timestamp.timestamp(), 1700000000);
    }

    #[test]
    fn caption_is_used_as_text() {
        let msg = make_group_message(serde_json::json!({
            "caption": "see attached",
            "document": {
                "file_id": "doc-1",
                "file_unique_id": "u-doc-1",
                "file_name": "log.txt",
            },
        }));
        let attachments = vec![Attachment {
            kind: AttachmentKind::Document,
            url: "https://files.example/log.txt".into(),
            name: Some("log.txt".into()),
        }];
        let env = to_envelope(&msg, attachments).unwrap();
        assert_eq!(env.text, "see attached");
        assert_eq!(env.attachments.len(), 1);
    }

    #[test]
    fn empty_messages_produce_nothing() {
        let msg = make_group_message(serde_json::json!({"text": "   "}));
        assert!(to_envelope(&msg, vec![]).is_none());
    }
}
