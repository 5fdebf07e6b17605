// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the Intercom REST API and webhook notifications.
//!
//! Only the fields the relay reads are modelled; everything else in the
//! payloads is ignored.

use serde::{Deserialize, Serialize};

/// Search request body shared by `/contacts/search` and `/conversations/search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    pub query: SearchQuery<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery<'a> {
    pub field: &'a str,
    pub operator: &'a str,
    pub value: &'a str,
}

impl<'a> SearchRequest<'a> {
    /// Single-field equality search.
    pub fn equals(field: &'a str, value: &'a str) -> Self {
        Self {
            query: SearchQuery {
                field,
                operator: "=",
                value,
            },
        }
    }
}

/// A contact or conversation reference as returned in search results.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub custom_attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactList {
    #[serde(default)]
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationList {
    #[serde(default)]
    pub conversations: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateContact<'a> {
    pub role: &'a str,
    pub external_id: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateConversation<'a> {
    pub from: ConversationFrom<'a>,
    pub body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationFrom<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub id: &'a str,
}

/// Response of `POST /conversations`: the created user message.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedMessage {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReply<'a> {
    pub message_type: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub intercom_user_id: &'a str,
    pub body: &'a str,
}

/// Error envelope returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorList {
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Webhook notification envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub topic: String,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    pub item: NotifiedConversation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifiedConversation {
    pub id: String,
    #[serde(default)]
    pub custom_attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub conversation_parts: Option<PartList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartList {
    #[serde(default)]
    pub conversation_parts: Vec<ConversationPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationPart {
    pub id: String,
    #[serde(default)]
    pub part_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    pub author: Author,
    #[serde(default)]
    pub attachments: Vec<PartAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartAttachment {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Reads a custom attribute as a string, accepting numeric values too.
pub fn attribute_string(
    attributes: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    match attributes.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_serializes_equality_query() {
        let req = SearchRequest::equals("external_id", "42");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"query": {"field": "external_id", "operator": "=", "value": "42"}})
        );
    }

    #[test]
    fn user_reply_uses_type_key() {
        let reply = UserReply {
            message_type: "comment",
            kind: "user",
            intercom_user_id: "c-1",
            body: "hi",
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "user");
        assert_eq!(json["intercom_user_id"], "c-1");
    }

    #[test]
    fn attribute_string_accepts_numbers() {
        let mut attrs = serde_json::Map::new();
        attrs.insert("group_id".into(), serde_json::json!(-100123));
        attrs.insert("blank".into(), serde_json::json!(" "));
        assert_eq!(attribute_string(&attrs, "group_id").as_deref(), Some("-100123"));
        assert!(attribute_string(&attrs, "blank").is_none());
        assert!(attribute_string(&attrs, "missing").is_none());
    }
}
