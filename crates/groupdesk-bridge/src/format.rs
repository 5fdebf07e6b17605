// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text envelopes for each direction.

use groupdesk_core::Message;

/// Body posted into the conversation: `"<display name>: <text>"`, followed by
/// one line per attachment URL.
pub fn to_conversation(message: &Message) -> String {
    let mut body = format!("{}: {}", message.sender.display_name, message.text);
    for attachment in &message.attachments {
        body.push('\n');
        body.push_str(&attachment.url);
    }
    body
}

/// Body posted into the group: the support marker followed by the text.
pub fn to_source(prefix: &str, text: &str) -> String {
    format!("{prefix}{text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupdesk_test_utils::fixtures::{group_message, image};

    #[test]
    fn conversation_body_prefixes_sender() {
        let msg = group_message("1", "-1", "Ops", "printer is on fire");
        assert_eq!(to_conversation(&msg), "Alice: printer is on fire");
    }

    #[test]
    fn conversation_body_lists_attachment_urls() {
        let mut msg = group_message("1", "-1", "Ops", "see photo");
        msg.attachments.push(image("https://files.example/a.jpg"));
        msg.attachments.push(image("https://files.example/b.jpg"));
        assert_eq!(
            to_conversation(&msg),
            "Alice: see photo\nhttps://files.example/a.jpg\nhttps://files.example/b.jpg"
        );
    }

    #[test]
    fn source_body_uses_prefix() {
        assert_eq!(to_source("[Support] ", "on it"), "[Support] on it");
        assert_eq!(to_source("", "on it"), "on it");
    }
}
