// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single delivery path shared by the router, the provisioner, and the
//! retry sweep.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use groupdesk_core::types::QueuedMessage;
use groupdesk_core::{
    BindingStore, ConversationPlatform, Message, PendingQueue, RelayError, SourcePlatform,
};

use crate::contacts::ContactResolver;
use crate::settings::RelaySettings;
use crate::{format, metrics};

/// Result of replaying one drained snapshot of a pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
    /// Failed and could not be written back to the store either.
    pub lost: usize,
}

/// What happened to a message that could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeued {
    Queued,
    DeadLettered,
    /// The store rejected the write too; the message is gone.
    Lost,
}

pub struct Forwarder {
    store: Arc<dyn BindingStore>,
    queue: Arc<dyn PendingQueue>,
    conversations: Arc<dyn ConversationPlatform>,
    source: Arc<dyn SourcePlatform>,
    contacts: Arc<ContactResolver>,
    settings: RelaySettings,
}

impl Forwarder {
    pub fn new(
        store: Arc<dyn BindingStore>,
        queue: Arc<dyn PendingQueue>,
        conversations: Arc<dyn ConversationPlatform>,
        source: Arc<dyn SourcePlatform>,
        contacts: Arc<ContactResolver>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            store,
            queue,
            conversations,
            source,
            contacts,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn contacts(&self) -> &Arc<ContactResolver> {
        &self.contacts
    }

    /// Appends a group message to its conversation as a user reply and
    /// records it as the binding's last message.
    pub async fn forward_to_conversation(
        &self,
        group_id: &str,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), RelayError> {
        let contact_id = self.contacts.resolve(&message.sender).await?;
        let body = format::to_conversation(message);

        if let Err(e) = self
            .conversations
            .send_reply(conversation_id, &body, &contact_id)
            .await
        {
            self.contacts.invalidate(&message.sender.id).await;
            return Err(e);
        }

        if let Err(e) = self.store.update_last_message_id(group_id, &message.id).await {
            warn!(group_id, error = %e, "failed to record last message id");
        }
        debug!(group_id, conversation_id, message_id = %message.id, "forwarded to conversation");
        Ok(())
    }

    /// Posts a support reply into the group: the text first, then every
    /// attachment as its own send.
    ///
    /// Every send is attempted whatever happened to the others. The reply
    /// fails only when nothing reached the group.
    pub async fn forward_to_source(&self, group_id: &str, message: &Message) -> Result<(), RelayError> {
        let mut delivered = 0;
        let mut last_error = None;

        if !message.text.trim().is_empty() {
            let body = format::to_source(&self.settings.support_prefix, &message.text);
            match self.source.send(group_id, &body, None).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    warn!(group_id, message_id = %message.id, error = %e, "reply text delivery failed");
                    last_error = Some(e);
                }
            }
        }

        for attachment in &message.attachments {
            match self
                .source
                .send_attachment(group_id, &attachment.url, attachment.name.as_deref())
                .await
            {
                Ok(_) => delivered += 1,
                Err(e) => {
                    warn!(group_id, url = %attachment.url, error = %e, "attachment delivery failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }

    /// Puts a failed message back on its group's queue, or dead-letters it
    /// once `attempts` reaches the ceiling.
    pub async fn requeue(&self, group_id: &str, message: &Message, attempts: u32, reason: &str) -> Requeued {
        if attempts >= self.settings.max_delivery_attempts {
            return match self.store_dead_letter(group_id, message, attempts, reason).await {
                Ok(()) => Requeued::DeadLettered,
                Err(_) => Requeued::Lost,
            };
        }

        match self.queue.enqueue(group_id, message, attempts).await {
            Ok(_) => {
                info!(group_id, message_id = %message.id, attempts, reason, "message queued for retry");
                Requeued::Queued
            }
            Err(e) => {
                error!(group_id, message_id = %message.id, error = %e, "failed to queue message");
                Requeued::Lost
            }
        }
    }

    /// Counts a failed attempt on the head of the group's queue. The message
    /// keeps its place unless the ceiling is reached, in which case it is
    /// dead-lettered.
    pub async fn retry_head(&self, group_id: &str, head: &QueuedMessage, reason: &str) -> Requeued {
        let attempts = head.attempts + 1;
        if attempts >= self.settings.max_delivery_attempts {
            return self.dead_letter_head(group_id, head, attempts, reason).await;
        }

        if let Err(e) = self.queue.set_attempts(group_id, head.seq, attempts).await {
            warn!(group_id, message_id = %head.message.id, error = %e, "failed to record attempt");
        }
        info!(group_id, message_id = %head.message.id, attempts, reason, "message kept queued for retry");
        Requeued::Queued
    }

    /// Moves the head of the group's queue to the dead-letter table. When the
    /// dead-letter write fails the message stays queued.
    pub async fn dead_letter_head(
        &self,
        group_id: &str,
        head: &QueuedMessage,
        attempts: u32,
        reason: &str,
    ) -> Requeued {
        if self
            .store_dead_letter(group_id, &head.message, attempts, reason)
            .await
            .is_err()
        {
            return Requeued::Queued;
        }
        if let Err(e) = self.queue.remove_through(group_id, head.seq).await {
            warn!(group_id, message_id = %head.message.id, error = %e, "dead-lettered message is still queued");
        }
        Requeued::DeadLettered
    }

    async fn store_dead_letter(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
        reason: &str,
    ) -> Result<(), RelayError> {
        match self.queue.dead_letter(group_id, message, attempts, reason).await {
            Ok(()) => {
                metrics::record_dead_letter();
                error!(group_id, message_id = %message.id, attempts, reason, "message dead-lettered");
                Ok(())
            }
            Err(e) => {
                error!(group_id, message_id = %message.id, error = %e, "failed to dead-letter message");
                Err(e)
            }
        }
    }

    /// Replays the group's queue into `conversation_id` in arrival order.
    ///
    /// The caller must hold the group lock. Each failure re-enqueues only that
    /// message; the snapshot is removed after the pass, so anything enqueued
    /// meanwhile stays for the next flush.
    pub async fn deliver_pending(
        &self,
        group_id: &str,
        conversation_id: &str,
    ) -> Result<FlushReport, RelayError> {
        let snapshot = self.queue.drain(group_id).await?;
        let Some(last_seq) = snapshot.last().map(|queued| queued.seq) else {
            return Ok(FlushReport::default());
        };

        let mut report = FlushReport::default();
        for queued in &snapshot {
            match self
                .forward_to_conversation(group_id, conversation_id, &queued.message)
                .await
            {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let reason = e.to_string();
                    match self
                        .requeue(group_id, &queued.message, queued.attempts + 1, &reason)
                        .await
                    {
                        Requeued::Queued => report.requeued += 1,
                        Requeued::DeadLettered => report.dead_lettered += 1,
                        Requeued::Lost => report.lost += 1,
                    }
                }
            }
        }

        self.queue.remove_through(group_id, last_seq).await?;
        info!(
            group_id,
            conversation_id,
            delivered = report.delivered,
            requeued = report.requeued,
            dead_lettered = report.dead_lettered,
            lost = report.lost,
            "pending queue flushed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupdesk_core::types::GroupBinding;
    use groupdesk_test_utils::fixtures::{group_message, image, support_reply};
    use groupdesk_test_utils::{MemoryStore, MockConversationPlatform, MockSourcePlatform};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        conversations: Arc<MockConversationPlatform>,
        source: Arc<MockSourcePlatform>,
        forwarder: Forwarder,
    }

    fn fixture(max_attempts: u32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let conversations = Arc::new(MockConversationPlatform::new());
        let source = Arc::new(MockSourcePlatform::new());
        let contacts = Arc::new(ContactResolver::new(
            store.clone(),
            conversations.clone(),
            Duration::from_secs(60),
        ));
        let settings = RelaySettings {
            max_delivery_attempts: max_attempts,
            ..RelaySettings::default()
        };
        let forwarder = Forwarder::new(
            store.clone(),
            store.clone(),
            conversations.clone(),
            source.clone(),
            contacts,
            settings,
        );
        Fixture {
            store,
            conversations,
            source,
            forwarder,
        }
    }

    #[tokio::test]
    async fn forward_updates_last_message_id() {
        let f = fixture(5);
        f.store
            .save_binding(&GroupBinding {
                group_id: "-1".into(),
                conversation_id: "conv-9".into(),
                last_message_id: None,
            })
            .await
            .unwrap();

        let msg = group_message("m7", "-1", "Ops", "hello");
        f.forwarder.forward_to_conversation("-1", "conv-9", &msg).await.unwrap();

        let replies = f.conversations.replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "Alice: hello");
        assert_eq!(replies[0].contact_id, "contact-42");
        let binding = f.store.get_binding("-1").await.unwrap().unwrap();
        assert_eq!(binding.last_message_id.as_deref(), Some("m7"));
    }

    #[tokio::test]
    async fn failed_reply_invalidates_contact() {
        let f = fixture(5);
        f.conversations.fail_replies_containing("boom").await;
        let msg = group_message("m1", "-1", "Ops", "boom");

        assert!(f.forwarder.forward_to_conversation("-1", "conv-1", &msg).await.is_err());
        assert_eq!(f.store.get_contact("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn attachments_are_independent() {
        let f = fixture(5);
        f.source.fail_urls_containing("broken").await;
        let mut reply = support_reply("r1", "conv-1", "see attached");
        reply.attachments = vec![
            image("https://files.example/broken.png"),
            image("https://files.example/ok.png"),
        ];

        f.forwarder.forward_to_source("-1", &reply).await.unwrap();

        let texts = f.source.texts().await;
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].text, "[Support] see attached");
        let sent = f.source.attachments().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://files.example/ok.png");
    }

    #[tokio::test]
    async fn failed_text_still_sends_attachments() {
        let f = fixture(5);
        f.source.set_fail_texts(true).await;
        let mut reply = support_reply("r1", "conv-1", "see attached");
        reply.attachments = vec![image("https://files.example/a.png")];

        f.forwarder.forward_to_source("-1", &reply).await.unwrap();
        assert!(f.source.texts().await.is_empty());
        assert_eq!(f.source.attachments().await.len(), 1);
    }

    #[tokio::test]
    async fn reply_fails_when_nothing_was_delivered() {
        let f = fixture(5);
        f.source.fail_urls_containing("files.example").await;
        let mut reply = support_reply("r1", "conv-1", "");
        reply.attachments = vec![
            image("https://files.example/a.png"),
            image("https://files.example/b.png"),
        ];

        assert!(f.forwarder.forward_to_source("-1", &reply).await.is_err());
        assert!(f.source.attachments().await.is_empty());
    }

    #[tokio::test]
    async fn retry_head_counts_in_place_then_dead_letters() {
        let f = fixture(2);
        for id in ["1", "2"] {
            f.store
                .enqueue("-1", &group_message(id, "-1", "Ops", "hi"), 0)
                .await
                .unwrap();
        }

        let head = f.store.drain("-1").await.unwrap().remove(0);
        assert_eq!(f.forwarder.retry_head("-1", &head, "timeout").await, Requeued::Queued);
        assert_eq!(f.store.queued_ids("-1").await, ["1", "2"]);

        let head = f.store.drain("-1").await.unwrap().remove(0);
        assert_eq!(head.attempts, 1);
        assert_eq!(
            f.forwarder.retry_head("-1", &head, "timeout").await,
            Requeued::DeadLettered
        );
        assert_eq!(f.store.queued_ids("-1").await, ["2"]);
        assert_eq!(f.store.dead_letters("-1").await.unwrap()[0].attempts, 2);
    }

    #[tokio::test]
    async fn attachment_only_reply_skips_text() {
        let f = fixture(5);
        let mut reply = support_reply("r1", "conv-1", "");
        reply.attachments = vec![image("https://files.example/a.png")];

        f.forwarder.forward_to_source("-1", &reply).await.unwrap();
        assert!(f.source.texts().await.is_empty());
        assert_eq!(f.source.attachments().await.len(), 1);
    }

    #[tokio::test]
    async fn requeue_dead_letters_at_ceiling() {
        let f = fixture(2);
        let msg = group_message("m1", "-1", "Ops", "hi");

        assert_eq!(f.forwarder.requeue("-1", &msg, 1, "timeout").await, Requeued::Queued);
        assert_eq!(
            f.forwarder.requeue("-1", &msg, 2, "timeout").await,
            Requeued::DeadLettered
        );
        assert_eq!(f.store.queued_ids("-1").await, ["m1"]);
        let dead = f.store.dead_letters("-1").await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
    }

    #[tokio::test]
    async fn deliver_pending_keeps_only_failures() {
        let f = fixture(5);
        for (id, text) in [("1", "first"), ("2", "second fails"), ("3", "third")] {
            f.store
                .enqueue("-1", &group_message(id, "-1", "Ops", text), 0)
                .await
                .unwrap();
        }
        f.conversations.fail_replies_containing("fails").await;

        let report = f.forwarder.deliver_pending("-1", "conv-1").await.unwrap();
        assert_eq!(
            report,
            FlushReport {
                delivered: 2,
                requeued: 1,
                dead_lettered: 0,
                lost: 0
            }
        );
        assert_eq!(
            f.conversations.conversation_texts("conv-1").await,
            ["Alice: first", "Alice: third"]
        );
        assert_eq!(f.store.queued_ids("-1").await, ["2"]);
        let left = f.store.drain("-1").await.unwrap();
        assert_eq!(left[0].attempts, 1);
    }

    #[tokio::test]
    async fn unwritable_failures_are_counted_as_lost() {
        let f = fixture(5);
        f.store
            .enqueue("-1", &group_message("1", "-1", "Ops", "fails"), 0)
            .await
            .unwrap();
        f.conversations.fail_replies_containing("fails").await;
        f.store.set_fail_queue_writes(true);

        let report = f.forwarder.deliver_pending("-1", "conv-1").await.unwrap();
        assert_eq!(report.lost, 1);
        assert_eq!(report.requeued, 0);
        assert!(f.store.queued_ids("-1").await.is_empty());
    }
}
