// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-message handling for unbound groups.
//!
//! ```text
//! UNBOUND --lock taken---> PROVISIONING --> BOUND
//!    |                          |
//!    |                          +--error--> PROVISION_FAILED (message re-queued)
//!    +--lock held---> LOCK_CONTENDED (message queued, wait, re-read) --> BOUND?
//! ```
//!
//! The store-level lock guarantees a single creator per group. Everyone else
//! queues; the creator replays the queue once the binding is persisted. When
//! older messages are already queued, the oldest one seeds the conversation
//! and keeps its place in the queue until it has been delivered.

use std::sync::Arc;

use tracing::{debug, info, warn};

use groupdesk_core::types::{ConversationMetadata, GroupBinding, QueuedMessage, RoutingTarget};
use groupdesk_core::{
    BindingStore, ConversationPlatform, GroupLock, Message, PendingQueue, RelayError,
};

use crate::forward::{FlushReport, Forwarder};
use crate::{format, metrics};

/// How a provisioning attempt resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new conversation was created, seeded with the triggering message.
    Created(String),
    /// Another attempt bound the group first; the message was forwarded to it.
    Existing(String),
    /// The conversation platform already had a conversation tagged with this
    /// group; the binding was restored and the message forwarded to it.
    Recovered(String),
    /// The lock was held elsewhere. The message was queued; carries the
    /// binding seen after the contention wait, if any.
    Contended(Option<String>),
    /// Provisioning failed; the message is queued for another attempt.
    Failed,
    /// The message lacks its group routing fields. Nothing was queued.
    Invalid(String),
}

impl ProvisionOutcome {
    /// The bound conversation, when one is known.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::Created(id) | Self::Existing(id) | Self::Recovered(id) => Some(id),
            Self::Contended(id) => id.as_deref(),
            Self::Failed | Self::Invalid(_) => None,
        }
    }
}

/// The message a provisioning attempt starts from.
#[derive(Clone, Copy)]
enum Trigger<'a> {
    /// Just arrived and not queued.
    Fresh(&'a Message),
    /// Oldest entry of the group's queue.
    Head(&'a QueuedMessage),
}

impl<'a> Trigger<'a> {
    fn message(self) -> &'a Message {
        match self {
            Self::Fresh(message) => message,
            Self::Head(head) => &head.message,
        }
    }
}

pub struct Provisioner {
    store: Arc<dyn BindingStore>,
    lock: Arc<dyn GroupLock>,
    queue: Arc<dyn PendingQueue>,
    conversations: Arc<dyn ConversationPlatform>,
    forwarder: Arc<Forwarder>,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn BindingStore>,
        lock: Arc<dyn GroupLock>,
        queue: Arc<dyn PendingQueue>,
        conversations: Arc<dyn ConversationPlatform>,
        forwarder: Arc<Forwarder>,
    ) -> Self {
        Self {
            store,
            lock,
            queue,
            conversations,
            forwarder,
        }
    }

    /// Binds the message's group to a conversation, creating one if needed.
    ///
    /// `attempts` is how many times this message has already failed. Never
    /// returns an error: failures re-queue the message.
    pub async fn provision(&self, message: &Message, attempts: u32) -> ProvisionOutcome {
        let target = match message.routing_target() {
            Ok(target) => target,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "cannot provision message");
                return ProvisionOutcome::Invalid(e.to_string());
            }
        };
        let group_id = target.group_id;

        let acquired = match self.lock.acquire(group_id).await {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(group_id, error = %e, "lock store failed, treating lock as held");
                false
            }
        };
        if !acquired {
            return self.wait_for_binding(group_id, message, attempts).await;
        }

        let outcome = if self.enqueue_behind_backlog(group_id, message, attempts).await {
            self.provision_head_locked(group_id)
                .await
                .unwrap_or(ProvisionOutcome::Failed)
        } else {
            match self.provision_locked(target, Trigger::Fresh(message)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(group_id, message_id = %message.id, error = %e, "provisioning failed");
                    self.forwarder
                        .requeue(group_id, message, attempts + 1, &e.to_string())
                        .await;
                    ProvisionOutcome::Failed
                }
            }
        };

        self.release(group_id).await;
        outcome
    }

    /// Retries provisioning with the oldest queued message as the trigger.
    ///
    /// Returns `None`, changing nothing, when the lock is held elsewhere or
    /// the queue is empty. A failure counts an attempt on the message without
    /// moving it.
    pub async fn provision_queued(&self, group_id: &str) -> Option<ProvisionOutcome> {
        match self.lock.acquire(group_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(group_id, "provisioning retry skipped, lock held");
                return None;
            }
            Err(e) => {
                warn!(group_id, error = %e, "provisioning retry skipped, lock store failed");
                return None;
            }
        }

        let outcome = self.provision_head_locked(group_id).await;
        self.release(group_id).await;
        outcome
    }

    /// Replays the group's queue into its conversation under the group lock.
    ///
    /// Returns `None` when the lock is held elsewhere; the holder, or the next
    /// retry sweep, will deliver the queue instead.
    pub async fn flush_pending(&self, group_id: &str, conversation_id: &str) -> Option<FlushReport> {
        match self.lock.acquire(group_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(group_id, "flush skipped, lock held");
                return None;
            }
            Err(e) => {
                warn!(group_id, error = %e, "flush skipped, lock store failed");
                return None;
            }
        }

        let report = match self.forwarder.deliver_pending(group_id, conversation_id).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(group_id, error = %e, "flush failed");
                None
            }
        };
        self.release(group_id).await;
        report
    }

    async fn wait_for_binding(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
    ) -> ProvisionOutcome {
        if let Err(e) = self.queue.enqueue(group_id, message, attempts).await {
            warn!(group_id, message_id = %message.id, error = %e, "failed to queue contended message");
        }
        debug!(group_id, message_id = %message.id, "provisioning contended, message queued");

        tokio::time::sleep(self.forwarder.settings().contention_wait).await;

        let conversation_id = match self.store.get_conversation_id(group_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(group_id, error = %e, "binding re-read failed");
                None
            }
        };
        if let Some(conversation_id) = &conversation_id {
            self.flush_pending(group_id, conversation_id).await;
        }
        ProvisionOutcome::Contended(conversation_id)
    }

    /// Queues the message behind older ones still waiting for this group.
    /// Returns `false` when there is no backlog or it could not be queued.
    async fn enqueue_behind_backlog(&self, group_id: &str, message: &Message, attempts: u32) -> bool {
        match self.queue.length(group_id).await {
            Ok(0) => false,
            Ok(backlog) => match self.queue.enqueue(group_id, message, attempts).await {
                Ok(_) => {
                    debug!(group_id, message_id = %message.id, backlog, "message queued behind backlog");
                    true
                }
                Err(e) => {
                    warn!(group_id, message_id = %message.id, error = %e, "failed to queue behind backlog");
                    false
                }
            },
            Err(e) => {
                debug!(group_id, error = %e, "backlog check failed");
                false
            }
        }
    }

    /// Provisions from the head of the queue. Caller holds the lock.
    async fn provision_head_locked(&self, group_id: &str) -> Option<ProvisionOutcome> {
        let head = match self.queue.drain(group_id).await {
            Ok(snapshot) => snapshot.into_iter().next()?,
            Err(e) => {
                warn!(group_id, error = %e, "pending queue read failed");
                return None;
            }
        };

        let target = match head.message.routing_target() {
            Ok(target) => target,
            Err(e) => {
                let reason = e.to_string();
                warn!(group_id, message_id = %head.message.id, error = %reason, "queued message cannot be provisioned");
                self.forwarder
                    .dead_letter_head(group_id, &head, head.attempts, &reason)
                    .await;
                return Some(ProvisionOutcome::Invalid(reason));
            }
        };

        match self.provision_locked(target, Trigger::Head(&head)).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(group_id, message_id = %head.message.id, error = %e, "provisioning retry failed");
                self.forwarder
                    .retry_head(group_id, &head, &e.to_string())
                    .await;
                Some(ProvisionOutcome::Failed)
            }
        }
    }

    /// Steps run while holding the lock. Any error is handled by the caller.
    async fn provision_locked(
        &self,
        target: RoutingTarget<'_>,
        trigger: Trigger<'_>,
    ) -> Result<ProvisionOutcome, RelayError> {
        let group_id = target.group_id;
        let message = trigger.message();

        if let Some(binding) = self.store.get_binding(group_id).await? {
            self.deliver_trigger(group_id, &binding.conversation_id, trigger)
                .await?;
            return Ok(ProvisionOutcome::Existing(binding.conversation_id));
        }

        if let Some(remote) = self
            .conversations
            .find_conversation_by_group_id(group_id)
            .await?
        {
            self.store
                .save_binding(&GroupBinding {
                    group_id: group_id.to_string(),
                    conversation_id: remote.id.clone(),
                    last_message_id: None,
                })
                .await?;
            info!(group_id, conversation_id = %remote.id, "binding recovered from conversation platform");
            self.deliver_trigger(group_id, &remote.id, trigger).await?;
            return Ok(ProvisionOutcome::Recovered(remote.id));
        }

        let contacts = self.forwarder.contacts();
        let contact_id = contacts.resolve(&message.sender).await?;
        let metadata = ConversationMetadata {
            group_name: target.group_name.to_string(),
            group_id: group_id.to_string(),
            first_message_time: message.timestamp,
        };
        let conversation_id = match self
            .conversations
            .create_conversation(
                &contact_id,
                &message.sender.display_name,
                &format::to_conversation(message),
                &metadata,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                contacts.invalidate(&message.sender.id).await;
                return Err(e);
            }
        };

        self.store
            .save_binding(&GroupBinding {
                group_id: group_id.to_string(),
                conversation_id: conversation_id.clone(),
                last_message_id: Some(message.id.clone()),
            })
            .await?;
        metrics::record_conversation_created();
        info!(group_id, conversation_id = %conversation_id, group_name = target.group_name, "conversation created");

        // The head seeded the conversation; it must not be replayed.
        if let Trigger::Head(head) = trigger {
            if let Err(e) = self.queue.remove_through(group_id, head.seq).await {
                warn!(group_id, message_id = %head.message.id, error = %e, "seed message still queued, it may be sent twice");
            }
        }

        self.drain_after_bind(group_id, &conversation_id).await;
        Ok(ProvisionOutcome::Created(conversation_id))
    }

    /// Delivers the trigger into an already known conversation, then replays
    /// the queue. A queued head is delivered by the replay, in order.
    async fn deliver_trigger(
        &self,
        group_id: &str,
        conversation_id: &str,
        trigger: Trigger<'_>,
    ) -> Result<(), RelayError> {
        if let Trigger::Fresh(message) = trigger {
            self.forwarder
                .forward_to_conversation(group_id, conversation_id, message)
                .await?;
        }
        self.drain_after_bind(group_id, conversation_id).await;
        Ok(())
    }

    async fn drain_after_bind(&self, group_id: &str, conversation_id: &str) {
        // A failed drain leaves the queue intact for the retry sweep.
        if let Err(e) = self.forwarder.deliver_pending(group_id, conversation_id).await {
            warn!(group_id, error = %e, "pending drain after bind failed");
        }
    }

    async fn release(&self, group_id: &str) {
        if let Err(e) = self.lock.release(group_id).await {
            warn!(group_id, error = %e, "lock release failed, relying on expiry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::ContactResolver;
    use crate::settings::RelaySettings;
    use groupdesk_test_utils::fixtures::group_message;
    use groupdesk_test_utils::{MemoryStore, MockConversationPlatform, MockSourcePlatform};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        conversations: Arc<MockConversationPlatform>,
        provisioner: Provisioner,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let conversations = Arc::new(MockConversationPlatform::new());
        let contacts = Arc::new(ContactResolver::new(
            store.clone(),
            conversations.clone(),
            Duration::from_secs(60),
        ));
        let settings = RelaySettings {
            contention_wait: Duration::from_millis(10),
            ..RelaySettings::default()
        };
        let forwarder = Arc::new(Forwarder::new(
            store.clone(),
            store.clone(),
            conversations.clone(),
            Arc::new(MockSourcePlatform::new()),
            contacts,
            settings,
        ));
        let provisioner = Provisioner::new(
            store.clone(),
            store.clone(),
            store.clone(),
            conversations.clone(),
            forwarder,
        );
        Fixture {
            store,
            conversations,
            provisioner,
        }
    }

    #[tokio::test]
    async fn creates_conversation_with_metadata() {
        let f = fixture();
        let msg = group_message("m1", "-100", "Ops Team", "need help");

        let outcome = f.provisioner.provision(&msg, 0).await;
        assert_eq!(outcome, ProvisionOutcome::Created("conv-1".into()));

        let created = f.conversations.created().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].initial_text, "Alice: need help");
        assert_eq!(created[0].contact_id, "contact-42");
        assert_eq!(created[0].metadata.group_id, "-100");
        assert_eq!(created[0].metadata.group_name, "Ops Team");
        assert_eq!(created[0].metadata.first_message_time, msg.timestamp);

        let binding = f.store.get_binding("-100").await.unwrap().unwrap();
        assert_eq!(binding.conversation_id, "conv-1");
        assert_eq!(binding.last_message_id.as_deref(), Some("m1"));
        assert!(!f.store.is_locked("-100").await);
    }

    #[tokio::test]
    async fn existing_binding_forwards_instead_of_creating() {
        let f = fixture();
        f.store
            .save_binding(&GroupBinding {
                group_id: "-100".into(),
                conversation_id: "conv-7".into(),
                last_message_id: None,
            })
            .await
            .unwrap();

        let outcome = f
            .provisioner
            .provision(&group_message("m2", "-100", "Ops", "again"), 0)
            .await;
        assert_eq!(outcome, ProvisionOutcome::Existing("conv-7".into()));
        assert!(f.conversations.created().await.is_empty());
        assert_eq!(f.conversations.conversation_texts("conv-7").await, ["Alice: again"]);
    }

    #[tokio::test]
    async fn recovers_binding_from_platform() {
        let f = fixture();
        f.conversations.add_remote_conversation("-100", "conv-old").await;

        let outcome = f
            .provisioner
            .provision(&group_message("m1", "-100", "Ops", "hello again"), 0)
            .await;
        assert_eq!(outcome, ProvisionOutcome::Recovered("conv-old".into()));
        assert!(f.conversations.created().await.is_empty());
        assert_eq!(
            f.store.get_group_id("conv-old").await.unwrap().as_deref(),
            Some("-100")
        );
    }

    #[tokio::test]
    async fn create_failure_requeues_and_releases() {
        let f = fixture();
        f.conversations.set_fail_create(true);

        let outcome = f
            .provisioner
            .provision(&group_message("m1", "-100", "Ops", "hi"), 0)
            .await;
        assert_eq!(outcome, ProvisionOutcome::Failed);
        assert_eq!(f.store.queued_ids("-100").await, ["m1"]);
        assert_eq!(f.store.drain("-100").await.unwrap()[0].attempts, 1);
        assert!(!f.store.is_locked("-100").await);
        assert_eq!(f.store.get_contact("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn held_lock_queues_and_rereads() {
        let f = fixture();
        f.store.hold_lock("-100").await;

        let outcome = f
            .provisioner
            .provision(&group_message("m1", "-100", "Ops", "hi"), 0)
            .await;
        assert_eq!(outcome, ProvisionOutcome::Contended(None));
        assert_eq!(f.store.queued_ids("-100").await, ["m1"]);
        assert!(f.conversations.created().await.is_empty());
    }

    #[tokio::test]
    async fn missing_group_name_is_invalid() {
        let f = fixture();
        let mut msg = group_message("m1", "-100", "Ops", "hi");
        msg.group_name = None;

        let outcome = f.provisioner.provision(&msg, 0).await;
        assert!(matches!(outcome, ProvisionOutcome::Invalid(_)));
        assert_eq!(f.store.lock_calls(), 0);
        assert_eq!(f.store.queue_calls(), 0);
    }

    async fn enqueue_all(store: &MemoryStore, entries: &[(&str, &str)]) {
        for (id, text) in entries {
            store
                .enqueue("-100", &group_message(id, "-100", "Ops", text), 0)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn queued_head_seeds_conversation_in_order() {
        let f = fixture();
        enqueue_all(&f.store, &[("1", "one"), ("2", "two"), ("3", "three")]).await;

        let outcome = f.provisioner.provision_queued("-100").await;
        assert_eq!(outcome, Some(ProvisionOutcome::Created("conv-1".into())));
        assert_eq!(f.conversations.created().await[0].initial_text, "Alice: one");
        assert_eq!(
            f.conversations.conversation_texts("conv-1").await,
            ["Alice: one", "Alice: two", "Alice: three"]
        );
        assert!(f.store.queued_ids("-100").await.is_empty());
        assert!(!f.store.is_locked("-100").await);
    }

    #[tokio::test]
    async fn queued_retry_leaves_queue_alone_while_locked() {
        let f = fixture();
        enqueue_all(&f.store, &[("1", "one"), ("2", "two")]).await;
        f.store.hold_lock("-100").await;

        assert_eq!(f.provisioner.provision_queued("-100").await, None);
        assert_eq!(f.store.queued_ids("-100").await, ["1", "2"]);
        assert_eq!(f.store.drain("-100").await.unwrap()[0].attempts, 0);
    }

    #[tokio::test]
    async fn queued_retry_failure_counts_attempt_in_place() {
        let f = fixture();
        enqueue_all(&f.store, &[("1", "one"), ("2", "two")]).await;
        f.conversations.set_fail_create(true);

        assert_eq!(
            f.provisioner.provision_queued("-100").await,
            Some(ProvisionOutcome::Failed)
        );
        let left = f.store.drain("-100").await.unwrap();
        assert_eq!(f.store.queued_ids("-100").await, ["1", "2"]);
        assert_eq!(left[0].attempts, 1);
        assert_eq!(left[1].attempts, 0);
        assert!(!f.store.is_locked("-100").await);
    }

    #[tokio::test]
    async fn fresh_message_goes_behind_backlog() {
        let f = fixture();
        enqueue_all(&f.store, &[("1", "one")]).await;

        let outcome = f
            .provisioner
            .provision(&group_message("2", "-100", "Ops", "two"), 0)
            .await;
        assert_eq!(outcome, ProvisionOutcome::Created("conv-1".into()));
        assert_eq!(
            f.conversations.conversation_texts("conv-1").await,
            ["Alice: one", "Alice: two"]
        );
        assert!(f.store.queued_ids("-100").await.is_empty());
    }

    #[tokio::test]
    async fn flush_is_skipped_while_locked() {
        let f = fixture();
        f.store
            .enqueue("-100", &group_message("m1", "-100", "Ops", "hi"), 0)
            .await
            .unwrap();
        f.store.hold_lock("-100").await;

        assert_eq!(f.provisioner.flush_pending("-100", "conv-1").await, None);
        assert_eq!(f.store.queued_ids("-100").await, ["m1"]);
    }
}
