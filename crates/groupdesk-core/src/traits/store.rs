// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store traits for bindings, per-group locks, and the pending queue.
//!
//! Implementations are durable and shared between processes; every method is
//! a store round trip.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::{DeadLetter, GroupBinding, Message, QueuedMessage};

/// Group <-> conversation mapping plus the user -> contact cache.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Upserts the binding for `binding.group_id`, replacing any previous one.
    async fn save_binding(&self, binding: &GroupBinding) -> Result<(), RelayError>;

    async fn get_binding(&self, group_id: &str) -> Result<Option<GroupBinding>, RelayError>;

    async fn get_conversation_id(&self, group_id: &str) -> Result<Option<String>, RelayError> {
        Ok(self
            .get_binding(group_id)
            .await?
            .map(|binding| binding.conversation_id))
    }

    /// Reverse lookup from a conversation id to its group.
    async fn get_group_id(&self, conversation_id: &str) -> Result<Option<String>, RelayError>;

    /// Updates only `last_message_id`; a missing binding is a no-op.
    async fn update_last_message_id(
        &self,
        group_id: &str,
        message_id: &str,
    ) -> Result<(), RelayError>;

    /// Returns the cached contact id, or `None` when absent or expired.
    async fn get_contact(&self, user_id: &str) -> Result<Option<String>, RelayError>;

    async fn save_contact(
        &self,
        user_id: &str,
        contact_id: &str,
        ttl: Duration,
    ) -> Result<(), RelayError>;

    async fn invalidate_contact(&self, user_id: &str) -> Result<(), RelayError>;
}

/// Non-blocking mutual exclusion keyed by group id.
#[async_trait]
pub trait GroupLock: Send + Sync {
    /// Atomically takes the lock if it is free or expired. Returns `false`
    /// when another holder has it.
    async fn acquire(&self, group_id: &str) -> Result<bool, RelayError>;

    /// Deletes the lock unconditionally. Releasing a free lock is a no-op.
    async fn release(&self, group_id: &str) -> Result<(), RelayError>;
}

/// Per-group FIFO buffer of messages awaiting delivery.
#[async_trait]
pub trait PendingQueue: Send + Sync {
    /// Appends to the tail of the group's buffer. Returns the sequence number.
    async fn enqueue(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
    ) -> Result<i64, RelayError>;

    /// Returns every buffered message in arrival order without removing it.
    async fn drain(&self, group_id: &str) -> Result<Vec<QueuedMessage>, RelayError>;

    /// Deletes the whole buffer for the group.
    async fn clear(&self, group_id: &str) -> Result<(), RelayError>;

    /// Deletes every entry with `seq <= through_seq`, i.e. one drained snapshot.
    async fn remove_through(&self, group_id: &str, through_seq: i64) -> Result<(), RelayError>;

    /// Records a new attempt count on one entry without moving it.
    async fn set_attempts(&self, group_id: &str, seq: i64, attempts: u32) -> Result<(), RelayError>;

    async fn length(&self, group_id: &str) -> Result<usize, RelayError>;

    /// Groups that currently have at least one buffered message.
    async fn pending_groups(&self) -> Result<Vec<String>, RelayError>;

    /// Moves a message to terminal storage after the retry ceiling.
    async fn dead_letter(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
        reason: &str,
    ) -> Result<(), RelayError>;

    async fn dead_letters(&self, group_id: &str) -> Result<Vec<DeadLetter>, RelayError>;
}
