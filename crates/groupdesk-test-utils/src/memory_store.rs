// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementation of the three store traits.
//!
//! Each trait can be switched into a failing mode to simulate a store outage,
//! and every lock and queue call is counted so tests can assert that a code
//! path never touched them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use groupdesk_core::types::{DeadLetter, GroupBinding, Message, QueuedMessage};
use groupdesk_core::{BindingStore, GroupLock, PendingQueue, RelayError};

#[derive(Default)]
struct State {
    bindings: HashMap<String, GroupBinding>,
    contacts: HashMap<String, String>,
    locks: HashSet<String>,
    queues: BTreeMap<String, Vec<QueuedMessage>>,
    dead: Vec<DeadLetter>,
    next_seq: i64,
}

/// Shared in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_locks: AtomicBool,
    fail_bindings: AtomicBool,
    fail_contacts: AtomicBool,
    fail_queue_writes: AtomicBool,
    lock_calls: AtomicUsize,
    queue_calls: AtomicUsize,
}

fn outage(what: &str) -> RelayError {
    RelayError::storage(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        format!("{what} store unavailable"),
    ))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every lock call fail.
    pub fn set_fail_locks(&self, fail: bool) {
        self.fail_locks.store(fail, Ordering::SeqCst);
    }

    /// Makes every binding read and write fail.
    pub fn set_fail_bindings(&self, fail: bool) {
        self.fail_bindings.store(fail, Ordering::SeqCst);
    }

    /// Makes contact cache reads and writes fail.
    pub fn set_fail_contacts(&self, fail: bool) {
        self.fail_contacts.store(fail, Ordering::SeqCst);
    }

    /// Makes `enqueue` and `dead_letter` fail. Reads and removals still work.
    pub fn set_fail_queue_writes(&self, fail: bool) {
        self.fail_queue_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `acquire`/`release` calls made so far.
    pub fn lock_calls(&self) -> usize {
        self.lock_calls.load(Ordering::SeqCst)
    }

    /// Number of queue calls made so far.
    pub fn queue_calls(&self) -> usize {
        self.queue_calls.load(Ordering::SeqCst)
    }

    /// Whether `group_id` is currently locked.
    pub async fn is_locked(&self, group_id: &str) -> bool {
        self.state.lock().await.locks.contains(group_id)
    }

    /// Takes the lock directly, bypassing counters and fault injection.
    pub async fn hold_lock(&self, group_id: &str) {
        self.state.lock().await.locks.insert(group_id.to_string());
    }

    /// Ids of the queued messages for `group_id`, oldest first.
    pub async fn queued_ids(&self, group_id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .queues
            .get(group_id)
            .map(|q| q.iter().map(|m| m.message.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Every dead letter across groups.
    pub async fn all_dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.clone()
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<(), RelayError> {
        if flag.load(Ordering::SeqCst) {
            Err(outage(what))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BindingStore for MemoryStore {
    async fn save_binding(&self, binding: &GroupBinding) -> Result<(), RelayError> {
        self.check(&self.fail_bindings, "binding")?;
        let mut state = self.state.lock().await;
        state
            .bindings
            .retain(|group, b| group == &binding.group_id || b.conversation_id != binding.conversation_id);
        state
            .bindings
            .insert(binding.group_id.clone(), binding.clone());
        Ok(())
    }

    async fn get_binding(&self, group_id: &str) -> Result<Option<GroupBinding>, RelayError> {
        self.check(&self.fail_bindings, "binding")?;
        Ok(self.state.lock().await.bindings.get(group_id).cloned())
    }

    async fn get_group_id(&self, conversation_id: &str) -> Result<Option<String>, RelayError> {
        self.check(&self.fail_bindings, "binding")?;
        Ok(self
            .state
            .lock()
            .await
            .bindings
            .values()
            .find(|b| b.conversation_id == conversation_id)
            .map(|b| b.group_id.clone()))
    }

    async fn update_last_message_id(
        &self,
        group_id: &str,
        message_id: &str,
    ) -> Result<(), RelayError> {
        self.check(&self.fail_bindings, "binding")?;
        if let Some(binding) = self.state.lock().await.bindings.get_mut(group_id) {
            binding.last_message_id = Some(message_id.to_string());
        }
        Ok(())
    }

    async fn get_contact(&self, user_id: &str) -> Result<Option<String>, RelayError> {
        self.check(&self.fail_contacts, "contact")?;
        Ok(self.state.lock().await.contacts.get(user_id).cloned())
    }

    async fn save_contact(
        &self,
        user_id: &str,
        contact_id: &str,
        _ttl: Duration,
    ) -> Result<(), RelayError> {
        self.check(&self.fail_contacts, "contact")?;
        self.state
            .lock()
            .await
            .contacts
            .insert(user_id.to_string(), contact_id.to_string());
        Ok(())
    }

    async fn invalidate_contact(&self, user_id: &str) -> Result<(), RelayError> {
        self.check(&self.fail_contacts, "contact")?;
        self.state.lock().await.contacts.remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl GroupLock for MemoryStore {
    async fn acquire(&self, group_id: &str) -> Result<bool, RelayError> {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_locks, "lock")?;
        Ok(self.state.lock().await.locks.insert(group_id.to_string()))
    }

    async fn release(&self, group_id: &str) -> Result<(), RelayError> {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_locks, "lock")?;
        self.state.lock().await.locks.remove(group_id);
        Ok(())
    }
}

#[async_trait]
impl PendingQueue for MemoryStore {
    async fn enqueue(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
    ) -> Result<i64, RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_queue_writes, "queue")?;
        let mut state = self.state.lock().await;
        state.next_seq += 1;
        let seq = state.next_seq;
        state
            .queues
            .entry(group_id.to_string())
            .or_default()
            .push(QueuedMessage {
                seq,
                message: message.clone(),
                attempts,
                enqueued_at: Utc::now(),
            });
        Ok(seq)
    }

    async fn drain(&self, group_id: &str) -> Result<Vec<QueuedMessage>, RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .await
            .queues
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, group_id: &str) -> Result<(), RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.queues.remove(group_id);
        Ok(())
    }

    async fn remove_through(&self, group_id: &str, through_seq: i64) -> Result<(), RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(queue) = state.queues.get_mut(group_id) {
            queue.retain(|m| m.seq > through_seq);
            if queue.is_empty() {
                state.queues.remove(group_id);
            }
        }
        Ok(())
    }

    async fn set_attempts(&self, group_id: &str, seq: i64, attempts: u32) -> Result<(), RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(entry) = state
            .queues
            .get_mut(group_id)
            .and_then(|queue| queue.iter_mut().find(|m| m.seq == seq))
        {
            entry.attempts = attempts;
        }
        Ok(())
    }

    async fn length(&self, group_id: &str) -> Result<usize, RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .await
            .queues
            .get(group_id)
            .map_or(0, Vec::len))
    }

    async fn pending_groups(&self) -> Result<Vec<String>, RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.queues.keys().cloned().collect())
    }

    async fn dead_letter(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
        reason: &str,
    ) -> Result<(), RelayError> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_queue_writes, "queue")?;
        self.state.lock().await.dead.push(DeadLetter {
            group_id: group_id.to_string(),
            message: message.clone(),
            attempts,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn dead_letters(&self, group_id: &str) -> Result<Vec<DeadLetter>, RelayError> {
        Ok(self
            .state
            .lock()
            .await
            .dead
            .iter()
            .filter(|d| d.group_id == group_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::group_message;

    #[tokio::test]
    async fn lock_outage_is_an_error() {
        let store = MemoryStore::new();
        store.set_fail_locks(true);
        assert!(store.acquire("-1").await.unwrap_err().is_storage());
        assert_eq!(store.lock_calls(), 1);
    }

    #[tokio::test]
    async fn remove_through_drops_empty_queue() {
        let store = MemoryStore::new();
        let seq = store
            .enqueue("-1", &group_message("1", "-1", "Ops", "hi"), 0)
            .await
            .unwrap();
        store.remove_through("-1", seq).await.unwrap();
        assert!(store.pending_groups().await.unwrap().is_empty());
    }
}
