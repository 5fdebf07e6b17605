// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Intercom side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use groupdesk_core::types::{
    AdapterType, ContactProfile, ConversationMetadata, HealthStatus, Platform, RemoteConversation,
};
use groupdesk_core::{ConversationPlatform, PluginAdapter, RelayError};

/// A conversation opened through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedConversation {
    pub id: String,
    pub contact_id: String,
    pub display_name: String,
    pub initial_text: String,
    pub metadata: ConversationMetadata,
}

/// A reply appended through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub conversation_id: String,
    pub text: String,
    pub contact_id: String,
}

/// Records every call and fails on demand.
///
/// Conversation ids are `conv-1`, `conv-2`, ... and contact ids are
/// `contact-<user_id>`.
#[derive(Default)]
pub struct MockConversationPlatform {
    created: Mutex<Vec<CreatedConversation>>,
    replies: Mutex<Vec<SentReply>>,
    remote: Mutex<HashMap<String, String>>,
    fail_replies_containing: Mutex<Vec<String>>,
    create_delay: Mutex<Duration>,
    fail_create: AtomicBool,
    fail_contacts: AtomicBool,
    contact_calls: AtomicUsize,
}

impl MockConversationPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspends inside `create_conversation` for `delay`, widening race windows.
    pub async fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().await = delay;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_contacts(&self, fail: bool) {
        self.fail_contacts.store(fail, Ordering::SeqCst);
    }

    /// Fails any reply whose text contains `needle`.
    pub async fn fail_replies_containing(&self, needle: &str) {
        self.fail_replies_containing
            .lock()
            .await
            .push(needle.to_string());
    }

    /// Stops failing replies.
    pub async fn heal_replies(&self) {
        self.fail_replies_containing.lock().await.clear();
    }

    /// Registers a conversation that `find_conversation_by_group_id` will return.
    pub async fn add_remote_conversation(&self, group_id: &str, conversation_id: &str) {
        self.remote
            .lock()
            .await
            .insert(group_id.to_string(), conversation_id.to_string());
    }

    pub async fn created(&self) -> Vec<CreatedConversation> {
        self.created.lock().await.clone()
    }

    pub async fn replies(&self) -> Vec<SentReply> {
        self.replies.lock().await.clone()
    }

    /// Texts delivered into `conversation_id`, seed message first.
    pub async fn conversation_texts(&self, conversation_id: &str) -> Vec<String> {
        let mut texts: Vec<String> = self
            .created
            .lock()
            .await
            .iter()
            .filter(|c| c.id == conversation_id)
            .map(|c| c.initial_text.clone())
            .collect();
        texts.extend(
            self.replies
                .lock()
                .await
                .iter()
                .filter(|r| r.conversation_id == conversation_id)
                .map(|r| r.text.clone()),
        );
        texts
    }

    /// Number of `resolve_or_create_contact` calls.
    pub fn contact_calls(&self) -> usize {
        self.contact_calls.load(Ordering::SeqCst)
    }
}

fn intercom_error(message: impl Into<String>) -> RelayError {
    RelayError::platform(Platform::Intercom, message)
}

#[async_trait]
impl PluginAdapter for MockConversationPlatform {
    fn name(&self) -> &str {
        "mock-conversation"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Conversation
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationPlatform for MockConversationPlatform {
    async fn create_conversation(
        &self,
        contact_id: &str,
        display_name: &str,
        initial_text: &str,
        metadata: &ConversationMetadata,
    ) -> Result<String, RelayError> {
        let delay = *self.create_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(intercom_error("create conversation failed"));
        }

        let mut created = self.created.lock().await;
        let id = format!("conv-{}", created.len() + 1);
        created.push(CreatedConversation {
            id: id.clone(),
            contact_id: contact_id.to_string(),
            display_name: display_name.to_string(),
            initial_text: initial_text.to_string(),
            metadata: metadata.clone(),
        });
        Ok(id)
    }

    async fn send_reply(
        &self,
        conversation_id: &str,
        text: &str,
        contact_id: &str,
    ) -> Result<(), RelayError> {
        let failing = self.fail_replies_containing.lock().await;
        if failing.iter().any(|needle| text.contains(needle.as_str())) {
            return Err(intercom_error(format!("reply to {conversation_id} failed")));
        }
        drop(failing);

        self.replies.lock().await.push(SentReply {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
            contact_id: contact_id.to_string(),
        });
        Ok(())
    }

    async fn find_conversation_by_group_id(
        &self,
        group_id: &str,
    ) -> Result<Option<RemoteConversation>, RelayError> {
        Ok(self
            .remote
            .lock()
            .await
            .get(group_id)
            .map(|id| RemoteConversation {
                id: id.clone(),
                group_id: Some(group_id.to_string()),
            }))
    }

    async fn resolve_or_create_contact(
        &self,
        user_id: &str,
        _profile: &ContactProfile,
    ) -> Result<String, RelayError> {
        self.contact_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_contacts.load(Ordering::SeqCst) {
            return Err(intercom_error("contact lookup failed"));
        }
        Ok(format!("contact-{user_id}"))
    }
}
