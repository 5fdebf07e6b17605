// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Telegram side.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use groupdesk_core::types::{AdapterType, HealthStatus, MessageId, Platform};
use groupdesk_core::{PluginAdapter, RelayError, SourcePlatform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub group_id: String,
    pub text: String,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAttachment {
    pub group_id: String,
    pub url: String,
    pub caption: Option<String>,
}

/// Captures outbound group messages.
#[derive(Default)]
pub struct MockSourcePlatform {
    texts: Mutex<Vec<SentText>>,
    attachments: Mutex<Vec<SentAttachment>>,
    fail_urls_containing: Mutex<Vec<String>>,
    fail_texts: Mutex<bool>,
    next_id: AtomicUsize,
}

impl MockSourcePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_texts(&self, fail: bool) {
        *self.fail_texts.lock().await = fail;
    }

    /// Fails attachment sends whose URL contains `needle`.
    pub async fn fail_urls_containing(&self, needle: &str) {
        self.fail_urls_containing
            .lock()
            .await
            .push(needle.to_string());
    }

    pub async fn texts(&self) -> Vec<SentText> {
        self.texts.lock().await.clone()
    }

    pub async fn attachments(&self) -> Vec<SentAttachment> {
        self.attachments.lock().await.clone()
    }

    fn next_message_id(&self) -> MessageId {
        MessageId((self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string())
    }
}

#[async_trait]
impl PluginAdapter for MockSourcePlatform {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl SourcePlatform for MockSourcePlatform {
    async fn send(
        &self,
        group_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<MessageId, RelayError> {
        if *self.fail_texts.lock().await {
            return Err(RelayError::platform(Platform::Telegram, "send failed"));
        }
        self.texts.lock().await.push(SentText {
            group_id: group_id.to_string(),
            text: text.to_string(),
            reply_to: reply_to.map(str::to_string),
        });
        Ok(self.next_message_id())
    }

    async fn send_attachment(
        &self,
        group_id: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, RelayError> {
        let failing = self.fail_urls_containing.lock().await;
        if failing.iter().any(|needle| url.contains(needle.as_str())) {
            return Err(RelayError::platform(
                Platform::Telegram,
                format!("upload of {url} failed"),
            ));
        }
        drop(failing);

        self.attachments.lock().await.push(SentAttachment {
            group_id: group_id.to_string(),
            url: url.to_string(),
            caption: caption.map(str::to_string),
        });
        Ok(self.next_message_id())
    }
}
