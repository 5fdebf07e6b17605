// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the binding, lock, and queue traits.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use groupdesk_config::model::StorageConfig;
use groupdesk_core::types::{DeadLetter, GroupBinding, Message, QueuedMessage};
use groupdesk_core::{
    AdapterType, BindingStore, GroupLock, HealthStatus, PendingQueue, PluginAdapter, RelayError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store shared by every relay component.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
    lock_ttl: Duration,
}

impl SqliteStore {
    /// Opens the configured database. `lock_ttl` bounds how long an abandoned
    /// provisioning lock blocks its group.
    pub async fn open(config: &StorageConfig, lock_ttl: Duration) -> Result<Self, RelayError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "sqlite store ready");
        Ok(Self::new(db, lock_ttl))
    }

    pub fn new(db: Database, lock_ttl: Duration) -> Self {
        Self { db, lock_ttl }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Every stored binding.
    pub async fn list_bindings(&self) -> Result<Vec<GroupBinding>, RelayError> {
        queries::bindings::list_bindings(&self.db).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl BindingStore for SqliteStore {
    async fn save_binding(&self, binding: &GroupBinding) -> Result<(), RelayError> {
        queries::bindings::save_binding(&self.db, binding).await
    }

    async fn get_binding(&self, group_id: &str) -> Result<Option<GroupBinding>, RelayError> {
        queries::bindings::get_binding(&self.db, group_id).await
    }

    async fn get_group_id(&self, conversation_id: &str) -> Result<Option<String>, RelayError> {
        queries::bindings::get_group_id(&self.db, conversation_id).await
    }

    async fn update_last_message_id(
        &self,
        group_id: &str,
        message_id: &str,
    ) -> Result<(), RelayError> {
        queries::bindings::update_last_message_id(&self.db, group_id, message_id).await
    }

    async fn get_contact(&self, user_id: &str) -> Result<Option<String>, RelayError> {
        queries::contacts::get_contact(&self.db, user_id).await
    }

    async fn save_contact(
        &self,
        user_id: &str,
        contact_id: &str,
        ttl: Duration,
    ) -> Result<(), RelayError> {
        queries::contacts::save_contact(&self.db, user_id, contact_id, ttl).await
    }

    async fn invalidate_contact(&self, user_id: &str) -> Result<(), RelayError> {
        queries::contacts::invalidate_contact(&self.db, user_id).await
    }
}

#[async_trait]
impl GroupLock for SqliteStore {
    async fn acquire(&self, group_id: &str) -> Result<bool, RelayError> {
        queries::locks::acquire(&self.db, group_id, self.lock_ttl).await
    }

    async fn release(&self, group_id: &str) -> Result<(), RelayError> {
        queries::locks::release(&self.db, group_id).await
    }
}

#[async_trait]
impl PendingQueue for SqliteStore {
    async fn enqueue(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
    ) -> Result<i64, RelayError> {
        queries::pending::enqueue(&self.db, group_id, message, attempts).await
    }

    async fn drain(&self, group_id: &str) -> Result<Vec<QueuedMessage>, RelayError> {
        queries::pending::drain(&self.db, group_id).await
    }

    async fn clear(&self, group_id: &str) -> Result<(), RelayError> {
        queries::pending::clear(&self.db, group_id).await
    }

    async fn remove_through(&self, group_id: &str, through_seq: i64) -> Result<(), RelayError> {
        queries::pending::remove_through(&self.db, group_id, through_seq).await
    }

    async fn set_attempts(&self, group_id: &str, seq: i64, attempts: u32) -> Result<(), RelayError> {
        queries::pending::set_attempts(&self.db, group_id, seq, attempts).await
    }

    async fn length(&self, group_id: &str) -> Result<usize, RelayError> {
        queries::pending::length(&self.db, group_id).await
    }

    async fn pending_groups(&self) -> Result<Vec<String>, RelayError> {
        queries::pending::pending_groups(&self.db).await
    }

    async fn dead_letter(
        &self,
        group_id: &str,
        message: &Message,
        attempts: u32,
        reason: &str,
    ) -> Result<(), RelayError> {
        queries::pending::dead_letter(&self.db, group_id, message, attempts, reason).await
    }

    async fn dead_letters(&self, group_id: &str) -> Result<Vec<DeadLetter>, RelayError> {
        queries::pending::dead_letters(&self.db, group_id).await
    }
}
