// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-group provisioning locks with expiry.

use std::time::Duration;

use groupdesk_core::RelayError;
use rusqlite::{TransactionBehavior, params};

use crate::database::{Database, map_tr_err, now_millis};

/// Takes the lock for `group_id` unless a live holder exists.
///
/// An expired row is removed first, then the insert succeeds only if no row
/// is left. Both happen inside one immediate transaction.
pub async fn acquire(db: &Database, group_id: &str, ttl: Duration) -> Result<bool, RelayError> {
    let group_id = group_id.to_string();
    let now = now_millis();
    let expires_at = now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "DELETE FROM group_locks WHERE group_id = ?1 AND expires_at <= ?2",
                params![group_id, now],
            )?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO group_locks (group_id, expires_at) VALUES (?1, ?2)",
                params![group_id, expires_at],
            )?;
            tx.commit()?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn release(db: &Database, group_id: &str) -> Result<(), RelayError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM group_locks WHERE group_id = ?1",
                params![group_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
