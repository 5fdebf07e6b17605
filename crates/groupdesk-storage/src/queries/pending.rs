// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-group FIFO of undelivered messages, plus the dead-letter table.
//!
//! Messages are stored as JSON. Order is the autoincrement `seq`, which never
//! reuses values, so a drained snapshot can be removed by its highest `seq`
//! without touching later arrivals.

use chrono::{DateTime, Utc};
use groupdesk_core::RelayError;
use groupdesk_core::types::{DeadLetter, Message, QueuedMessage};
use rusqlite::{TransactionBehavior, params};
use tracing::warn;

use crate::database::{Database, map_tr_err, now_millis};

fn encode(message: &Message) -> Result<String, RelayError> {
    serde_json::to_string(message).map_err(RelayError::storage)
}

fn decode(payload: &str) -> Result<Message, RelayError> {
    serde_json::from_str(payload).map_err(RelayError::storage)
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Appends a message. Returns its sequence number.
pub async fn enqueue(
    db: &Database,
    group_id: &str,
    message: &Message,
    attempts: u32,
) -> Result<i64, RelayError> {
    let group_id = group_id.to_string();
    let payload = encode(message)?;
    let now = now_millis();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO pending_messages (group_id, payload, attempts, enqueued_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![group_id, payload, attempts, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Every buffered message for the group in arrival order. Nothing is removed.
///
/// A row whose payload no longer decodes is moved to the dead-letter table
/// with its raw payload and left out of the snapshot.
pub async fn drain(db: &Database, group_id: &str) -> Result<Vec<QueuedMessage>, RelayError> {
    let group = group_id.to_string();
    let rows: Vec<(i64, String, u32, i64)> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, payload, attempts, enqueued_at
                 FROM pending_messages WHERE group_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![group], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    let mut snapshot = Vec::with_capacity(rows.len());
    let mut undecodable = Vec::new();
    for (seq, payload, attempts, enqueued_at) in rows {
        match decode(&payload) {
            Ok(message) => snapshot.push(QueuedMessage {
                seq,
                message,
                attempts,
                enqueued_at: timestamp(enqueued_at),
            }),
            Err(e) => {
                warn!(group_id, seq, error = %e, "undecodable pending message, dead-lettering");
                undecodable.push((seq, format!("undecodable payload: {e}")));
            }
        }
    }

    if !undecodable.is_empty() {
        if let Err(e) = quarantine(db, undecodable).await {
            warn!(group_id, error = %e, "failed to dead-letter undecodable messages");
        }
    }
    Ok(snapshot)
}

/// Moves rows into `dead_letters` verbatim, one `(seq, reason)` pair each.
async fn quarantine(db: &Database, rows: Vec<(i64, String)>) -> Result<(), RelayError> {
    let now = now_millis();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for (seq, reason) in &rows {
                tx.execute(
                    "INSERT INTO dead_letters (group_id, payload, attempts, reason, failed_at)
                     SELECT group_id, payload, attempts, ?2, ?3
                     FROM pending_messages WHERE seq = ?1",
                    params![seq, reason, now],
                )?;
                tx.execute("DELETE FROM pending_messages WHERE seq = ?1", params![seq])?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn clear(db: &Database, group_id: &str) -> Result<(), RelayError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM pending_messages WHERE group_id = ?1",
                params![group_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes the entries of one drained snapshot (`seq <= through_seq`).
pub async fn remove_through(
    db: &Database,
    group_id: &str,
    through_seq: i64,
) -> Result<(), RelayError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM pending_messages WHERE group_id = ?1 AND seq <= ?2",
                params![group_id, through_seq],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrites the attempt count of one entry without moving it.
pub async fn set_attempts(
    db: &Database,
    group_id: &str,
    seq: i64,
    attempts: u32,
) -> Result<(), RelayError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE pending_messages SET attempts = ?3 WHERE group_id = ?1 AND seq = ?2",
                params![group_id, seq, attempts],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn length(db: &Database, group_id: &str) -> Result<usize, RelayError> {
    let group_id = group_id.to_string();
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM pending_messages WHERE group_id = ?1",
                params![group_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(usize::try_from(count).unwrap_or_default())
}

/// Groups with at least one buffered message, oldest backlog first.
pub async fn pending_groups(db: &Database) -> Result<Vec<String>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id FROM pending_messages
                 GROUP BY group_id ORDER BY MIN(seq) ASC",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn dead_letter(
    db: &Database,
    group_id: &str,
    message: &Message,
    attempts: u32,
    reason: &str,
) -> Result<(), RelayError> {
    let group_id = group_id.to_string();
    let payload = encode(message)?;
    let reason = reason.to_string();
    let now = now_millis();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO dead_letters (group_id, payload, attempts, reason, failed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![group_id, payload, attempts, reason, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn dead_letters(db: &Database, group_id: &str) -> Result<Vec<DeadLetter>, RelayError> {
    let group = group_id.to_string();
    let rows: Vec<(String, u32, String, i64)> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT payload, attempts, reason, failed_at
                 FROM dead_letters WHERE group_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![group], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    // Rows quarantined by `drain` keep a payload that cannot be decoded.
    Ok(rows
        .into_iter()
        .filter_map(|(payload, attempts, reason, failed_at)| match decode(&payload) {
            Ok(message) => Some(DeadLetter {
                group_id: group_id.to_string(),
                message,
                attempts,
                reason,
                failed_at: timestamp(failed_at),
            }),
            Err(e) => {
                warn!(group_id, error = %e, reason = %reason, "skipping undecodable dead letter");
                None
            }
        })
        .collect())
}
