// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group binding persistence.

use groupdesk_core::RelayError;
use groupdesk_core::types::GroupBinding;
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};

/// Upserts the binding for its group.
///
/// A conversation belongs to at most one group, so any other group still
/// pointing at the same conversation is unbound in the same transaction.
pub async fn save_binding(db: &Database, binding: &GroupBinding) -> Result<(), RelayError> {
    let binding = binding.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "DELETE FROM bindings WHERE conversation_id = ?1 AND group_id != ?2",
                params![binding.conversation_id, binding.group_id],
            )?;
            tx.execute(
                "INSERT INTO bindings (group_id, conversation_id, last_message_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(group_id) DO UPDATE SET
                     conversation_id = excluded.conversation_id,
                     last_message_id = excluded.last_message_id,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    binding.group_id,
                    binding.conversation_id,
                    binding.last_message_id
                ],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_binding(db: &Database, group_id: &str) -> Result<Option<GroupBinding>, RelayError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT group_id, conversation_id, last_message_id
                 FROM bindings WHERE group_id = ?1",
                params![group_id],
                |row| {
                    Ok(GroupBinding {
                        group_id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        last_message_id: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Reverse lookup through the unique conversation index.
pub async fn get_group_id(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<String>, RelayError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT group_id FROM bindings WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_last_message_id(
    db: &Database,
    group_id: &str,
    message_id: &str,
) -> Result<(), RelayError> {
    let group_id = group_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bindings SET last_message_id = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE group_id = ?1",
                params![group_id, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Every binding, ordered by group id. Used by the `binding list` command.
pub async fn list_bindings(db: &Database) -> Result<Vec<GroupBinding>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id, conversation_id, last_message_id
                 FROM bindings ORDER BY group_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(GroupBinding {
                    group_id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    last_message_id: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(group: &str, conversation: &str, last: Option<&str>) -> GroupBinding {
        GroupBinding {
            group_id: group.to_string(),
            conversation_id: conversation.to_string(),
            last_message_id: last.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn save_twice_keeps_latest() {
        let db = Database::open_in_memory().await.unwrap();
        save_binding(&db, &binding("-1", "conv-a", Some("m1"))).await.unwrap();
        save_binding(&db, &binding("-1", "conv-b", Some("m2"))).await.unwrap();

        let stored = get_binding(&db, "-1").await.unwrap().unwrap();
        assert_eq!(stored, binding("-1", "conv-b", Some("m2")));
        assert_eq!(get_group_id(&db, "conv-a").await.unwrap(), None);
        assert_eq!(get_group_id(&db, "conv-b").await.unwrap().as_deref(), Some("-1"));
    }

    #[tokio::test]
    async fn reverse_lookup_matches_every_binding() {
        let db = Database::open_in_memory().await.unwrap();
        for i in 0..5 {
            save_binding(&db, &binding(&format!("-{i}"), &format!("conv-{i}"), None))
                .await
                .unwrap();
        }
        for i in 0..5 {
            let group = get_group_id(&db, &format!("conv-{i}")).await.unwrap();
            assert_eq!(group, Some(format!("-{i}")));
        }
        assert_eq!(get_group_id(&db, "conv-missing").await.unwrap(), None);
        assert_eq!(list_bindings(&db).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn rebinding_a_conversation_moves_it() {
        let db = Database::open_in_memory().await.unwrap();
        save_binding(&db, &binding("-1", "conv", None)).await.unwrap();
        save_binding(&db, &binding("-2", "conv", None)).await.unwrap();

        assert!(get_binding(&db, "-1").await.unwrap().is_none());
        assert_eq!(get_group_id(&db, "conv").await.unwrap().as_deref(), Some("-2"));
    }

    #[tokio::test]
    async fn update_last_message_id_is_partial() {
        let db = Database::open_in_memory().await.unwrap();
        save_binding(&db, &binding("-1", "conv", Some("m1"))).await.unwrap();
        update_last_message_id(&db, "-1", "m9").await.unwrap();
        assert_eq!(
            get_binding(&db, "-1").await.unwrap().unwrap(),
            binding("-1", "conv", Some("m9"))
        );

        // Unknown group is a no-op.
        update_last_message_id(&db, "-404", "m1").await.unwrap();
        assert!(get_binding(&db, "-404").await.unwrap().is_none());
    }
}
