// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TTL cache of user -> contact ids.

use std::time::Duration;

use groupdesk_core::RelayError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_millis};

/// Returns the cached contact id if it has not expired.
pub async fn get_contact(db: &Database, user_id: &str) -> Result<Option<String>, RelayError> {
    let user_id = user_id.to_string();
    let now = now_millis();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT contact_id FROM contacts WHERE user_id = ?1 AND expires_at > ?2",
                params![user_id, now],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save_contact(
    db: &Database,
    user_id: &str,
    contact_id: &str,
    ttl: Duration,
) -> Result<(), RelayError> {
    let user_id = user_id.to_string();
    let contact_id = contact_id.to_string();
    let expires_at = now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (user_id, contact_id, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     contact_id = excluded.contact_id,
                     expires_at = excluded.expires_at",
                params![user_id, contact_id, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn invalidate_contact(db: &Database, user_id: &str) -> Result<(), RelayError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM contacts WHERE user_id = ?1", params![user_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cached_contact_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(get_contact(&db, "42").await.unwrap(), None);

        save_contact(&db, "42", "contact-1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(get_contact(&db, "42").await.unwrap().as_deref(), Some("contact-1"));

        save_contact(&db, "42", "contact-2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(get_contact(&db, "42").await.unwrap().as_deref(), Some("contact-2"));
    }

    #[tokio::test]
    async fn expired_contact_is_a_miss() {
        let db = Database::open_in_memory().await.unwrap();
        save_contact(&db, "42", "contact-1", Duration::ZERO).await.unwrap();
        assert_eq!(get_contact(&db, "42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_removes_mapping() {
        let db = Database::open_in_memory().await.unwrap();
        save_contact(&db, "42", "contact-1", Duration::from_secs(60)).await.unwrap();
        invalidate_contact(&db, "42").await.unwrap();
        assert_eq!(get_contact(&db, "42").await.unwrap(), None);
        invalidate_contact(&db, "42").await.unwrap();
    }
}
