// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `groupdesk queue` and `groupdesk binding` operator commands.
//!
//! Each command returns its rendered output so `main` decides where it goes.

use groupdesk_core::{BindingStore, PendingQueue, RelayError};
use groupdesk_storage::SqliteStore;

/// Number of queued messages for a group.
pub async fn queue_length(store: &SqliteStore, group_id: &str) -> Result<String, RelayError> {
    let len = store.length(group_id).await?;
    Ok(format!("{group_id}: {len} pending"))
}

/// Lists every group with queued messages and its queue length.
pub async fn queue_list(store: &SqliteStore) -> Result<String, RelayError> {
    let groups = store.pending_groups().await?;
    if groups.is_empty() {
        return Ok("no pending messages".to_string());
    }
    let mut lines = Vec::with_capacity(groups.len());
    for group_id in groups {
        let len = store.length(&group_id).await?;
        lines.push(format!("{group_id}: {len} pending"));
    }
    Ok(lines.join("\n"))
}

/// Discards a group's queue.
pub async fn queue_clear(store: &SqliteStore, group_id: &str) -> Result<String, RelayError> {
    let len = store.length(group_id).await?;
    store.clear(group_id).await?;
    Ok(format!("{group_id}: cleared {len} pending"))
}

/// Dead-lettered messages for a group, one JSON object per line.
pub async fn dead_letters(store: &SqliteStore, group_id: &str) -> Result<String, RelayError> {
    let letters = store.dead_letters(group_id).await?;
    if letters.is_empty() {
        return Ok(format!("{group_id}: no dead letters"));
    }
    let lines = letters
        .iter()
        .map(|letter| {
            serde_json::json!({
                "message_id": letter.message.id,
                "attempts": letter.attempts,
                "reason": letter.reason,
                "failed_at": letter.failed_at.to_rfc3339(),
                "text": letter.message.text,
            })
            .to_string()
        })
        .collect::<Vec<_>>();
    Ok(lines.join("\n"))
}

/// The binding for one group.
pub async fn binding_show(store: &SqliteStore, group_id: &str) -> Result<String, RelayError> {
    match store.get_binding(group_id).await? {
        Some(binding) => Ok(format!(
            "{} -> {} (last message: {})",
            binding.group_id,
            binding.conversation_id,
            binding.last_message_id.as_deref().unwrap_or("-")
        )),
        None => Ok(format!("{group_id}: not bound")),
    }
}

/// Every stored binding, one per line.
pub async fn binding_list(store: &SqliteStore) -> Result<String, RelayError> {
    let bindings = store.list_bindings().await?;
    if bindings.is_empty() {
        return Ok("no bindings".to_string());
    }
    Ok(bindings
        .iter()
        .map(|b| format!("{} -> {}", b.group_id, b.conversation_id))
        .collect::<Vec<_>>()
        .join("\n"))
}
