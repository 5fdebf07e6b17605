// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment discovery and file URL resolution for Telegram messages.
//!
//! Files are never downloaded by the relay. Each file is resolved through
//! `getFile` to a Bot API download URL, which is forwarded as-is.

use groupdesk_core::error::RelayError;
use groupdesk_core::types::{Attachment, AttachmentKind, Platform};
use teloxide::prelude::*;
use teloxide::types::{FileId, Message};
use tracing::debug;

const FILE_ENDPOINT: &str = "https://api.telegram.org/file/bot";

/// A file referenced by a message, before its URL is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub kind: AttachmentKind,
    pub file_id: FileId,
    pub name: Option<String>,
}

/// Lists the files carried by a message.
///
/// Photos contribute only their largest size (last in the array).
pub fn file_refs(msg: &Message) -> Vec<FileRef> {
    let mut refs = Vec::new();

    if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
        refs.push(FileRef {
            kind: AttachmentKind::Image,
            file_id: largest.file.id.clone(),
            name: None,
        });
    }
    if let Some(doc) = msg.document() {
        let is_image = doc
            .mime_type
            .as_ref()
            .is_some_and(|m| m.type_().as_str() == "image");
        refs.push(FileRef {
            kind: if is_image {
                AttachmentKind::Image
            } else {
                AttachmentKind::Document
            },
            file_id: doc.file.id.clone(),
            name: doc.file_name.clone(),
        });
    }
    if let Some(voice) = msg.voice() {
        refs.push(FileRef {
            kind: AttachmentKind::Audio,
            file_id: voice.file.id.clone(),
            name: None,
        });
    }
    if let Some(audio) = msg.audio() {
        refs.push(FileRef {
            kind: AttachmentKind::Audio,
            file_id: audio.file.id.clone(),
            name: audio.file_name.clone(),
        });
    }
    if let Some(video) = msg.video() {
        refs.push(FileRef {
            kind: AttachmentKind::Video,
            file_id: video.file.id.clone(),
            name: video.file_name.clone(),
        });
    }

    refs
}

/// Builds the Bot API download URL for a resolved file path.
pub fn download_url(token: &str, file_path: &str) -> String {
    format!("{FILE_ENDPOINT}{token}/{file_path}")
}

/// Resolves every file on the message to an [`Attachment`].
///
/// Stops at the first `getFile` failure.
pub async fn resolve_attachments(bot: &Bot, msg: &Message) -> Result<Vec<Attachment>, RelayError> {
    let refs = file_refs(msg);
    let mut attachments = Vec::with_capacity(refs.len());

    for file_ref in refs {
        let file = bot
            .get_file(file_ref.file_id.clone())
            .await
            .map_err(|e| RelayError::Platform {
                platform: Platform::Telegram,
                message: format!("failed to get file info: {e}"),
                source: Some(Box::new(e)),
            })?;

        debug!(file_id = %file_ref.file_id.0, path = %file.path, "resolved Telegram file");
        attachments.push(Attachment {
            kind: file_ref.kind,
            url: download_url(bot.token(), &file.path),
            name: file_ref.name,
        });
    }

    Ok(attachments)
}

/// Picks the attachment kind for an outbound URL from its file extension.
pub fn kind_for_url(url: &str) -> AttachmentKind {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" => AttachmentKind::Image,
        "mp3" | "ogg" | "oga" | "m4a" | "wav" => AttachmentKind::Audio,
        "mp4" | "mov" | "webm" => AttachmentKind::Video,
        _ => AttachmentKind::Document,
    }
}
