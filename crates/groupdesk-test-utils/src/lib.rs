// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Groupdesk.
//!
//! - [`MemoryStore`] - binding store, lock, and queue in memory, with fault injection
//! - [`MockConversationPlatform`] - records created conversations and replies
//! - [`MockSourcePlatform`] - records messages posted into groups
//! - [`fixtures`] - message builders

pub mod fixtures;
pub mod memory_store;
pub mod mock_conversation;
pub mod mock_source;

pub use memory_store::MemoryStore;
pub use mock_conversation::{CreatedConversation, MockConversationPlatform, SentReply};
pub use mock_source::{MockSourcePlatform, SentAttachment, SentText};
