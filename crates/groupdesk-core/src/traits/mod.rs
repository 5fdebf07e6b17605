// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the relay core and its collaborators.
//!
//! Platform adapters extend [`PluginAdapter`]; the three store traits are
//! implemented by the storage backend. All traits use `#[async_trait]` for
//! dynamic dispatch compatibility.

pub mod adapter;
pub mod conversation;
pub mod source;
pub mod store;

pub use adapter::PluginAdapter;
pub use conversation::ConversationPlatform;
pub use source::SourcePlatform;
pub use store::{BindingStore, GroupLock, PendingQueue};
