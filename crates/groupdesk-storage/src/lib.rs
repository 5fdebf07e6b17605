// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for Groupdesk.
//!
//! One WAL-mode database holds the group bindings, the contact cache, the
//! provisioning locks, and the pending queue. All access is serialized
//! through `tokio-rusqlite`'s single background thread, so set-if-absent and
//! append operations are atomic without further coordination in-process;
//! `BEGIN IMMEDIATE` keeps them atomic across processes sharing the file.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
