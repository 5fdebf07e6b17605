// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions over [`Database`](crate::Database).

pub mod bindings;
pub mod contacts;
pub mod locks;
pub mod pending;
