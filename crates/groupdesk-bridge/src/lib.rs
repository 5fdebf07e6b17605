// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message routing and conversation binding for Groupdesk.
//!
//! The [`Router`] consumes [`BridgeEvent`](groupdesk_core::BridgeEvent)s from
//! both platforms. Messages from a bound group are forwarded to its
//! conversation; the first message from an unbound group goes through the
//! [`Provisioner`], which creates exactly one conversation per group under a
//! store-level lock and replays whatever was queued meanwhile. Support
//! replies are resolved back to their group through the reverse binding.
//!
//! No routing failure escapes as an error: every message ends up forwarded,
//! queued for retry, dead-lettered, or dropped with a log line and a counter.

pub mod contacts;
pub mod format;
pub mod forward;
pub mod metrics;
pub mod provisioner;
pub mod router;
pub mod settings;

pub use contacts::ContactResolver;
pub use forward::{FlushReport, Forwarder};
pub use provisioner::{ProvisionOutcome, Provisioner};
pub use router::{RouteOutcome, Router};
pub use settings::RelaySettings;
