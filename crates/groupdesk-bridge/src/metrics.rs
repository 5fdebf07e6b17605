// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions and recording helpers.
//!
//! Recorded through the `metrics` facade; without an installed recorder every
//! call is a no-op.

use metrics::{describe_counter, describe_gauge};

/// Registers metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!(
        "groupdesk_messages_total",
        "Routed messages by direction and outcome"
    );
    describe_counter!(
        "groupdesk_conversations_created_total",
        "Conversations provisioned for new groups"
    );
    describe_counter!(
        "groupdesk_replies_dropped_total",
        "Support replies with no bound group"
    );
    describe_counter!(
        "groupdesk_dead_letters_total",
        "Messages moved to the dead-letter table"
    );
    describe_gauge!(
        "groupdesk_pending_messages",
        "Messages waiting in pending queues at the last retry sweep"
    );
}

/// Records one routed message. `direction` is `inbound` (group to support) or
/// `outbound` (support to group).
pub fn record_message(direction: &'static str, outcome: &'static str) {
    metrics::counter!(
        "groupdesk_messages_total",
        "direction" => direction,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_conversation_created() {
    metrics::counter!("groupdesk_conversations_created_total").increment(1);
}

pub fn record_reply_dropped() {
    metrics::counter!("groupdesk_replies_dropped_total").increment(1);
}

pub fn record_dead_letter() {
    metrics::counter!("groupdesk_dead_letters_total").increment(1);
}

pub fn set_pending_messages(count: usize) {
    metrics::gauge!("groupdesk_pending_messages").set(count as f64);
}
