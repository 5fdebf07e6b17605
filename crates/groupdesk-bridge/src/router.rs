// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level coordinator for both directions.

use std::sync::Arc;
use std::time::Duration;

use strum::IntoStaticStr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use groupdesk_core::{BindingStore, BridgeEvent, Message, PendingQueue, Platform};

use crate::forward::Forwarder;
use crate::metrics;
use crate::provisioner::{ProvisionOutcome, Provisioner};

/// Terminal state of one routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RouteOutcome {
    /// Appended to the group's existing conversation.
    Forwarded,
    /// Started a new conversation.
    Provisioned,
    /// Waiting in the group's pending queue.
    Queued,
    /// Missing routing fields; logged and discarded.
    Rejected,
    /// Support reply posted into its group.
    Delivered,
    /// Support reply could not be posted.
    Failed,
    /// Support reply for a conversation with no bound group.
    Dropped,
}

pub struct Router {
    store: Arc<dyn BindingStore>,
    queue: Arc<dyn PendingQueue>,
    forwarder: Arc<Forwarder>,
    provisioner: Arc<Provisioner>,
}

impl Router {
    pub fn new(
        store: Arc<dyn BindingStore>,
        queue: Arc<dyn PendingQueue>,
        forwarder: Arc<Forwarder>,
        provisioner: Arc<Provisioner>,
    ) -> Self {
        Self {
            store,
            queue,
            forwarder,
            provisioner,
        }
    }

    /// Consumes events until the channel closes or `cancel` fires, then waits
    /// for in-flight handlers.
    ///
    /// Each event runs on its own task so a slow provisioning never blocks
    /// other groups.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<BridgeEvent>, cancel: CancellationToken) {
        let tracker = TaskTracker::new();
        info!("router running");

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("event channel closed, stopping router");
                        break;
                    };
                    let router = Arc::clone(&self);
                    tracker.spawn(async move {
                        router.handle_event(event).await;
                    });
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping router");
                    break;
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        info!("router stopped");
    }

    /// Runs [`retry_pending`](Self::retry_pending) every `interval` until cancelled.
    pub async fn run_retry_sweep(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.retry_pending().await,
                _ = cancel.cancelled() => {
                    info!("retry sweep shutting down");
                    break;
                }
            }
        }
    }

    /// Handles one adapter event. Errors from adapters are logged only.
    pub async fn handle_event(&self, event: BridgeEvent) -> Option<RouteOutcome> {
        match event {
            BridgeEvent::Message(message) => Some(self.route(&message).await),
            BridgeEvent::Error { platform, error } => {
                error!(%platform, error = %error, "adapter error");
                None
            }
        }
    }

    /// Routes a message by the platform it came from.
    pub async fn route(&self, message: &Message) -> RouteOutcome {
        match message.sender.platform {
            Platform::Telegram => {
                let outcome = self.route_from_source(message).await;
                metrics::record_message("inbound", outcome.into());
                outcome
            }
            Platform::Intercom => {
                let outcome = self.route_from_conversation(message).await;
                metrics::record_message("outbound", outcome.into());
                outcome
            }
        }
    }

    /// Group message towards its conversation.
    pub async fn route_from_source(&self, message: &Message) -> RouteOutcome {
        let Some(group_id) = message.group_id.as_deref().filter(|g| !g.trim().is_empty()) else {
            warn!(message_id = %message.id, "group message without group_id rejected");
            return RouteOutcome::Rejected;
        };

        let conversation_id = match self.store.get_conversation_id(group_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(group_id, error = %e, "binding lookup failed, treating group as unbound");
                None
            }
        };

        match conversation_id {
            Some(conversation_id) => self.forward_bound(group_id, &conversation_id, message).await,
            None => self.provision(message).await,
        }
    }

    async fn forward_bound(&self, group_id: &str, conversation_id: &str, message: &Message) -> RouteOutcome {
        if let Err(e) = self
            .forwarder
            .forward_to_conversation(group_id, conversation_id, message)
            .await
        {
            warn!(group_id, conversation_id, message_id = %message.id, error = %e, "forward failed");
            self.forwarder.requeue(group_id, message, 1, &e.to_string()).await;
            return RouteOutcome::Queued;
        }

        // Messages that queued up while the group was being provisioned, or
        // after earlier failures, follow the one that just got through.
        match self.queue.length(group_id).await {
            Ok(0) => {}
            Ok(_) => {
                self.provisioner.flush_pending(group_id, conversation_id).await;
            }
            Err(e) => debug!(group_id, error = %e, "queue length check failed"),
        }
        RouteOutcome::Forwarded
    }

    async fn provision(&self, message: &Message) -> RouteOutcome {
        match self.provisioner.provision(message, 0).await {
            ProvisionOutcome::Created(_) => RouteOutcome::Provisioned,
            ProvisionOutcome::Existing(_) | ProvisionOutcome::Recovered(_) => RouteOutcome::Forwarded,
            ProvisionOutcome::Contended(_) | ProvisionOutcome::Failed => {
                info!(message_id = %message.id, "no conversation yet, message left queued");
                RouteOutcome::Queued
            }
            ProvisionOutcome::Invalid(_) => RouteOutcome::Rejected,
        }
    }

    /// Support reply back into its group.
    pub async fn route_from_conversation(&self, message: &Message) -> RouteOutcome {
        let Some(conversation_id) = message.conversation_id.as_deref() else {
            warn!(message_id = %message.id, "support reply without conversation_id dropped");
            metrics::record_reply_dropped();
            return RouteOutcome::Dropped;
        };

        let group_id = match self.store.get_group_id(conversation_id).await {
            Ok(Some(group_id)) => group_id,
            Ok(None) => {
                warn!(conversation_id, message_id = %message.id, "no group bound to conversation, reply dropped");
                metrics::record_reply_dropped();
                return RouteOutcome::Dropped;
            }
            Err(e) => {
                error!(conversation_id, error = %e, "reverse binding lookup failed");
                return RouteOutcome::Failed;
            }
        };

        match self.forwarder.forward_to_source(&group_id, message).await {
            Ok(()) => {
                debug!(group_id = %group_id, conversation_id, "support reply delivered");
                RouteOutcome::Delivered
            }
            Err(e) => {
                error!(group_id = %group_id, conversation_id, error = %e, "support reply delivery failed");
                RouteOutcome::Failed
            }
        }
    }

    /// Retries every non-empty pending queue once.
    ///
    /// Bound groups are flushed. For an unbound group the oldest message is
    /// provisioned again as the trigger without leaving the queue, so arrival
    /// order survives any number of failed or contended sweeps.
    pub async fn retry_pending(&self) {
        let groups = match self.queue.pending_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "retry sweep could not list pending groups");
                return;
            }
        };

        for group_id in &groups {
            match self.store.get_conversation_id(group_id).await {
                Ok(Some(conversation_id)) => {
                    self.provisioner.flush_pending(group_id, &conversation_id).await;
                }
                Ok(None) => self.retry_unbound(group_id).await,
                Err(e) => warn!(group_id, error = %e, "retry sweep binding lookup failed"),
            }
        }

        let mut pending = 0;
        for group_id in &groups {
            pending += self.queue.length(group_id).await.unwrap_or_default();
        }
        metrics::set_pending_messages(pending);
        debug!(groups = groups.len(), pending, "retry sweep complete");
    }

    async fn retry_unbound(&self, group_id: &str) {
        match self.provisioner.provision_queued(group_id).await {
            Some(outcome) => debug!(group_id, ?outcome, "retried provisioning"),
            None => debug!(group_id, "provisioning retry deferred"),
        }
    }
}
