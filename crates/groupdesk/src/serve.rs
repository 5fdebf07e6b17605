// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `groupdesk serve` command implementation.
//!
//! Opens the store, builds both platform adapters and the routing core,
//! then runs the webhook server, Telegram polling, the router, and the
//! retry sweeper until a shutdown signal arrives.

use std::sync::Arc;

use groupdesk_bridge::{ContactResolver, Forwarder, Provisioner, RelaySettings, Router};
use groupdesk_config::model::GroupdeskConfig;
use groupdesk_core::{HealthStatus, PluginAdapter, RelayError};
use groupdesk_intercom::IntercomPlatform;
use groupdesk_intercom::webhook::{self, MetricsRender, WebhookState};
use groupdesk_storage::SqliteStore;
use groupdesk_telegram::TelegramSource;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// Capacity of the inbound event channel shared by both adapters.
const EVENT_BUFFER: usize = 256;

/// Runs the relay until SIGINT/SIGTERM.
pub async fn run_serve(config: GroupdeskConfig) -> Result<(), RelayError> {
    init_tracing(&config.relay.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting groupdesk");

    let metrics_render = if config.webhook.metrics {
        install_prometheus()
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    let store = Arc::new(SqliteStore::open(&config.storage, config.relay.lock_ttl()).await?);
    let telegram = Arc::new(TelegramSource::new(&config.telegram)?);
    let intercom = Arc::new(IntercomPlatform::new(&config.intercom)?);

    report_health(store.as_ref()).await;
    report_health(telegram.as_ref()).await;
    report_health(intercom.as_ref()).await;

    let settings = RelaySettings::from(&config.relay);
    let contacts = Arc::new(ContactResolver::new(
        store.clone(),
        intercom.clone(),
        settings.contact_ttl,
    ));
    let forwarder = Arc::new(Forwarder::new(
        store.clone(),
        store.clone(),
        intercom.clone(),
        telegram.clone(),
        contacts,
        settings,
    ));
    let provisioner = Arc::new(Provisioner::new(
        store.clone(),
        store.clone(),
        store.clone(),
        intercom.clone(),
        forwarder.clone(),
    ));
    let router = Arc::new(Router::new(
        store.clone(),
        store.clone(),
        forwarder,
        provisioner,
    ));

    let cancel = shutdown::install_signal_handler();
    let tracker = TaskTracker::new();
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

    let webhook_state = WebhookState {
        events: events_tx.clone(),
        client_secret: config.intercom.client_secret.clone(),
        metrics: metrics_render,
    };
    if webhook_state.client_secret.is_none() {
        warn!("intercom.client_secret is not set, webhook signatures will not be verified");
    }
    {
        let host = config.webhook.host.clone();
        let port = config.webhook.port;
        let cancel = cancel.clone();
        tracker.spawn(async move {
            if let Err(e) = webhook::serve(&host, port, webhook_state, cancel.clone()).await {
                error!(error = %e, "webhook server failed, shutting down");
                cancel.cancel();
            }
        });
    }

    telegram.connect(events_tx).await?;

    tracker.spawn(
        router
            .clone()
            .run_retry_sweep(config.relay.retry_interval(), cancel.clone()),
    );

    router.run(events_rx, cancel.clone()).await;

    info!("shutting down");
    if let Err(e) = telegram.shutdown().await {
        warn!(error = %e, "telegram shutdown failed");
    }
    if let Err(e) = intercom.shutdown().await {
        warn!(error = %e, "intercom shutdown failed");
    }
    tracker.close();
    tracker.wait().await;
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "store shutdown failed");
    }

    info!("groupdesk stopped");
    Ok(())
}

/// Logs an adapter's health at startup. Unhealthy adapters do not stop the
/// relay; their calls fail and are retried like any other remote failure.
async fn report_health(adapter: &dyn PluginAdapter) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => info!(adapter = adapter.name(), "adapter healthy"),
        Ok(HealthStatus::Degraded(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter degraded")
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter unhealthy")
        }
        Err(e) => warn!(adapter = adapter.name(), error = %e, "adapter health check failed"),
    }
}

/// Installs the Prometheus recorder and returns its renderer for
/// `GET /metrics`. Failure disables metrics without stopping the relay.
fn install_prometheus() -> Option<MetricsRender> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            groupdesk_bridge::metrics::register_metrics();
            info!("prometheus metrics enabled");
            Some(Arc::new(move || handle.render()) as MetricsRender)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .is_err()
    {
        debug!("tracing subscriber already installed");
    }
}

fn default_filter(log_level: &str) -> String {
    let crates = [
        "groupdesk",
        "groupdesk_bridge",
        "groupdesk_storage",
        "groupdesk_telegram",
        "groupdesk_intercom",
    ];
    let mut directives: Vec<String> = crates.iter().map(|c| format!("{c}={log_level}")).collect();
    directives.push("warn".to_string());
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_relay_crates() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("groupdesk=debug,"));
        assert!(filter.contains("groupdesk_bridge=debug"));
        assert!(filter.ends_with(",warn"));
        assert!(tracing_subscriber::EnvFilter::try_new(&filter).is_ok());
    }

    #[tokio::test]
    async fn serve_fails_fast_without_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GroupdeskConfig::default();
        config.storage.database_path = dir.path().join("serve.db").display().to_string();

        let err = run_serve(config).await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert!(err.to_string().contains("telegram.bot_token"));
    }
}
