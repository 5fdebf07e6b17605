// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram source adapter for Groupdesk.
//!
//! Receives group messages through teloxide long polling and publishes them
//! as [`BridgeEvent`]s, and implements [`SourcePlatform`] for posting support
//! replies back into groups.

pub mod handler;
pub mod media;

use async_trait::async_trait;
use groupdesk_config::model::TelegramConfig;
use groupdesk_core::error::RelayError;
use groupdesk_core::traits::{PluginAdapter, SourcePlatform};
use groupdesk_core::types::{
    AdapterType, AttachmentKind, BridgeEvent, EventSender, HealthStatus, MessageId, Platform,
};
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, Recipient, ReplyParameters};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Telegram adapter implementing [`SourcePlatform`].
pub struct TelegramSource {
    bot: Bot,
    dispatcher: Mutex<Option<ShutdownToken>>,
}

impl TelegramSource {
    /// Creates a new Telegram adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, RelayError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            RelayError::Config("telegram.bot_token is required for the Telegram adapter".into())
        })?;

        if token.trim().is_empty() {
            return Err(RelayError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
            dispatcher: Mutex::new(None),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Starts long polling and publishes relayable group messages on `events`.
    ///
    /// Calling `connect` on an already connected adapter is a no-op.
    pub async fn connect(&self, events: EventSender) -> Result<(), RelayError> {
        let mut slot = self.dispatcher.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let events = events.clone();
            async move {
                if !handler::should_relay(&msg) {
                    debug!(chat_id = msg.chat.id.0, "ignoring non-group or bot message");
                    return respond(());
                }

                let attachments = match media::resolve_attachments(&bot, &msg).await {
                    Ok(attachments) => attachments,
                    Err(error) => {
                        if events
                            .send(BridgeEvent::Error {
                                platform: Platform::Telegram,
                                error,
                            })
                            .await
                            .is_err()
                        {
                            warn!("event channel closed, dropping error event");
                        }
                        Vec::new()
                    }
                };

                match handler::to_envelope(&msg, attachments) {
                    Some(envelope) => {
                        if events.send(BridgeEvent::Message(envelope)).await.is_err() {
                            warn!("event channel closed, dropping message");
                        }
                    }
                    None => debug!(msg_id = msg.id.0, "ignoring message with no content"),
                }

                respond(())
            }
        });

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .build();
        *slot = Some(dispatcher.shutdown_token());

        info!("starting Telegram long polling");
        tokio::spawn(async move {
            dispatcher.dispatch().await;
            debug!("Telegram dispatcher stopped");
        });

        Ok(())
    }
}

/// Parses a relay group id into a Telegram chat id.
fn parse_chat_id(group_id: &str) -> Result<ChatId, RelayError> {
    group_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| RelayError::platform(Platform::Telegram, format!("invalid chat_id {group_id}: {e}")))
}

fn send_error(what: &str, e: teloxide::RequestError) -> RelayError {
    RelayError::Platform {
        platform: Platform::Telegram,
        message: format!("failed to send {what}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramSource {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        debug!("Telegram adapter shutting down");
        let token = self.dispatcher.lock().await.take();
        if let Some(token) = token {
            match token.shutdown() {
                Ok(done) => done.await,
                Err(_) => debug!("Telegram dispatcher was not running"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourcePlatform for TelegramSource {
    async fn send(
        &self,
        group_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<MessageId, RelayError> {
        let chat_id = parse_chat_id(group_id)?;
        let mut request = self.bot.send_message(Recipient::Id(chat_id), text);

        if let Some(reply_to) = reply_to {
            match reply_to.parse::<i32>() {
                Ok(id) => {
                    request = request
                        .reply_parameters(ReplyParameters::new(teloxide::types::MessageId(id)));
                }
                Err(_) => warn!(reply_to, "ignoring non-numeric reply target"),
            }
        }

        let sent = request.await.map_err(|e| send_error("message", e))?;
        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn send_attachment(
        &self,
        group_id: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, RelayError> {
        let chat_id = parse_chat_id(group_id)?;
        let parsed = url::Url::parse(url).map_err(|e| {
            RelayError::platform(Platform::Telegram, format!("invalid attachment url {url}: {e}"))
        })?;
        let file = InputFile::url(parsed);

        let sent = match media::kind_for_url(url) {
            AttachmentKind::Image => {
                let mut request = self.bot.send_photo(Recipient::Id(chat_id), file);
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                request.await.map_err(|e| send_error("photo", e))?
            }
            _ => {
                let mut request = self.bot.send_document(Recipient::Id(chat_id), file);
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                request.await.map_err(|e| send_error("document", e))?
            }
        };

        Ok(MessageId(sent.id.0.to_string()))
    }
}
