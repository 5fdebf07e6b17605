// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Intercom REST API.
//!
//! Provides [`IntercomClient`] which handles authentication headers, JSON
//! request construction, and transient error retry.

use std::time::Duration;

use groupdesk_core::error::RelayError;
use groupdesk_core::types::Platform;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    ContactList, ConversationFrom, ConversationList, CreateContact, CreateConversation,
    CreatedMessage, ErrorList, Record, SearchRequest, UserReply,
};

/// Result of a contact creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactCreation {
    Created(String),
    /// Another request created the same contact first.
    Conflict,
}

/// HTTP client for Intercom API communication.
///
/// Retries once on transient errors (429, 500, 502, 503).
#[derive(Debug, Clone)]
pub struct IntercomClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl IntercomClient {
    /// Creates a new Intercom API client.
    ///
    /// # Arguments
    /// * `access_token` - workspace access token
    /// * `api_version` - value of the `Intercom-Version` header (e.g. "2.11")
    /// * `base_url` - API root, normally `https://api.intercom.io`
    pub fn new(access_token: &str, api_version: &str, base_url: &str) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|e| {
                RelayError::Config(format!("invalid access token header value: {e}"))
            })?,
        );
        headers.insert(
            "Intercom-Version",
            HeaderValue::from_str(api_version).map_err(|e| {
                RelayError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RelayError::Platform {
                platform: Platform::Intercom,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the delay between a transient failure and its retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the configured API root.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks the token by fetching the authenticated admin.
    pub async fn me(&self) -> Result<(), RelayError> {
        self.send(Method::GET, "/me", None::<&()>).await?;
        Ok(())
    }

    /// Finds a user contact by its external id (the Telegram user id).
    pub async fn find_contact(&self, external_id: &str) -> Result<Option<String>, RelayError> {
        let list: ContactList = self
            .json(
                Method::POST,
                "/contacts/search",
                Some(&SearchRequest::equals("external_id", external_id)),
            )
            .await?;
        Ok(list.data.into_iter().next().map(|c| c.id))
    }

    /// Creates a user contact. A 409 from Intercom maps to
    /// [`ContactCreation::Conflict`].
    pub async fn create_contact(
        &self,
        external_id: &str,
        name: &str,
    ) -> Result<ContactCreation, RelayError> {
        let body = CreateContact {
            role: "user",
            external_id,
            name,
        };
        let response = self.execute(Method::POST, "/contacts", Some(&body)).await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(external_id, "contact already exists");
            return Ok(ContactCreation::Conflict);
        }
        let record: Record = parse(check(response, "/contacts").await?, "/contacts").await?;
        Ok(ContactCreation::Created(record.id))
    }

    /// Opens a conversation as `contact_id`. Returns the conversation id.
    pub async fn create_conversation(
        &self,
        contact_id: &str,
        body: &str,
    ) -> Result<String, RelayError> {
        let request = CreateConversation {
            from: ConversationFrom {
                kind: "user",
                id: contact_id,
            },
            body,
        };
        let created: CreatedMessage = self
            .json(Method::POST, "/conversations", Some(&request))
            .await?;
        Ok(created.conversation_id)
    }

    /// Replaces the custom attributes of a conversation.
    pub async fn set_custom_attributes(
        &self,
        conversation_id: &str,
        attributes: &serde_json::Value,
    ) -> Result<(), RelayError> {
        let body = serde_json::json!({ "custom_attributes": attributes });
        self.send(
            Method::PUT,
            &format!("/conversations/{conversation_id}"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    /// Posts a comment to a conversation on behalf of the contact.
    pub async fn reply_as_user(
        &self,
        conversation_id: &str,
        contact_id: &str,
        body: &str,
    ) -> Result<(), RelayError> {
        let reply = UserReply {
            message_type: "comment",
            kind: "user",
            intercom_user_id: contact_id,
            body,
        };
        self.send(
            Method::POST,
            &format!("/conversations/{conversation_id}/reply"),
            Some(&reply),
        )
        .await?;
        Ok(())
    }

    /// Searches conversations by a custom attribute value.
    pub async fn search_conversations(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<Record>, RelayError> {
        let field = format!("custom_attributes.{attribute}");
        let list: ConversationList = self
            .json(
                Method::POST,
                "/conversations/search",
                Some(&SearchRequest::equals(&field, value)),
            )
            .await?;
        Ok(list.conversations)
    }

    async fn json<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, RelayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, path, body).await?;
        parse(response, path).await
    }

    /// Sends a request and turns non-success responses into platform errors
    /// carrying the status code.
    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, RelayError>
    where
        B: Serialize + ?Sized,
    {
        let response = self.execute(method, path, body).await?;
        check(response, path).await
    }

    /// Sends a request, retrying transient statuses. Returns the final
    /// response whatever its status.
    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, RelayError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        let mut attempt = 0;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| RelayError::Platform {
                platform: Platform::Intercom,
                message: format!("HTTP request to {path} failed: {e}"),
                source: Some(Box::new(e)),
            })?;

            let status = response.status();
            debug!(status = %status, attempt, path, "Intercom response received");

            if !is_transient_error(status) || attempt >= self.max_retries {
                return Ok(response);
            }

            warn!(status = %status, attempt, path, "transient error, will retry");
            attempt += 1;
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

async fn check(response: reqwest::Response, path: &str) -> Result<reqwest::Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(RelayError::platform(
        Platform::Intercom,
        describe_failure(path, status, &text),
    ))
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T, RelayError> {
    response.json::<T>().await.map_err(|e| RelayError::Platform {
        platform: Platform::Intercom,
        message: format!("failed to parse response from {path}: {e}"),
        source: Some(Box::new(e)),
    })
}

fn describe_failure(path: &str, status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorList>(body)
        .ok()
        .and_then(|list| list.errors.into_iter().next())
        .map(|e| match e.message {
            Some(message) => format!("{}: {message}", e.code),
            None => e.code,
        })
        .unwrap_or_else(|| body.to_string());
    format!("{path} returned {}: {detail}", status.as_u16())
}

/// Returns true for status codes worth one more attempt.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> IntercomClient {
        IntercomClient::new("test-token", "2.11", base_url)
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn requests_carry_auth_and_version_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("intercom-version", "2.11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"type": "admin"})))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server.uri()).me().await.unwrap();
    }

    #[tokio::test]
    async fn find_contact_returns_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contacts/search"))
            .and(body_partial_json(serde_json::json!({
                "query": {"field": "external_id", "value": "42"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "list",
                "data": [{"type": "contact", "id": "contact-1"}],
            })))
            .mount(&server)
            .await;

        let found = test_client(&server.uri()).find_contact("42").await.unwrap();
        assert_eq!(found.as_deref(), Some("contact-1"));
    }

    #[tokio::test]
    async fn create_contact_maps_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "type": "error.list",
                "errors": [{"code": "conflict", "message": "A contact matching those details already exists"}],
            })))
            .mount(&server)
            .await;

        let result = test_client(&server.uri())
            .create_contact("42", "Alice")
            .await
            .unwrap();
        assert_eq!(result, ContactCreation::Conflict);
    }

    #[tokio::test]
    async fn create_conversation_returns_conversation_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .and(body_partial_json(serde_json::json!({
                "from": {"type": "user", "id": "contact-1"},
                "body": "Alice: hello",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "user_message",
                "id": "403918",
                "conversation_id": "123456",
            })))
            .mount(&server)
            .await;

        let id = test_client(&server.uri())
            .create_conversation("contact-1", "Alice: hello")
            .await
            .unwrap();
        assert_eq!(id, "123456");
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/55/reply"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations/55/reply"))
            .and(body_partial_json(serde_json::json!({
                "message_type": "comment",
                "type": "user",
                "intercom_user_id": "contact-1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "55"})))
            .mount(&server)
            .await;

        test_client(&server.uri())
            .reply_as_user("55", "contact-1", "more info")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/55/reply"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "type": "error.list",
                "errors": [{"code": "not_found", "message": "Resource Not Found"}],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .reply_as_user("55", "contact-1", "hi")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("not_found"), "got: {msg}");
    }

    #[tokio::test]
    async fn search_conversations_queries_custom_attribute() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/search"))
            .and(body_partial_json(serde_json::json!({
                "query": {"field": "custom_attributes.group_id", "operator": "=", "value": "-100"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "conversation.list",
                "conversations": [{"id": "777", "custom_attributes": {"group_id": "-100"}}],
            })))
            .mount(&server)
            .await;

        let found = test_client(&server.uri())
            .search_conversations("group_id", "-100")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "777");
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_error(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_error(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_error(StatusCode::CONFLICT));
        assert!(!is_transient_error(StatusCode::UNAUTHORIZED));
    }
}
