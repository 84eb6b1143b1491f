//! Thin async client for the Slack Web API methods huddle uses.
//!
//! The dispatch core depends only on the [`ChatClient`] and [`UserDirectory`]
//! traits; [`HttpSlackClient`] is the production implementation, a
//! `reqwest::Client` wrapper authenticated with the bot token. The app-level
//! token is only used by [`HttpSlackClient::connections_open`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageBody;

const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("slack api request failed: {0}")]
    Request(String),
    #[error("slack api call `{method}` returned error: {error}")]
    Api { method: String, error: String },
    #[error("user not found: {0}")]
    UserNotFound(String),
}

/// Sends outbound messages. Fire-and-forget beyond the call's own result.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn post_message(&self, channel_id: &str, body: &MessageBody)
        -> Result<(), ClientError>;
}

/// Resolves a platform user id to a display name.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<String, ClientError>;
}

pub struct HttpSlackClient {
    http: reqwest::Client,
    bot_token: SecretString,
}

/// Generic Slack API response envelope for deserialization.
#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    user: Option<UserObject>,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    name: String,
    #[serde(default)]
    real_name: Option<String>,
}

impl HttpSlackClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self { http: reqwest::Client::new(), bot_token }
    }

    /// Opens a Socket Mode connection and returns the WebSocket URL.
    ///
    /// Uses the app-level token (`xapp-...`) rather than the bot token.
    pub async fn connections_open(&self, app_token: &SecretString) -> Result<String, ClientError> {
        debug!("opening socket mode connection");
        let response = self
            .http
            .post(format!("{SLACK_API_BASE}/apps.connections.open"))
            .bearer_auth(app_token.expose_secret())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|error| ClientError::Request(error.to_string()))?;

        let payload: SlackApiResponse = response
            .json()
            .await
            .map_err(|error| ClientError::Request(error.to_string()))?;

        if !payload.ok {
            return Err(ClientError::Api {
                method: "apps.connections.open".to_owned(),
                error: payload.error.unwrap_or_default(),
            });
        }

        payload.url.ok_or_else(|| ClientError::Api {
            method: "apps.connections.open".to_owned(),
            error: "response missing `url`".to_owned(),
        })
    }

    async fn call_bot_api(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<SlackApiResponse, ClientError> {
        let response = self
            .http
            .post(format!("{SLACK_API_BASE}/{method}"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| ClientError::Request(error.to_string()))?;

        let payload: SlackApiResponse = response
            .json()
            .await
            .map_err(|error| ClientError::Request(error.to_string()))?;

        if !payload.ok {
            return Err(ClientError::Api {
                method: method.to_owned(),
                error: payload.error.unwrap_or_default(),
            });
        }

        Ok(payload)
    }
}

#[async_trait]
impl ChatClient for HttpSlackClient {
    async fn post_message(
        &self,
        channel_id: &str,
        body: &MessageBody,
    ) -> Result<(), ClientError> {
        let payload = match body {
            MessageBody::Text(text) => serde_json::json!({
                "channel": channel_id,
                "text": text,
            }),
            MessageBody::Styled(attachment) => serde_json::json!({
                "channel": channel_id,
                "attachments": [attachment],
            }),
        };

        debug!(channel_id, "posting message");
        self.call_bot_api("chat.postMessage", &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for HttpSlackClient {
    async fn display_name(&self, user_id: &str) -> Result<String, ClientError> {
        debug!(user_id, "resolving user");
        let response = self
            .http
            .get(format!("{SLACK_API_BASE}/users.info"))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("user", user_id)])
            .send()
            .await
            .map_err(|error| ClientError::Request(error.to_string()))?;

        let payload: SlackApiResponse = response
            .json()
            .await
            .map_err(|error| ClientError::Request(error.to_string()))?;

        if !payload.ok {
            let error = payload.error.unwrap_or_default();
            if error == "user_not_found" {
                return Err(ClientError::UserNotFound(user_id.to_owned()));
            }
            return Err(ClientError::Api { method: "users.info".to_owned(), error });
        }

        let user = payload.user.ok_or_else(|| ClientError::Api {
            method: "users.info".to_owned(),
            error: "response missing `user`".to_owned(),
        })?;

        Ok(user.real_name.filter(|name| !name.is_empty()).unwrap_or(user.name))
    }
}
