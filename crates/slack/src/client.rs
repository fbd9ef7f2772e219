//! Slack Web API access.
//!
//! [`SlackApi`] is the seam handlers talk to; [`HttpSlackClient`] is the
//! production implementation over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::blocks::{Block, MessageTemplate};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Request(String),
    #[error("slack responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("slack response could not be decoded: {0}")]
    Response(String),
    #[error("slack api error: {0}")]
    Api(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub real_name: String,
    pub display_name: String,
    pub email: Option<String>,
}

impl UserProfile {
    /// Name to greet the user by, `None` when the profile has neither name set.
    pub fn greeting_name(&self) -> Option<&str> {
        [self.display_name.as_str(), self.real_name.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    pub profile: UserProfile,
}

impl SlackUser {
    /// Best human-readable name: profile real name, then account real name,
    /// then the username.
    pub fn display_real_name(&self) -> &str {
        if !self.profile.real_name.is_empty() {
            return &self.profile.real_name;
        }
        match self.real_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
    InChannel,
}

/// Body posted to an interaction `response_url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResponseMessage {
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    pub replace_original: bool,
}

impl ResponseMessage {
    pub fn ephemeral(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            text: None,
            response_type: Some(ResponseType::Ephemeral),
            replace_original: false,
        }
    }

    pub fn replacing(blocks: Vec<Block>) -> Self {
        Self { blocks, text: None, response_type: None, replace_original: true }
    }
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    async fn respond(
        &self,
        response_url: &str,
        message: &ResponseMessage,
    ) -> Result<(), SlackApiError>;

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError>;

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, SlackApiError>;
}

#[derive(Clone)]
pub struct HttpSlackClient {
    client: Client,
    bot_token: SecretString,
    api_base: String,
}

impl std::fmt::Debug for HttpSlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSlackClient")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    error: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

impl HttpSlackClient {
    pub fn new(bot_token: SecretString, timeout: Duration) -> Result<Self, SlackApiError> {
        Self::with_api_base(bot_token, DEFAULT_SLACK_API_BASE, timeout)
    }

    pub fn with_api_base(
        bot_token: SecretString,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SlackApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SlackApiError::Request(error.to_string()))?;
        let api_base = api_base.into().trim_end_matches('/').to_owned();
        Ok(Self { client, bot_token, api_base })
    }

    async fn call_post(&self, method: &str, body: &Value) -> Result<ApiEnvelope, SlackApiError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| SlackApiError::Request(error.to_string()))?;
        Self::read_envelope(method, response).await
    }

    async fn call_get(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiEnvelope, SlackApiError> {
        let response = self
            .client
            .get(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|error| SlackApiError::Request(error.to_string()))?;
        Self::read_envelope(method, response).await
    }

    async fn read_envelope(
        method: &str,
        response: reqwest::Response,
    ) -> Result<ApiEnvelope, SlackApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackApiError::Status { status: status.as_u16(), body });
        }

        let envelope: ApiEnvelope =
            response.json().await.map_err(|error| SlackApiError::Response(error.to_string()))?;
        if !envelope.ok {
            let error = envelope.error.unwrap_or_else(|| "unknown_error".to_owned());
            warn!(event_name = "slack.api.error", method, error = %error, "slack api call failed");
            return Err(SlackApiError::Api(error));
        }

        debug!(event_name = "slack.api.ok", method, "slack api call succeeded");
        Ok(envelope)
    }
}

fn field<T: DeserializeOwned>(envelope: ApiEnvelope, key: &str) -> Result<T, SlackApiError> {
    let value = envelope
        .rest
        .get(key)
        .cloned()
        .ok_or_else(|| SlackApiError::Response(format!("response is missing `{key}`")))?;
    serde_json::from_value(value).map_err(|error| SlackApiError::Response(error.to_string()))
}

fn message_body(message: &MessageTemplate) -> Result<Value, SlackApiError> {
    serde_json::to_value(message).map_err(|error| SlackApiError::Request(error.to_string()))
}

#[async_trait]
impl SlackApi for HttpSlackClient {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let mut body = message_body(message)?;
        body["channel"] = Value::String(channel.to_owned());
        self.call_post("chat.postMessage", &body).await.map(|_| ())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let mut body = message_body(message)?;
        body["channel"] = Value::String(channel.to_owned());
        body["user"] = Value::String(user.to_owned());
        self.call_post("chat.postEphemeral", &body).await.map(|_| ())
    }

    async fn respond(
        &self,
        response_url: &str,
        message: &ResponseMessage,
    ) -> Result<(), SlackApiError> {
        let response = self
            .client
            .post(response_url)
            .json(message)
            .send()
            .await
            .map_err(|error| SlackApiError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "slack.response_url.failed",
                status = status.as_u16(),
                body = %body,
                "response url rejected the message"
            );
            return Err(SlackApiError::Status { status: status.as_u16(), body });
        }

        debug!(event_name = "slack.response_url.ok", "responded to response url");
        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
        let envelope = self.call_get("users.info", &[("user", user_id)]).await?;
        field(envelope, "user")
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, SlackApiError> {
        let envelope = self.call_get("users.profile.get", &[("user", user_id)]).await?;
        field(envelope, "profile")
    }
}
