//! Thin async client for the Slack Web API methods the bot calls.
//!
//! Handlers only see the [`SlackWebApi`] trait; [`SlackWebClient`] is the
//! reqwest-backed implementation used at runtime.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::blocks::MessagePayload;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_id: String,
    pub ts: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{method} request failed: {message}")]
    Request { method: String, message: String },
    #[error("{method} response could not be decoded: {message}")]
    Decode { method: String, message: String },
    #[error("{method} returned error `{error}`")]
    Slack { method: String, error: String },
    #[error("{method} response is missing `{field}`")]
    MissingField { method: String, field: &'static str },
}

#[async_trait]
pub trait SlackWebApi: Send + Sync {
    /// `users.info`
    async fn user_info(&self, user_id: &str) -> Result<SlackUser, ApiError>;

    /// `chat.postMessage`
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessagePayload,
    ) -> Result<PostedMessage, ApiError>;
}

#[derive(Clone, Debug)]
pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    user: Option<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    name: String,
}

impl SlackWebClient {
    pub fn new(base_url: impl Into<String>, bot_token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http: reqwest::Client::new(), base_url, bot_token }
    }

    /// Calls `apps.connections.open` with the app-level token and returns the
    /// Socket Mode WebSocket URL.
    pub async fn connections_open(&self, app_token: &SecretString) -> Result<String, ApiError> {
        const METHOD: &str = "apps.connections.open";
        debug!(method = METHOD, "opening socket mode connection");

        let request = self
            .http
            .post(self.method_url(METHOD))
            .bearer_auth(app_token.expose_secret())
            .header("Content-Type", "application/x-www-form-urlencoded");
        let response = self.call(METHOD, request).await?;

        response.url.ok_or(ApiError::MissingField { method: METHOD.to_owned(), field: "url" })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<SlackApiResponse, ApiError> {
        let response = request.send().await.map_err(|error| ApiError::Request {
            method: method.to_owned(),
            message: error.to_string(),
        })?;

        let response: SlackApiResponse = response.json().await.map_err(|error| {
            ApiError::Decode { method: method.to_owned(), message: error.to_string() }
        })?;

        if !response.ok {
            let error = response.error.unwrap_or_else(|| "unknown".to_owned());
            warn!(method, error = %error, "slack api call returned an error");
            return Err(ApiError::Slack { method: method.to_owned(), error });
        }

        Ok(response)
    }
}

#[async_trait]
impl SlackWebApi for SlackWebClient {
    async fn user_info(&self, user_id: &str) -> Result<SlackUser, ApiError> {
        const METHOD: &str = "users.info";
        debug!(method = METHOD, user_id, "looking up slack user");

        let request = self
            .http
            .get(self.method_url(METHOD))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("user", user_id)]);
        let response = self.call(METHOD, request).await?;

        let user = response
            .user
            .ok_or(ApiError::MissingField { method: METHOD.to_owned(), field: "user" })?;
        Ok(SlackUser { id: user.id, name: user.name })
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessagePayload,
    ) -> Result<PostedMessage, ApiError> {
        const METHOD: &str = "chat.postMessage";
        debug!(method = METHOD, channel_id, "posting message");

        let body = serde_json::json!({
            "channel": channel_id,
            "text": message.text,
            "attachments": message.attachments,
        });
        let request = self
            .http
            .post(self.method_url(METHOD))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body);
        let response = self.call(METHOD, request).await?;

        let ts =
            response.ts.ok_or(ApiError::MissingField { method: METHOD.to_owned(), field: "ts" })?;
        Ok(PostedMessage {
            channel_id: response.channel.unwrap_or_else(|| channel_id.to_owned()),
            ts,
        })
    }
}
