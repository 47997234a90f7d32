//! HTTP client for the bot API.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::{ApiResponse, GetUpdatesParams, User};
use super::{
    AnswerInlineQuery, ApiError, ChatOutbound, RetryPolicy, SendMessage, Update, UpdateSource,
    with_retry,
};
use crate::config::ApiSettings;

const LOG_TARGET: &str = "imebot::api";

/// Bot API client: JSON POST to `{base_url}/bot{token}/{method}`, every call
/// retried per [`RetryPolicy`].
pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The endpoint embeds the token
        f.debug_struct("TelegramClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::Transport {
                method: "client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/bot{}",
                settings.base_url.trim_end_matches('/'),
                settings.token
            ),
            retry: RetryPolicy {
                attempts: settings.retry_attempts,
                delay: Duration::from_millis(settings.retry_delay_ms),
            },
        })
    }

    /// Call `method` with `params`, retrying transport and decode failures.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, ApiError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        with_retry(self.retry, method, || self.call_once(method, params)).await
    }

    async fn call_once<P, T>(&self, method: &str, params: &P) -> Result<T, ApiError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let transport = |e: reqwest::Error| ApiError::Transport {
            method: method.to_string(),
            message: e.without_url().to_string(),
        };

        let response = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .json(params)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        let envelope: ApiResponse<T> =
            serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
                method: method.to_string(),
                message: format!("HTTP {}: {}", status, e),
            })?;
        unwrap_envelope(method, envelope)
    }

    /// Resolve the bot's own account.
    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.call("getMe", &serde_json::json!({})).await
    }
}

fn unwrap_envelope<T>(method: &str, envelope: ApiResponse<T>) -> Result<T, ApiError> {
    if !envelope.ok {
        let description = match (envelope.error_code, envelope.description) {
            (Some(code), Some(text)) => format!("{} {}", code, text),
            (None, Some(text)) => text,
            (Some(code), None) => code.to_string(),
            (None, None) => "no description".to_string(),
        };
        return Err(ApiError::Rejected {
            method: method.to_string(),
            description,
        });
    }
    envelope.result.ok_or_else(|| ApiError::Decode {
        method: method.to_string(),
        message: "missing result".to_string(),
    })
}

impl UpdateSource for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ApiError> {
        self.call(
            "getUpdates",
            &GetUpdatesParams {
                offset,
                timeout: timeout_secs,
            },
        )
        .await
    }
}

impl ChatOutbound for TelegramClient {
    async fn send_message(&self, request: SendMessage) -> Result<(), ApiError> {
        // Result is the sent message; only success matters
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    async fn answer_inline_query(&self, request: AnswerInlineQuery) -> Result<(), ApiError> {
        let answered: bool = self.call("answerInlineQuery", &request).await?;
        log::debug!(
            target: LOG_TARGET,
            "answerInlineQuery({}) -> {}",
            request.inline_query_id,
            answered
        );
        Ok(())
    }
}
