//! Telegram Bot API client.
//!
//! A thin reqwest wrapper over the handful of Bot API methods the gateway
//! uses, plus the update types it reads.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chat::{handle_command, ReplySink};
use crate::error::{GatewayError, Result};
use crate::format::Markup;
use crate::gateway::Gateway;

/// Bot API base URL.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Seconds the server holds a `getUpdates` call open waiting for updates.
pub const LONG_POLL_TIMEOUT_SECS: u64 = 25;

/// Request timeout. Must exceed the long-poll timeout.
const DEFAULT_TIMEOUT_SECS: u64 = LONG_POLL_TIMEOUT_SECS + 15;

/// One incoming update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    secret_token: &'a str,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
struct Empty {}

/// Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    /// `<api>/bot<token>`; never logged.
    base_url: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Creates a client for the public Bot API.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_url(token, TELEGRAM_API_URL)
    }

    /// Creates a client for a Bot API server at `api_url`.
    pub fn with_api_url(token: &str, api_url: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(GatewayError::config("Telegram token is empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// Calls a Bot API method and unwraps its envelope.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            // The URL embeds the token.
            .map_err(|e| {
                GatewayError::transport(format!("{} request failed: {}", method, e.without_url()))
            })?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            GatewayError::transport(format!(
                "{} returned an unreadable response ({}): {}",
                method,
                status,
                e.without_url()
            ))
        })?;

        if !envelope.ok {
            return Err(GatewayError::transport(format!(
                "{} failed ({}): {}",
                method,
                status,
                envelope.description.as_deref().unwrap_or("no description")
            )));
        }

        envelope
            .result
            .ok_or_else(|| GatewayError::transport(format!("{} returned no result", method)))
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &request).await
    }

    /// Sends `text` to `chat_id`, as HTML when `markup` is [`Markup::Html`].
    pub async fn send_message(&self, chat_id: i64, text: &str, markup: Markup) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: match markup {
                Markup::Html => Some("HTML"),
                Markup::Plain => None,
            },
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    /// Registers `url` as the webhook endpoint.
    ///
    /// Telegram echoes `secret_token` in the `X-Telegram-Bot-Api-Secret-Token`
    /// header of every webhook request.
    pub async fn set_webhook(&self, url: &str, secret_token: &str) -> Result<()> {
        let request = SetWebhookRequest { url, secret_token };
        let _: bool = self.call("setWebhook", &request).await?;
        Ok(())
    }

    /// Removes any registered webhook so `getUpdates` can be used.
    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self.call("deleteWebhook", &Empty {}).await?;
        Ok(())
    }

    /// Acknowledges a callback query so the client stops its spinner.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let request = AnswerCallbackRequest { callback_query_id };
        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }

    /// Routes one update to the command dispatcher.
    ///
    /// Messages and callback queries both end in [`handle_command`]. Delivery
    /// failures are logged, not returned: the update has been consumed.
    pub async fn process_update(&self, gateway: &Gateway, update: Update) {
        let update_id = update.update_id;

        if let Some(message) = update.message {
            let Some(text) = message.text else {
                debug!(update_id, "Skipping message without text");
                return;
            };
            let reply = TelegramReply::new(self.clone(), message.chat.id);
            if let Err(e) = handle_command(gateway, message.chat.id, &text, &reply).await {
                warn!(update_id, chat_id = message.chat.id, error = %e, "Failed to deliver reply");
            }
            return;
        }

        if let Some(callback) = update.callback_query {
            if let Err(e) = self.answer_callback_query(&callback.id).await {
                warn!(update_id, error = %e, "Failed to answer callback query");
            }
            let (Some(data), Some(message)) = (callback.data, callback.message) else {
                debug!(update_id, "Skipping callback query without data or message");
                return;
            };
            let reply = TelegramReply::new(self.clone(), message.chat.id);
            if let Err(e) = handle_command(gateway, message.chat.id, &data, &reply).await {
                warn!(update_id, chat_id = message.chat.id, error = %e, "Failed to deliver reply");
            }
            return;
        }

        debug!(update_id, "Skipping unsupported update");
    }
}

/// Replies to one chat through a [`TelegramClient`].
#[derive(Debug, Clone)]
pub struct TelegramReply {
    client: TelegramClient,
    chat_id: i64,
}

impl TelegramReply {
    pub fn new(client: TelegramClient, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait]
impl ReplySink for TelegramReply {
    async fn send(&self, text: &str, markup: Markup) -> Result<()> {
        self.client.send_message(self.chat_id, text, markup).await
    }
}
