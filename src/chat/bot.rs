//! Lifecycle of the chat front-end.
//!
//! [`BotHandle`] is created at startup and consumed at shutdown. In polling
//! mode it owns the `getUpdates` loop; in webhook mode it only registers the
//! endpoint and hands its client to the HTTP `/webhook` route.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::chat::telegram::{TelegramClient, Update, LONG_POLL_TIMEOUT_SECS};
use crate::config::{TelegramConfig, WebhookConfig};
use crate::error::Result;
use crate::gateway::Gateway;

/// Delay before retrying after a failed `getUpdates` call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// How updates reach the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    Polling,
    Webhook(WebhookConfig),
}

/// Owned handle to a running bot.
pub struct BotHandle {
    client: TelegramClient,
    mode: DeliveryMode,
    cancel: CancellationToken,
    poller: Option<JoinHandle<()>>,
}

impl BotHandle {
    /// Starts the bot described by `config`.
    ///
    /// With a webhook URL the endpoint is registered and no task is spawned.
    /// Otherwise any stale webhook is removed and a polling task is started.
    pub async fn start(gateway: Arc<Gateway>, config: &TelegramConfig) -> Result<Self> {
        let client = TelegramClient::new(&config.token)?;
        Self::start_with_client(gateway, client, config.webhook()).await
    }

    /// Starts the bot on an existing client.
    pub async fn start_with_client(
        gateway: Arc<Gateway>,
        client: TelegramClient,
        webhook: Option<WebhookConfig>,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();

        let (mode, poller) = match webhook {
            Some(webhook) => {
                client
                    .set_webhook(&webhook.endpoint, &webhook.secret)
                    .await?;
                info!(endpoint = %webhook.endpoint, "Telegram webhook registered");
                (DeliveryMode::Webhook(webhook), None)
            }
            None => {
                client.delete_webhook().await?;
                info!("Telegram long polling started");
                let task = tokio::spawn(poll_updates(gateway, client.clone(), cancel.clone()));
                (DeliveryMode::Polling, Some(task))
            }
        };

        Ok(Self {
            client,
            mode,
            cancel,
            poller,
        })
    }

    pub fn client(&self) -> &TelegramClient {
        &self.client
    }

    pub fn mode(&self) -> &DeliveryMode {
        &self.mode
    }

    /// The webhook settings when updates arrive through `/webhook`.
    pub fn webhook(&self) -> Option<&WebhookConfig> {
        match &self.mode {
            DeliveryMode::Webhook(webhook) => Some(webhook),
            DeliveryMode::Polling => None,
        }
    }

    /// Stops polling and waits for in-flight updates to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(poller) = self.poller.take() {
            if let Err(e) = poller.await {
                warn!(error = %e, "Telegram polling task ended abnormally");
            }
        }
        info!("Telegram bot stopped");
    }
}

/// The `getUpdates` loop. Each update is handled on its own task.
async fn poll_updates(gateway: Arc<Gateway>, client: TelegramClient, cancel: CancellationToken) {
    let tracker = TaskTracker::new();
    let mut offset: Option<i64> = None;

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = client.get_updates(offset, LONG_POLL_TIMEOUT_SECS) => batch,
        };

        match batch {
            Ok(updates) => {
                offset = next_offset(offset, &updates);
                for update in updates {
                    let gateway = Arc::clone(&gateway);
                    let client = client.clone();
                    tracker.spawn(async move { client.process_update(&gateway, update).await });
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }

    tracker.close();
    debug!(pending = tracker.len(), "Waiting for in-flight updates");
    tracker.wait().await;
}

/// Offset that acknowledges every update in `updates`.
fn next_offset(current: Option<i64>, updates: &[Update]) -> Option<i64> {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .map_or(current, |next| Some(current.map_or(next, |c| c.max(next))))
}
