//! HTTP front-end.
//!
//! Routes:
//! - `GET /health`: liveness, no auth.
//! - `GET /table/{name}?limit=N`: bounded lookup of one table.
//! - `POST /query` with `{"sql": "..."}`: one read-only statement.
//! - `POST /webhook`: Telegram updates, when the bot runs in webhook mode.
//!
//! `/table` and `/query` require the `x-api-key` header when a key is set.
//! `/webhook` always requires the secret token registered with `setWebhook`.

mod response;

pub use response::{json_error, status_for, ApiError, QueryResponse};

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::access::Credential;
use crate::chat::{TelegramClient, Update};
use crate::gateway::Gateway;

/// Header carrying the shared HTTP secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header Telegram uses to echo the webhook secret token.
pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Set when the bot receives updates through `/webhook`.
    pub webhook: Option<WebhookReceiver>,
}

/// The bot client answering webhook updates and the token they must carry.
#[derive(Clone)]
pub struct WebhookReceiver {
    pub client: TelegramClient,
    secret: String,
}

impl WebhookReceiver {
    fn accepts(&self, headers: &HeaderMap) -> bool {
        headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|presented| presented == self.secret)
    }
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            webhook: None,
        }
    }

    pub fn with_webhook(mut self, client: TelegramClient, secret: impl Into<String>) -> Self {
        self.webhook = Some(WebhookReceiver {
            client,
            secret: secret.into(),
        });
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/table/{name}", get(table))
        .route("/query", post(query))
        .route("/webhook", post(webhook))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TableParams {
    /// Kept as text so a non-integer value is reported as a rejected limit.
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn table(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(params): Query<TableParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    state
        .gateway
        .authorize(Credential::ApiKey(api_key(&headers)))?;

    let lookup = state.gateway.table(&name, params.limit.as_deref()).await?;
    info!(route = "/table", table = %name, rows = lookup.result.row_count(), "Request served");

    Ok(Json(QueryResponse::from_result(
        &lookup.result,
        lookup.limit as usize,
    )))
}

async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    if let Err(e) = state
        .gateway
        .authorize(Credential::ApiKey(api_key(&headers)))
    {
        return ApiError(e).into_response();
    }

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected malformed query body");
            return json_error(rejection.status(), rejection.body_text());
        }
    };

    match state.gateway.query(request.sql.trim()).await {
        Ok(result) => {
            info!(route = "/query", rows = result.row_count(), "Request served");
            let preview = state.gateway.limits().query_max_rows;
            Json(QueryResponse::from_result(&result, preview)).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Update>, JsonRejection>,
) -> Response {
    let Some(receiver) = state.webhook.as_ref() else {
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "Bot is not configured");
    };

    if !receiver.accepts(&headers) {
        info!(route = "/webhook", "Rejected webhook request without a valid secret token");
        return json_error(StatusCode::UNAUTHORIZED, "Invalid webhook secret");
    }

    let update = match body {
        Ok(Json(update)) => update,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected malformed webhook update");
            return json_error(rejection.status(), rejection.body_text());
        }
    };

    receiver.client.process_update(&state.gateway, update).await;
    "OK".into_response()
}
