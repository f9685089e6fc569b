//! Shared helpers: a loopback gateway server and a fake Bot API.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use db_gateway::access::AccessPolicy;
use db_gateway::chat::{TelegramClient, Update};
use db_gateway::config::Limits;
use db_gateway::db::DatabaseClient;
use db_gateway::gateway::Gateway;
use db_gateway::http::{router, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const API_KEY: &str = "test-key";
pub const BOT_TOKEN: &str = "123:test-token";
pub const WEBHOOK_SECRET: &str = "webhook-test-secret";

/// A router served on `127.0.0.1:<random>` until dropped.
pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn serve(app: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn gateway(db: Arc<dyn DatabaseClient>, policy: AccessPolicy) -> Arc<Gateway> {
    Arc::new(Gateway::new(db, policy, Limits::default()))
}

/// Serves the gateway API protected by [`API_KEY`].
pub async fn spawn_api(db: Arc<dyn DatabaseClient>) -> TestServer {
    let gw = gateway(db, AccessPolicy::from_settings(Some(API_KEY), None));
    TestServer::serve(router(AppState::new(gw))).await
}

pub type RecordedApiCall = (String, Value);

/// In-memory Bot API: records every call and serves queued updates.
#[derive(Clone, Default)]
pub struct FakeTelegram {
    calls: Arc<Mutex<Vec<RecordedApiCall>>>,
    updates: Arc<Mutex<VecDeque<Update>>>,
    reject_html: bool,
}

impl FakeTelegram {
    /// A fake whose `sendMessage` refuses HTML, like a bad entity would.
    pub fn rejecting_html() -> Self {
        Self {
            reject_html: true,
            ..Self::default()
        }
    }

    pub fn push_update(&self, update: Update) {
        self.updates.lock().unwrap().push_back(update);
    }

    pub fn calls(&self) -> Vec<RecordedApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Bodies of every call to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, body)| body)
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls_to("sendMessage")
            .iter()
            .filter_map(|b| b["text"].as_str().map(String::from))
            .collect()
    }

    pub async fn spawn(&self) -> (TestServer, TelegramClient) {
        let app = Router::new()
            .route("/{bot}/{method}", post(handle_api_call))
            .with_state(self.clone());
        let server = TestServer::serve(app).await;
        let client = TelegramClient::with_api_url(BOT_TOKEN, &server.base_url).unwrap();
        (server, client)
    }
}

async fn handle_api_call(
    State(fake): State<FakeTelegram>,
    Path((bot, method)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert_eq!(bot, format!("bot{BOT_TOKEN}"));
    fake.calls.lock().unwrap().push((method.clone(), body.clone()));

    match method.as_str() {
        "getUpdates" => {
            let updates: Vec<Update> = fake.updates.lock().unwrap().drain(..).collect();
            if updates.is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            (StatusCode::OK, Json(json!({"ok": true, "result": updates})))
        }
        "sendMessage" if fake.reject_html && body["parse_mode"] == "HTML" => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities"
            })),
        ),
        "sendMessage" => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "result": {"message_id": 1, "chat": {"id": body["chat_id"]}, "date": 0}
            })),
        ),
        _ => (StatusCode::OK, Json(json!({"ok": true, "result": true}))),
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub fn message_update(update_id: i64, chat_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1700000000,
            "chat": {"id": chat_id, "type": "private"},
            "text": text
        }
    })
}

pub fn callback_update(update_id: i64, chat_id: i64, data: &str) -> Value {
    json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb-{update_id}"),
            "chat_instance": "1",
            "data": data,
            "message": {"message_id": 1, "chat": {"id": chat_id, "type": "private"}}
        }
    })
}
