//! Chat front-end tests against a fake Bot API.

use std::sync::Arc;

use db_gateway::access::AccessPolicy;
use db_gateway::chat::bot::DeliveryMode;
use db_gateway::chat::{BotHandle, ReplySink, TelegramReply, Update};
use db_gateway::config::WebhookConfig;
use db_gateway::db::{ColumnInfo, MockDatabaseClient, QueryParam, ResultSet, Value};
use db_gateway::format::Markup;
use db_gateway::http::{router, AppState, WEBHOOK_SECRET_HEADER};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::json;

use super::common::{
    callback_update, gateway, message_update, wait_until, FakeTelegram, TestServer,
    WEBHOOK_SECRET,
};

async fn spawn_webhook(
    fake: &FakeTelegram,
    mock: Arc<MockDatabaseClient>,
    allowed: Option<&str>,
) -> (TestServer, TestServer) {
    let (telegram, client) = fake.spawn().await;
    let gw = gateway(mock, AccessPolicy::from_settings(None, allowed));
    let state = AppState::new(gw).with_webhook(client, WEBHOOK_SECRET);
    let api = TestServer::serve(router(state)).await;
    (api, telegram)
}

async fn post_update_with(
    api: &TestServer,
    secret: Option<&str>,
    update: serde_json::Value,
) -> reqwest::Response {
    let mut request = reqwest::Client::new().post(api.url("/webhook")).json(&update);
    if let Some(secret) = secret {
        request = request.header(WEBHOOK_SECRET_HEADER, secret);
    }
    request.send().await.unwrap()
}

async fn post_update(api: &TestServer, update: serde_json::Value) -> reqwest::Response {
    post_update_with(api, Some(WEBHOOK_SECRET), update).await
}

#[tokio::test]
async fn test_reply_sink_sends_html_parse_mode() {
    let fake = FakeTelegram::default();
    let (_server, client) = fake.spawn().await;

    let reply = TelegramReply::new(client, 42);
    reply.send("<pre>x</pre>", Markup::Html).await.unwrap();
    reply.send("plain", Markup::Plain).await.unwrap();

    assert_eq!(
        fake.calls_to("sendMessage"),
        vec![
            json!({"chat_id": 42, "text": "<pre>x</pre>", "parse_mode": "HTML"}),
            json!({"chat_id": 42, "text": "plain"}),
        ]
    );
}

#[tokio::test]
async fn test_api_error_is_transport_failure() {
    let fake = FakeTelegram::rejecting_html();
    let (_server, client) = fake.spawn().await;

    let err = client
        .send_message(1, "<pre>x</pre>", Markup::Html)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Transport Error");
    assert!(err.to_string().contains("can't parse entities"));
    assert!(!err.to_string().contains("test-token"));
}

#[tokio::test]
async fn test_webhook_query_replies_with_formatted_chunk() {
    let fake = FakeTelegram::default();
    let mock = Arc::new(MockDatabaseClient::new());
    let (api, _telegram) = spawn_webhook(&fake, mock.clone(), None).await;

    let response = post_update(&api, message_update(1, 77, "/query SELECT 1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
    assert_eq!(
        fake.calls_to("sendMessage"),
        vec![json!({
            "chat_id": 77,
            "text": "<pre>?column?\n--------\n1</pre>",
            "parse_mode": "HTML"
        })]
    );
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_webhook_refuses_update_without_secret() {
    let fake = FakeTelegram::default();
    let mock = Arc::new(MockDatabaseClient::new());
    let (api, _telegram) = spawn_webhook(&fake, mock.clone(), Some("1")).await;

    for secret in [None, Some("guessed"), Some("")] {
        let update = message_update(9, 1, "/query SELECT * FROM secrets");
        let response = post_update_with(&api, secret, update).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{secret:?}");
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, json!({"detail": "Invalid webhook secret"}));
    }

    assert_eq!(mock.call_count(), 0);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_webhook_search_binds_term() {
    let fake = FakeTelegram::default();
    let hits = ResultSet::with_data(
        vec![ColumnInfo::new("repo", "TEXT"), ColumnInfo::new("snippet", "TEXT")],
        vec![vec![Value::from("acme/tools"), Value::from("a < b")]],
    );
    let mock = Arc::new(MockDatabaseClient::with_result(hits));
    let (api, _telegram) = spawn_webhook(&fake, mock.clone(), None).await;

    post_update(&api, message_update(3, 77, "/search '; DROP TABLE x; --")).await;

    let (sql, params) = mock.calls().remove(0);
    assert!(!sql.contains("DROP"));
    assert_eq!(
        params,
        vec![
            QueryParam::Text("%'; DROP TABLE x; --%".to_string()),
            QueryParam::Int(10)
        ]
    );
    assert_eq!(
        fake.calls_to("sendMessage"),
        vec![
            json!({"chat_id": 77, "text": "Searching for: '; DROP TABLE x; -- ..."}),
            json!({
                "chat_id": 77,
                "text": "<b>Repo:</b> acme/tools\n<pre>a &lt; b</pre>",
                "parse_mode": "HTML"
            }),
        ]
    );
}

#[tokio::test]
async fn test_webhook_table_limit_is_clamped() {
    let fake = FakeTelegram::default();
    let mock = Arc::new(MockDatabaseClient::new());
    let (api, _telegram) = spawn_webhook(&fake, mock.clone(), None).await;

    post_update(&api, message_update(1, 77, "/table widgets 5000")).await;

    assert_eq!(
        mock.calls(),
        vec![(
            "SELECT * FROM \"widgets\" LIMIT $1".to_string(),
            vec![QueryParam::Int(1000)]
        )]
    );
}

#[tokio::test]
async fn test_rejected_html_is_resent_as_plain_text() {
    let fake = FakeTelegram::rejecting_html();
    let mock = Arc::new(MockDatabaseClient::new());
    let (api, _telegram) = spawn_webhook(&fake, mock, None).await;

    post_update(&api, message_update(1, 77, "/query SELECT 1")).await;

    let sends = fake.calls_to("sendMessage");
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0]["parse_mode"], "HTML");
    assert_eq!(
        sends[1],
        json!({"chat_id": 77, "text": "?column?\n--------\n1"})
    );
}

#[tokio::test]
async fn test_webhook_denies_chat_outside_allow_list() {
    let fake = FakeTelegram::default();
    let mock = Arc::new(MockDatabaseClient::new());
    let (api, _telegram) = spawn_webhook(&fake, mock.clone(), Some("1, 2")).await;

    post_update(&api, message_update(1, 77, "/query SELECT 1")).await;

    assert_eq!(fake.sent_texts(), vec!["Access denied.".to_string()]);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_callback_query_uses_command_dispatch() {
    let fake = FakeTelegram::default();
    let mock = Arc::new(MockDatabaseClient::new());
    let (api, _telegram) = spawn_webhook(&fake, mock.clone(), None).await;

    post_update(&api, callback_update(5, 77, "/table orders")).await;

    assert_eq!(
        fake.calls_to("answerCallbackQuery"),
        vec![json!({"callback_query_id": "cb-5"})]
    );
    assert_eq!(mock.calls()[0].1, vec![QueryParam::Int(20)]);
    assert_eq!(fake.sent_texts().len(), 1);
}

#[tokio::test]
async fn test_webhook_mode_registers_endpoint() {
    let fake = FakeTelegram::default();
    let (_telegram, client) = fake.spawn().await;
    let gw = gateway(Arc::new(MockDatabaseClient::new()), AccessPolicy::default());

    let webhook = WebhookConfig {
        endpoint: "https://bot.example.com/webhook".to_string(),
        secret: WEBHOOK_SECRET.to_string(),
    };

    let bot = BotHandle::start_with_client(gw, client, Some(webhook.clone()))
        .await
        .unwrap();

    assert_eq!(bot.mode(), &DeliveryMode::Webhook(webhook.clone()));
    assert_eq!(bot.webhook(), Some(&webhook));
    assert_eq!(
        fake.calls_to("setWebhook"),
        vec![json!({
            "url": "https://bot.example.com/webhook",
            "secret_token": WEBHOOK_SECRET
        })]
    );
    bot.shutdown().await;
    assert!(fake.calls_to("getUpdates").is_empty());
}

#[tokio::test]
async fn test_polling_handles_updates_and_advances_offset() {
    let fake = FakeTelegram::default();
    let (_telegram, client) = fake.spawn().await;
    let mock = Arc::new(MockDatabaseClient::new());
    let gw = gateway(mock.clone(), AccessPolicy::default());

    let update: Update = serde_json::from_value(message_update(41, 9, "/start")).unwrap();
    fake.push_update(update);

    let bot = BotHandle::start_with_client(gw, client, None).await.unwrap();
    assert_eq!(bot.mode(), &DeliveryMode::Polling);

    let seen = &fake;
    let replied = wait_until(|| async move { !seen.sent_texts().is_empty() }).await;
    assert!(replied, "no reply was sent");

    let advanced = wait_until(|| async move {
        seen
            .calls_to("getUpdates")
            .iter()
            .any(|body| body["offset"] == 42)
    })
    .await;
    assert!(advanced, "offset never advanced past the handled update");

    bot.shutdown().await;

    assert_eq!(fake.calls()[0].0, "deleteWebhook");
    assert!(fake.sent_texts()[0].starts_with("Bot active."));
    assert_eq!(mock.call_count(), 0);
}
