//! db-gateway - A read-only PostgreSQL query gateway.

use std::sync::Arc;
use std::time::Duration;

use db_gateway::chat::BotHandle;
use db_gateway::cli::Cli;
use db_gateway::config::Config;
use db_gateway::db::PostgresClient;
use db_gateway::error::{GatewayError, Result};
use db_gateway::gateway::Gateway;
use db_gateway::http::{router, AppState};
use db_gateway::logging::init_stderr_logging;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let file_config = Config::load_from_file(&config_path)?;
    let config = cli.into_config(file_config)?;

    info!("Database: {}", config.connection.display_string());
    let db = PostgresClient::new(
        &config.connection,
        Duration::from_secs(config.limits.connect_timeout_secs),
    );
    let gateway = Arc::new(Gateway::new(
        Arc::new(db),
        config.access.clone(),
        config.limits,
    ));

    let mut state = AppState::new(Arc::clone(&gateway));
    let bot = match &config.telegram {
        Some(telegram) => {
            let bot = BotHandle::start(Arc::clone(&gateway), telegram).await?;
            if let Some(webhook) = bot.webhook() {
                state = state.with_webhook(bot.client().clone(), webhook.secret.clone());
            }
            Some(bot)
        }
        None => {
            info!("TELEGRAM_TOKEN not set; chat front-end disabled");
            None
        }
    };

    if config.access.api_key.is_none() {
        warn!("HTTP_API_KEY not set; the HTTP API is open to anyone who can reach it");
    }

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::config(format!("Failed to bind {addr}: {e}")))?;
    info!("HTTP server listening on http://{addr}");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::internal(format!("HTTP server error: {e}")));

    if let Some(bot) = bot {
        bot.shutdown().await;
    }
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
