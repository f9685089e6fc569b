//! Chat command front-end.
//!
//! Commands arrive as message text (or inline-button callback data) and are
//! answered through a [`ReplySink`]. Both entry points normalize to a chat id
//! plus command line and call [`handle_command`].

pub mod bot;
pub mod telegram;

pub use bot::BotHandle;
pub use telegram::{TelegramClient, TelegramReply, Update};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::access::Credential;
use crate::config::Limits;
use crate::db::ResultSet;
use crate::error::{GatewayError, Result};
use crate::format::{format_record, Chunk, Markup};
use crate::gateway::Gateway;

const TABLE_USAGE: &str = "Usage: /table <table_name> [limit]";
const QUERY_USAGE: &str = "Usage: /query <SELECT ...>";
const SEARCH_USAGE: &str = "Usage: /search <term>";
const COUNT_USAGE: &str = "Usage: /count <term>";
const NO_RESULTS_FOUND: &str = "No results found.";
const DATABASE_ERROR: &str = "Error querying the database.";

/// Reply to `/start`, `/help` and unrecognized commands.
pub fn usage(limits: &Limits) -> String {
    format!(
        "Bot active. Commands:\n\
         /table <name> [limit]: rows of one table\n\
         /query <SELECT ...>: run a read-only query (SELECT only)\n\
         /search <term>: find the term in search results (up to {} results)\n\
         /count <term>: count search results for the term",
        limits.search_results_limit
    )
}

/// Delivers replies to the chat a command came from.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Sends one message. `markup` tells the transport how to render `text`.
    async fn send(&self, text: &str, markup: Markup) -> Result<()>;
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Table {
        name: Option<String>,
        limit: Option<String>,
    },
    /// Everything after the command word, trimmed.
    Query(String),
    /// Search term; arguments joined by single spaces.
    Search(String),
    Count(String),
    Unknown(String),
}

impl Command {
    /// Parses a command line such as `/table users 10` or `/query@my_bot SELECT 1`.
    ///
    /// Returns `None` when the text is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;

        let (word, args) = match rest.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (rest, ""),
        };
        // Group chats address commands as `/name@bot_username`.
        let name = word.split('@').next().unwrap_or_default().to_ascii_lowercase();

        let command = match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "table" => {
                let mut parts = args.split_whitespace();
                Self::Table {
                    name: parts.next().map(String::from),
                    limit: parts.next().map(String::from),
                }
            }
            "query" => Self::Query(args.to_string()),
            "search" => Self::Search(join_words(args)),
            "count" => Self::Count(join_words(args)),
            _ => Self::Unknown(name),
        };
        Some(command)
    }
}

fn join_words(args: &str) -> String {
    args.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Handles one command line from `chat_id`, replying through `sink`.
///
/// Every command produces at least one reply. Text that is not a command is
/// ignored. The returned error is a delivery failure that the fallback could
/// not recover from.
pub async fn handle_command(
    gateway: &Gateway,
    chat_id: i64,
    text: &str,
    sink: &dyn ReplySink,
) -> Result<()> {
    let Some(command) = Command::parse(text) else {
        debug!(chat_id, "Ignoring non-command message");
        return Ok(());
    };

    if let Err(e) = gateway.authorize(Credential::ChatId(chat_id)) {
        return sink.send(&e.to_string(), Markup::Plain).await;
    }

    debug!(chat_id, ?command, "Dispatching chat command");
    match command {
        Command::Start | Command::Help | Command::Unknown(_) => {
            sink.send(&usage(gateway.limits()), Markup::Plain).await
        }
        Command::Table { name: None, .. } => sink.send(TABLE_USAGE, Markup::Plain).await,
        Command::Table {
            name: Some(name),
            limit,
        } => match gateway.table(&name, limit.as_deref()).await {
            Ok(lookup) => {
                let block = gateway.format(&lookup.result, lookup.limit as usize);
                send_block(gateway, &block, sink).await
            }
            Err(e) => reply_error(chat_id, "Error querying table", e, sink).await,
        },
        Command::Query(sql) if sql.is_empty() => sink.send(QUERY_USAGE, Markup::Plain).await,
        Command::Query(sql) => match gateway.query(&sql).await {
            Ok(result) => {
                let block = gateway.format(&result, gateway.limits().query_max_rows);
                send_block(gateway, &block, sink).await
            }
            Err(e) => reply_error(chat_id, "Error running query", e, sink).await,
        },
        Command::Search(term) if term.is_empty() => sink.send(SEARCH_USAGE, Markup::Plain).await,
        Command::Search(term) => {
            sink.send(&format!("Searching for: {term} ..."), Markup::Plain).await?;
            match gateway.search(&term).await {
                Ok(result) if result.is_empty() => {
                    sink.send(NO_RESULTS_FOUND, Markup::Plain).await
                }
                Ok(result) => send_records(&result, sink).await,
                Err(e) => {
                    debug!(chat_id, error = %e, "Search failed");
                    sink.send(DATABASE_ERROR, Markup::Plain).await
                }
            }
        }
        Command::Count(term) if term.is_empty() => sink.send(COUNT_USAGE, Markup::Plain).await,
        Command::Count(term) => match gateway.count(&term).await {
            Ok(count) => {
                let reply = format!("Results for '{term}': {count}");
                sink.send(&reply, Markup::Plain).await
            }
            Err(e) => {
                debug!(chat_id, error = %e, "Count failed");
                sink.send(DATABASE_ERROR, Markup::Plain).await
            }
        },
    }
}

async fn reply_error(
    chat_id: i64,
    context: &str,
    error: GatewayError,
    sink: &dyn ReplySink,
) -> Result<()> {
    let text = match &error {
        GatewayError::Rejected(rejection) => rejection.message().to_string(),
        _ => {
            debug!(chat_id, error = %error, "Chat command failed");
            format!("{context}: {error}")
        }
    };
    sink.send(&text, Markup::Plain).await
}

async fn send_block(gateway: &Gateway, block: &str, sink: &dyn ReplySink) -> Result<()> {
    let chunker = gateway.chat_chunker();
    for chunk in chunker.split(block) {
        send_chunk(&chunk, chunker.markup(), sink).await?;
    }
    Ok(())
}

/// Sends one message per search hit, each with its own plain-text fallback.
async fn send_records(result: &ResultSet, sink: &dyn ReplySink) -> Result<()> {
    for (index, row) in result.rows.iter().enumerate() {
        let html = format_record(&result.columns, row, Markup::Html);
        match sink.send(&html, Markup::Html).await {
            Err(GatewayError::Transport(reason)) => {
                warn!(%reason, record = index, "Search record rejected, resending as plain text");
                let plain = format_record(&result.columns, row, Markup::Plain);
                sink.send(&plain, Markup::Plain).await?;
            }
            other => other?,
        }
    }
    Ok(())
}

/// Sends a chunk, resending it as plain text if the transport rejects the markup.
async fn send_chunk(chunk: &Chunk, markup: Markup, sink: &dyn ReplySink) -> Result<()> {
    if markup == Markup::Plain {
        return sink.send(&chunk.text, Markup::Plain).await;
    }

    match sink.send(&chunk.render(markup), markup).await {
        Err(GatewayError::Transport(reason)) => {
            warn!(%reason, chunk = chunk.index, "Formatted reply rejected, resending as plain text");
            sink.send(&chunk.text, Markup::Plain).await
        }
        other => other,
    }
}
