//! db-gateway - A read-only PostgreSQL query gateway.
//!
//! HTTP and Telegram front-ends share one pipeline: access check, name or
//! query validation, execution on a worker task, text formatting and
//! chunked delivery.

pub mod access;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod gateway;
pub mod http;
pub mod logging;
pub mod query;
pub mod safety;
