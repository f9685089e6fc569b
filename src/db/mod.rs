//! Database abstraction layer for the gateway.
//!
//! Provides a trait-based interface for running one statement and reading
//! back its columns and rows, so the pipeline can be exercised against an
//! in-memory client in tests.

mod mock;
mod postgres;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use postgres::PostgresClient;
pub use types::{ColumnInfo, QueryParam, ResultSet, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for database clients.
///
/// Implementations acquire their own connection per call and release it
/// before returning, whether the statement succeeded or not.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes one statement with positional parameters bound to `$1..$n`.
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<ResultSet>;
}
