//! Statement execution on isolated worker tasks.
//!
//! The executor never runs a statement on the caller's task. Each call is
//! spawned onto the runtime and awaited, so a slow database round-trip only
//! suspends the request that issued it.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::db::{DatabaseClient, QueryParam, ResultSet};
use crate::error::{GatewayError, Result};
use crate::query::search::{count_query, search_query};
use crate::safety::{Identifier, ValidatedQuery};

/// Clamps a requested row limit into `[1, max]`.
pub fn clamp_limit(requested: i64, max: i64) -> i64 {
    requested.clamp(1, max.max(1))
}

/// Builds the bounded "select all" lookup for a validated table name.
///
/// The limit is bound as `$1`, never interpolated.
pub fn table_query(table: &Identifier, limit: i64) -> (String, Vec<QueryParam>) {
    (
        format!("SELECT * FROM {} LIMIT $1", table.quoted()),
        vec![QueryParam::Int(limit)],
    )
}

/// Runs statements against a [`DatabaseClient`] on spawned tasks.
#[derive(Clone)]
pub struct QueryExecutor {
    db: Arc<dyn DatabaseClient>,
}

impl QueryExecutor {
    /// Creates a new query executor.
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    /// Runs a caller-supplied query that passed the safety gate.
    pub async fn execute_validated(&self, query: &ValidatedQuery) -> Result<ResultSet> {
        self.execute(query.as_str().to_string(), Vec::new()).await
    }

    /// Runs the bounded lookup for `table`.
    pub async fn execute_table(&self, table: &Identifier, limit: i64) -> Result<ResultSet> {
        let (sql, params) = table_query(table, limit);
        self.execute(sql, params).await
    }

    /// Runs a term search returning at most `limit` rows.
    pub async fn execute_search(&self, term: &str, limit: i64) -> Result<ResultSet> {
        let (sql, params) = search_query(term, limit);
        self.execute(sql, params).await
    }

    /// Counts the results matching `term`.
    pub async fn execute_count(&self, term: &str) -> Result<ResultSet> {
        let (sql, params) = count_query(term);
        self.execute(sql, params).await
    }

    /// Executes one statement on a worker task and waits for it.
    ///
    /// Failures are returned as-is; there is no retry.
    pub async fn execute(&self, sql: String, params: Vec<QueryParam>) -> Result<ResultSet> {
        let db = Arc::clone(&self.db);
        let start = Instant::now();

        let worker = tokio::spawn(async move { db.execute(&sql, &params).await });

        let result = worker.await.map_err(|e| {
            error!(error = %e, "Query worker terminated abnormally");
            GatewayError::internal(format!("query worker join error: {e}"))
        })?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(rs) => debug!(rows = rs.row_count(), elapsed_ms, "Query completed"),
            Err(e) => error!(error = %e, elapsed_ms, "Query failed"),
        }
        result
    }
}
