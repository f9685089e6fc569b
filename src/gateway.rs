//! The request pipeline shared by the HTTP and chat front-ends.
//!
//! Every request runs the same stateless sequence: authorize, validate the
//! table name or the raw SQL, execute on a worker task, then format. The
//! front-ends differ only in how they read input and deliver output.

use std::sync::Arc;

use tracing::info;

use crate::access::{AccessGate, AccessPolicy, Credential};
use crate::config::Limits;
use crate::db::{DatabaseClient, ResultSet, Value};
use crate::error::{GatewayError, Rejection, Result};
use crate::format::{format_results, Markup, OutputChunker};
use crate::query::{clamp_limit, QueryExecutor};
use crate::safety::{IdentifierPolicy, QuerySafetyGate};

/// Result of a table lookup together with the limit actually applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLookup {
    pub result: ResultSet,
    pub limit: i64,
}

/// The validate-execute-format pipeline.
#[derive(Clone)]
pub struct Gateway {
    access: AccessGate,
    identifiers: IdentifierPolicy,
    safety: QuerySafetyGate,
    executor: QueryExecutor,
    limits: Limits,
}

impl Gateway {
    pub fn new(db: Arc<dyn DatabaseClient>, access: AccessPolicy, limits: Limits) -> Self {
        Self {
            access: AccessGate::new(access),
            identifiers: IdentifierPolicy,
            safety: QuerySafetyGate::new(limits.max_query_length),
            executor: QueryExecutor::new(db),
            limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Checks a credential against the access policy.
    pub fn authorize(&self, credential: Credential<'_>) -> Result<()> {
        let outcome = self.access.authorize(credential);
        if outcome.is_err() {
            info!(channel = ?credential.channel(), "Request denied by access policy");
        }
        outcome
    }

    /// Returns the limit used for a table lookup.
    pub fn effective_limit(&self, requested: Option<i64>) -> i64 {
        clamp_limit(
            requested.unwrap_or(self.limits.table_default_limit),
            self.limits.table_max_limit,
        )
    }

    /// Validates `name` and fetches at most the effective limit of its rows.
    ///
    /// `limit` is the caller's raw text; the name is checked before it.
    pub async fn table(&self, name: &str, limit: Option<&str>) -> Result<TableLookup> {
        let table = self.identifiers.validate(name).ok_or_else(|| {
            info!(table = name, "Rejected invalid table name");
            Rejection::InvalidName
        })?;
        let requested = parse_limit(limit)?;
        let limit = self.effective_limit(requested);

        let result = self.executor.execute_table(&table, limit).await?;
        info!(table = %table, limit, rows = result.row_count(), "Table lookup served");
        Ok(TableLookup { result, limit })
    }

    /// Validates raw SQL against the safety gate and executes it.
    pub async fn query(&self, sql: &str) -> Result<ResultSet> {
        let query = self.safety.validate(sql).map_err(|reason| {
            info!(%reason, "Rejected unsafe query");
            Rejection::UnsafeQuery
        })?;

        let result = self.executor.execute_validated(&query).await?;
        info!(rows = result.row_count(), "Query served");
        Ok(result)
    }

    /// Newest search results mentioning `term`, capped by the search limit.
    pub async fn search(&self, term: &str) -> Result<ResultSet> {
        let limit = clamp_limit(self.limits.search_results_limit, self.limits.table_max_limit);
        let result = self.executor.execute_search(term, limit).await?;
        info!(limit, rows = result.row_count(), "Search served");
        Ok(result)
    }

    /// Number of search results mentioning `term`.
    pub async fn count(&self, term: &str) -> Result<i64> {
        let result = self.executor.execute_count(term).await?;
        match result.rows.first().and_then(|row| row.first()) {
            Some(Value::Int(count)) => Ok(*count),
            Some(Value::Null) | None => Ok(0),
            Some(other) => Err(GatewayError::internal(format!(
                "count returned a non-integer value: {}",
                other.to_display_string()
            ))),
        }
    }

    /// Formats a result with at most `max_rows` data lines.
    pub fn format(&self, result: &ResultSet, max_rows: usize) -> String {
        format_results(result, max_rows)
    }

    /// Returns the chunker for chat replies.
    pub fn chat_chunker(&self) -> OutputChunker {
        OutputChunker::new(self.limits.chunk_length, Markup::Html)
    }
}

/// Parses an optional row limit. Blank text counts as absent.
pub fn parse_limit(raw: Option<&str>) -> Result<Option<i64>> {
    match raw.map(str::trim).filter(|l| !l.is_empty()) {
        None => Ok(None),
        Some(text) => text.parse::<i64>().map(Some).map_err(|_| {
            info!(limit = text, "Rejected invalid limit");
            GatewayError::from(Rejection::InvalidLimit)
        }),
    }
}
