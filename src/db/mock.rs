//! Mock database clients for testing.
//!
//! Provides in-memory implementations that return a fixed result or a fixed
//! failure and record every statement they receive.

use super::{ColumnInfo, DatabaseClient, QueryParam, ResultSet, Value};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// A statement received by a mock client.
pub type RecordedCall = (String, Vec<QueryParam>);

#[derive(Debug, Default)]
struct CallLog(Mutex<Vec<RecordedCall>>);

impl CallLog {
    fn record(&self, sql: &str, params: &[QueryParam]) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((sql.to_string(), params.to_vec()));
    }

    fn snapshot(&self) -> Vec<RecordedCall> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// A mock database client that returns a predefined result.
#[derive(Debug)]
pub struct MockDatabaseClient {
    result: ResultSet,
    calls: CallLog,
}

impl MockDatabaseClient {
    /// Creates a mock that answers every statement like `SELECT 1`.
    pub fn new() -> Self {
        Self::with_result(ResultSet::with_data(
            vec![ColumnInfo::new("?column?", "INT4")],
            vec![vec![Value::Int(1)]],
        ))
    }

    /// Creates a mock that answers every statement with `result`.
    pub fn with_result(result: ResultSet) -> Self {
        Self {
            result,
            calls: CallLog::default(),
        }
    }

    /// Returns every statement executed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.snapshot()
    }

    /// Returns the number of statements executed so far.
    pub fn call_count(&self) -> usize {
        self.calls.snapshot().len()
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<ResultSet> {
        self.calls.record(sql, params);
        Ok(self.result.clone())
    }
}

/// A mock database client whose every statement fails.
#[derive(Debug)]
pub struct FailingDatabaseClient {
    message: String,
    calls: CallLog,
}

impl FailingDatabaseClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: CallLog::default(),
        }
    }

    /// Returns the number of statements attempted so far.
    pub fn call_count(&self) -> usize {
        self.calls.snapshot().len()
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<ResultSet> {
        self.calls.record(sql, params);
        Err(GatewayError::query(self.message.clone()))
    }
}
