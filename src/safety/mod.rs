//! Query safety gate.
//!
//! Decides whether caller-supplied SQL may reach the database. The gate is
//! lexical: it rejects statement chaining, anything that does not start with
//! `SELECT`, and any text mentioning a mutating verb. It is not a SQL parser
//! and does not make arbitrary read statements injection-proof; a caller that
//! passes it can run one read-only statement and nothing more.

mod identifier;

pub use identifier::{Identifier, IdentifierPolicy, MAX_IDENTIFIER_LEN};

use std::fmt;

/// Default maximum query length in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 3000;

/// The only statement keyword a caller may start a query with.
const READ_ONLY_KEYWORD: &str = "select";

/// Separator that would allow a second statement to follow the first.
const STATEMENT_SEPARATOR: char = ';';

/// Mutating keywords, matched case-insensitively with a trailing space.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "delete", "update", "insert", "truncate", "alter", "create", "drop",
];

/// SQL text that passed the safety gate.
///
/// Holds the caller's text unchanged; validation never rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery(String);

impl ValidatedQuery {
    /// Returns the validated SQL text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the query and returns its text.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The first policy rule a query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeReason {
    Empty,
    TooLong { length: usize, max: usize },
    StatementSeparator,
    NotReadOnly,
    ForbiddenKeyword(&'static str),
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty query"),
            Self::TooLong { length, max } => {
                write!(f, "query is {length} characters, limit is {max}")
            }
            Self::StatementSeparator => write!(f, "statement separator present"),
            Self::NotReadOnly => write!(f, "query does not start with SELECT"),
            Self::ForbiddenKeyword(keyword) => write!(f, "forbidden keyword '{keyword}'"),
        }
    }
}

/// Validates raw SQL against the read-only policy.
#[derive(Debug, Clone)]
pub struct QuerySafetyGate {
    max_length: usize,
    forbidden: Vec<String>,
}

impl Default for QuerySafetyGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUERY_LENGTH)
    }
}

impl QuerySafetyGate {
    /// Creates a gate with the given maximum length and the standard keyword list.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            forbidden: FORBIDDEN_KEYWORDS.iter().map(|k| format!("{k} ")).collect(),
        }
    }

    /// Returns the configured maximum length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Checks `text` and returns it as a [`ValidatedQuery`] if every rule passes.
    ///
    /// Rules short-circuit in order: empty, length, separator, leading
    /// keyword, forbidden keywords.
    pub fn validate(&self, text: &str) -> Result<ValidatedQuery, UnsafeReason> {
        if text.is_empty() {
            return Err(UnsafeReason::Empty);
        }

        let length = text.chars().count();
        if length > self.max_length {
            return Err(UnsafeReason::TooLong {
                length,
                max: self.max_length,
            });
        }

        if text.contains(STATEMENT_SEPARATOR) {
            return Err(UnsafeReason::StatementSeparator);
        }

        let lowered = text.to_lowercase();
        if !lowered.trim_start().starts_with(READ_ONLY_KEYWORD) {
            return Err(UnsafeReason::NotReadOnly);
        }

        for (pattern, keyword) in self.forbidden.iter().zip(FORBIDDEN_KEYWORDS) {
            if lowered.contains(pattern.as_str()) {
                return Err(UnsafeReason::ForbiddenKeyword(keyword));
            }
        }

        Ok(ValidatedQuery(text.to_string()))
    }

    /// Returns true if `text` passes the gate.
    pub fn is_safe(&self, text: &str) -> bool {
        self.validate(text).is_ok()
    }
}
