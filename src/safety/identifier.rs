//! Table name validation for structured lookups.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Maximum identifier length accepted (PostgreSQL's NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^[A-Za-z0-9_]{{1,{MAX_IDENTIFIER_LEN}}}$"))
        .unwrap_or_else(|e| panic!("identifier pattern is invalid: {e}"))
});

/// A table name that matched the identifier grammar.
///
/// Only constructed by [`IdentifierPolicy::validate`], so it is always safe to
/// place inside double quotes in a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier wrapped in double quotes.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates bare table names.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierPolicy;

impl IdentifierPolicy {
    /// Returns the token as an [`Identifier`], or `None` if it has any
    /// character outside `[A-Za-z0-9_]` or is not 1 to 63 characters long.
    pub fn validate(&self, token: &str) -> Option<Identifier> {
        IDENTIFIER_RE
            .is_match(token)
            .then(|| Identifier(token.to_string()))
    }
}
