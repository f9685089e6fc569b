//! Query execution for the gateway.
//!
//! This module isolates statement execution from the front-ends: it builds
//! the fixed-shape table lookup and term searches, and dispatches each
//! statement to its own worker task.

pub mod executor;
pub mod search;

pub use executor::{clamp_limit, table_query, QueryExecutor};
pub use search::{count_query, like_pattern, search_query};
