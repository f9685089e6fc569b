//! Term search over the `search_results` table.
//!
//! The term only ever travels as a bound parameter. It is wrapped in `%`
//! after escaping the `LIKE` metacharacters, so it matches as a literal
//! substring.

use crate::db::QueryParam;

/// Columns a `/search` reply shows, in display order.
pub const SEARCH_COLUMNS: &str = "source, repo, path, html_url, score, snippet, found_at";

/// Matches `$1` against every text column of a result.
const TERM_PREDICATE: &str = "(COALESCE(source, '') ILIKE $1 \
     OR COALESCE(repo, '') ILIKE $1 \
     OR COALESCE(path, '') ILIKE $1 \
     OR COALESCE(html_url, '') ILIKE $1 \
     OR COALESCE(snippet, '') ILIKE $1)";

/// Builds the `ILIKE` pattern matching `term` anywhere in a column.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Newest results mentioning `term`, at most `limit` rows.
pub fn search_query(term: &str, limit: i64) -> (String, Vec<QueryParam>) {
    (
        format!(
            "SELECT {SEARCH_COLUMNS} FROM public.search_results WHERE {TERM_PREDICATE} \
             ORDER BY found_at DESC LIMIT $2"
        ),
        vec![QueryParam::Text(like_pattern(term)), QueryParam::Int(limit)],
    )
}

/// Number of results mentioning `term`, in a column named `cnt`.
pub fn count_query(term: &str) -> (String, Vec<QueryParam>) {
    (
        format!("SELECT COUNT(*) AS cnt FROM public.search_results WHERE {TERM_PREDICATE}"),
        vec![QueryParam::Text(like_pattern(term))],
    )
}
