//! Query filtering over recognised tasks.

use serde::Serialize;

use crate::task::TaskLine;

/// Default cap on the number of results shown.
pub const DEFAULT_RESULT_LIMIT: usize = 50;

/// Tasks whose text contains `query`, ignoring case, in input order.
///
/// A blank query matches nothing.
pub fn filter<'a>(tasks: &'a [TaskLine], query: &str) -> Vec<&'a TaskLine> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    tasks
        .iter()
        .filter(|task| task.text.to_lowercase().contains(&needle))
        .collect()
}

/// One-line summary of a search.
///
/// ```
/// use lull_markdown::search::describe;
///
/// assert_eq!(describe("  ", 0, 50), "Type to search");
/// assert_eq!(describe("milk", 0, 50), "No matches");
/// assert_eq!(describe("milk", 3, 50), "3 matches");
/// assert_eq!(
///     describe("a", 51, 50),
///     "Limited to 50 entries. Try refining your search."
/// );
/// ```
pub fn describe(query: &str, count: usize, limit: usize) -> String {
    if query.trim().is_empty() {
        return "Type to search".to_string();
    }
    if count == 0 {
        return "No matches".to_string();
    }
    if count > limit {
        return format!("Limited to {limit} entries. Try refining your search.");
    }
    format!("{count} matches")
}

/// The first `limit` results.
pub fn limited<T>(results: &[T], limit: usize) -> &[T] {
    &results[..results.len().min(limit)]
}

/// Outcome of running a query over a set of tasks.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult<'a> {
    /// Summary line for the search
    pub description: String,

    /// Matches before the limit was applied
    pub total: usize,

    /// Matches shown, at most the limit
    pub matches: Vec<&'a TaskLine>,
}

/// Filter, describe and limit in one step.
pub fn search<'a>(tasks: &'a [TaskLine], query: &str, limit: usize) -> SearchResult<'a> {
    let all = filter(tasks, query);
    SearchResult {
        description: describe(query, all.len(), limit),
        total: all.len(),
        matches: limited(&all, limit).to_vec(),
    }
}
