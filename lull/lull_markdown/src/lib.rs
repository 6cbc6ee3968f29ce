//! # Lull Markdown
//!
//! Recognises task lines in markdown notes and filters them by a query.
//! This is the work a lull scheduler runs in the background: parsing one
//! document is one task, and a search runs once the whole batch is in.
//!
//! - **task**: list items with checkbox, timestamp, dates and properties
//! - **search**: case-insensitive filtering, summary line and result limit

mod patterns;
pub mod search;
pub mod task;

pub use search::{describe, filter, limited, search, SearchResult, DEFAULT_RESULT_LIMIT};
pub use task::{parse_document, parse_task_line, TaskLine};
