//! Compiled patterns for task-line recognition.
//!
//! Every pattern is compiled once on first use and shared afterwards.

use regex::Regex;
use std::sync::OnceLock;

static PATTERNS: OnceLock<PatternSet> = OnceLock::new();

/// Hours, optional minutes after `:`, `.` or a space, optional am/pm.
const TIME: &str = r"\d{1,2}(?:[:. ]?\d{2})?(?:\s?[apAP][mM]\b)?";

/// Hours and minutes joined by a colon, optional am/pm.
const STRICT_TIME: &str = r"\d{1,2}:\d{2}(?:\s?[apAP][mM]\b)?";

const DURATION_SEPARATOR: &str = r"\s?-{1,2}\s?";

const DATE: &str = r"\d{4}-\d{2}-\d{2}";

/// Pre-compiled pattern set.
#[derive(Debug)]
pub(crate) struct PatternSet {
    /// Leading indentation and list marker (`-`, `*`, `+`, `1.`, `1)`)
    pub list_token: Regex,

    /// Checkbox right after the list marker
    pub checkbox: Regex,

    /// Loose timestamp or range at the start of the task text
    pub leading_timestamp: Regex,

    /// Colon-separated timestamp or range anywhere in the task text
    pub strict_timestamp: Regex,

    /// Components of a single time value
    pub time_parts: Regex,

    /// ATX heading
    pub heading: Regex,

    /// Trailing block reference (` ^block-id`)
    pub block_id: Regex,

    /// Bracketed inline property (`[key:: value]`)
    pub property: Regex,

    /// Scheduled date in bracketed, parenthesised and emoji forms
    pub scheduled: [Regex; 3],

    /// Due date in bracketed, parenthesised and emoji forms
    pub due: [Regex; 3],
}

impl PatternSet {
    fn new() -> Self {
        Self {
            list_token: Regex::new(r"^(?P<indent>\s*)(?P<marker>[-*+]|\d+[.)])\s+")
                .expect("list_token regex must compile"),

            checkbox: Regex::new(r"^\[(?P<completion>[^\]])\](?:\s+|$)")
                .expect("checkbox regex must compile"),

            leading_timestamp: Regex::new(&format!(
                r"^(?P<start>{TIME})(?:{DURATION_SEPARATOR}(?P<end>{TIME}))?(?:\s+|$)"
            ))
            .expect("leading_timestamp regex must compile"),

            strict_timestamp: Regex::new(&format!(
                r"\b(?P<start>{STRICT_TIME})(?:{DURATION_SEPARATOR}(?P<end>{STRICT_TIME}))?"
            ))
            .expect("strict_timestamp regex must compile"),

            time_parts: Regex::new(
                r"^(?P<hours>\d{1,2})(?:[:. ]?(?P<minutes>\d{2}))?(?:\s?(?P<meridiem>[apAP][mM]))?$",
            )
            .expect("time_parts regex must compile"),

            heading: Regex::new(r"^(?P<level>#{1,6})\s+(?P<title>.*?)\s*#*\s*$")
                .expect("heading regex must compile"),

            block_id: Regex::new(r"\s\^(?P<id>[A-Za-z0-9-]+)\s*$")
                .expect("block_id regex must compile"),

            property: Regex::new(r"\[(?P<key>[^\]:]+)::\s*(?P<value>[^\]]*)\]")
                .expect("property regex must compile"),

            scheduled: date_property("scheduled", "⏳"),

            due: date_property("due", "📅"),
        }
    }
}

fn date_property(key: &str, emoji: &str) -> [Regex; 3] {
    [
        Regex::new(&format!(r"\[{key}\s*::\s*(?P<date>{DATE})\]")),
        Regex::new(&format!(r"\({key}\s*::\s*(?P<date>{DATE})\)")),
        Regex::new(&format!(r"{emoji}\s*(?P<date>{DATE})")),
    ]
    .map(|pattern| pattern.expect("date property regex must compile"))
}

/// Get the shared pattern set.
pub(crate) fn patterns() -> &'static PatternSet {
    PATTERNS.get_or_init(PatternSet::new)
}
