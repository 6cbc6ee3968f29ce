//! Task-line recognition.
//!
//! A task line is a markdown list item, optionally with a checkbox. The
//! text after the marker may start with a timestamp or time range and may
//! carry inline properties, among them scheduled and due dates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use regex::Captures;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use lull_core::error::MarkdownError;

use crate::patterns::patterns;

/// A recognised markdown task line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLine {
    /// File the line was read from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// One-based line number, or 0 for a line parsed on its own
    pub line: usize,

    /// Width of the leading indentation
    pub indent: usize,

    /// The list marker as written (`-`, `*`, `+`, `1.`, `2)`)
    pub marker: String,

    /// Checkbox character, `None` for a plain list item
    pub completion: Option<char>,

    /// Task text with marker, checkbox, timestamp and properties removed
    pub text: String,

    /// The line as written
    pub raw: String,

    /// Start of the leading timestamp or range
    pub start_time: Option<NaiveTime>,

    /// End of the range
    pub end_time: Option<NaiveTime>,

    /// Scheduled date
    pub scheduled: Option<NaiveDate>,

    /// Due date
    pub due: Option<NaiveDate>,

    /// Bracketed `[key:: value]` properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Trailing block reference
    pub block_id: Option<String>,

    /// Closest heading above the line
    pub heading: Option<String>,
}

impl TaskLine {
    /// Whether the line carries a checkbox.
    pub fn is_task(&self) -> bool {
        self.completion.is_some()
    }

    /// Whether the checkbox is ticked with anything other than a space.
    pub fn is_done(&self) -> bool {
        self.completion.is_some_and(|c| c != ' ')
    }

    /// Whether the line has a start time.
    pub fn is_timed(&self) -> bool {
        self.start_time.is_some()
    }
}

/// Recognise a single line.
///
/// Returns `Ok(None)` for a line that is not a list item. A recognised line
/// with a calendar-impossible date, or a colon-separated time out of range,
/// is an error.
///
/// ```
/// use chrono::NaiveTime;
/// use lull_markdown::parse_task_line;
///
/// let task = parse_task_line("- [ ] 9:00 - 10:30 Standup").unwrap().unwrap();
/// assert_eq!(task.text, "Standup");
/// assert_eq!(task.start_time, NaiveTime::from_hms_opt(9, 0, 0));
/// assert_eq!(task.end_time, NaiveTime::from_hms_opt(10, 30, 0));
/// assert!(!task.is_done());
/// ```
pub fn parse_task_line(line: &str) -> Result<Option<TaskLine>, MarkdownError> {
    parse_line(line, 0)
}

fn parse_line(raw: &str, line: usize) -> Result<Option<TaskLine>, MarkdownError> {
    let p = patterns();

    let Some(list) = p.list_token.captures(raw) else {
        return Ok(None);
    };
    let indent = list["indent"].chars().count();
    let marker = list["marker"].to_string();
    let mut rest = &raw[list.get(0).map_or(0, |m| m.end())..];

    let mut completion = None;
    if let Some(checkbox) = p.checkbox.captures(rest) {
        completion = checkbox["completion"].chars().next();
        rest = &rest[checkbox.get(0).map_or(0, |m| m.end())..];
    }

    let mut body = rest.to_string();

    let mut block_id = None;
    let block = p
        .block_id
        .captures(&body)
        .and_then(|caps| Some((caps.get(0)?.start(), caps["id"].to_string())));
    if let Some((start, id)) = block {
        body.truncate(start);
        block_id = Some(id);
    }

    let scheduled = find_date(&p.scheduled, &mut body, line)?;
    let due = find_date(&p.due, &mut body, line)?;

    let mut properties = BTreeMap::new();
    for caps in p.property.captures_iter(&body) {
        properties.insert(caps["key"].trim().to_string(), caps["value"].trim().to_string());
    }
    if !properties.is_empty() {
        body = p.property.replace_all(&body, "").into_owned();
    }

    let (start_time, end_time) = find_times(&mut body, line)?;

    let text = body.split_whitespace().collect::<Vec<_>>().join(" ");
    trace!(line, %text, "Recognised list item");

    Ok(Some(TaskLine {
        path: None,
        line,
        indent,
        marker,
        completion,
        text,
        raw: raw.to_string(),
        start_time,
        end_time,
        scheduled,
        due,
        properties,
        block_id,
        heading: None,
    }))
}

/// Take the first date matched by any of `forms` out of `body`.
fn find_date(
    forms: &[regex::Regex],
    body: &mut String,
    line: usize,
) -> Result<Option<NaiveDate>, MarkdownError> {
    let mut found = None;
    for form in forms {
        let Some(value) = form.captures(body).map(|caps| caps["date"].to_string()) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map_err(|_| MarkdownError::InvalidDate { line, value })?;
        found.get_or_insert(date);
        *body = form.replace(body, "").into_owned();
    }
    Ok(found)
}

/// Take the leading timestamp, or failing that a colon-separated one from
/// anywhere, out of `body`.
fn find_times(
    body: &mut String,
    line: usize,
) -> Result<(Option<NaiveTime>, Option<NaiveTime>), MarkdownError> {
    let p = patterns();

    let leading = p
        .leading_timestamp
        .captures(body)
        .and_then(|caps| Some((caps.get(0)?.end(), loose_range(&caps)?)));
    // A loose leading number that is not a valid time is just text.
    if let Some((end, times)) = leading {
        body.replace_range(..end, "");
        return Ok(times);
    }

    let Some((range, start, end)) = p.strict_timestamp.captures(body).and_then(|caps| {
        Some((
            caps.get(0)?.range(),
            caps["start"].to_string(),
            caps.name("end").map(|m| m.as_str().to_string()),
        ))
    }) else {
        return Ok((None, None));
    };

    let start = strict_time(&start, line)?;
    let end = end.map(|value| strict_time(&value, line)).transpose()?;
    body.replace_range(range, "");
    Ok((Some(start), end))
}

fn loose_range(caps: &Captures<'_>) -> Option<(Option<NaiveTime>, Option<NaiveTime>)> {
    let start = parse_time(&caps["start"])?;
    let end = match caps.name("end") {
        Some(m) => Some(parse_time(m.as_str())?),
        None => None,
    };
    Some((Some(start), end))
}

fn strict_time(value: &str, line: usize) -> Result<NaiveTime, MarkdownError> {
    parse_time(value).ok_or_else(|| MarkdownError::InvalidTime {
        line,
        value: value.trim().to_string(),
    })
}

/// Parse `9`, `9:30`, `09.30`, `9 30`, `9am`, `9:30 PM`.
fn parse_time(value: &str) -> Option<NaiveTime> {
    let caps = patterns().time_parts.captures(value.trim())?;
    let mut hours: u32 = caps["hours"].parse().ok()?;
    let minutes: u32 = caps.name("minutes").map_or(Some(0), |m| m.as_str().parse().ok())?;

    if let Some(meridiem) = caps.name("meridiem") {
        if !(1..=12).contains(&hours) {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hours = match (hours, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Recognise every list item in a markdown document.
///
/// Lines inside fenced code blocks are skipped. Each task records its line
/// number and the closest heading above it.
pub fn parse_document(path: &Path, source: &str) -> Result<Vec<TaskLine>, MarkdownError> {
    let p = patterns();
    let mut tasks = Vec::new();
    let mut heading: Option<String> = None;
    let mut in_fence = false;

    for (index, raw) in source.lines().enumerate() {
        let trimmed = raw.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(caps) = p.heading.captures(raw) {
            heading = Some(caps["title"].to_string());
            continue;
        }

        if let Some(mut task) = parse_line(raw, index + 1)? {
            task.path = Some(path.to_path_buf());
            task.heading = heading.clone();
            tasks.push(task);
        }
    }

    debug!(path = %path.display(), tasks = tasks.len(), "Parsed document");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> TaskLine {
        parse_task_line(line).unwrap().unwrap()
    }

    fn time(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    #[test]
    fn test_plain_text_is_not_a_task() {
        assert!(parse_task_line("Just a paragraph").unwrap().is_none());
        assert!(parse_task_line("").unwrap().is_none());
    }

    #[test]
    fn test_markers_and_checkbox() {
        let task = parse("  1) [x] Ship it");
        assert_eq!(task.indent, 2);
        assert_eq!(task.marker, "1)");
        assert_eq!(task.completion, Some('x'));
        assert!(task.is_done());
        assert_eq!(task.text, "Ship it");

        let item = parse("* plain bullet");
        assert!(!item.is_task());
        assert_eq!(item.text, "plain bullet");
    }

    #[test]
    fn test_meridiem_times() {
        let task = parse("- [ ] 9am - 12pm Deep work");
        assert_eq!(task.start_time, time(9, 0));
        assert_eq!(task.end_time, time(12, 0));
        assert_eq!(task.text, "Deep work");

        assert_eq!(parse("- 12am night").start_time, time(0, 0));
        assert_eq!(parse("- 1:15 PM lunch").start_time, time(13, 15));
    }

    #[test]
    fn test_out_of_range_leading_number_is_text() {
        let task = parse("- [ ] 99 bottles");
        assert_eq!(task.start_time, None);
        assert_eq!(task.text, "99 bottles");
    }

    #[test]
    fn test_strict_time_anywhere() {
        let task = parse("- [ ] Call the bank at 16:30");
        assert_eq!(task.start_time, time(16, 30));
        assert_eq!(task.text, "Call the bank at");
    }

    #[test]
    fn test_invalid_strict_time_is_error() {
        let err = parse_task_line("- [ ] Meet at 25:10").unwrap_err();
        assert!(matches!(err, MarkdownError::InvalidTime { .. }));
    }

    #[test]
    fn test_properties_and_block_id() {
        let task = parse("- [ ] Review [due:: 2024-05-02] [owner:: Kim] ^abc-1");
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2024, 5, 2));
        assert_eq!(task.properties.get("owner").map(String::as_str), Some("Kim"));
        assert_eq!(task.block_id.as_deref(), Some("abc-1"));
        assert_eq!(task.text, "Review");
    }

    #[test]
    fn test_emoji_dates_keep_scheduled_and_due_apart() {
        let task = parse("- [ ] File taxes ⏳ 2024-04-01 📅 2024-04-15");
        assert_eq!(task.scheduled, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2024, 4, 15));
        assert_eq!(task.text, "File taxes");

        let due_only = parse("- [ ] Renew passport 📅 2024-06-30");
        assert_eq!(due_only.scheduled, None);
        assert_eq!(due_only.due, NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    #[test]
    fn test_invalid_date_is_error() {
        let err = parse_task_line("- [ ] Pay rent (scheduled:: 2024-02-30)").unwrap_err();
        assert!(matches!(err, MarkdownError::InvalidDate { line: 0, .. }));
    }
}
