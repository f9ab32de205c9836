use chrono::{DateTime, Utc};

use crate::feed::{Feed, ListState};
use crate::item::CommentItem;

pub const DEFAULT_WRAP_WIDTH: usize = 80;

const HEADER: &str = "Comments";
const FORM_HINT: &str = "Write a comment...";
const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub width: usize,
    pub now: DateTime<Utc>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            width: DEFAULT_WRAP_WIDTH,
            now: Utc::now(),
        }
    }
}

/// Renders the whole feed: header, form line, then the list region. A load
/// failure replaces only the list region.
pub fn feed_lines(feed: &Feed, opts: Options) -> Vec<String> {
    let mut lines = vec![HEADER.to_string(), form_line(feed), String::new()];
    match feed.list() {
        ListState::Idle | ListState::Loading => lines.push("Loading...".to_string()),
        ListState::Error(err) => lines.push(err.to_string()),
        ListState::Ready(_) => {
            let items = feed.items();
            if items.is_empty() {
                lines.push("No comments yet.".to_string());
            }
            for item in &items {
                lines.extend(item_lines(item, opts));
                lines.push(String::new());
            }
            if feed.is_refreshing() {
                lines.push("Refreshing...".to_string());
            }
        }
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

fn form_line(feed: &Feed) -> String {
    if feed.viewer().is_none() {
        return format!("[{FORM_HINT}] (sign in to comment)");
    }
    if feed.can_submit() {
        format!("[{FORM_HINT}] Send")
    } else {
        format!("[{FORM_HINT}] Send (disabled)")
    }
}

pub fn item_lines(item: &CommentItem, opts: Options) -> Vec<String> {
    let entry = &item.entry;
    let mut header = format!(
        "{}  {}",
        entry.author().username,
        relative_time(entry.created_at(), opts.now)
    );
    if let Some(id) = entry.id() {
        header.push_str(&format!("  #{id}"));
    }
    if item.deletable {
        header.push_str("  [delete]");
        if item.deleting {
            header.push_str(" (in progress)");
        }
    }

    let body = if entry.is_pending() {
        format!("{} (Sending...)", entry.body())
    } else {
        entry.body().to_string()
    };
    let width = opts.width.saturating_sub(INDENT.len()).max(10);
    let mut lines = vec![header];
    for paragraph in body.lines() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        for wrapped in textwrap::wrap(paragraph, width) {
            lines.push(format!("{INDENT}{wrapped}"));
        }
    }
    lines
}

/// "just now", "5 minutes ago", "3 days ago", ...
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 0 {
        return "just now".to_string();
    }
    const UNITS: [(i64, &str); 6] = [
        (365 * 24 * 3600, "year"),
        (30 * 24 * 3600, "month"),
        (7 * 24 * 3600, "week"),
        (24 * 3600, "day"),
        (3600, "hour"),
        (60, "minute"),
    ];
    for (size, unit) in UNITS {
        let count = seconds / size;
        if count >= 1 {
            let plural = if count == 1 { "" } else { "s" };
            return format!("{count} {unit}{plural} ago");
        }
    }
    "just now".to_string()
}
