//! Status line rendering
//!
//! ```text
//! Opus │ 42.5% used (85k) ▒▒▒▒▒▒▒▒░░░░░░░░░░░░ ● auth flow  ● db schema  ● free
//! ```

use crossterm::style::{Color, Stylize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use ctxmon_core::Segment;

/// Topic colors, cycled in segment order
const SEGMENT_COLORS: [Color; 4] = [
    Color::DarkCyan,
    Color::DarkMagenta,
    Color::DarkBlue,
    Color::DarkYellow,
];
const FREE_COLOR: Color = Color::DarkGrey;
const MODEL_COLOR: Color = Color::Magenta;

const TOPIC_CELL: &str = "▒";
const FREE_CELL: &str = "░";
const SEPARATOR: &str = "│";

/// Legend names wider than this are shortened
const MAX_NAME_WIDTH: usize = 15;

/// Color of the usage percentage
pub fn usage_color(pct: f64) -> Color {
    if pct >= 80.0 {
        Color::DarkRed
    } else if pct >= 60.0 {
        Color::DarkYellow
    } else {
        Color::DarkGreen
    }
}

/// Token count as `850` or `85k`
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1000 {
        format!("{}k", (tokens as f64 / 1000.0).round() as u64)
    } else {
        tokens.to_string()
    }
}

/// Shorten a legend name to 14 columns plus an ellipsis
pub fn short_name(name: &str) -> String {
    if name.width() > MAX_NAME_WIDTH {
        format!("{}…", truncate_to_width(name, MAX_NAME_WIDTH - 1))
    } else {
        name.to_string()
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = UnicodeWidthChar::width(c).unwrap_or(0);
        if current_width + char_width > max_width {
            break;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn cells(pct: f64, bar_width: usize) -> usize {
    ((pct / 100.0) * bar_width as f64).round().max(1.0) as usize
}

/// Bar and legend for the cached segments, or empty when there are none
///
/// Topic shares are rescaled to the real usage; the free tail always
/// reflects the real free percentage, whatever the extractor estimated.
pub fn segment_bar(segments: &[Segment], used_pct: f64, bar_width: usize) -> String {
    if segments.is_empty() {
        return String::new();
    }

    let topics: Vec<&Segment> = segments.iter().filter(|s| !s.is_free()).collect();
    let topic_total: f64 = topics.iter().map(|s| f64::from(s.pct)).sum();

    let mut bar = String::new();
    let mut legend = Vec::with_capacity(topics.len() + 1);

    for (i, segment) in topics.iter().enumerate() {
        let color = SEGMENT_COLORS[i % SEGMENT_COLORS.len()];
        let scaled = if topic_total > 0.0 {
            f64::from(segment.pct) / topic_total * used_pct
        } else {
            0.0
        };
        bar.push_str(&TOPIC_CELL.repeat(cells(scaled, bar_width)).with(color).to_string());
        legend.push(format!("● {}", short_name(&segment.name)).with(color).to_string());
    }

    let free_pct = 100.0 - used_pct;
    bar.push_str(&FREE_CELL.repeat(cells(free_pct, bar_width)).with(FREE_COLOR).to_string());
    legend.push("● free".with(FREE_COLOR).to_string());

    format!(" {} {}", bar, legend.join("  "))
}

/// Line for a session that has not reported any usage yet
pub fn new_session_line(model: &str) -> String {
    format!(
        "{} {} {} {}",
        model.with(MODEL_COLOR),
        SEPARATOR.with(FREE_COLOR),
        "0% used".with(Color::DarkGreen),
        "(new session)".with(FREE_COLOR),
    )
}

/// Full status line
pub fn status_line(
    model: &str,
    pct: f64,
    used_tokens: u64,
    segments: &[Segment],
    bar_width: usize,
) -> String {
    format!(
        "{} {} {} {}{}",
        model.with(MODEL_COLOR),
        SEPARATOR.with(FREE_COLOR),
        format!("{:.1}% used", pct).with(usage_color(pct)),
        format!("({})", format_tokens(used_tokens)).with(FREE_COLOR),
        segment_bar(segments, pct, bar_width),
    )
}
