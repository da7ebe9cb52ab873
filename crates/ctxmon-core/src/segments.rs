//! Topic segments and the extractor's one-line output format.
//!
//! The extractor answers with a single line such as:
//! ```text
//! auth flow 40%|db schema 35%|free 25%
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Name conventionally used for the unused-context bucket
pub const FREE_SEGMENT: &str = "free";

static SEGMENT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+(\d+)%$").expect("valid segment regex"));

/// A named topic and the share of context it consumed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Topic name (1-4 words)
    pub name: String,
    /// Percentage of context (0-100)
    pub pct: u8,
}

impl Segment {
    pub fn new(name: impl Into<String>, pct: u8) -> Self {
        Self {
            name: name.into(),
            pct,
        }
    }

    /// Whether this is the unused-context bucket
    pub fn is_free(&self) -> bool {
        self.name.eq_ignore_ascii_case(FREE_SEGMENT)
    }
}

/// Last non-empty line of extractor output
pub fn last_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

/// Parse extractor output into segments.
///
/// Only the last non-empty line is considered. Tokens that do not match
/// `<name> <NN>%` are dropped, the rest are kept in order.
pub fn parse_segment_line(output: &str) -> Vec<Segment> {
    last_line(output)
        .split('|')
        .filter_map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> Option<Segment> {
    let caps = SEGMENT_TOKEN.captures(token.trim())?;
    let name = caps.get(1)?.as_str().trim();
    let pct: u8 = caps.get(2)?.as_str().parse().ok()?;
    if name.is_empty() || pct > 100 {
        return None;
    }
    Some(Segment::new(name, pct))
}
