//! Reader for the assistant's line-oriented JSON transcript.
//!
//! Each line is one event. Only a few fields matter here:
//! ```text
//! {"message":{"role":"user","content":"..."}}
//! {"message":{"role":"assistant","content":[{"type":"text","text":"..."}],
//!             "model":"...","usage":{"input_tokens":..,"output_tokens":..}},
//!  "isSidechain":false}
//! ```

use serde::Deserialize;
use std::path::Path;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Short tag used when quoting the turn in a prompt
    pub fn tag(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASST",
        }
    }
}

/// One user or assistant message with its plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Token counts reported with an assistant message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl TokenUsage {
    /// Tokens occupying the context window
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_input_tokens
            + self.cache_creation_input_tokens
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptLine {
    #[serde(default)]
    message: Option<TranscriptMessage>,
    #[serde(default)]
    is_sidechain: bool,
    #[serde(default)]
    is_api_error_message: bool,
}

#[derive(Debug, Deserialize)]
struct TranscriptMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<serde_json::Value>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

impl TranscriptMessage {
    fn role(&self) -> Option<Role> {
        match self.role.as_deref() {
            Some("user") => Some(Role::User),
            Some("assistant") => Some(Role::Assistant),
            _ => None,
        }
    }

    /// Plain text of the message; array content keeps only text blocks
    fn text(&self) -> String {
        match &self.content {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(blocks)) => blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }

    fn is_synthetic(&self) -> bool {
        self.model
            .as_deref()
            .map(|m| m.to_lowercase().contains("synthetic"))
            .unwrap_or(false)
    }
}

/// Read the conversation turns of a transcript, oldest first.
///
/// Lines that are not valid JSON, are not user/assistant messages, or
/// carry only whitespace are skipped. Only an unreadable file is an error.
pub fn read_turns(path: &Path) -> std::io::Result<Vec<Turn>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_turns(&content))
}

/// Parse conversation turns from transcript content
pub fn parse_turns(content: &str) -> Vec<Turn> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str::<TranscriptLine>(l).ok())
        .filter_map(|line| {
            let message = line.message?;
            let role = message.role()?;
            let text = message.text().trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(Turn { role, text })
        })
        .collect()
}

/// Most recent context usage recorded in a transcript.
///
/// Returns `None` when the file is unreadable or holds no qualifying
/// assistant message.
pub fn latest_usage(path: &Path) -> Option<TokenUsage> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_latest_usage(&content)
}

/// Scan transcript content backwards for the latest real assistant usage
pub fn parse_latest_usage(content: &str) -> Option<TokenUsage> {
    content
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str::<TranscriptLine>(l.trim()).ok())
        .filter(|line| !line.is_sidechain && !line.is_api_error_message)
        .filter_map(|line| line.message)
        .filter(|m| m.role() == Some(Role::Assistant) && !m.is_synthetic())
        .filter_map(|m| m.usage)
        .find(|u| u.total() > 0)
}
