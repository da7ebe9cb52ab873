//! Prompt sent to the topic extractor.

use crate::transcript::Turn;

/// Render turns as role-tagged excerpts, oldest first, each capped to
/// `max_chars` characters.
pub fn format_turns(turns: &[Turn], max_chars: usize) -> String {
    turns
        .iter()
        .map(|t| format!("[{}] {}", t.role.tag(), truncate(&t.text, max_chars)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// Build the segmentation request for a conversation at `pct` usage
pub fn build_prompt(turns: &[Turn], pct: f64, max_chars: usize) -> String {
    let free = (100.0 - pct.round()).clamp(0.0, 100.0) as u32;
    format!(
        r#"Split the conversation below into 3-6 distinct topic segments, in the order they were discussed. Keep separate subjects separate.

Reply with ONE line and nothing else, in exactly this format:
topic1 XX%|topic2 XX%|topic3 XX%|...|free XX%

Requirements:
- Between 3 and 6 segments; prefer detail but do not over-split
- Topic names are 1-4 specific words (e.g. "statusline daemon", not "code")
- Percentages add up to 100 and reflect how much of the conversation each topic took
- The last segment is "free": the unused context, about {free}%
- First topic discussed comes first

Conversation:
{conversation}"#,
        free = free,
        conversation = format_turns(turns, max_chars),
    )
}
