//! Token estimation for context budgets.
//!
//! Character-based heuristic: ~3.2 chars/token for English prose. Overestimating
//! keeps the context block inside the model's window.

use crate::inference::types::ChatMessage;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Average characters per token for English prose.
const CHARS_PER_TOKEN: f64 = 3.2;

/// Per-message overhead (role label, formatting tokens).
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

// ─── UTF-8 Safe Truncation ──────────────────────────────────────────────────

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    // Walk backward to find a valid char boundary
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Keep at most `max_chars` characters.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// Estimate the token count for a string of natural language text.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.len() as f64;
    (chars / CHARS_PER_TOKEN).ceil() as u32
}

/// Largest byte length whose estimate stays within `tokens`.
pub fn max_bytes_for_tokens(tokens: u32) -> usize {
    (tokens as f64 * CHARS_PER_TOKEN).floor() as usize
}

/// Estimate the token count of a message sequence.
pub fn estimate_messages_tokens(messages: &[ChatMessage]) -> u32 {
    messages
        .iter()
        .map(|m| MESSAGE_OVERHEAD_TOKENS + estimate_tokens(m.text_content()))
        .sum()
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        // 10 chars / 3.2 = 3.125 → 4
        assert_eq!(estimate_tokens("abcdefghij"), 4);
    }

    #[test]
    fn test_max_bytes_roundtrip_within_budget() {
        for tokens in [0, 1, 7, 100, 3000] {
            let text = "x".repeat(max_bytes_for_tokens(tokens));
            assert!(estimate_tokens(&text) <= tokens, "budget {tokens}");
        }
    }

    #[test]
    fn test_truncate_utf8_ascii() {
        assert_eq!(truncate_utf8("hello world", 5), "hello");
        assert_eq!(truncate_utf8("short", 100), "short");
    }

    #[test]
    fn test_truncate_utf8_multibyte_boundary() {
        // "ü" is 2 bytes; cutting at byte 6 lands inside it.
        let s = "Ana Mü";
        assert_eq!(truncate_utf8(s, 6), "Ana M");
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("Müller", 2), "Mü");
        assert_eq!(truncate_chars("Müller", 6), "Müller");
        assert_eq!(truncate_chars("Müller", 0), "");
    }

    #[test]
    fn test_estimate_messages_tokens() {
        let msgs = vec![ChatMessage::user("abcdefghij"), ChatMessage::assistant("")];
        assert_eq!(estimate_messages_tokens(&msgs), 4 + 4 + 4);
    }
}
