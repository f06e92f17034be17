//! Token counting against the reference `cl100k_base` encoding.
//!
//! The chunker and the generation-context budget both need an exact,
//! shared notion of "token" rather than the teacher's char/4 heuristic —
//! this module is the single place that owns a `tiktoken_rs` encoder.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

use crate::error::{ChunkingError, Result};

static ENCODER: OnceLock<CoreBPE> = OnceLock::new();

fn encoder() -> &'static CoreBPE {
    // `cl100k_base()` only fails if the bundled, compile-time-embedded rank
    // tables fail to parse; that is a `tiktoken-rs` packaging defect, not a
    // runtime condition this crate can recover from.
    #[allow(clippy::expect_used)]
    ENCODER.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base encoder tables are bundled with tiktoken-rs"))
}

/// Number of `cl100k_base` tokens in `text`.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    encoder().encode_with_special_tokens(text).len()
}

/// Truncates `text` to at most `max_tokens` tokens, decoding back to a
/// `String`. Used when a paragraph's tail overlap still exceeds the
/// configured overlap budget after paragraph-level trimming.
///
/// # Errors
///
/// Returns [`ChunkingError::TokenizerFailed`] if the truncated token slice
/// does not decode back to valid UTF-8 (can happen if truncation lands
/// mid-multi-token-character; callers should treat this as "keep the
/// untruncated text" rather than a hard failure).
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> Result<String> {
    let enc = encoder();
    let tokens = enc.encode_with_special_tokens(text);
    if tokens.len() <= max_tokens {
        return Ok(text.to_string());
    }
    let tail = &tokens[tokens.len() - max_tokens..];
    enc.decode(tail.to_vec())
        .map_err(|e| ChunkingError::TokenizerFailed(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens_nonempty_text() {
        assert!(count_tokens("hello world") > 0);
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_count_tokens_scales_with_length() {
        let short = count_tokens("hello");
        let long = count_tokens("hello ".repeat(50).as_str());
        assert!(long > short);
    }

    #[test]
    fn test_truncate_to_tokens_keeps_short_text_whole() {
        let text = "short text";
        let truncated = truncate_to_tokens(text, 1000).unwrap();
        assert_eq!(truncated, text);
    }

    #[test]
    fn test_truncate_to_tokens_respects_budget() {
        let text = "one two three four five six seven eight nine ten".repeat(5);
        let truncated = truncate_to_tokens(&text, 5).unwrap();
        assert!(count_tokens(&truncated) <= 5);
    }
}
