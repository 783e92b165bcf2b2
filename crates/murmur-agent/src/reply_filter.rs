// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suppression of non-answers.
//!
//! The persona must never break character on the air: refusals, canned
//! disclaimers, and contentless fragments are dropped before dispatch.

/// Substrings that mark a reply as a refusal or persona break.
const SUPPRESS_PHRASES: &[&str] = &[
    "i cannot fulfill",
    "i'm unable to",
    "i am unable",
    "as an ai",
    "i'm sorry, but i cannot",
];

/// Contentless one-offs suppressed only as whole replies.
const SUPPRESS_EXACT: &[&str] = &["...", "hmm"];

/// Whether a generated reply should be dropped instead of sent.
///
/// Direct messages tolerate shorter replies than channel traffic.
pub fn is_non_answer(reply: &str, is_direct: bool) -> bool {
    let trimmed = reply.trim();
    let min_len = if is_direct { 3 } else { 5 };
    if trimmed.chars().count() < min_len {
        return true;
    }

    let lower = trimmed.to_lowercase();
    if SUPPRESS_EXACT.iter().any(|p| lower == *p) {
        return true;
    }
    SUPPRESS_PHRASES.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_replies_pass() {
        assert!(!is_non_answer("sure, the net starts at 7pm", false));
        assert!(!is_non_answer("73!", true));
    }

    #[test]
    fn refusals_are_suppressed() {
        assert!(is_non_answer("I cannot fulfill that request.", false));
        assert!(is_non_answer("As an AI, I don't have opinions.", false));
        assert!(is_non_answer("I'm sorry, but I cannot help with that.", true));
    }

    #[test]
    fn short_fragments_are_suppressed() {
        assert!(is_non_answer("ok", false));
        assert!(is_non_answer("", true));
        assert!(is_non_answer("  ", true));
    }

    #[test]
    fn direct_messages_allow_shorter_replies() {
        assert!(is_non_answer("yes!", false), "too short for a channel");
        assert!(!is_non_answer("yes!", true), "fine for a DM");
    }

    #[test]
    fn contentless_exact_matches_are_suppressed() {
        assert!(is_non_answer("...", true));
        assert!(is_non_answer("Hmm", true));
        // But only as whole replies.
        assert!(!is_non_answer("hmm, tricky one... let me think about the antenna", false));
    }
}
