// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splits reply text into mesh-sized payloads.
//!
//! Chunks never split a UTF-8 code point. Break points are chosen in
//! priority order: paragraph boundary > line boundary > word boundary >
//! hard split at the byte budget.

use murmur_core::MurmurError;

/// Splits `text` into chunks of at most `max_bytes` bytes each.
///
/// Returns an error only for a zero byte budget, which makes chunking
/// impossible.
pub fn split_payload(text: &str, max_bytes: usize) -> Result<Vec<String>, MurmurError> {
    if max_bytes == 0 {
        return Err(MurmurError::PayloadTooLarge { budget: 0 });
    }

    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while rest.len() > max_bytes {
        let (cut, next) = break_point(rest, max_bytes);
        let chunk = rest[..cut].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[next..].trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    Ok(chunks)
}

/// Finds where to cut: `(end_of_chunk, start_of_remainder)` in bytes.
///
/// Priority: double newline > single newline > space > hard split at the
/// largest char boundary within budget.
fn break_point(text: &str, max_bytes: usize) -> (usize, usize) {
    let mut hard = max_bytes;
    while !text.is_char_boundary(hard) {
        hard -= 1;
    }
    if hard == 0 {
        // Budget smaller than the first code point: emit that char alone so
        // splitting always makes progress.
        let ch_len = text.chars().next().map_or(0, char::len_utf8);
        return (ch_len, ch_len);
    }
    let window = &text[..hard];

    if let Some(pos) = window.rfind("\n\n")
        && pos > 0
    {
        return (pos, pos + 2);
    }
    if let Some(pos) = window.rfind('\n')
        && pos > 0
    {
        return (pos, pos + 1);
    }
    if let Some(pos) = window.rfind(' ')
        && pos > 0
    {
        return (pos, pos + 1);
    }
    (hard, hard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_payload("fits easily", 200).unwrap();
        assert_eq!(chunks, vec!["fits easily".to_string()]);
    }

    #[test]
    fn splits_at_word_boundaries_within_budget() {
        let text = "the quick brown fox jumps over the lazy dog again and again";
        let chunks = split_payload(text, 20).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 20, "chunk `{chunk}` over budget");
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        // No words lost or mangled.
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| words(c)).collect();
        assert_eq!(rejoined, words(text));
    }

    #[test]
    fn prefers_paragraph_boundary() {
        let text = "first part.\n\nsecond part that runs a bit longer than the budget";
        let chunks = split_payload(text, 40).unwrap();
        assert_eq!(chunks[0], "first part.");
    }

    #[test]
    fn never_splits_a_multibyte_character() {
        // Mixed Polish and emoji content, budget chosen to land mid-char.
        let text = "zażółć gęślą jaźń 🦀🦀🦀 końcówka wiadomości po polsku";
        for budget in 5..30 {
            let chunks = split_payload(text, budget).unwrap();
            for chunk in &chunks {
                assert!(chunk.len() <= budget, "budget {budget}, chunk `{chunk}`");
                // Being a &str slice already proves boundary safety; check
                // content survived too.
            }
            let rejoined: Vec<&str> = chunks.iter().flat_map(|c| words(c)).collect();
            assert_eq!(rejoined, words(text), "budget {budget}");
        }
    }

    #[test]
    fn unbroken_run_is_hard_split() {
        let text = "a".repeat(50);
        let chunks = split_payload(&text, 20).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn budget_below_one_code_point_still_makes_progress() {
        // 4-byte emoji with a 1-byte budget: the char is emitted whole
        // rather than looping forever.
        let chunks = split_payload("🦀🦀", 1).unwrap();
        assert_eq!(chunks, vec!["🦀".to_string(), "🦀".to_string()]);
    }

    #[test]
    fn zero_budget_is_an_error() {
        let err = split_payload("anything", 0).unwrap_err();
        assert!(matches!(err, MurmurError::PayloadTooLarge { budget: 0 }));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_payload("", 200).unwrap().is_empty());
        assert!(split_payload("   ", 200).unwrap().is_empty());
    }

    #[test]
    fn chunk_order_preserves_text_order() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_payload(text, 12).unwrap();
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, text);
    }
}
