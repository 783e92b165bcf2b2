// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compaction: folds older conversation history into a rolling summary via
//! the AI gateway's summarization call, keeping the context window bounded.

use murmur_core::types::{Role, Turn};
use murmur_core::{AiProvider, GatewayError};
use tracing::info;

/// Very rough token estimate: whitespace-separated word count.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Builds the fold text and asks the provider for a rolling summary.
///
/// Any existing summary is prepended to the fold text so the new summary
/// subsumes it; the summary never resets, it rolls forward.
pub async fn summarize_history(
    provider: &dyn AiProvider,
    previous_summary: Option<&str>,
    to_fold: &[Turn],
    max_chars: usize,
) -> Result<String, GatewayError> {
    let mut lines = Vec::with_capacity(to_fold.len() + 1);
    if let Some(prev) = previous_summary {
        lines.push(format!("Summary of earlier conversation: {prev}"));
    }
    for turn in to_fold {
        match (&turn.role, &turn.name) {
            (Role::User, Some(name)) => lines.push(format!("{name}: {}", turn.text)),
            _ => lines.push(format!("{}: {}", turn.role, turn.text)),
        }
    }
    let fold_text = lines.join("\n");

    let summary = provider.summarize(&fold_text, max_chars).await?;

    info!(
        folded = to_fold.len(),
        summary_chars = summary.len(),
        "history compacted into rolling summary"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_counts_words() {
        assert_eq!(estimate_tokens("one two three"), 3);
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("  padded   out  "), 2);
    }
}
