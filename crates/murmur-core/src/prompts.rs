// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt templates shared by every AI provider adapter.
//!
//! Keeping these here means both providers speak to their models with the
//! same persona framing, triage contract, and summarization instructions.

use crate::types::NodeId;

/// How much of the persona the triage classifier sees.
const TRIAGE_PERSONA_BUDGET: usize = 250;

/// System prompt for the lightweight triage classifier.
pub fn triage_system_prompt(persona: &str) -> String {
    let persona_summary = truncate_chars(persona, TRIAGE_PERSONA_BUDGET);
    format!(
        "You are a triage system for a main AI assistant. Decide if the main \
         AI (persona: '{persona_summary}') should respond to NEWEST_MESSAGE \
         based on it and RECENT_CHANNEL_HISTORY. Respond 'YES' if it's a \
         question, engagement attempt, or relevant topic. Respond 'NO' for \
         casual chatter not involving the assistant, simple acknowledgments, \
         etc. Output ONLY 'YES' or 'NO'."
    )
}

/// User-side query for the triage classifier.
pub fn triage_query(recent: &[String], sender_name: &str, text: &str) -> String {
    format!(
        "RECENT_CHANNEL_HISTORY:\n{}\n\nNEWEST_MESSAGE from '{sender_name}':\n{text}\n\n\
         Considering the main AI's persona and the instructions, should the \
         main AI generate a response to the NEWEST_MESSAGE? (Answer ONLY 'YES' or 'NO')",
        recent.join("\n")
    )
}

/// System prompt for the summarization call.
pub fn summarizer_persona(max_chars: usize) -> String {
    format!(
        "You are an expert at summarizing conversations or text very \
         concisely into a single paragraph, under {max_chars} characters, \
         retaining key facts and context."
    )
}

/// Attribution line prefixed to the newest user message so the persona knows
/// who is speaking on a shared channel.
pub fn user_attribution(sender_name: &str, node: NodeId) -> String {
    if sender_name.is_empty() || sender_name.starts_with("Node-") {
        format!("User (NodeID: {node})")
    } else {
        format!("User '{sender_name}' (NodeID: {node})")
    }
}

/// System line injecting the rolling summary ahead of recent turns.
pub fn summary_system_line(summary: &str) -> String {
    format!("Summary of earlier parts of this conversation: {summary}")
}

/// Truncates to a character budget, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
