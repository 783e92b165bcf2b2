// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI provider adapter trait.
//!
//! Providers expose exactly three capabilities: reply generation, triage
//! classification, and summarization. Provider choice is a runtime
//! parameter -- the engine selects an adapter by name from its registry.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::{ContextWindow, MeshMessage, TriageVerdict};

/// Adapter for a conversational AI backend.
///
/// All calls are time-bounded by the adapter and must be cancel-safe: a
/// caller dropping the future mid-flight leaves no side effects behind.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Short provider name used for registry lookup and logging.
    fn name(&self) -> &str;

    /// Generates a persona reply to `message` given the conversation window.
    async fn generate_reply(
        &self,
        persona: &str,
        context: &ContextWindow,
        message: &MeshMessage,
    ) -> Result<String, GatewayError>;

    /// Asks the lightweight triage classifier whether the persona should
    /// engage with `newest`, given the recent channel history.
    async fn classify_triage(
        &self,
        persona: &str,
        recent: &[String],
        newest: &MeshMessage,
    ) -> Result<TriageVerdict, GatewayError>;

    /// Summarizes `text` into at most roughly `max_chars` characters.
    /// Used for context compaction; failures are non-fatal to the caller.
    async fn summarize(&self, text: &str, max_chars: usize) -> Result<String, GatewayError>;
}
