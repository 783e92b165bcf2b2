// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI provider for deterministic testing.
//!
//! Replies pop from a FIFO queue (default: a canned line). Triage verdicts
//! and failures are scriptable; call counters let tests assert that
//! cancelled jobs never reached the gateway.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use murmur_core::types::{ContextWindow, MeshMessage, TriageVerdict};
use murmur_core::{AiProvider, GatewayError};

/// A mock provider with scripted responses.
pub struct MockProvider {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    verdicts: Mutex<VecDeque<Result<TriageVerdict, GatewayError>>>,
    generation_delay: Mutex<Duration>,
    generate_calls: AtomicUsize,
    triage_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            verdicts: Mutex::new(VecDeque::new()),
            generation_delay: Mutex::new(Duration::ZERO),
            generate_calls: AtomicUsize::new(0),
            triage_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_replies(replies: Vec<&str>) -> Self {
        let provider = Self::new();
        for reply in replies {
            provider.push_reply(reply);
        }
        provider
    }

    pub fn push_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_reply_error(&self, err: GatewayError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn push_verdict(&self, verdict: Result<TriageVerdict, GatewayError>) {
        self.verdicts.lock().unwrap().push_back(verdict);
    }

    /// Makes every generation call take this long (virtual time friendly).
    pub fn set_generation_delay(&self, delay: Duration) {
        *self.generation_delay.lock().unwrap() = delay;
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn triage_calls(&self) -> usize {
        self.triage_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_reply(
        &self,
        _persona: &str,
        _context: &ContextWindow,
        message: &MeshMessage,
    ) -> Result<String, GatewayError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.generation_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(format!("mock reply to: {}", message.text)))
    }

    async fn classify_triage(
        &self,
        _persona: &str,
        _recent: &[String],
        _newest: &MeshMessage,
    ) -> Result<TriageVerdict, GatewayError> {
        self.triage_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.verdicts.lock().unwrap().pop_front();
        next.unwrap_or(Ok(TriageVerdict::Yes))
    }

    async fn summarize(&self, text: &str, max_chars: usize) -> Result<String, GatewayError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        let _ = max_chars;
        Ok(format!("summary of {} words", text.split_whitespace().count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::types::ContextKey;
    use murmur_core::NodeId;
    use tokio::time::Instant;

    fn message(text: &str) -> MeshMessage {
        MeshMessage {
            id: "m".into(),
            key: ContextKey::Channel(0),
            sender: NodeId(1),
            sender_name: "a".into(),
            text: text.into(),
            received_at: Instant::now(),
            is_direct: false,
            rssi: None,
            snr: None,
        }
    }

    #[tokio::test]
    async fn scripted_replies_pop_in_order_then_default() {
        let provider = MockProvider::with_replies(vec!["first", "second"]);
        let window = ContextWindow::default();
        assert_eq!(
            provider
                .generate_reply("p", &window, &message("a"))
                .await
                .unwrap(),
            "first"
        );
        assert_eq!(
            provider
                .generate_reply("p", &window, &message("b"))
                .await
                .unwrap(),
            "second"
        );
        assert_eq!(
            provider
                .generate_reply("p", &window, &message("c"))
                .await
                .unwrap(),
            "mock reply to: c"
        );
        assert_eq!(provider.generate_calls(), 3);
    }

    #[tokio::test]
    async fn verdicts_default_to_yes() {
        let provider = MockProvider::new();
        let verdict = provider
            .classify_triage("p", &[], &message("q"))
            .await
            .unwrap();
        assert_eq!(verdict, TriageVerdict::Yes);

        provider.push_verdict(Ok(TriageVerdict::No));
        let verdict = provider
            .classify_triage("p", &[], &message("q"))
            .await
            .unwrap();
        assert_eq!(verdict, TriageVerdict::No);
    }
}
