// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The context store: per-conversation bounded history, rolling summary,
//! and reply cooldowns.
//!
//! Conversations are created lazily on first message and live for the
//! process lifetime. Mutations for one conversation are serialized behind a
//! per-conversation lock; distinct conversations proceed in parallel.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use murmur_config::model::ContextConfig;
use murmur_core::types::{ContextKey, ContextWindow, MeshMessage, Role, Turn};
use murmur_core::AiProvider;

use crate::compaction::{estimate_tokens, summarize_history};

/// Tuning knobs for the store, lifted from `[context]` plus the reply cooldown.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub max_history_messages: usize,
    pub summarize_threshold_tokens: usize,
    pub recent_to_keep: usize,
    pub summary_max_chars: usize,
    pub cooldown: Duration,
}

impl ContextSettings {
    pub fn from_config(cfg: &ContextConfig, cooldown: Duration) -> Self {
        Self {
            max_history_messages: cfg.max_history_messages,
            summarize_threshold_tokens: cfg.summarize_threshold_tokens,
            recent_to_keep: cfg.recent_to_keep,
            summary_max_chars: cfg.summary_max_chars,
            cooldown,
        }
    }
}

/// State of one conversation.
#[derive(Debug, Default)]
struct Conversation {
    turns: VecDeque<Turn>,
    summary: Option<String>,
    last_reply_at: Option<Instant>,
}

/// Per-conversation bounded message history with summarization.
pub struct ContextStore {
    settings: ContextSettings,
    conversations: Mutex<HashMap<ContextKey, Arc<Mutex<Conversation>>>>,
}

impl ContextStore {
    pub fn new(settings: ContextSettings) -> Self {
        Self {
            settings,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    async fn conversation(&self, key: ContextKey) -> Arc<Mutex<Conversation>> {
        self.conversations
            .lock()
            .await
            .entry(key)
            .or_default()
            .clone()
    }

    /// Appends an inbound message to its conversation, enforcing the hard
    /// history bound.
    pub async fn record_inbound(&self, msg: &MeshMessage) {
        let conv = self.conversation(msg.key).await;
        let mut conv = conv.lock().await;
        conv.turns.push_back(Turn {
            role: Role::User,
            name: Some(msg.sender_name.clone()),
            text: msg.text.clone(),
        });
        Self::enforce_bound(&mut conv, self.settings.max_history_messages);
    }

    /// Appends a dispatched persona reply to the conversation.
    pub async fn record_reply(&self, key: ContextKey, text: &str) {
        let conv = self.conversation(key).await;
        let mut conv = conv.lock().await;
        conv.turns.push_back(Turn {
            role: Role::Assistant,
            name: None,
            text: text.to_string(),
        });
        Self::enforce_bound(&mut conv, self.settings.max_history_messages);
    }

    fn enforce_bound(conv: &mut Conversation, max: usize) {
        while conv.turns.len() > max {
            conv.turns.pop_front();
        }
    }

    /// Returns the rolling summary plus recent turns, oldest first.
    pub async fn get_window(&self, key: ContextKey) -> ContextWindow {
        let conv = self.conversation(key).await;
        let conv = conv.lock().await;
        ContextWindow {
            summary: conv.summary.clone(),
            turns: conv.turns.iter().cloned().collect(),
        }
    }

    /// Last `n` user turns formatted as `name: text` lines, for triage
    /// context. The newest message is excluded by the caller passing it
    /// separately.
    pub async fn recent_user_lines(&self, key: ContextKey, n: usize) -> Vec<String> {
        let conv = self.conversation(key).await;
        let conv = conv.lock().await;
        conv.turns
            .iter()
            .filter(|t| t.role == Role::User)
            .rev()
            .take(n)
            .map(|t| {
                let name = t.name.as_deref().unwrap_or("unknown");
                format!("{name}: {}", t.text)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    /// Records a reply timestamp for cooldown accounting. Compaction never
    /// clears this.
    pub async fn mark_responded(&self, key: ContextKey, at: Instant) {
        let conv = self.conversation(key).await;
        conv.lock().await.last_reply_at = Some(at);
    }

    /// `max(0, cooldown - (now - last_reply_at))`.
    pub async fn cooldown_remaining(&self, key: ContextKey) -> Duration {
        if self.settings.cooldown.is_zero() {
            return Duration::ZERO;
        }
        let conv = self.conversation(key).await;
        let conv = conv.lock().await;
        match conv.last_reply_at {
            Some(at) => self.settings.cooldown.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Cooldown snapshot across all conversations, for the status surface.
    pub async fn cooldowns(&self) -> Vec<(ContextKey, Duration)> {
        let keys: Vec<ContextKey> = self.conversations.lock().await.keys().copied().collect();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push((key, self.cooldown_remaining(key).await));
        }
        out
    }

    /// Folds older history into the rolling summary when the estimated token
    /// size exceeds the configured threshold.
    ///
    /// Summarization is best-effort: on failure the turns are left intact
    /// (the hard count bound still applies) and the summary is unchanged.
    /// Returns true when a fold happened.
    pub async fn compact_if_needed(&self, key: ContextKey, provider: &dyn AiProvider) -> bool {
        let conv = self.conversation(key).await;
        let mut conv = conv.lock().await;

        let total_tokens: usize = conv.turns.iter().map(|t| estimate_tokens(&t.text)).sum();
        if total_tokens <= self.settings.summarize_threshold_tokens
            || conv.turns.len() <= self.settings.recent_to_keep + 2
        {
            return false;
        }

        let fold_count = conv.turns.len() - self.settings.recent_to_keep;
        let to_fold: Vec<Turn> = conv.turns.iter().take(fold_count).cloned().collect();

        debug!(
            key = %key,
            folding = fold_count,
            total_tokens,
            "context over threshold, summarizing older history"
        );

        match summarize_history(
            provider,
            conv.summary.as_deref(),
            &to_fold,
            self.settings.summary_max_chars,
        )
        .await
        {
            Ok(summary) => {
                conv.turns.drain(..fold_count);
                conv.summary = Some(summary);
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "summarization failed, keeping raw history");
                Self::enforce_bound(&mut conv, self.settings.max_history_messages);
                false
            }
        }
    }
}
