// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-reply scheduling with supersession.
//!
//! Every approved reply becomes a cancellation-token-bearing timer task.
//! Invariant: at most one pending reply exists per conversation at any
//! instant -- a new approval supersedes (cancels) any prior pending one, so
//! the engine always honors the most recent trigger and never stacks
//! replies.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use murmur_core::types::ContextKey;

struct PendingEntry {
    generation: u64,
    cancel: CancellationToken,
    scheduled_at: Instant,
}

/// Registry of pending replies, one slot per conversation.
pub struct ReplyScheduler {
    pending: Mutex<HashMap<ContextKey, PendingEntry>>,
    next_generation: AtomicU64,
    root_cancel: CancellationToken,
}

impl ReplyScheduler {
    /// Creates a scheduler whose timers are all children of `root_cancel`;
    /// cancelling the root cancels every outstanding reply.
    pub fn new(root_cancel: CancellationToken) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            root_cancel,
        }
    }

    /// Schedules `job` to run after `delay`, superseding any reply already
    /// pending for `key`.
    ///
    /// The job receives its cancellation token and must re-check it at its
    /// own suspension points (before generation, before send).
    pub async fn schedule<F, Fut>(self: &Arc<Self>, key: ContextKey, delay: Duration, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.root_cancel.child_token();

        let superseded = self.pending.lock().await.insert(
            key,
            PendingEntry {
                generation,
                cancel: token.clone(),
                scheduled_at: Instant::now() + delay,
            },
        );
        if let Some(old) = superseded {
            debug!(key = %key, "superseding pending reply");
            old.cancel.cancel();
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        job(token.clone()).await;
                    }
                }
            }

            // Release the slot, unless a newer approval already took it.
            let mut pending = scheduler.pending.lock().await;
            if pending
                .get(&key)
                .is_some_and(|entry| entry.generation == generation)
            {
                pending.remove(&key);
            }
        });
    }

    /// Cancels the pending reply for `key`, if any. Returns whether one was
    /// cancelled.
    pub async fn cancel(&self, key: ContextKey) -> bool {
        match self.pending.lock().await.remove(&key) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every pending reply (engine shutdown).
    pub async fn cancel_all(&self) {
        let mut pending = self.pending.lock().await;
        for (_, entry) in pending.drain() {
            entry.cancel.cancel();
        }
    }

    /// Whether a reply is pending for `key`.
    pub async fn is_pending(&self, key: ContextKey) -> bool {
        self.pending.lock().await.contains_key(&key)
    }

    /// Number of pending replies across all conversations.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// When the pending reply for `key` will fire, if any.
    pub async fn scheduled_at(&self, key: ContextKey) -> Option<Instant> {
        self.pending.lock().await.get(&key).map(|e| e.scheduled_at)
    }
}
