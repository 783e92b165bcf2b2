// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatcher: serializes outbound replies onto the mesh.
//!
//! One FIFO worker per target preserves per-target send order; distinct
//! targets transmit concurrently. Oversized text is chunked, transient send
//! failures are retried with short backoff, and a message that exhausts its
//! retries is dropped (and counted) rather than blocking the queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use murmur_config::model::DispatchConfig;
use murmur_core::types::SendTarget;
use murmur_core::{MeshLink, MurmurError};

use crate::chunking::split_payload;

/// Dispatch knobs, lifted from the `[dispatch]` config section.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_payload_bytes: usize,
    pub max_send_retries: u32,
    pub retry_backoff: Duration,
}

impl DispatchSettings {
    pub fn from_config(cfg: &DispatchConfig) -> Self {
        Self {
            max_payload_bytes: cfg.max_payload_bytes,
            max_send_retries: cfg.max_send_retries,
            retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
        }
    }
}

/// One queued outbound message, already chunked.
struct OutboundJob {
    chunks: Vec<String>,
}

/// Serializes outbound sends through per-target worker queues.
pub struct Dispatcher {
    link: Arc<dyn MeshLink>,
    settings: DispatchSettings,
    workers: Mutex<HashMap<SendTarget, mpsc::Sender<OutboundJob>>>,
    dropped: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        link: Arc<dyn MeshLink>,
        settings: DispatchSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            link,
            settings,
            workers: Mutex::new(HashMap::new()),
            dropped: Arc::new(AtomicU64::new(0)),
            cancel,
        }
    }

    /// Queues `text` for delivery to `target`.
    ///
    /// Returns once the message is queued; delivery is asynchronous.
    /// Chunks of one message stay contiguous and ordered.
    pub async fn enqueue(&self, target: SendTarget, text: &str) -> Result<(), MurmurError> {
        let chunks = split_payload(text, self.settings.max_payload_bytes)?;
        if chunks.is_empty() {
            return Ok(());
        }
        debug!(target = %target, chunks = chunks.len(), "queueing outbound message");

        let tx = self.worker(target).await;
        tx.send(OutboundJob { chunks })
            .await
            .map_err(|_| MurmurError::Internal("dispatch worker stopped".into()))
    }

    /// Messages dropped after exhausting their retries, for status reporting.
    pub fn dropped_sends(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn worker(&self, target: SendTarget) -> mpsc::Sender<OutboundJob> {
        let mut workers = self.workers.lock().await;
        if let Some(tx) = workers.get(&target)
            && !tx.is_closed()
        {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(worker_loop(
            self.link.clone(),
            self.settings.clone(),
            self.dropped.clone(),
            self.cancel.clone(),
            target,
            rx,
        ));
        workers.insert(target, tx.clone());
        tx
    }
}

/// Drains one target's queue, strictly in order.
async fn worker_loop(
    link: Arc<dyn MeshLink>,
    settings: DispatchSettings,
    dropped: Arc<AtomicU64>,
    cancel: CancellationToken,
    target: SendTarget,
    mut rx: mpsc::Receiver<OutboundJob>,
) {
    loop {
        let job = tokio::select! {
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        'job: for chunk in job.chunks {
            let mut attempt: u32 = 0;
            loop {
                attempt += 1;
                match link.send(target, &chunk).await {
                    Ok(()) => break,
                    Err(e) if attempt < settings.max_send_retries => {
                        warn!(
                            target = %target,
                            attempt,
                            error = %e,
                            "send failed, retrying"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(settings.retry_backoff) => {}
                            _ = cancel.cancelled() => return,
                        }
                    }
                    Err(e) => {
                        // Terminal for this message only; later messages to
                        // this and other targets still flow.
                        error!(
                            target = %target,
                            attempts = attempt,
                            error = %e,
                            "dropping message after exhausting send retries"
                        );
                        dropped.fetch_add(1, Ordering::Relaxed);
                        break 'job;
                    }
                }
            }
        }
    }
    debug!(target = %target, "dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use murmur_core::types::{ConnectionStatus, NodeIdentity};
    use murmur_core::NodeId;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::{watch, Notify};

    fn settings(max_payload: usize, retries: u32) -> DispatchSettings {
        DispatchSettings {
            max_payload_bytes: max_payload,
            max_send_retries: retries,
            retry_backoff: Duration::from_millis(100),
        }
    }

    /// Link stub recording sends, with scripted failures and an optional
    /// per-target gate to hold sends open.
    struct FlakyLink {
        sent: StdMutex<Vec<(SendTarget, String)>>,
        fail_first: AtomicU64,
        gate: Option<(SendTarget, Arc<Notify>)>,
        status_tx: watch::Sender<ConnectionStatus>,
    }

    impl FlakyLink {
        fn new() -> Self {
            let (status_tx, _) = watch::channel(ConnectionStatus::default());
            Self {
                sent: StdMutex::new(Vec::new()),
                fail_first: AtomicU64::new(0),
                gate: None,
                status_tx,
            }
        }

        fn failing_first(n: u64) -> Self {
            let link = Self::new();
            link.fail_first.store(n, Ordering::SeqCst);
            link
        }

        fn gated(target: SendTarget) -> (Self, Arc<Notify>) {
            let mut link = Self::new();
            let notify = Arc::new(Notify::new());
            link.gate = Some((target, notify.clone()));
            (link, notify)
        }

        fn sent(&self) -> Vec<(SendTarget, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MeshLink for FlakyLink {
        async fn send(&self, target: SendTarget, text: &str) -> Result<(), MurmurError> {
            if let Some((gated, notify)) = &self.gate
                && *gated == target
            {
                notify.notified().await;
            }
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(MurmurError::transport("radio buffer full"));
            }
            self.sent.lock().unwrap().push((target, text.to_string()));
            Ok(())
        }

        fn status(&self) -> ConnectionStatus {
            self.status_tx.borrow().clone()
        }

        fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
            self.status_tx.subscribe()
        }

        fn identity(&self) -> Option<NodeIdentity> {
            None
        }

        async fn stop(&self) {}
    }

    const CH: SendTarget = SendTarget::Channel(0);

    async fn drain(dispatcher: &Dispatcher, link: &FlakyLink, expect: usize) {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                if link.sent().len() >= expect {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {expect} sends, saw {} (dropped {})",
                link.sent().len(),
                dispatcher.dropped_sends()
            )
        });
    }

    #[tokio::test(start_paused = true)]
    async fn per_target_order_is_preserved() {
        let link = Arc::new(FlakyLink::new());
        let dispatcher =
            Dispatcher::new(link.clone(), settings(200, 5), CancellationToken::new());

        dispatcher.enqueue(CH, "1").await.unwrap();
        dispatcher.enqueue(CH, "2").await.unwrap();
        dispatcher.enqueue(CH, "3").await.unwrap();

        drain(&dispatcher, &link, 3).await;
        let texts: Vec<String> = link.sent().into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn long_text_is_chunked_in_order() {
        let link = Arc::new(FlakyLink::new());
        let dispatcher =
            Dispatcher::new(link.clone(), settings(16, 5), CancellationToken::new());

        dispatcher
            .enqueue(CH, "alpha beta gamma delta epsilon")
            .await
            .unwrap();

        drain(&dispatcher, &link, 2).await;
        let sent = link.sent();
        assert!(sent.len() >= 2);
        for (_, chunk) in &sent {
            assert!(chunk.len() <= 16);
        }
        let rejoined: Vec<String> = sent
            .iter()
            .flat_map(|(_, t)| t.split_whitespace().map(String::from))
            .collect();
        assert_eq!(
            rejoined,
            vec!["alpha", "beta", "gamma", "delta", "epsilon"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_without_duplicates() {
        // Fails 3 times, succeeds on the 4th attempt, under a retry cap of 5.
        let link = Arc::new(FlakyLink::failing_first(3));
        let dispatcher =
            Dispatcher::new(link.clone(), settings(200, 5), CancellationToken::new());

        dispatcher.enqueue(CH, "persistent little message").await.unwrap();

        drain(&dispatcher, &link, 1).await;
        assert_eq!(link.sent().len(), 1, "no duplicate delivery");
        assert_eq!(dispatcher.dropped_sends(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_drop_message_but_not_the_queue() {
        // 10 failures exceed the cap of 3, killing the first message; the
        // second message then goes through.
        let link = Arc::new(FlakyLink::failing_first(10));
        let dispatcher =
            Dispatcher::new(link.clone(), settings(200, 3), CancellationToken::new());

        dispatcher.enqueue(CH, "doomed").await.unwrap();
        dispatcher.enqueue(CH, "survivor").await.unwrap();

        drain(&dispatcher, &link, 1).await;
        let texts: Vec<String> = link.sent().into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["survivor"]);
        assert_eq!(dispatcher.dropped_sends(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn targets_do_not_block_each_other() {
        let (link, gate) = FlakyLink::gated(SendTarget::Node(NodeId(0xaa)));
        let link = Arc::new(link);
        let dispatcher =
            Dispatcher::new(link.clone(), settings(200, 5), CancellationToken::new());

        // The node send parks on the gate; the channel send must not wait.
        dispatcher
            .enqueue(SendTarget::Node(NodeId(0xaa)), "held")
            .await
            .unwrap();
        dispatcher.enqueue(CH, "flows").await.unwrap();

        drain(&dispatcher, &link, 1).await;
        assert_eq!(link.sent()[0].1, "flows");

        gate.notify_one();
        drain(&dispatcher, &link, 2).await;
        assert_eq!(link.sent()[1].1, "held");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_payload_budget_surfaces_at_enqueue() {
        let link = Arc::new(FlakyLink::new());
        let dispatcher = Dispatcher::new(link, settings(0, 5), CancellationToken::new());

        let err = dispatcher.enqueue(CH, "anything").await.unwrap_err();
        assert!(matches!(err, MurmurError::PayloadTooLarge { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_workers() {
        let cancel = CancellationToken::new();
        let link = Arc::new(FlakyLink::failing_first(u64::MAX));
        let dispatcher = Dispatcher::new(link.clone(), settings(200, 1000), cancel.clone());

        dispatcher.enqueue(CH, "never delivered").await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        // Worker is gone; nothing was delivered and nothing hangs.
        assert!(link.sent().is_empty());
    }
}
