// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock mesh link for deterministic testing.
//!
//! `MockLink` implements [`MeshLink`] with captured outbound sends and
//! scriptable failures; inbound messages are injected through the paired
//! mpsc sender returned by [`MockLink::with_inbound`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use murmur_core::types::{
    ConnectionState, ConnectionStatus, MeshMessage, NodeId, NodeIdentity, SendTarget,
};
use murmur_core::{MeshLink, MurmurError};

/// A mock mesh link capturing everything the bridge transmits.
pub struct MockLink {
    sent: Mutex<Vec<(SendTarget, String)>>,
    fail_next: AtomicU64,
    status_tx: watch::Sender<ConnectionStatus>,
    identity: NodeIdentity,
}

impl MockLink {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus {
            state: ConnectionState::Connected,
            retry_count: 0,
            last_error: None,
        });
        Self {
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicU64::new(0),
            status_tx,
            identity: NodeIdentity {
                node_id: NodeId(0xaa),
                node_name: "mock-node".into(),
                channels: vec![],
            },
        }
    }

    /// Creates a link plus the inbound injection channel the engine reads.
    pub fn with_inbound() -> (Arc<Self>, mpsc::Sender<MeshMessage>, mpsc::Receiver<MeshMessage>) {
        let (tx, rx) = mpsc::channel(64);
        (Arc::new(Self::new()), tx, rx)
    }

    /// Makes the next `n` sends fail with a transport error.
    pub fn fail_next_sends(&self, n: u64) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<(SendTarget, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Waits until at least `n` sends have been captured.
    ///
    /// Polls rather than parking on a notifier so virtual-time tests
    /// auto-advance through it.
    pub async fn wait_for_sends(&self, n: usize) -> Vec<(SendTarget, String)> {
        tokio::time::timeout(std::time::Duration::from_secs(60), async {
            loop {
                if self.sent_count() >= n {
                    return self.sent();
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!("expected {n} sends, saw {}", self.sent_count())
        })
    }

    /// Publishes a connection status change.
    pub fn set_status(&self, state: ConnectionState, retry_count: u32) {
        self.status_tx.send_replace(ConnectionStatus {
            state,
            retry_count,
            last_error: None,
        });
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeshLink for MockLink {
    async fn send(&self, target: SendTarget, text: &str) -> Result<(), MurmurError> {
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(MurmurError::transport("mock send failure"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((target, text.to_string()));
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn identity(&self) -> Option<NodeIdentity> {
        Some(self.identity.clone())
    }

    async fn stop(&self) {
        self.set_status(ConnectionState::Disconnected, 0);
    }
}
