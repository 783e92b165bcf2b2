// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine-facing mesh link interface.
//!
//! Implemented by the connection supervisor over real TCP/serial transports
//! and by `MockLink` in tests. Inbound messages are delivered separately,
//! through the `mpsc::Receiver<MeshMessage>` handed out when the link is
//! started; this trait covers only the outbound and observability surface.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::MurmurError;
use crate::types::{ConnectionStatus, NodeIdentity, SendTarget};

/// Outbound and status surface of a mesh connection.
#[async_trait]
pub trait MeshLink: Send + Sync {
    /// Transmits one text payload. The payload must already fit the mesh
    /// frame budget; chunking is the dispatcher's job. Errors are
    /// transport-level and retryable.
    async fn send(&self, target: SendTarget, text: &str) -> Result<(), MurmurError>;

    /// Current connection status snapshot.
    fn status(&self) -> ConnectionStatus;

    /// Subscribes to connection status transitions.
    fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus>;

    /// Local node identity, once the handshake has completed.
    fn identity(&self) -> Option<NodeIdentity>;

    /// Stops the connection and all supervision. Idempotent.
    async fn stop(&self);
}
