// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The control surface: the engine-owned state any front end (CLI, console,
//! remote shell) talks to. No ambient globals -- everything goes through
//! [`EngineHandle`] commands answered by the engine loop.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use murmur_core::types::{ConnectionStatus, ContextKey, NodeIdentity};
use murmur_core::MurmurError;

/// Commands a front end can issue to the running engine.
#[derive(Debug)]
pub enum EngineCommand {
    /// Force a persona response in `key`'s conversation, bypassing triage,
    /// probability, and cooldown. Still obeys reply supersession.
    ForceResponse {
        key: ContextKey,
        done: oneshot::Sender<()>,
    },
    /// Switch the channel the persona replies on for broadcast traffic.
    SetActiveChannel { idx: u8 },
    /// Replace the persona prompt.
    SetPersona { persona: String },
    /// Switch the active AI provider by name.
    SetProvider {
        name: String,
        done: oneshot::Sender<Result<(), MurmurError>>,
    },
    /// Snapshot the engine status.
    GetStatus {
        done: oneshot::Sender<EngineStatus>,
    },
}

/// Status snapshot returned by [`EngineHandle::status`].
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub connection: ConnectionStatus,
    pub identity: Option<NodeIdentity>,
    pub active_channel: u8,
    pub provider: String,
    pub persona_preview: String,
    /// Sticky: raised when any gateway call reports rejected credentials.
    pub credential_warning: bool,
    /// Outbound messages dropped after exhausting send retries.
    pub dropped_sends: u64,
    pub pending_replies: usize,
    pub cooldowns: Vec<(ContextKey, Duration)>,
}

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub(crate) fn new(tx: mpsc::Sender<EngineCommand>) -> Self {
        Self { tx }
    }

    /// Forces a persona response in the given conversation.
    pub async fn force_response(&self, key: ContextKey) -> Result<(), MurmurError> {
        let (done, rx) = oneshot::channel();
        self.send(EngineCommand::ForceResponse { key, done }).await?;
        rx.await
            .map_err(|_| MurmurError::Internal("engine stopped".into()))
    }

    pub async fn set_active_channel(&self, idx: u8) -> Result<(), MurmurError> {
        self.send(EngineCommand::SetActiveChannel { idx }).await
    }

    pub async fn set_persona(&self, persona: String) -> Result<(), MurmurError> {
        self.send(EngineCommand::SetPersona { persona }).await
    }

    pub async fn set_provider(&self, name: &str) -> Result<(), MurmurError> {
        let (done, rx) = oneshot::channel();
        self.send(EngineCommand::SetProvider {
            name: name.to_string(),
            done,
        })
        .await?;
        rx.await
            .map_err(|_| MurmurError::Internal("engine stopped".into()))?
    }

    /// Snapshots connection state and per-conversation cooldowns.
    pub async fn status(&self) -> Result<EngineStatus, MurmurError> {
        let (done, rx) = oneshot::channel();
        self.send(EngineCommand::GetStatus { done }).await?;
        rx.await
            .map_err(|_| MurmurError::Internal("engine stopped".into()))
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), MurmurError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| MurmurError::Internal("engine stopped".into()))
    }
}
