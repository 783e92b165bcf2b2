// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared between the mesh transport, the orchestration engine,
//! and the AI gateway adapters.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::Instant;

/// Numeric identifier of a node on the mesh, as assigned by the radio.
///
/// Displayed in lowercase hex, matching the convention used on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Identifies a conversation: either a broadcast channel or a direct-message
/// peer. All context, cooldown, and journal state is keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKey {
    /// A mesh broadcast channel, by channel index.
    Channel(u8),
    /// A direct-message conversation with the given peer.
    Direct(NodeId),
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextKey::Channel(idx) => write!(f, "channel-{idx}"),
            ContextKey::Direct(node) => write!(f, "dm-{node}"),
        }
    }
}

/// Destination of an outbound send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendTarget {
    /// Broadcast on a channel.
    Channel(u8),
    /// Direct message to a node.
    Node(NodeId),
}

impl std::fmt::Display for SendTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendTarget::Channel(idx) => write!(f, "channel-{idx}"),
            SendTarget::Node(node) => write!(f, "node-{node}"),
        }
    }
}

impl From<ContextKey> for SendTarget {
    fn from(key: ContextKey) -> Self {
        match key {
            ContextKey::Channel(idx) => SendTarget::Channel(idx),
            ContextKey::Direct(node) => SendTarget::Node(node),
        }
    }
}

/// An inbound mesh text message, normalized by the connection supervisor.
///
/// Immutable once constructed; retained only inside the context store until
/// eviction or compaction.
#[derive(Debug, Clone)]
pub struct MeshMessage {
    /// Transport-assigned packet id, or a locally generated one.
    pub id: String,
    /// Conversation this message belongs to.
    pub key: ContextKey,
    /// Sending node.
    pub sender: NodeId,
    /// Display name resolved by the radio, or a `Node-<hex>` fallback.
    pub sender_name: String,
    /// Message body.
    pub text: String,
    /// Monotonic receive timestamp.
    pub received_at: Instant,
    /// True when addressed to the bridge's own node rather than broadcast.
    pub is_direct: bool,
    /// Received signal strength, when the radio reports it.
    pub rssi: Option<i32>,
    /// Signal-to-noise ratio, when the radio reports it.
    pub snr: Option<f32>,
}

/// Connection lifecycle states owned by the supervisor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Degraded,
    Reconnecting,
}

/// Snapshot of the supervisor's connection status, published on a watch
/// channel on every transition.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Identity of the local node as reported by the transport handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_id: NodeId,
    pub node_name: String,
    pub channels: Vec<ChannelInfo>,
}

/// One entry of the radio's channel table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub index: u8,
    pub name: String,
    pub role: String,
}

/// Outcome of the triage policy for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Do not reply.
    Skip(SkipReason),
    /// Reply after the given delay.
    RespondAfter(Duration),
}

/// Why the triage policy declined to reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The per-conversation cooldown has not elapsed.
    Cooldown,
    /// The probability gate came up tails.
    Probability,
    /// The triage classifier said no.
    TriageNo,
    /// The triage classifier failed; fail closed.
    TriageError,
    /// Broadcast on a channel the bridge is not active on.
    InactiveChannel,
    /// Echo of the bridge's own transmission.
    OwnMessage,
}

/// Verdict of the lightweight triage classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageVerdict {
    Yes,
    No,
}

/// Role of a conversation turn, as presented to the AI gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of conversation history handed to the AI gateway.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    /// Sender display name for user turns.
    pub name: Option<String>,
    pub text: String,
}

/// The context window for one conversation: a rolling summary of compacted
/// history plus the most recent turns, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    pub summary: Option<String>,
    pub turns: Vec<Turn>,
}

/// One record of the append-only conversation journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: chrono::DateTime<chrono::Utc>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub text: String,
}
