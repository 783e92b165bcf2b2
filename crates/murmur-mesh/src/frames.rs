// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire envelopes spoken to the radio's companion interface.
//!
//! One JSON object per line, newline-delimited. The radio side decodes and
//! encodes actual LoRa packets; the bridge never sees protocol internals,
//! only these envelopes.

use murmur_core::types::ChannelInfo;
use serde::{Deserialize, Serialize};

use murmur_core::MurmurError;

/// The broadcast destination, matching the all-ones convention on the mesh.
pub const BROADCAST_NUM: u32 = 0xffff_ffff;

/// One framed envelope on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Handshake: the radio reports the bridge's own identity and channel
    /// table. Sent once after the session opens.
    Hello {
        node_id: u32,
        node_name: String,
        #[serde(default)]
        channels: Vec<ChannelInfo>,
    },
    /// Inbound text message.
    Rx {
        #[serde(default)]
        id: Option<String>,
        from: u32,
        #[serde(default)]
        from_name: Option<String>,
        #[serde(default)]
        to: Option<u32>,
        #[serde(default)]
        channel: Option<u8>,
        text: String,
        #[serde(default)]
        rssi: Option<i32>,
        #[serde(default)]
        snr: Option<f32>,
    },
    /// Outbound text message.
    Tx {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<u32>,
        channel: u8,
        text: String,
        want_ack: bool,
    },
    /// The radio confirmed delivery of an outbound packet.
    Ack { id: String },
    /// The radio failed to deliver an outbound packet.
    Nak { id: String, reason: String },
    /// Keepalive probe.
    Ping,
    /// Keepalive answer.
    Pong,
}

impl Frame {
    /// Encodes the frame as a single JSON line (without the newline).
    pub fn encode(&self) -> Result<String, MurmurError> {
        serde_json::to_string(self).map_err(|e| MurmurError::Transport {
            message: format!("failed to encode frame: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Decodes one JSON line into a frame.
    pub fn decode(line: &str) -> Result<Frame, MurmurError> {
        serde_json::from_str(line).map_err(|e| MurmurError::Transport {
            message: format!("failed to decode frame: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// True when `to` addresses the broadcast destination.
    pub fn is_broadcast_dest(to: Option<u32>) -> bool {
        matches!(to, None | Some(BROADCAST_NUM))
    }
}
