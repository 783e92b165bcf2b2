// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mesh wire protocol, transports, and connection supervision for Murmur.
//!
//! The supervisor owns the connection lifecycle state machine and exposes
//! the [`murmur_core::MeshLink`] surface to the rest of the bridge; the
//! frames and transport modules stay below it.

pub mod backoff;
pub mod frames;
pub mod supervisor;
pub mod transport;

pub use frames::Frame;
pub use supervisor::{MeshSupervisor, SupervisorSettings};
pub use transport::{connector, LinkConnector, RawLink, TransportSpec};
