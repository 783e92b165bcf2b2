// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatch for the Murmur mesh bridge: chunking, per-target
//! ordering, and bounded retry.

pub mod chunking;
pub mod dispatcher;

pub use chunking::split_payload;
pub use dispatcher::{DispatchSettings, Dispatcher};
