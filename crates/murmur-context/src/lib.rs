// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context store for the Murmur mesh bridge: bounded per-conversation
//! history, rolling summarization, and reply cooldowns.

pub mod compaction;
pub mod store;

pub use store::{ContextSettings, ContextStore};
