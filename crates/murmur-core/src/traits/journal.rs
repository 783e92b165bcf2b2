// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only conversation journal trait.

use async_trait::async_trait;

use crate::error::MurmurError;
use crate::types::{ContextKey, JournalEntry};

/// Sink for the per-conversation message log.
///
/// The engine emits one record after each accepted inbound message and one
/// after each successfully dispatched reply. Storage format and medium are
/// the implementation's concern.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Appends one record to the journal for `key`.
    async fn record(&self, key: &ContextKey, entry: &JournalEntry) -> Result<(), MurmurError>;
}
