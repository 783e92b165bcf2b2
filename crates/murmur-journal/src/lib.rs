// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only conversation journal, one JSONL file per conversation.
//!
//! The engine emits one record per accepted inbound message and per
//! successfully dispatched reply. Records are plain JSON lines for offline
//! analysis; nothing here is ever read back by the bridge itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use murmur_core::types::{ContextKey, JournalEntry};
use murmur_core::{Journal, MurmurError};

/// JSONL-file journal rooted at a directory.
pub struct JsonlJournal {
    dir: PathBuf,
}

impl JsonlJournal {
    /// Creates the journal, ensuring the directory exists.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, MurmurError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MurmurError::Journal {
                source: Box::new(e),
            })?;
        Ok(Self { dir })
    }

    /// Path of the journal file for one conversation.
    pub fn file_path(&self, key: &ContextKey) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize_stem(&key.to_string())))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Keeps only filename-safe characters, mirroring how conversation ids are
/// flattened to files.
fn sanitize_stem(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if safe.is_empty() {
        "unknown-conversation".to_string()
    } else {
        safe
    }
}

#[async_trait]
impl Journal for JsonlJournal {
    async fn record(&self, key: &ContextKey, entry: &JournalEntry) -> Result<(), MurmurError> {
        let mut line = serde_json::to_string(entry).map_err(|e| MurmurError::Journal {
            source: Box::new(e),
        })?;
        line.push('\n');

        let path = self.file_path(key);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| MurmurError::Journal {
                source: Box::new(e),
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| MurmurError::Journal {
                source: Box::new(e),
            })?;

        debug!(path = %path.display(), "journal record appended");
        Ok(())
    }
}
