//! Storage traits and error types
//!
//! This module defines the trait interface for the processed-item record and
//! the associated error types.

use crate::item::ItemId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable record of which items have been fully processed
///
/// The record is append-only: once an id is in, it stays in and the item is
/// never fetched again.
pub trait ItemStore {
    /// Returns true if the item has already been processed
    fn is_processed(&self, id: &ItemId) -> bool;

    /// Records an item as processed
    ///
    /// Idempotent. Returns `Ok(true)` when the id was newly recorded and
    /// `Ok(false)` when it was already known. On `Err`, the id is still
    /// recorded in memory but the record may not survive a restart.
    fn mark_processed(&mut self, id: &ItemId) -> StorageResult<bool>;

    /// Number of processed items known to the store
    fn processed_count(&self) -> usize;
}
