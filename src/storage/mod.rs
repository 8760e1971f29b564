//! Storage module for persisting crawl results
//!
//! This module handles everything that touches the archive directory:
//! - The processed-item record, backed by item directory names
//! - Path and file naming rules
//! - Writing fetched content into an item's staging directory

mod directory;
mod layout;
mod traits;
mod writer;

pub use directory::DirectoryStore;
pub use layout::{
    extension_for, link_file_stem, DataLayout, ARTICLE_STEM, STAGING_DIR,
};
pub use traits::{ItemStore, StorageError, StorageResult};
pub use writer::ArtifactWriter;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Item store shared between concurrently running item fetches
pub type SharedStore = Arc<Mutex<dyn ItemStore + Send>>;

/// Wraps a store so it can be shared across tasks
pub fn shared<S: ItemStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store, recovering the guard if a previous holder panicked
///
/// The store's state is a set that is only ever inserted into, so a poisoned
/// lock still guards consistent data.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, dyn ItemStore + Send + 'static> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
