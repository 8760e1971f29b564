//! Directory-backed item store
//!
//! An item counts as processed when `<root>/<id>` exists. Files for an item in
//! progress live under `<root>/.staging/<id>` and are moved into place with a
//! single rename when the item is marked processed, so a crash mid-item never
//! leaves a directory that looks complete.

use crate::item::ItemId;
use crate::storage::layout::DataLayout;
use crate::storage::traits::{ItemStore, StorageError, StorageResult};
use std::collections::HashSet;
use std::fs;

/// Item store whose persistent state is the archive directory itself
#[derive(Debug)]
pub struct DirectoryStore {
    layout: DataLayout,
    processed: HashSet<ItemId>,
}

impl DirectoryStore {
    /// Opens the store, treating every item directory under the root as processed
    ///
    /// Never fails: if the root cannot be scanned the store starts empty and the
    /// condition is logged.
    pub fn load(layout: DataLayout) -> Self {
        match Self::try_load(layout.clone()) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "Could not load processed items from {}: {}; starting with an empty record",
                    layout.root().display(),
                    e
                );
                Self::empty(layout)
            }
        }
    }

    /// Opens the store, returning the scan error instead of degrading
    ///
    /// Leftover staging directories from an interrupted run are removed first.
    pub fn try_load(layout: DataLayout) -> StorageResult<Self> {
        discard_staging(&layout);

        let root = layout.root();
        let entries = fs::read_dir(root).map_err(|e| StorageError::io(root, e))?;

        let mut processed = HashSet::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                    continue;
                }
            };

            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name();
            match name.to_str().and_then(ItemId::parse) {
                Some(id) => {
                    processed.insert(id);
                }
                None => tracing::trace!("Ignoring non-item directory {:?}", name),
            }
        }

        tracing::info!(
            "Loaded {} processed items from {}",
            processed.len(),
            root.display()
        );

        Ok(Self { layout, processed })
    }

    /// Creates a store that knows about no items
    pub fn empty(layout: DataLayout) -> Self {
        Self {
            layout,
            processed: HashSet::new(),
        }
    }

    /// Moves the staged files of an item to their final place
    fn promote(&self, id: &ItemId) -> StorageResult<()> {
        let staging = self.layout.staging_dir(id);
        let target = self.layout.item_dir(id);

        if target.exists() {
            if staging.exists() {
                fs::remove_dir_all(&staging).map_err(|e| StorageError::io(&staging, e))?;
            }
            return Ok(());
        }

        if staging.exists() {
            fs::rename(&staging, &target).map_err(|e| StorageError::io(&target, e))
        } else {
            fs::create_dir_all(&target).map_err(|e| StorageError::io(&target, e))
        }
    }
}

impl ItemStore for DirectoryStore {
    fn is_processed(&self, id: &ItemId) -> bool {
        self.processed.contains(id)
    }

    fn mark_processed(&mut self, id: &ItemId) -> StorageResult<bool> {
        if !self.processed.insert(id.clone()) {
            return Ok(false);
        }

        self.promote(id)?;
        Ok(true)
    }

    fn processed_count(&self) -> usize {
        self.processed.len()
    }
}

/// Removes everything under the staging root
fn discard_staging(layout: &DataLayout) {
    let staging = layout.staging_root();
    if !staging.exists() {
        return;
    }

    match fs::remove_dir_all(&staging) {
        Ok(()) => tracing::info!("Discarded unfinished items in {}", staging.display()),
        Err(e) => tracing::warn!(
            "Could not discard unfinished items in {}: {}",
            staging.display(),
            e
        ),
    }
}
