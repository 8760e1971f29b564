//! Artifact writer
//!
//! Writes fetched content for an item into its staging directory. Nothing here
//! touches the processed-item record; promotion happens in the store.

use crate::item::ItemId;
use crate::storage::layout::{extension_for, link_file_stem, DataLayout, ARTICLE_STEM};
use crate::storage::traits::{StorageError, StorageResult};
use url::Url;

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    layout: DataLayout,
}

impl ArtifactWriter {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// Saves the primary article and returns the file name used
    pub async fn write_article(
        &self,
        id: &ItemId,
        body: &[u8],
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let name = format!("{}.{}", ARTICLE_STEM, extension_for(content_type));
        self.write_file(id, &name, body).await?;
        Ok(name)
    }

    /// Saves one secondary link and returns the file name used
    pub async fn write_link(
        &self,
        id: &ItemId,
        url: &Url,
        body: &[u8],
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let name = format!("{}.{}", link_file_stem(url), extension_for(content_type));
        self.write_file(id, &name, body).await?;
        Ok(name)
    }

    async fn write_file(&self, id: &ItemId, name: &str, contents: &[u8]) -> StorageResult<()> {
        let dir = self.layout.staging_dir(id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let path = dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        tracing::trace!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }
}
