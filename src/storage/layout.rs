//! On-disk layout of the archive
//!
//! ```text
//! <root>/
//!   .staging/<id>/        items still being fetched
//!   <id>/                 processed items
//!     article.html
//!     link-<hash>.html    one per downloaded secondary link
//! ```

use crate::item::ItemId;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// Directory under the root holding items that are not processed yet
pub const STAGING_DIR: &str = ".staging";

/// File stem of the primary article
pub const ARTICLE_STEM: &str = "article";

/// Hex digits of the URL hash kept in link file names
const LINK_HASH_LEN: usize = 16;

/// Path computations for the archive rooted at one directory
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final directory of a processed item
    pub fn item_dir(&self, id: &ItemId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn staging_root(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Directory an item's files are written to until it is processed
    pub fn staging_dir(&self, id: &ItemId) -> PathBuf {
        self.staging_root().join(id.as_str())
    }
}

/// File stem for a secondary link, derived from the URL alone
///
/// The same URL always maps to the same stem, and the stem never contains
/// characters that are unsafe in a file name.
pub fn link_file_stem(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    let hex = hex::encode(digest);
    format!("link-{}", &hex[..LINK_HASH_LEN])
}

/// Picks a file extension from a Content-Type header value
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => "html",
        "application/pdf" => "pdf",
        "text/plain" | "text/markdown" => "txt",
        "application/json" => "json",
        "application/xml" | "text/xml" | "application/rss+xml" | "application/atom+xml" => "xml",
        _ => "bin",
    }
}
