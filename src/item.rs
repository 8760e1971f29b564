//! Front page items
//!
//! An item is one story entry on the aggregator's front page: an id assigned by
//! the site, the article it links to, and its discussion thread.

use std::fmt;
use url::Url;

/// Stable identifier the source site assigns to a story
///
/// The id doubles as a directory name in the archive, so only ASCII
/// alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    /// Validates and wraps a raw id
    ///
    /// Returns `None` for empty ids and ids containing anything that is not
    /// safe to use as a single path component.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return None;
        }

        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One front page entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,

    /// The story's primary link
    pub article_url: Url,

    /// The story's comment thread on the aggregator
    pub discussion_url: Url,
}

impl Item {
    /// Creates an item, deriving its discussion URL from the aggregator base
    pub fn new(id: ItemId, article_url: Url, base_url: &Url) -> Self {
        let discussion_url = discussion_url(base_url, &id);
        Self {
            id,
            article_url,
            discussion_url,
        }
    }
}

/// Returns `<base>/item?id=<id>`
pub fn discussion_url(base_url: &Url, id: &ItemId) -> Url {
    let mut url = base_url.clone();
    url.set_path("/item");
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("id", id.as_str());
    url
}
