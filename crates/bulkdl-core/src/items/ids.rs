//! Identifier newtypes for batch items and backend downloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of an item in the batch collection.
///
/// Uniqueness is enforced across all item variants (pending, single and
/// multiple share one id space).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Create a new item ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random item ID for selections that carry no natural key.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Derive the id of a child produced by resolving `parent`.
    ///
    /// The result is not guaranteed unique; callers must check the collection
    /// and fall back to [`ItemId::with_suffix`].
    pub fn child_of(parent: &Self, descriptor_id: &str) -> Self {
        Self(format!("{}#{descriptor_id}", parent.0))
    }

    /// Append a numeric disambiguation suffix.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}~{n}", self.0))
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier assigned by the download backend to one transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(pub u64);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
