//! Pluggable state stores for synced fragments and mappings.
//!
//! The crate ships with two built-in backends:
//!
//! - [`MemoryStore`] -- in-process state, useful for tests and embedding.
//! - [`FsStore`] -- a single JSON document on the local filesystem.
//!
//! Implement the [`Store`] trait to bridge into a host system's own
//! settings/metadata storage.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A synced HTML fragment plus its provenance.
///
/// Stored either as the global singleton or attached 1:1 to a content item.
/// Re-syncing overwrites in place; fragments are never versioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// The assembled HTML. Sanitized at render time, not here.
    pub html: String,
    /// URL the fragment was fetched from.
    pub source_url: String,
    /// Capture time as a Unix timestamp (seconds).
    pub updated_at: u64,
}

/// Which kind of source the admin last synced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChoice {
    /// A regulation selected by numeric ID.
    #[default]
    Id,
    /// A regulation picked from the discovered listing.
    List,
    /// An arbitrary admin-supplied URL.
    Custom,
}

/// Persistent state interface for the sync pipeline.
///
/// Replaces ambient option/meta storage with an explicit injected store.
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// with the background refresh task.
///
/// Registry invariants are the implementation's responsibility: a mapped ID
/// appears at most once, and removal is idempotent.
pub trait Store: Send + Sync + 'static {
    /// The global fragment, if any sync has completed.
    fn global_fragment(&self) -> impl Future<Output = Result<Option<Fragment>>> + Send;

    /// Overwrite the global fragment.
    fn set_global_fragment(&self, fragment: &Fragment) -> impl Future<Output = Result<()>> + Send;

    /// The source choice used by the last successful sync.
    fn last_choice(&self) -> impl Future<Output = Result<SourceChoice>> + Send;

    fn set_last_choice(&self, choice: SourceChoice) -> impl Future<Output = Result<()>> + Send;

    /// The remembered custom URL, if the last choice was [`SourceChoice::Custom`].
    fn custom_url(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    fn set_custom_url(&self, url: Option<&str>) -> impl Future<Output = Result<()>> + Send;

    /// The fragment attached to a content item.
    fn item_fragment(&self, id: u64) -> impl Future<Output = Result<Option<Fragment>>> + Send;

    /// Attach (or overwrite) the fragment for a content item.
    fn set_item_fragment(
        &self,
        id: u64,
        fragment: &Fragment,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete the fragment for a content item. Deleting an absent fragment
    /// is not an error.
    fn delete_item_fragment(&self, id: u64) -> impl Future<Output = Result<()>> + Send;

    /// All mapped content-item IDs, sorted and deduplicated.
    fn mapped_ids(&self) -> impl Future<Output = Result<Vec<u64>>> + Send;

    /// Register a content item as mapped. Adding an existing ID is a no-op.
    fn add_mapped_id(&self, id: u64) -> impl Future<Output = Result<()>> + Send;

    /// Unregister a content item. Removing an absent ID is a no-op.
    fn remove_mapped_id(&self, id: u64) -> impl Future<Output = Result<()>> + Send;

    /// Whether scheduled refresh is enabled.
    fn schedule_enabled(&self) -> impl Future<Output = Result<bool>> + Send;

    fn set_schedule_enabled(&self, enabled: bool) -> impl Future<Output = Result<()>> + Send;
}

/// Full store state, shared by the built-in backends.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    pub(crate) global: Option<Fragment>,
    #[serde(default)]
    pub(crate) last_choice: SourceChoice,
    #[serde(default)]
    pub(crate) custom_url: Option<String>,
    #[serde(default)]
    pub(crate) items: BTreeMap<u64, Fragment>,
    #[serde(default)]
    pub(crate) mapped: BTreeSet<u64>,
    #[serde(default)]
    pub(crate) schedule_enabled: bool,
}

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
