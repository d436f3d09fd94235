//! Builder for configuring the sync pipeline.

use std::time::Duration;

use crate::fetch::{DEFAULT_FETCH_TIMEOUT, DEFAULT_LISTING_TIMEOUT, Fetcher};
use crate::normalize::BodyExtractor;
use crate::resolver::REGULATION_LIST_URL;
use crate::service::{ContentItems, SyncService};
use crate::store::Store;

/// Builder for configuring a [`SyncService`].
///
/// Provides a fluent API for setting fetch/listing timeouts, the listing
/// URL, and the HTML capability.
///
/// # Example
///
/// ```rust,no_run
/// use std::collections::HashSet;
/// use std::time::Duration;
/// use regulation_sync::{MemoryStore, SyncBuilder};
///
/// let items: HashSet<u64> = [7].into_iter().collect();
/// let service = SyncBuilder::new(MemoryStore::new(), items)
///     .fetch_timeout(Duration::from_secs(30))
///     .build();
/// ```
pub struct SyncBuilder<S: Store, C: ContentItems> {
    store: S,
    items: C,
    fetch_timeout: Duration,
    listing_timeout: Duration,
    listing_url: String,
    body_extraction: bool,
}

impl<S: Store, C: ContentItems> SyncBuilder<S, C> {
    /// Create a new builder with the given store and content-item registry.
    ///
    /// Defaults: 20 s fetch timeout, 15 s listing timeout, the canonical
    /// regulation listing URL, body extraction enabled.
    pub fn new(store: S, items: C) -> Self {
        Self {
            store,
            items,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            listing_timeout: DEFAULT_LISTING_TIMEOUT,
            listing_url: REGULATION_LIST_URL.to_string(),
            body_extraction: true,
        }
    }

    /// Timeout for fetching a regulation or an arbitrary page.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Timeout for fetching the regulation listing page.
    pub fn listing_timeout(mut self, timeout: Duration) -> Self {
        self.listing_timeout = timeout;
        self
    }

    /// Override the listing page URL.
    pub fn listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }

    /// Drop the HTML capability: fetched pages are stored raw, without
    /// asset rewriting or body extraction, and listing discovery is
    /// disabled. A degraded mode for constrained hosts, not an error path.
    pub fn without_body_extraction(mut self) -> Self {
        self.body_extraction = false;
        self
    }

    /// Consume the builder and return the configured [`SyncService`].
    pub fn build(self) -> SyncService<S, C> {
        let extractor = self.body_extraction.then(BodyExtractor::default);
        let fetcher = Fetcher::new(
            self.fetch_timeout,
            self.listing_timeout,
            self.listing_url,
            extractor,
        );

        SyncService::new(self.store, self.items, fetcher)
    }
}
