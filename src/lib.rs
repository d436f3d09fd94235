//! # regulation_sync
//!
//! Fetches regulation HTML from a remote regulation system and republishes
//! it inside a host content-management system, with optional per-item
//! mapping and scheduled refresh.
//!
//! ## Overview
//!
//! A [`SyncService`] fetches content from an admin-selected source (a
//! regulation ID, a link discovered on the public listing, or a custom
//! URL). URLs targeting a known regulation detail or embed page are
//! resolved to the structured API the remote SPA consumes; everything else
//! is fetched as raw HTML, has its relative asset URLs rewritten to
//! absolute ones, and is reduced to the `<body>` contents. The resulting
//! fragment is stored globally and, optionally, attached to a content
//! item. At render time fragments pass through an allow-list sanitizer.
//!
//! State lives behind the [`Store`] trait ([`MemoryStore`], [`FsStore`],
//! or a host-specific bridge); capability checks are injected per call via
//! [`Permissions`]; the optional [`schedule`] task refreshes all mapped
//! items in the background.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::collections::HashSet;
//! use regulation_sync::{
//!     MemoryStore, SourceSelection, SyncBuilder, SyncRequest, Unrestricted,
//! };
//!
//! # async fn example() -> regulation_sync::Result<()> {
//! let items: HashSet<u64> = [7].into_iter().collect();
//! let service = SyncBuilder::new(MemoryStore::new(), items).build();
//!
//! // Fetch regulation 42 and attach it to content item 7.
//! service
//!     .sync(
//!         &Unrestricted,
//!         SyncRequest {
//!             source: SourceSelection::ById(42),
//!             target: Some(7),
//!         },
//!     )
//!     .await?;
//!
//! // Sanitized markup for the display directive.
//! let html = service.render(Some(7)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod resolver;
pub mod sanitizer;
pub mod schedule;
pub mod service;
pub mod store;

pub use config::SyncBuilder;
pub use error::{Result, SyncError};
pub use fetch::{Fetcher, RegulationLink};
pub use normalize::BodyExtractor;
pub use sanitizer::{AllowlistSanitizer, Sanitizer, sanitize_rich};
pub use schedule::ScheduleHandle;
pub use service::{
    ContentItems, Mapping, Permissions, SourceSelection, SyncOutcome, SyncReport, SyncRequest,
    SyncService, Unrestricted,
};
pub use store::{Fragment, FsStore, MemoryStore, SourceChoice, Store};
