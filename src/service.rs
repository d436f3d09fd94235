//! Sync orchestration: validation, permission checks, fetch, persistence.
//!
//! [`SyncService`] owns the store, the host's content-item registry, and the
//! [`Fetcher`]. Each operation mirrors one admin action in the host system.
//! The service is deliberately unaware of scheduling -- see
//! [`schedule`](crate::schedule) for the background collaborator.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Result, SyncError};
use crate::fetch::{Fetcher, RegulationLink};
use crate::resolver;
use crate::sanitizer::sanitize_rich;
use crate::store::{Fragment, SourceChoice, Store, unix_now};

/// Capability checks for the calling user.
///
/// Checked before any network call: a caller without rights to a target
/// item can neither fetch-and-attach nor remove its mapping, and
/// globally-scoped operations require the elevated site capability.
pub trait Permissions: Send + Sync {
    /// May the caller manage the mapping for this content item?
    fn can_manage_item(&self, id: u64) -> bool;

    /// Does the caller hold the elevated, site-wide capability?
    fn can_manage_site(&self) -> bool;
}

/// Caller with every capability. Used by scheduled runs, which act on
/// behalf of the system rather than a user.
#[derive(Debug, Clone, Copy)]
pub struct Unrestricted;

impl Permissions for Unrestricted {
    fn can_manage_item(&self, _id: u64) -> bool {
        true
    }

    fn can_manage_site(&self) -> bool {
        true
    }
}

/// The host system's view of which content items exist.
///
/// Mappings referencing items that no longer exist are pruned lazily the
/// next time [`SyncService::mappings`] runs.
pub trait ContentItems: Send + Sync + 'static {
    fn exists(&self, id: u64) -> bool;
}

impl ContentItems for HashSet<u64> {
    fn exists(&self, id: u64) -> bool {
        self.contains(&id)
    }
}

/// The source an admin selected on the sync form.
#[derive(Debug, Clone)]
pub enum SourceSelection {
    /// A regulation by numeric ID; fetched through its embed URL.
    ById(u64),
    /// A URL picked from the discovered listing. Rooted paths are resolved
    /// against the canonical regulation host.
    FromList(String),
    /// An arbitrary admin-supplied URL.
    Custom(String),
}

impl SourceSelection {
    fn choice(&self) -> SourceChoice {
        match self {
            SourceSelection::ById(_) => SourceChoice::Id,
            SourceSelection::FromList(_) => SourceChoice::List,
            SourceSelection::Custom(_) => SourceChoice::Custom,
        }
    }

    fn resolve_url(&self) -> Result<String> {
        match self {
            SourceSelection::ById(0) => {
                Err(SyncError::Validation("a regulation ID is required".into()))
            }
            SourceSelection::ById(id) => Ok(resolver::embed_url(*id)),
            SourceSelection::FromList(url) if url.is_empty() => Err(SyncError::Validation(
                "a regulation must be chosen from the list".into(),
            )),
            SourceSelection::FromList(url) if url.starts_with('/') => {
                Ok(format!("{}{url}", resolver::REGULATION_BASE_URL))
            }
            SourceSelection::FromList(url) => Ok(url.clone()),
            SourceSelection::Custom(url) if url.is_empty() => {
                Err(SyncError::Validation("a custom URL is required".into()))
            }
            SourceSelection::Custom(url) => Ok(url.clone()),
        }
    }
}

/// One admin-triggered sync: a source plus an optional target content item.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub source: SourceSelection,
    /// Content item to attach the fragment to; `None` updates only the
    /// global copy.
    pub target: Option<u64>,
}

/// Result of a successful [`SyncService::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The URL that was fetched.
    pub source_url: String,
    /// The content item the fragment was attached to, if any.
    pub mapped: Option<u64>,
}

/// Aggregate outcome of a [`SyncService::sync_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Mappings refreshed successfully.
    pub synced: usize,
    /// Mappings skipped because the caller may not manage them.
    pub skipped: usize,
    /// One message per failed mapping.
    pub errors: Vec<String>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "synced {} mappings, skipped {}, {} errors",
            self.synced,
            self.skipped,
            self.errors.len()
        )
    }
}

/// A mapping row as surfaced to the admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub item_id: u64,
    pub source_url: String,
    pub updated_at: u64,
    /// Whether the caller may sync or remove this mapping.
    pub manageable: bool,
}

/// The content fetch & normalize pipeline bound to a store and a host.
///
/// Operations are sequential: one blocking HTTP call, then in-memory
/// transformation, then storage writes. Concurrent triggers racing on the
/// same mapping are not detected; the last writer wins.
pub struct SyncService<S: Store, C: ContentItems> {
    store: S,
    items: C,
    fetcher: Fetcher,
}

impl<S: Store, C: ContentItems> SyncService<S, C> {
    pub(crate) fn new(store: S, items: C, fetcher: Fetcher) -> Self {
        Self {
            store,
            items,
            fetcher,
        }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle the sync form: fetch from the selected source and persist.
    ///
    /// The global fragment is always overwritten; when a target item is
    /// given and exists, the fragment is also attached to it and the
    /// mapping registered. Permission checks run before any network call,
    /// and the admin's source selection is remembered even when the fetch
    /// then fails.
    pub async fn sync(&self, perms: &dyn Permissions, request: SyncRequest) -> Result<SyncOutcome> {
        let target = request.target.filter(|id| *id != 0);

        match target {
            Some(id) if !perms.can_manage_item(id) => {
                return Err(SyncError::Permission(
                    "you do not have permission to update that mapping",
                ));
            }
            None if !perms.can_manage_site() => {
                return Err(SyncError::Permission(
                    "updating the global copy requires site management rights",
                ));
            }
            _ => {}
        }

        let choice = request.source.choice();
        let source_url = request.source.resolve_url()?;

        // Remember the form selection up front so a failed fetch does not
        // reset the admin screen.
        self.store.set_last_choice(choice).await?;
        let remembered_custom = match choice {
            SourceChoice::Custom => Some(source_url.as_str()),
            _ => None,
        };
        self.store.set_custom_url(remembered_custom).await?;

        let html = self.fetcher.fetch_fragment(&source_url).await?;
        let fragment = Fragment {
            html,
            source_url: source_url.clone(),
            updated_at: unix_now(),
        };

        self.store.set_global_fragment(&fragment).await?;

        let mut mapped = None;
        if let Some(id) = target {
            if self.items.exists(id) {
                self.save_item_payload(id, &fragment).await?;
                mapped = Some(id);
            } else {
                tracing::warn!("Target item {id} does not exist; stored global copy only");
            }
        }

        tracing::info!("Synced content from {source_url}");
        Ok(SyncOutcome { source_url, mapped })
    }

    /// Re-fetch one mapped item from its stored source URL.
    pub async fn sync_one(&self, perms: &dyn Permissions, id: u64) -> Result<()> {
        self.refresh(id, Some(perms)).await
    }

    /// Refresh every mapped item sequentially, continuing past failures.
    ///
    /// `perms` of `None` (scheduled runs) skips nothing; otherwise items
    /// the caller may not manage are counted as skipped.
    pub async fn sync_all(&self, perms: Option<&dyn Permissions>) -> Result<SyncReport> {
        let ids = self.store.mapped_ids().await?;
        let mut report = SyncReport::default();

        for id in ids {
            if let Some(perms) = perms {
                if !perms.can_manage_item(id) {
                    report.skipped += 1;
                    continue;
                }
            }

            match self.refresh(id, None).await {
                Ok(()) => report.synced += 1,
                Err(e) => report.errors.push(format!("Item {id}: {e}")),
            }
        }

        Ok(report)
    }

    /// Remove the mapping (and stored fragment) for a content item.
    ///
    /// Idempotent: removing an absent mapping succeeds.
    pub async fn remove_mapping(&self, perms: &dyn Permissions, id: u64) -> Result<()> {
        if !perms.can_manage_item(id) {
            return Err(SyncError::Permission(
                "you do not have permission to remove this mapping",
            ));
        }

        self.delete_item_payload(id).await
    }

    /// Flip the scheduled-refresh flag. Requires the site capability.
    pub async fn set_schedule(&self, perms: &dyn Permissions, enabled: bool) -> Result<()> {
        if !perms.can_manage_site() {
            return Err(SyncError::Permission(
                "only site managers can change the sync schedule",
            ));
        }

        self.store.set_schedule_enabled(enabled).await
    }

    /// Whether scheduled refresh is currently enabled.
    pub async fn schedule_enabled(&self) -> Result<bool> {
        self.store.schedule_enabled().await
    }

    /// List current mappings for the admin screen, pruning entries whose
    /// content items no longer exist.
    pub async fn mappings(&self, perms: &dyn Permissions) -> Result<Vec<Mapping>> {
        let mut out = Vec::new();

        for id in self.store.mapped_ids().await? {
            if !self.items.exists(id) {
                tracing::debug!("Pruning mapping for deleted item {id}");
                self.delete_item_payload(id).await?;
                continue;
            }

            let (source_url, updated_at) = match self.store.item_fragment(id).await? {
                Some(fragment) => (fragment.source_url, fragment.updated_at),
                None => (String::new(), 0),
            };
            out.push(Mapping {
                item_id: id,
                source_url,
                updated_at,
                manageable: perms.can_manage_item(id),
            });
        }

        Ok(out)
    }

    /// Render the display directive: the item's fragment if mapped, else
    /// the global fragment, else an empty string. Output is sanitized
    /// through the allow-list and wrapped in a container `div`.
    pub async fn render(&self, item_id: Option<u64>) -> Result<String> {
        if let Some(id) = item_id {
            if let Some(fragment) = self.store.item_fragment(id).await? {
                if !fragment.html.is_empty() {
                    return Ok(wrap_embed(&fragment.html));
                }
            }
        }

        match self.store.global_fragment().await? {
            Some(fragment) if !fragment.html.is_empty() => Ok(wrap_embed(&fragment.html)),
            _ => Ok(String::new()),
        }
    }

    /// Discovered links from the regulation listing page, for the admin
    /// form's "choose from list" option.
    pub async fn regulation_links(&self) -> Vec<RegulationLink> {
        self.fetcher.regulation_links().await
    }

    async fn refresh(&self, id: u64, perms: Option<&dyn Permissions>) -> Result<()> {
        if !self.items.exists(id) {
            return Err(SyncError::UnknownItem(id));
        }

        if let Some(perms) = perms {
            if !perms.can_manage_item(id) {
                return Err(SyncError::Permission(
                    "you do not have permission to sync this mapping",
                ));
            }
        }

        let source_url = match self.store.item_fragment(id).await? {
            Some(fragment) if !fragment.source_url.is_empty() => fragment.source_url,
            _ => {
                return Err(SyncError::Validation(format!(
                    "no source URL is stored for item {id}"
                )));
            }
        };

        let html = self.fetcher.fetch_fragment(&source_url).await?;
        let fragment = Fragment {
            html,
            source_url,
            updated_at: unix_now(),
        };
        self.save_item_payload(id, &fragment).await
    }

    async fn save_item_payload(&self, id: u64, fragment: &Fragment) -> Result<()> {
        self.store.set_item_fragment(id, fragment).await?;
        self.store.add_mapped_id(id).await
    }

    async fn delete_item_payload(&self, id: u64) -> Result<()> {
        self.store.delete_item_fragment(id).await?;
        self.store.remove_mapped_id(id).await
    }
}

fn wrap_embed(html: &str) -> String {
    format!(r#"<div class="regulation-embed">{}</div>"#, sanitize_rich(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncBuilder;
    use crate::store::MemoryStore;

    /// Permissions stub: manages only the listed items.
    struct ItemsOnly(Vec<u64>);

    impl Permissions for ItemsOnly {
        fn can_manage_item(&self, id: u64) -> bool {
            self.0.contains(&id)
        }

        fn can_manage_site(&self) -> bool {
            false
        }
    }

    fn service(item_ids: &[u64]) -> SyncService<MemoryStore, HashSet<u64>> {
        let items: HashSet<u64> = item_ids.iter().copied().collect();
        SyncBuilder::new(MemoryStore::new(), items).build()
    }

    fn fragment(html: &str, source: &str) -> Fragment {
        Fragment {
            html: html.into(),
            source_url: source.into(),
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn sync_with_empty_custom_url_is_a_validation_error() {
        let svc = service(&[]);
        let result = svc
            .sync(
                &Unrestricted,
                SyncRequest {
                    source: SourceSelection::Custom(String::new()),
                    target: None,
                },
            )
            .await;
        assert!(matches!(result, Err(SyncError::Validation(_))));
    }

    #[tokio::test]
    async fn sync_with_zero_regulation_id_is_a_validation_error() {
        let svc = service(&[]);
        let result = svc
            .sync(
                &Unrestricted,
                SyncRequest {
                    source: SourceSelection::ById(0),
                    target: None,
                },
            )
            .await;
        assert!(matches!(result, Err(SyncError::Validation(_))));
    }

    #[tokio::test]
    async fn global_sync_requires_site_capability() {
        let svc = service(&[7]);
        let result = svc
            .sync(
                &ItemsOnly(vec![7]),
                SyncRequest {
                    source: SourceSelection::ById(1),
                    target: None,
                },
            )
            .await;
        assert!(matches!(result, Err(SyncError::Permission(_))));
    }

    #[tokio::test]
    async fn targeted_sync_requires_item_capability() {
        let svc = service(&[7]);
        let result = svc
            .sync(
                &ItemsOnly(vec![3]),
                SyncRequest {
                    source: SourceSelection::ById(1),
                    target: Some(7),
                },
            )
            .await;
        assert!(matches!(result, Err(SyncError::Permission(_))));
    }

    #[tokio::test]
    async fn remove_mapping_is_idempotent() {
        let svc = service(&[7]);
        svc.store()
            .set_item_fragment(7, &fragment("<p>x</p>", "https://h.test/"))
            .await
            .unwrap();
        svc.store().add_mapped_id(7).await.unwrap();

        svc.remove_mapping(&Unrestricted, 7).await.unwrap();
        svc.remove_mapping(&Unrestricted, 7).await.unwrap();

        assert!(svc.store().mapped_ids().await.unwrap().is_empty());
        assert_eq!(svc.store().item_fragment(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_mapping_checks_permissions() {
        let svc = service(&[7]);
        let result = svc.remove_mapping(&ItemsOnly(vec![]), 7).await;
        assert!(matches!(result, Err(SyncError::Permission(_))));
    }

    #[tokio::test]
    async fn sync_one_unknown_item_errors() {
        let svc = service(&[]);
        let result = svc.sync_one(&Unrestricted, 99).await;
        assert!(matches!(result, Err(SyncError::UnknownItem(99))));
    }

    #[tokio::test]
    async fn sync_one_without_stored_source_errors() {
        let svc = service(&[7]);
        svc.store().add_mapped_id(7).await.unwrap();
        let result = svc.sync_one(&Unrestricted, 7).await;
        assert!(matches!(result, Err(SyncError::Validation(_))));
    }

    #[tokio::test]
    async fn set_schedule_requires_site_capability() {
        let svc = service(&[]);
        let result = svc.set_schedule(&ItemsOnly(vec![7]), true).await;
        assert!(matches!(result, Err(SyncError::Permission(_))));
        assert!(!svc.schedule_enabled().await.unwrap());

        svc.set_schedule(&Unrestricted, true).await.unwrap();
        assert!(svc.schedule_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn mappings_prunes_deleted_items() {
        let svc = service(&[7]);
        for id in [7, 8] {
            svc.store()
                .set_item_fragment(id, &fragment("<p>x</p>", "https://h.test/"))
                .await
                .unwrap();
            svc.store().add_mapped_id(id).await.unwrap();
        }

        let mappings = svc.mappings(&Unrestricted).await.unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].item_id, 7);

        // Item 8 no longer exists in the host, so its state is gone.
        assert!(!svc.store().mapped_ids().await.unwrap().contains(&8));
        assert_eq!(svc.store().item_fragment(8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn mappings_reports_manageability() {
        let svc = service(&[7, 8]);
        for id in [7, 8] {
            svc.store()
                .set_item_fragment(id, &fragment("<p>x</p>", "https://h.test/"))
                .await
                .unwrap();
            svc.store().add_mapped_id(id).await.unwrap();
        }

        let mappings = svc.mappings(&ItemsOnly(vec![7])).await.unwrap();
        assert!(mappings.iter().find(|m| m.item_id == 7).unwrap().manageable);
        assert!(!mappings.iter().find(|m| m.item_id == 8).unwrap().manageable);
    }

    #[tokio::test]
    async fn render_prefers_item_fragment_over_global() {
        let svc = service(&[7]);
        svc.store()
            .set_global_fragment(&fragment("<p>global</p>", "https://h.test/g"))
            .await
            .unwrap();
        svc.store()
            .set_item_fragment(7, &fragment("<p>item</p>", "https://h.test/i"))
            .await
            .unwrap();

        let html = svc.render(Some(7)).await.unwrap();
        assert_eq!(html, r#"<div class="regulation-embed"><p>item</p></div>"#);

        let html = svc.render(None).await.unwrap();
        assert_eq!(html, r#"<div class="regulation-embed"><p>global</p></div>"#);
    }

    #[tokio::test]
    async fn render_sanitizes_stored_html() {
        let svc = service(&[]);
        svc.store()
            .set_global_fragment(&fragment(
                r#"<p>ok</p><iframe src="x">bad</iframe>"#,
                "https://h.test/",
            ))
            .await
            .unwrap();

        let html = svc.render(None).await.unwrap();
        assert!(html.contains("<p>ok</p>"));
        assert!(html.contains("bad"));
        assert!(!html.contains("<iframe"));
    }

    #[tokio::test]
    async fn render_without_state_is_empty() {
        let svc = service(&[]);
        assert_eq!(svc.render(None).await.unwrap(), "");
        assert_eq!(svc.render(Some(7)).await.unwrap(), "");
    }

    #[test]
    fn from_list_selection_resolves_rooted_paths() {
        let selection = SourceSelection::FromList("/regulation/5".into());
        assert_eq!(
            selection.resolve_url().unwrap(),
            "https://regsys.ntpusu.org/regulation/5"
        );
    }

    #[test]
    fn by_id_selection_builds_embed_url() {
        let selection = SourceSelection::ById(7);
        assert_eq!(
            selection.resolve_url().unwrap(),
            "https://regsys.ntpusu.org/regulation/7/embed"
        );
    }

    #[test]
    fn report_display_is_compact() {
        let report = SyncReport {
            synced: 2,
            skipped: 1,
            errors: vec!["Item 9: boom".into()],
        };
        assert_eq!(report.to_string(), "synced 2 mappings, skipped 1, 1 errors");
    }
}
