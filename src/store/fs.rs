//! Filesystem state store.

use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::error::{Result, SyncError};
use crate::store::{Fragment, SourceChoice, Store, StoreState};

/// Store backed by a single JSON document on the local filesystem.
///
/// Every operation reads, modifies, and rewrites the whole document; a
/// mutex serializes writers within this process. Intermediate directories
/// are created automatically.
///
/// # Example
///
/// ```rust,no_run
/// use regulation_sync::FsStore;
///
/// let store = FsStore::new("/var/data/regulation-sync/state.json");
/// ```
pub struct FsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FsStore {
    /// Create a new `FsStore` persisting to the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<StoreState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| SyncError::Store(Box::new(e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(SyncError::Store(Box::new(e))),
        }
    }

    async fn save(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Store(Box::new(e)))?;
        }

        let bytes = serde_json::to_vec_pretty(state).map_err(|e| SyncError::Store(Box::new(e)))?;
        tokio::fs::write(&self.path, &bytes)
            .await
            .map_err(|e| SyncError::Store(Box::new(e)))?;

        tracing::debug!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut StoreState),
    {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        mutate(&mut state);
        self.save(&state).await
    }
}

impl Store for FsStore {
    async fn global_fragment(&self) -> Result<Option<Fragment>> {
        Ok(self.load().await?.global)
    }

    async fn set_global_fragment(&self, fragment: &Fragment) -> Result<()> {
        let fragment = fragment.clone();
        self.update(|state| state.global = Some(fragment)).await
    }

    async fn last_choice(&self) -> Result<SourceChoice> {
        Ok(self.load().await?.last_choice)
    }

    async fn set_last_choice(&self, choice: SourceChoice) -> Result<()> {
        self.update(|state| state.last_choice = choice).await
    }

    async fn custom_url(&self) -> Result<Option<String>> {
        Ok(self.load().await?.custom_url)
    }

    async fn set_custom_url(&self, url: Option<&str>) -> Result<()> {
        let url = url.map(str::to_string);
        self.update(|state| state.custom_url = url).await
    }

    async fn item_fragment(&self, id: u64) -> Result<Option<Fragment>> {
        Ok(self.load().await?.items.remove(&id))
    }

    async fn set_item_fragment(&self, id: u64, fragment: &Fragment) -> Result<()> {
        let fragment = fragment.clone();
        self.update(move |state| {
            state.items.insert(id, fragment);
        })
        .await
    }

    async fn delete_item_fragment(&self, id: u64) -> Result<()> {
        self.update(move |state| {
            state.items.remove(&id);
        })
        .await
    }

    async fn mapped_ids(&self) -> Result<Vec<u64>> {
        Ok(self.load().await?.mapped.into_iter().collect())
    }

    async fn add_mapped_id(&self, id: u64) -> Result<()> {
        self.update(move |state| {
            state.mapped.insert(id);
        })
        .await
    }

    async fn remove_mapped_id(&self, id: u64) -> Result<()> {
        self.update(move |state| {
            state.mapped.remove(&id);
        })
        .await
    }

    async fn schedule_enabled(&self) -> Result<bool> {
        Ok(self.load().await?.schedule_enabled)
    }

    async fn set_schedule_enabled(&self, enabled: bool) -> Result<()> {
        self.update(move |state| state.schedule_enabled = enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fragment(html: &str) -> Fragment {
        Fragment {
            html: html.into(),
            source_url: "https://h.test/".into(),
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_state() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new(tmp.path().join("state.json"));
        assert_eq!(store.global_fragment().await.unwrap(), None);
        assert!(store.mapped_ids().await.unwrap().is_empty());
        assert!(!store.schedule_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn state_round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/state.json");

        let store = FsStore::new(&path);
        store.set_global_fragment(&fragment("<p>g</p>")).await.unwrap();
        store.set_item_fragment(7, &fragment("<p>i</p>")).await.unwrap();
        store.add_mapped_id(7).await.unwrap();
        store.set_last_choice(SourceChoice::Custom).await.unwrap();
        store.set_custom_url(Some("https://h.test/page")).await.unwrap();

        // A fresh handle must see the persisted state.
        let reopened = FsStore::new(&path);
        assert_eq!(reopened.global_fragment().await.unwrap().unwrap().html, "<p>g</p>");
        assert_eq!(reopened.item_fragment(7).await.unwrap().unwrap().html, "<p>i</p>");
        assert_eq!(reopened.mapped_ids().await.unwrap(), vec![7]);
        assert_eq!(reopened.last_choice().await.unwrap(), SourceChoice::Custom);
        assert_eq!(
            reopened.custom_url().await.unwrap().as_deref(),
            Some("https://h.test/page")
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = FsStore::new(&path);
        assert!(matches!(
            store.mapped_ids().await,
            Err(crate::SyncError::Store(_))
        ));
    }
}
