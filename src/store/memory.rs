//! In-memory state store.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::{Fragment, SourceChoice, Store, StoreState};

/// Store backed by in-process memory.
///
/// Cheap to clone; clones share the same underlying state. The default for
/// embedding and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn global_fragment(&self) -> Result<Option<Fragment>> {
        Ok(self.state.lock().await.global.clone())
    }

    async fn set_global_fragment(&self, fragment: &Fragment) -> Result<()> {
        self.state.lock().await.global = Some(fragment.clone());
        Ok(())
    }

    async fn last_choice(&self) -> Result<SourceChoice> {
        Ok(self.state.lock().await.last_choice)
    }

    async fn set_last_choice(&self, choice: SourceChoice) -> Result<()> {
        self.state.lock().await.last_choice = choice;
        Ok(())
    }

    async fn custom_url(&self) -> Result<Option<String>> {
        Ok(self.state.lock().await.custom_url.clone())
    }

    async fn set_custom_url(&self, url: Option<&str>) -> Result<()> {
        self.state.lock().await.custom_url = url.map(str::to_string);
        Ok(())
    }

    async fn item_fragment(&self, id: u64) -> Result<Option<Fragment>> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn set_item_fragment(&self, id: u64, fragment: &Fragment) -> Result<()> {
        self.state.lock().await.items.insert(id, fragment.clone());
        Ok(())
    }

    async fn delete_item_fragment(&self, id: u64) -> Result<()> {
        self.state.lock().await.items.remove(&id);
        Ok(())
    }

    async fn mapped_ids(&self) -> Result<Vec<u64>> {
        Ok(self.state.lock().await.mapped.iter().copied().collect())
    }

    async fn add_mapped_id(&self, id: u64) -> Result<()> {
        self.state.lock().await.mapped.insert(id);
        Ok(())
    }

    async fn remove_mapped_id(&self, id: u64) -> Result<()> {
        self.state.lock().await.mapped.remove(&id);
        Ok(())
    }

    async fn schedule_enabled(&self) -> Result<bool> {
        Ok(self.state.lock().await.schedule_enabled)
    }

    async fn set_schedule_enabled(&self, enabled: bool) -> Result<()> {
        self.state.lock().await.schedule_enabled = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(html: &str) -> Fragment {
        Fragment {
            html: html.into(),
            source_url: "https://h.test/".into(),
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn registry_deduplicates() {
        let store = MemoryStore::new();
        store.add_mapped_id(7).await.unwrap();
        store.add_mapped_id(7).await.unwrap();
        store.add_mapped_id(3).await.unwrap();
        assert_eq!(store.mapped_ids().await.unwrap(), vec![3, 7]);
    }

    #[tokio::test]
    async fn registry_removal_is_idempotent() {
        let store = MemoryStore::new();
        store.add_mapped_id(7).await.unwrap();
        store.remove_mapped_id(7).await.unwrap();
        store.remove_mapped_id(7).await.unwrap();
        assert!(store.mapped_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn item_fragment_overwrites_in_place() {
        let store = MemoryStore::new();
        store.set_item_fragment(7, &fragment("<p>a</p>")).await.unwrap();
        store.set_item_fragment(7, &fragment("<p>b</p>")).await.unwrap();
        let stored = store.item_fragment(7).await.unwrap().unwrap();
        assert_eq!(stored.html, "<p>b</p>");
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.set_schedule_enabled(true).await.unwrap();
        assert!(store.schedule_enabled().await.unwrap());
    }
}
