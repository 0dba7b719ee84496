//! In-memory registry driver.

use std::collections::HashMap;

use tokio::sync::RwLock;
use vestibule_protocol::RoomId;

use crate::{Driver, QueryConditions, RegistryError, RoomListing, SortSpec};

/// In-memory [`Driver`] for single-node deployments and tests.
///
/// A single `RwLock<HashMap>` gives linearizable per-listing updates;
/// queries scan under the read lock.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    listings: RwLock<HashMap<RoomId, RoomListing>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of persisted listings. Diagnostics only.
    pub async fn len(&self) -> usize {
        self.listings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.listings.read().await.is_empty()
    }
}

impl Driver for MemoryDriver {
    async fn create_instance(&self, initial: RoomListing) -> Result<RoomListing, RegistryError> {
        // Buffered: nothing is stored until the first save.
        Ok(initial)
    }

    async fn find(&self, conditions: &QueryConditions) -> Result<Vec<RoomListing>, RegistryError> {
        Ok(self
            .listings
            .read()
            .await
            .values()
            .filter(|listing| conditions.matches(listing))
            .cloned()
            .collect())
    }

    async fn find_one(
        &self,
        conditions: &QueryConditions,
        sort: Option<&SortSpec>,
    ) -> Result<Option<RoomListing>, RegistryError> {
        let listings = self.listings.read().await;
        let mut candidates: Vec<&RoomListing> = listings
            .values()
            .filter(|listing| conditions.matches(listing))
            .collect();
        if let Some(sort) = sort {
            candidates.sort_by(|a, b| sort.compare(a, b));
        }
        Ok(candidates.first().map(|listing| (*listing).clone()))
    }

    async fn find_by_id(&self, room_id: &RoomId) -> Result<Option<RoomListing>, RegistryError> {
        Ok(self.listings.read().await.get(room_id).cloned())
    }

    async fn save(&self, listing: &RoomListing) -> Result<(), RegistryError> {
        self.listings
            .write()
            .await
            .insert(listing.room_id.clone(), listing.clone());
        Ok(())
    }

    async fn remove(&self, room_id: &RoomId) -> Result<(), RegistryError> {
        self.listings.write().await.remove(room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vestibule_protocol::ProcessId;

    fn listing(id: &str, clients: u32) -> RoomListing {
        let mut l = RoomListing::new(RoomId::new(id), "battle", ProcessId::new("p1"));
        l.max_clients = 4;
        l.clients = clients;
        l
    }

    #[tokio::test]
    async fn test_create_instance_is_not_visible_until_saved() {
        let driver = MemoryDriver::new();
        let instance = driver.create_instance(listing("r1", 0)).await.unwrap();

        assert!(driver.find_by_id(&instance.room_id).await.unwrap().is_none());

        driver.save(&instance).await.unwrap();
        assert!(driver.find_by_id(&instance.room_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_filters_by_conditions() {
        let driver = MemoryDriver::new();
        driver.save(&listing("r1", 0)).await.unwrap();
        let mut locked = listing("r2", 2);
        locked.locked = true;
        driver.save(&locked).await.unwrap();

        let open = driver
            .find(&QueryConditions::new().with("locked", false))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].room_id, RoomId::new("r1"));
    }

    #[tokio::test]
    async fn test_find_one_respects_sort() {
        let driver = MemoryDriver::new();
        driver.save(&listing("empty", 0)).await.unwrap();
        driver.save(&listing("busy", 3)).await.unwrap();

        let fullest = driver
            .find_one(&QueryConditions::new(), Some(&SortSpec::desc("clients")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fullest.room_id, RoomId::new("busy"));

        let emptiest = driver
            .find_one(&QueryConditions::new(), Some(&SortSpec::asc("clients")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(emptiest.room_id, RoomId::new("empty"));
    }

    #[tokio::test]
    async fn test_find_one_none_when_nothing_matches() {
        let driver = MemoryDriver::new();
        driver.save(&listing("r1", 0)).await.unwrap();

        let result = driver
            .find_one(&QueryConditions::new().with("name", "chess"), None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_listing() {
        let driver = MemoryDriver::new();
        let mut l = listing("r1", 0);
        driver.save(&l).await.unwrap();

        l.clients = 3;
        l.metadata.insert("mode".into(), json!("ranked"));
        driver.save(&l).await.unwrap();

        let stored = driver.find_by_id(&l.room_id).await.unwrap().unwrap();
        assert_eq!(stored.clients, 3);
        assert_eq!(stored.metadata["mode"], json!("ranked"));
        assert_eq!(driver.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let driver = MemoryDriver::new();
        let l = listing("r1", 0);
        driver.save(&l).await.unwrap();

        driver.remove(&l.room_id).await.unwrap();
        driver.remove(&l.room_id).await.unwrap();

        assert!(driver.is_empty().await);
    }
}
