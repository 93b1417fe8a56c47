use crate::model::{DatabaseDescriptor, DatabaseRecord};
use crate::store::traits::DatabaseStore;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process record store. Records are cloned in and out so callers never
/// hold a reference into the map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<DatabaseDescriptor, DatabaseRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl DatabaseStore for MemoryStore {
    async fn get_database(&self, descriptor: &DatabaseDescriptor) -> Result<Option<DatabaseRecord>> {
        let records = self.records.read().await;
        Ok(records.get(descriptor).cloned())
    }

    async fn list_databases(&self, organization_name: Option<&str>) -> Result<Vec<DatabaseRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<DatabaseRecord> = records
            .values()
            .filter(|record| organization_name.map_or(true, |org| record.organization_name == org))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (&a.organization_name, &a.database_name).cmp(&(&b.organization_name, &b.database_name))
        });
        Ok(matching)
    }

    async fn upsert_database(&self, record: DatabaseRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.descriptor(), record);
        Ok(())
    }

    async fn delete_database(&self, descriptor: &DatabaseDescriptor) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(descriptor).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DatabaseState;

    #[tokio::test]
    async fn test_upsert_replaces_whole_record() {
        let store = MemoryStore::new();
        let descriptor = DatabaseDescriptor::new("acme", "widgets").unwrap();

        let mut record = DatabaseRecord::new(&descriptor, None, None);
        store.upsert_database(record.clone()).await.unwrap();

        record.state = DatabaseState::Active;
        store.upsert_database(record.clone()).await.unwrap();

        let loaded = store.get_database(&descriptor).await.unwrap().unwrap();
        assert_eq!(loaded.state, DatabaseState::Active);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_organization() {
        let store = MemoryStore::new();
        for (org, db) in [("acme", "zeta"), ("acme", "alpha"), ("other", "beta")] {
            let descriptor = DatabaseDescriptor::new(org, db).unwrap();
            store
                .upsert_database(DatabaseRecord::new(&descriptor, None, None))
                .await
                .unwrap();
        }

        let acme = store.list_databases(Some("acme")).await.unwrap();
        let names: Vec<&str> = acme.iter().map(|r| r.database_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        assert_eq!(store.list_databases(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = MemoryStore::new();
        let descriptor = DatabaseDescriptor::new("acme", "widgets").unwrap();
        assert!(!store.delete_database(&descriptor).await.unwrap());

        store
            .upsert_database(DatabaseRecord::new(&descriptor, None, None))
            .await
            .unwrap();
        assert!(store.delete_database(&descriptor).await.unwrap());
        assert!(store.is_empty().await);
    }
}
