use crate::error::{RegistryError, RegistryResult};
use crate::logic::registry::Registry;
use crate::model::{Branch, DatabaseDescriptor, DatabaseRecord, DatabaseState, UserContext};
use crate::store::traits::DatabaseStore;
use log::{info, warn};
use serde::Serialize;

/// What `recover` had to clean up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryReport {
    pub abandoned_creations: usize,
    pub finished_deletions: usize,
}

impl<S: DatabaseStore> Registry<S> {
    /// Creating -> Active. The `Creating` record is written first so the slot
    /// is claimed before the initial branch is built.
    pub async fn create_database(
        &self,
        database: &DatabaseDescriptor,
        label: Option<String>,
        comment: Option<String>,
        user: &UserContext,
    ) -> RegistryResult<DatabaseRecord> {
        let _section = self.enter(database).await;

        if let Some(existing) = self.lookup(database).await? {
            if existing.state == DatabaseState::Deleting {
                return Err(RegistryError::database_deleting(database));
            }
            if existing.state.occupies_slot() {
                return Err(RegistryError::database_already_exists(database));
            }
        }

        let mut record = DatabaseRecord::new(database, label, comment);
        self.persist(record.clone()).await?;

        let main = Branch::new_main_branch(user.author());
        record.branches.insert(main.name.clone(), main);
        Self::transition(&mut record, DatabaseState::Active)?;
        self.persist(record.clone()).await?;

        info!("Created database '{}' ({})", database, record.id);
        Ok(record)
    }

    /// Delete a database. Missing databases are an error; databases already
    /// Deleting or Deleted are a successful no-op.
    pub async fn delete_database(&self, database: &DatabaseDescriptor) -> RegistryResult<()> {
        if self.mark_deleting(database).await? {
            self.finish_deletion(database).await?;
        }
        Ok(())
    }

    /// Active -> Deleting, persisted before any teardown. Returns whether
    /// the caller owns the teardown.
    pub async fn mark_deleting(&self, database: &DatabaseDescriptor) -> RegistryResult<bool> {
        let _section = self.enter(database).await;

        let mut record = self
            .lookup(database)
            .await?
            .ok_or_else(|| RegistryError::unknown_database(database))?;

        match record.state {
            DatabaseState::Deleting | DatabaseState::Deleted => {
                info!("Database '{}' already {:?}", database, record.state);
                Ok(false)
            }
            DatabaseState::Creating => {
                // Leftover from an interrupted creation; nothing to tear down
                record.clear_contents();
                Self::transition(&mut record, DatabaseState::Deleted)?;
                self.persist(record).await?;
                Ok(false)
            }
            DatabaseState::Active => {
                Self::transition(&mut record, DatabaseState::Deleting)?;
                self.persist(record).await?;
                info!("Database '{}' marked deleting", database);
                Ok(true)
            }
        }
    }

    /// Deleting -> Deleted: drop branches, remotes and the commit set.
    pub async fn finish_deletion(&self, database: &DatabaseDescriptor) -> RegistryResult<()> {
        let _section = self.enter(database).await;

        let Some(mut record) = self.lookup(database).await? else {
            return Ok(());
        };
        if record.state != DatabaseState::Deleting {
            return Ok(());
        }

        record.clear_contents();
        Self::transition(&mut record, DatabaseState::Deleted)?;
        self.persist(record).await?;

        info!("Deleted database '{}'", database);
        Ok(())
    }

    /// Fetch a database record in any state but `Deleted`.
    pub async fn get_database(&self, database: &DatabaseDescriptor) -> RegistryResult<DatabaseRecord> {
        match self.lookup(database).await? {
            Some(record) if record.state != DatabaseState::Deleted => Ok(record),
            _ => Err(RegistryError::unknown_database(database)),
        }
    }

    pub async fn list_databases(&self, organization_name: Option<&str>) -> RegistryResult<Vec<DatabaseRecord>> {
        let records = self.lookup_all(organization_name).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.state != DatabaseState::Deleted)
            .collect())
    }

    /// Finish transitions a previous process left half-way: drop records
    /// stuck in `Creating` and complete deletions stuck in `Deleting`.
    pub async fn recover(&self) -> RegistryResult<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for record in self.lookup_all(None).await? {
            let database = record.descriptor();
            match record.state {
                DatabaseState::Creating => {
                    let _section = self.enter(&database).await;
                    let still_creating = matches!(
                        self.lookup(&database).await?,
                        Some(current) if current.state == DatabaseState::Creating
                    );
                    if still_creating {
                        self.store().delete_database(&database).await?;
                        warn!("Removed database '{}' left in Creating", database);
                        report.abandoned_creations += 1;
                    }
                }
                DatabaseState::Deleting => {
                    self.finish_deletion(&database).await?;
                    warn!("Finished interrupted deletion of '{}'", database);
                    report.finished_deletions += 1;
                }
                DatabaseState::Active | DatabaseState::Deleted => {}
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::registry::tests::widgets;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn new_registry() -> (Arc<MemoryStore>, Registry<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Registry::new(store))
    }

    #[tokio::test]
    async fn test_create_database_builds_main() {
        let (_, registry) = new_registry();
        let record = registry
            .create_database(&widgets(), Some("Widgets".to_string()), None, &UserContext::system())
            .await
            .unwrap();

        assert_eq!(record.state, DatabaseState::Active);
        assert!(record.branches.contains_key("main"));
        assert_eq!(record.label.as_deref(), Some("Widgets"));

        assert!(matches!(
            registry
                .create_database(&widgets(), None, None, &UserContext::system())
                .await,
            Err(RegistryError::DatabaseAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_mutations_during_deleting_fail_with_state_error() {
        let (_, registry) = new_registry();
        let user = UserContext::system();
        registry.create_database(&widgets(), None, None, &user).await.unwrap();

        assert!(registry.mark_deleting(&widgets()).await.unwrap());

        let branch = registry
            .create_branch("acme/widgets/local/branch/late", None, None, &user)
            .await;
        assert!(matches!(branch, Err(RegistryError::DatabaseDeleting { .. })));

        let remote = registry
            .set_remote(&widgets(), "origin", "http://a.example/x")
            .await;
        assert!(matches!(remote, Err(RegistryError::DatabaseDeleting { .. })));

        let origin = registry.resolve_origin("acme/widgets").await;
        assert!(matches!(origin, Err(RegistryError::DatabaseDeleting { .. })));

        // A second deleter does not own the teardown
        assert!(!registry.mark_deleting(&widgets()).await.unwrap());
        registry.finish_deletion(&widgets()).await.unwrap();

        assert!(matches!(
            registry.get_database(&widgets()).await,
            Err(RegistryError::UnknownDatabase { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, registry) = new_registry();
        registry
            .create_database(&widgets(), None, None, &UserContext::system())
            .await
            .unwrap();
        registry
            .set_remote(&widgets(), "origin", "http://a.example/x")
            .await
            .unwrap();

        registry.delete_database(&widgets()).await.unwrap();
        registry.delete_database(&widgets()).await.unwrap();

        let tombstone = store.get_database(&widgets()).await.unwrap().unwrap();
        assert_eq!(tombstone.state, DatabaseState::Deleted);
        assert!(tombstone.branches.is_empty());
        assert!(tombstone.remotes.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_database() {
        let (_, registry) = new_registry();
        assert!(matches!(
            registry.delete_database(&widgets()).await,
            Err(RegistryError::UnknownDatabase { .. })
        ));
    }

    #[tokio::test]
    async fn test_recreate_after_delete_starts_fresh() {
        let (_, registry) = new_registry();
        let user = UserContext::system();
        let first = registry.create_database(&widgets(), None, None, &user).await.unwrap();
        registry
            .create_branch("acme/widgets/local/branch/dev", None, None, &user)
            .await
            .unwrap();
        registry.delete_database(&widgets()).await.unwrap();

        let second = registry.create_database(&widgets(), None, None, &user).await.unwrap();
        assert_ne!(first.id, second.id);
        let names: Vec<String> = registry
            .list_branches(&widgets())
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["main"]);
    }

    #[tokio::test]
    async fn test_create_while_deleting_is_rejected() {
        let (_, registry) = new_registry();
        let user = UserContext::system();
        registry.create_database(&widgets(), None, None, &user).await.unwrap();
        registry.mark_deleting(&widgets()).await.unwrap();

        assert!(matches!(
            registry.create_database(&widgets(), None, None, &user).await,
            Err(RegistryError::DatabaseDeleting { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_hides_deleted() {
        let (_, registry) = new_registry();
        let user = UserContext::system();
        let gadgets = DatabaseDescriptor::new("acme", "gadgets").unwrap();
        registry.create_database(&widgets(), None, None, &user).await.unwrap();
        registry.create_database(&gadgets, None, None, &user).await.unwrap();
        registry.delete_database(&gadgets).await.unwrap();

        let listed = registry.list_databases(Some("acme")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].database_name, "widgets");
    }

    #[tokio::test]
    async fn test_recover_finishes_interrupted_transitions() {
        let (store, registry) = new_registry();
        let user = UserContext::system();

        // Interrupted creation
        let stuck = DatabaseDescriptor::new("acme", "stuck").unwrap();
        store
            .upsert_database(DatabaseRecord::new(&stuck, None, None))
            .await
            .unwrap();

        // Interrupted deletion
        registry.create_database(&widgets(), None, None, &user).await.unwrap();
        registry.mark_deleting(&widgets()).await.unwrap();

        let report = registry.recover().await.unwrap();
        assert_eq!(
            report,
            RecoveryReport {
                abandoned_creations: 1,
                finished_deletions: 1
            }
        );

        assert!(store.get_database(&stuck).await.unwrap().is_none());
        let widgets_record = store.get_database(&widgets()).await.unwrap().unwrap();
        assert_eq!(widgets_record.state, DatabaseState::Deleted);

        // Nothing left to do the second time
        assert_eq!(registry.recover().await.unwrap(), RecoveryReport::default());
    }
}
