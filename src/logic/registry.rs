use crate::error::{RegistryError, RegistryResult};
use crate::model::{DatabaseDescriptor, DatabaseRecord, DatabaseState};
use crate::store::traits::DatabaseStore;
use log::{error, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock map size above which idle entries are pruned.
const LOCK_MAP_PRUNE_THRESHOLD: usize = 1024;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Branch, remote and lifecycle operations over an injected record store.
///
/// Every mutation runs inside the exclusive section of its (organization,
/// database) key and ends with a single `upsert_database` of the whole
/// record. Reads go to the store directly and never wait on a section.
pub struct Registry<S> {
    store: Arc<S>,
    sections: parking_lot::Mutex<HashMap<DatabaseDescriptor, Arc<Mutex<()>>>>,
    lookup_timeout: Duration,
}

impl<S: DatabaseStore> Registry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_lookup_timeout(store, DEFAULT_LOOKUP_TIMEOUT)
    }

    pub fn with_lookup_timeout(store: Arc<S>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            sections: parking_lot::Mutex::new(HashMap::new()),
            lookup_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enter the exclusive section for `database`.
    pub(crate) async fn enter(&self, database: &DatabaseDescriptor) -> OwnedMutexGuard<()> {
        let section = {
            let mut sections = self.sections.lock();
            if sections.len() > LOCK_MAP_PRUNE_THRESHOLD {
                sections.retain(|_, section| Arc::strong_count(section) > 1);
            }
            sections.entry(database.clone()).or_default().clone()
        };
        section.lock_owned().await
    }

    /// Bounded lookup through the store. A timeout is reported as
    /// `LookupTimeout`, never as a missing database.
    pub(crate) async fn lookup(
        &self,
        database: &DatabaseDescriptor,
    ) -> RegistryResult<Option<DatabaseRecord>> {
        let record =
            match tokio::time::timeout(self.lookup_timeout, self.store.get_database(database)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!("Lookup of database '{}' timed out after {:?}", database, self.lookup_timeout);
                    return Err(RegistryError::lookup_timeout(database));
                }
            };

        if let Some(record) = &record {
            check_integrity(database, record)?;
        }
        Ok(record)
    }

    /// Bounded listing through the store. A timeout is reported as
    /// `LookupTimeout` against `org/*` (or `*/*` when unfiltered).
    pub(crate) async fn lookup_all(
        &self,
        organization_name: Option<&str>,
    ) -> RegistryResult<Vec<DatabaseRecord>> {
        match tokio::time::timeout(self.lookup_timeout, self.store.list_databases(organization_name))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => {
                let organization_name = organization_name.unwrap_or("*");
                warn!(
                    "Listing databases of '{}' timed out after {:?}",
                    organization_name, self.lookup_timeout
                );
                Err(RegistryError::LookupTimeout {
                    organization_name: organization_name.to_string(),
                    database_name: "*".to_string(),
                })
            }
        }
    }

    /// Look up a record that can be read from.
    pub(crate) async fn readable_record(
        &self,
        database: &DatabaseDescriptor,
    ) -> RegistryResult<DatabaseRecord> {
        let record = self
            .lookup(database)
            .await?
            .ok_or_else(|| RegistryError::unknown_database(database))?;

        match record.state {
            DatabaseState::Active => Ok(record),
            DatabaseState::Deleting => Err(RegistryError::database_deleting(database)),
            DatabaseState::Creating | DatabaseState::Deleted => {
                Err(RegistryError::unknown_database(database))
            }
        }
    }

    pub(crate) async fn persist(&self, record: DatabaseRecord) -> RegistryResult<()> {
        self.store.upsert_database(record).await?;
        Ok(())
    }

    /// Apply `change` to an active record inside its exclusive section and
    /// persist the result. Nothing is written when `change` fails.
    pub(crate) async fn mutate<T, F>(&self, database: &DatabaseDescriptor, change: F) -> RegistryResult<T>
    where
        F: FnOnce(&mut DatabaseRecord) -> RegistryResult<T> + Send,
        T: Send,
    {
        let _section = self.enter(database).await;
        let mut record = self.readable_record(database).await?;

        let output = change(&mut record)?;
        record.touch();
        self.persist(record).await?;
        Ok(output)
    }

    /// Move `record` to `next`, refusing transitions the lifecycle does not allow.
    pub(crate) fn transition(record: &mut DatabaseRecord, next: DatabaseState) -> RegistryResult<()> {
        if !record.state.can_transition_to(next) {
            let reason = format!(
                "illegal transition {:?} -> {:?} for '{}'",
                record.state,
                next,
                record.descriptor()
            );
            error!("{}", reason);
            return Err(RegistryError::Corrupted { reason });
        }
        record.state = next;
        record.touch();
        Ok(())
    }
}

fn check_integrity(database: &DatabaseDescriptor, record: &DatabaseRecord) -> RegistryResult<()> {
    if &record.descriptor() != database {
        let reason = format!(
            "record for '{}' stored under key '{}'",
            record.descriptor(),
            database
        );
        error!("{}", reason);
        return Err(RegistryError::Corrupted { reason });
    }

    if let Some((key, branch)) = record.branches.iter().find(|(key, branch)| *key != &branch.name) {
        let reason = format!(
            "branch '{}' stored under key '{}' in '{}'",
            branch.name, key, database
        );
        error!("{}", reason);
        return Err(RegistryError::Corrupted { reason });
    }

    if let Some((key, _)) = record
        .remotes
        .iter()
        .find(|(key, remote)| *key != &remote.remote_name)
    {
        let reason = format!("remote stored under mismatched key '{}' in '{}'", key, database);
        error!("{}", reason);
        return Err(RegistryError::Corrupted { reason });
    }

    Ok(())
}
