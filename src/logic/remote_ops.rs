use crate::error::{RegistryError, RegistryResult};
use crate::logic::registry::Registry;
use crate::model::{is_valid_name, DatabaseDescriptor, RemoteEntry};
use crate::store::traits::DatabaseStore;
use log::info;
use serde::Serialize;

/// Result of a remote read: one entry when a name was given, otherwise the
/// full listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RemoteLookup {
    One(RemoteEntry),
    All {
        remote_names: Vec<String>,
        remotes: Vec<RemoteEntry>,
    },
}

fn validate_remote(remote_name: &str, remote_location: &str) -> RegistryResult<()> {
    if !is_valid_name(remote_name) {
        return Err(RegistryError::BadRemoteName {
            remote_name: remote_name.to_string(),
        });
    }
    if url::Url::parse(remote_location).is_err() {
        return Err(RegistryError::BadRemoteLocation {
            remote_location: remote_location.to_string(),
        });
    }
    Ok(())
}

impl<S: DatabaseStore> Registry<S> {
    /// Register `remote_name` unless it is already known; an existing entry
    /// is returned unchanged.
    pub async fn add_remote(
        &self,
        database: &DatabaseDescriptor,
        remote_name: &str,
        remote_location: &str,
    ) -> RegistryResult<RemoteEntry> {
        validate_remote(remote_name, remote_location)?;

        self.mutate(database, |record| {
            let entry = record
                .remotes
                .entry(remote_name.to_string())
                .or_insert_with(|| RemoteEntry::new(remote_name.to_string(), remote_location.to_string()));
            Ok(entry.clone())
        })
        .await
    }

    /// Upsert: create on first use, overwrite the location afterwards.
    pub async fn set_remote(
        &self,
        database: &DatabaseDescriptor,
        remote_name: &str,
        remote_location: &str,
    ) -> RegistryResult<RemoteEntry> {
        validate_remote(remote_name, remote_location)?;

        let entry = self
            .mutate(database, |record| {
                let entry = RemoteEntry::new(remote_name.to_string(), remote_location.to_string());
                record.remotes.insert(remote_name.to_string(), entry.clone());
                Ok(entry)
            })
            .await?;

        info!("Remote '{}' of '{}' set to {}", remote_name, database, remote_location);
        Ok(entry)
    }

    pub async fn get_remote(
        &self,
        database: &DatabaseDescriptor,
        remote_name: Option<&str>,
    ) -> RegistryResult<RemoteLookup> {
        let record = self.readable_record(database).await?;

        match remote_name {
            Some(name) => record
                .remotes
                .get(name)
                .cloned()
                .map(RemoteLookup::One)
                .ok_or_else(|| RegistryError::unknown_remote(database, name)),
            None => Ok(RemoteLookup::All {
                remote_names: record.remote_names(),
                remotes: record.remotes.into_values().collect(),
            }),
        }
    }

    pub async fn delete_remote(&self, database: &DatabaseDescriptor, remote_name: &str) -> RegistryResult<()> {
        self.mutate(database, |record| {
            record
                .remotes
                .remove(remote_name)
                .map(|_| ())
                .ok_or_else(|| RegistryError::unknown_remote(database, remote_name))
        })
        .await?;

        info!("Removed remote '{}' from '{}'", remote_name, database);
        Ok(())
    }
}
