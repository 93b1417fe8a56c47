use crate::error::{RegistryError, RegistryResult};
use crate::logic::registry::Registry;
use crate::model::{
    default_prefixes, BranchDescriptor, DatabaseRecord, DatabaseState, Descriptor, Prefixes,
};
use crate::store::traits::DatabaseStore;
use serde::Serialize;

/// A descriptor that has been checked against the registry, with the state
/// a new branch would copy from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRef {
    /// Canonical absolute text of the ref
    pub descriptor: String,
    pub head: Option<String>,
    pub prefixes: Prefixes,
}

/// Parse an origin field, echoing the original text on failure.
pub fn parse_origin(text: &str) -> RegistryResult<Descriptor> {
    Descriptor::parse(text).map_err(|_| RegistryError::BadOriginAbsoluteDescriptor {
        absolute_descriptor: text.to_string(),
    })
}

/// Parse an origin field relative to `context`, so `branch/<name>` or
/// `local/commit/<id>` name a ref in the context's database. Absolute text
/// is accepted too.
pub fn parse_origin_relative(text: &str, context: &Descriptor) -> RegistryResult<Descriptor> {
    Descriptor::parse_relative(text, context).map_err(|_| {
        RegistryError::BadOriginAbsoluteDescriptor {
            absolute_descriptor: text.to_string(),
        }
    })
}

/// Parse the path of a branch operation; only local branch descriptors qualify.
pub fn parse_branch_target(text: &str) -> RegistryResult<BranchDescriptor> {
    Descriptor::parse(text)
        .ok()
        .and_then(Descriptor::into_branch)
        .ok_or_else(|| RegistryError::BadTargetAbsoluteDescriptor {
            absolute_descriptor: text.to_string(),
        })
}

impl<S: DatabaseStore> Registry<S> {
    /// Resolve a parsed descriptor to a ref. Does not enter any exclusive
    /// section.
    pub async fn resolve(&self, descriptor: &Descriptor) -> RegistryResult<ResolvedRef> {
        let Some(database) = descriptor.database() else {
            return Err(RegistryError::BadOriginAbsoluteDescriptor {
                absolute_descriptor: descriptor.to_string(),
            });
        };

        let record = self
            .lookup(database)
            .await?
            .ok_or_else(|| RegistryError::unknown_origin_database(database))?;

        resolve_in_record(descriptor, &record)
    }

    /// Parse then resolve origin text.
    pub async fn resolve_origin(&self, text: &str) -> RegistryResult<ResolvedRef> {
        let descriptor = parse_origin(text)?;
        self.resolve(&descriptor).await
    }
}

/// Resolve `descriptor` against a record already in hand. The caller makes
/// sure the record belongs to the descriptor's database.
pub(crate) fn resolve_in_record(
    descriptor: &Descriptor,
    record: &DatabaseRecord,
) -> RegistryResult<ResolvedRef> {
    match record.state {
        DatabaseState::Active => {}
        DatabaseState::Deleting => {
            return Err(RegistryError::database_deleting(&record.descriptor()))
        }
        DatabaseState::Creating | DatabaseState::Deleted => {
            return Err(RegistryError::unknown_origin_database(&record.descriptor()))
        }
    }

    match descriptor {
        Descriptor::Organization(org) => Err(RegistryError::BadOriginAbsoluteDescriptor {
            absolute_descriptor: org.to_string(),
        }),
        Descriptor::Database(database) => {
            resolve_branch(&database.branch(&record.default_branch), record)
        }
        Descriptor::Branch(branch) => resolve_branch(branch, record),
        Descriptor::Commit(commit) => {
            if !record.commits.contains(&commit.commit_id) {
                return Err(RegistryError::UnknownOriginCommit {
                    organization_name: commit.database.organization_name.clone(),
                    database_name: commit.database.database_name.clone(),
                    commit_id: commit.commit_id.clone(),
                });
            }

            // Prefixes travel with branches; borrow them from any branch at this commit
            let prefixes = record
                .branches
                .values()
                .find(|branch| branch.head.as_deref() == Some(commit.commit_id.as_str()))
                .map(|branch| branch.prefixes.clone())
                .unwrap_or_else(default_prefixes);

            Ok(ResolvedRef {
                descriptor: commit.to_string(),
                head: Some(commit.commit_id.clone()),
                prefixes,
            })
        }
    }
}

fn resolve_branch(branch: &BranchDescriptor, record: &DatabaseRecord) -> RegistryResult<ResolvedRef> {
    let found = record
        .branches
        .get(&branch.branch_name)
        .ok_or_else(|| RegistryError::unknown_origin_branch(branch))?;

    Ok(ResolvedRef {
        descriptor: branch.to_string(),
        head: found.head.clone(),
        prefixes: found.prefixes.clone(),
    })
}
