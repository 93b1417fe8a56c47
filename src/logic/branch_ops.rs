use crate::error::{RegistryError, RegistryResult};
use crate::logic::registry::Registry;
use crate::logic::resolve::{
    parse_branch_target, parse_origin, parse_origin_relative, resolve_in_record, ResolvedRef,
};
use crate::model::{
    default_prefixes, is_valid_name, Branch, BranchDescriptor, DatabaseDescriptor, Descriptor,
    Prefixes, UserContext,
};
use crate::store::traits::DatabaseStore;
use log::info;

impl<S: DatabaseStore> Registry<S> {
    /// Create the branch named by `target` (`org/db/local/branch/name`).
    ///
    /// The origin is parsed and resolved before the target is even looked
    /// at, so origin errors always win. The existence check and the insert
    /// happen in one exclusive section; at most one of several concurrent
    /// creators of the same name succeeds. An origin in the same database is
    /// re-resolved inside that section so the copied head is current.
    ///
    /// When the target is well formed, the origin may be relative to its
    /// database (`branch/main`, `local/commit/<id>`).
    ///
    /// Without an origin the branch starts empty. Without prefixes it
    /// inherits the origin's, or the defaults when there is no origin.
    pub async fn create_branch(
        &self,
        target: &str,
        origin: Option<&str>,
        prefixes: Option<Prefixes>,
        user: &UserContext,
    ) -> RegistryResult<Branch> {
        let origin: Option<(Descriptor, ResolvedRef)> = match origin {
            Some(text) => {
                let descriptor = match parse_branch_target(target) {
                    Ok(target) => parse_origin_relative(text, &Descriptor::Database(target.database))?,
                    Err(_) => parse_origin(text)?,
                };
                let resolved = self.resolve(&descriptor).await?;
                Some((descriptor, resolved))
            }
            None => None,
        };

        let target = parse_branch_target(target)?;
        let author = user.author();

        let branch = self
            .mutate(&target.database, |record| {
                if record.branches.contains_key(&target.branch_name) {
                    return Err(RegistryError::branch_already_exists(&target));
                }

                let resolved = match origin {
                    Some((descriptor, _)) if descriptor.database() == Some(&target.database) => {
                        Some(resolve_in_record(&descriptor, record)?)
                    }
                    Some((_, resolved)) => Some(resolved),
                    None => None,
                };

                let branch = match resolved {
                    Some(resolved) => Branch::new_from_origin(
                        target.branch_name.clone(),
                        resolved.head,
                        prefixes.unwrap_or(resolved.prefixes),
                        Some(resolved.descriptor),
                        author,
                    ),
                    None => Branch::new_from_origin(
                        target.branch_name.clone(),
                        None,
                        prefixes.unwrap_or_else(default_prefixes),
                        None,
                        author,
                    ),
                };

                // Copy in commits reachable from a foreign origin
                if let Some(head) = &branch.head {
                    record.commits.insert(head.clone());
                }
                record.branches.insert(branch.name.clone(), branch.clone());
                Ok(branch)
            })
            .await?;

        info!(
            "Created branch '{}' from {}",
            target,
            branch.origin.as_deref().unwrap_or("nothing")
        );
        Ok(branch)
    }

    /// Remove the branch named by `target`. Other branches, and the commits
    /// they point at, are untouched even when they share this branch's head.
    pub async fn delete_branch(&self, target: &str) -> RegistryResult<()> {
        let target = parse_branch_target(target)?;

        self.mutate(&target.database, |record| {
            record
                .branches
                .remove(&target.branch_name)
                .map(|_| ())
                .ok_or_else(|| RegistryError::unknown_branch(&target))
        })
        .await?;

        info!("Deleted branch '{}'", target);
        Ok(())
    }

    pub async fn get_branch(&self, target: &BranchDescriptor) -> RegistryResult<Branch> {
        let record = self.readable_record(&target.database).await?;
        record
            .branches
            .get(&target.branch_name)
            .cloned()
            .ok_or_else(|| RegistryError::unknown_branch(target))
    }

    pub async fn list_branches(&self, database: &DatabaseDescriptor) -> RegistryResult<Vec<Branch>> {
        let record = self.readable_record(database).await?;
        Ok(record.branches.into_values().collect())
    }

    /// Point `target` at `commit_id`. Called by the storage layer after it
    /// writes a commit; the id becomes addressable as
    /// `org/db/local/commit/<id>`.
    pub async fn set_branch_head(
        &self,
        target: &BranchDescriptor,
        commit_id: &str,
    ) -> RegistryResult<Branch> {
        if !is_valid_name(commit_id) {
            return Err(RegistryError::BadTargetAbsoluteDescriptor {
                absolute_descriptor: format!("{}/{}/commit/{}", target.database, target.scope.as_str(), commit_id),
            });
        }

        self.mutate(&target.database, |record| {
            let branch = record
                .branches
                .get_mut(&target.branch_name)
                .ok_or_else(|| RegistryError::unknown_branch(target))?;
            branch.head = Some(commit_id.to_string());
            let branch = branch.clone();
            record.commits.insert(commit_id.to_string());
            Ok(branch)
        })
        .await
    }
}
