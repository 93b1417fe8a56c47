use crate::model::{generate_id, DatabaseDescriptor, Id};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_BRANCH_NAME: &str = "main";

/// Namespace prefix → IRI.
pub type Prefixes = BTreeMap<String, String>;

pub fn default_prefixes() -> Prefixes {
    let mut prefixes = Prefixes::new();
    prefixes.insert("@base".to_string(), "terminusdb:///data/".to_string());
    prefixes.insert("@schema".to_string(), "terminusdb:///schema#".to_string());
    prefixes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseState {
    Creating, // Record reserved, initial branch not yet built
    Active,
    Deleting, // Visible to every caller before teardown starts
    Deleted,  // Tombstone; the slot may be reused
}

impl DatabaseState {
    /// Whether the (org, name) slot is taken by this record.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, DatabaseState::Creating | DatabaseState::Active)
    }

    pub fn can_transition_to(&self, next: DatabaseState) -> bool {
        use DatabaseState::*;
        matches!(
            (self, next),
            (Creating, Active) | (Active, Deleting) | (Deleting, Deleted) | (Creating, Deleted)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Commit the branch points at; `None` until the first commit.
    pub head: Option<String>,
    pub prefixes: Prefixes,
    /// Canonical descriptor of the ref this branch was created from
    pub origin: Option<String>,
    pub author: Option<String>,
    pub created_at: String, // ISO 8601 timestamp
}

impl Branch {
    pub fn new_main_branch(author: Option<String>) -> Self {
        Self {
            name: DEFAULT_BRANCH_NAME.to_string(),
            head: None,
            prefixes: default_prefixes(),
            origin: None,
            author,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn new_from_origin(
        name: String,
        head: Option<String>,
        prefixes: Prefixes,
        origin: Option<String>,
        author: Option<String>,
    ) -> Self {
        Self {
            name,
            head,
            prefixes,
            origin,
            author,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub remote_name: String,
    pub remote_location: String,
    pub updated_at: String,
}

impl RemoteEntry {
    pub fn new(remote_name: String, remote_location: String) -> Self {
        Self {
            remote_name,
            remote_location,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Everything the registry knows about one database incarnation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub id: Id,
    pub organization_name: String,
    pub database_name: String,
    pub label: Option<String>,
    pub comment: Option<String>,
    pub state: DatabaseState,
    pub default_branch: String,
    pub branches: BTreeMap<String, Branch>,
    pub remotes: BTreeMap<String, RemoteEntry>,
    /// Commit ids that have been a branch head in this database
    #[serde(default)]
    pub commits: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DatabaseRecord {
    pub fn new(descriptor: &DatabaseDescriptor, label: Option<String>, comment: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: generate_id(),
            organization_name: descriptor.organization_name.clone(),
            database_name: descriptor.database_name.clone(),
            label,
            comment,
            state: DatabaseState::Creating,
            default_branch: DEFAULT_BRANCH_NAME.to_string(),
            branches: BTreeMap::new(),
            remotes: BTreeMap::new(),
            commits: BTreeSet::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn descriptor(&self) -> DatabaseDescriptor {
        DatabaseDescriptor {
            organization_name: self.organization_name.clone(),
            database_name: self.database_name.clone(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn remote_names(&self) -> Vec<String> {
        self.remotes.keys().cloned().collect()
    }

    /// Drop everything hanging off the record; the storage layer reclaims
    /// unreferenced layers on its own.
    pub fn clear_contents(&mut self) {
        self.branches.clear();
        self.remotes.clear();
        self.commits.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_creating() {
        let descriptor = DatabaseDescriptor::new("acme", "widgets").unwrap();
        let record = DatabaseRecord::new(&descriptor, Some("Widgets".to_string()), None);

        assert_eq!(record.state, DatabaseState::Creating);
        assert_eq!(record.default_branch, "main");
        assert!(record.branches.is_empty());
        assert_eq!(record.descriptor(), descriptor);

        // Each incarnation gets its own id
        let again = DatabaseRecord::new(&descriptor, None, None);
        assert_ne!(record.id, again.id);
    }

    #[test]
    fn test_state_transitions() {
        use DatabaseState::*;
        assert!(Creating.can_transition_to(Active));
        assert!(Active.can_transition_to(Deleting));
        assert!(Deleting.can_transition_to(Deleted));
        assert!(!Deleted.can_transition_to(Active));
        assert!(!Active.can_transition_to(Deleted));

        assert!(Creating.occupies_slot());
        assert!(Active.occupies_slot());
        assert!(!Deleting.occupies_slot());
        assert!(!Deleted.occupies_slot());
    }

    #[test]
    fn test_record_json_without_commits_field() {
        // Records written before the commit set existed still load
        let descriptor = DatabaseDescriptor::new("acme", "widgets").unwrap();
        let record = DatabaseRecord::new(&descriptor, None, None);
        let mut json = serde_json::to_value(&record).unwrap();
        json.as_object_mut().unwrap().remove("commits");

        let parsed: DatabaseRecord = serde_json::from_value(json).unwrap();
        assert!(parsed.commits.is_empty());
        assert_eq!(parsed.state, DatabaseState::Creating);
    }
}
