use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope tag that separates the database segments from the ref segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryScope {
    Local,
}

impl RepositoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryScope::Local => "local",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "local" => Some(RepositoryScope::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationDescriptor {
    pub organization_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    pub organization_name: String,
    pub database_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchDescriptor {
    pub database: DatabaseDescriptor,
    pub scope: RepositoryScope,
    pub branch_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitDescriptor {
    pub database: DatabaseDescriptor,
    pub scope: RepositoryScope,
    pub commit_id: String,
}

/// Any addressable entity in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Descriptor {
    Organization(OrganizationDescriptor),
    Database(DatabaseDescriptor),
    Branch(BranchDescriptor),
    Commit(CommitDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("bad absolute descriptor: {descriptor}")]
    BadAbsoluteDescriptor { descriptor: String },
    #[error("bad descriptor '{descriptor}' relative to '{context}'")]
    BadRelativeDescriptor { descriptor: String, context: String },
    #[error("bad name: '{name}'")]
    BadName { name: String },
}

/// Names must be non-empty, free of separators and whitespace, and must not
/// start with `_` (reserved for system graphs).
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('_')
        && !name.chars().any(|c| c == '/' || c.is_whitespace() || c.is_control())
}

impl OrganizationDescriptor {
    pub fn new(organization_name: &str) -> Result<Self, ParseError> {
        if !is_valid_name(organization_name) {
            return Err(ParseError::BadName {
                name: organization_name.to_string(),
            });
        }
        Ok(Self {
            organization_name: organization_name.to_string(),
        })
    }
}

impl DatabaseDescriptor {
    pub fn new(organization_name: &str, database_name: &str) -> Result<Self, ParseError> {
        for name in [organization_name, database_name] {
            if !is_valid_name(name) {
                return Err(ParseError::BadName {
                    name: name.to_string(),
                });
            }
        }
        Ok(Self {
            organization_name: organization_name.to_string(),
            database_name: database_name.to_string(),
        })
    }

    pub fn branch(&self, branch_name: &str) -> BranchDescriptor {
        BranchDescriptor {
            database: self.clone(),
            scope: RepositoryScope::Local,
            branch_name: branch_name.to_string(),
        }
    }
}

impl BranchDescriptor {
    pub fn organization_name(&self) -> &str {
        &self.database.organization_name
    }

    pub fn database_name(&self) -> &str {
        &self.database.database_name
    }
}

impl Descriptor {
    /// Parse an absolute descriptor. A single leading `/` is tolerated.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let bad = || ParseError::BadAbsoluteDescriptor {
            descriptor: text.to_string(),
        };

        let body = text.strip_prefix('/').unwrap_or(text);
        let segments: Vec<&str> = body.split('/').collect();
        if segments.iter().any(|s| !is_valid_name(s)) {
            return Err(bad());
        }

        match segments.as_slice() {
            [org, db] => Ok(Descriptor::Database(DatabaseDescriptor {
                organization_name: org.to_string(),
                database_name: db.to_string(),
            })),
            [org, db, scope, kind, name] => {
                let database = DatabaseDescriptor {
                    organization_name: org.to_string(),
                    database_name: db.to_string(),
                };
                let scope = RepositoryScope::from_segment(scope).ok_or_else(bad)?;
                ref_descriptor(database, scope, kind, name).ok_or_else(bad)
            }
            _ => Err(bad()),
        }
    }

    /// Parse `text` relative to `context`. Relative readings take precedence
    /// so that `branch/dev` is never mistaken for an `org/db` pair; anything
    /// that has no relative reading must be a valid absolute descriptor.
    pub fn parse_relative(text: &str, context: &Descriptor) -> Result<Self, ParseError> {
        if let Some(relative) = relative_descriptor(text, context) {
            return Ok(relative);
        }

        Descriptor::parse(text).map_err(|_| ParseError::BadRelativeDescriptor {
            descriptor: text.to_string(),
            context: context.to_string(),
        })
    }

    pub fn database(&self) -> Option<&DatabaseDescriptor> {
        match self {
            Descriptor::Organization(_) => None,
            Descriptor::Database(database) => Some(database),
            Descriptor::Branch(branch) => Some(&branch.database),
            Descriptor::Commit(commit) => Some(&commit.database),
        }
    }

    pub fn into_branch(self) -> Option<BranchDescriptor> {
        match self {
            Descriptor::Branch(branch) => Some(branch),
            _ => None,
        }
    }
}

fn relative_descriptor(text: &str, context: &Descriptor) -> Option<Descriptor> {
    let segments: Vec<&str> = text.split('/').collect();
    if segments.iter().any(|s| !is_valid_name(s)) {
        return None;
    }

    let (database, scope) = match context {
        Descriptor::Organization(org) => {
            return match segments.as_slice() {
                [db] => Some(Descriptor::Database(DatabaseDescriptor {
                    organization_name: org.organization_name.clone(),
                    database_name: db.to_string(),
                })),
                _ => None,
            };
        }
        Descriptor::Database(database) => (database.clone(), None),
        Descriptor::Branch(branch) => (branch.database.clone(), Some(branch.scope)),
        Descriptor::Commit(commit) => (commit.database.clone(), Some(commit.scope)),
    };

    match segments.as_slice() {
        [scope_segment, kind, name] if scope.is_none() => {
            let scope = RepositoryScope::from_segment(scope_segment)?;
            ref_descriptor(database, scope, kind, name)
        }
        [kind, name] => ref_descriptor(
            database,
            scope.unwrap_or(RepositoryScope::Local),
            kind,
            name,
        ),
        _ => None,
    }
}

fn ref_descriptor(
    database: DatabaseDescriptor,
    scope: RepositoryScope,
    kind: &str,
    name: &str,
) -> Option<Descriptor> {
    match kind {
        "branch" => Some(Descriptor::Branch(BranchDescriptor {
            database,
            scope,
            branch_name: name.to_string(),
        })),
        "commit" => Some(Descriptor::Commit(CommitDescriptor {
            database,
            scope,
            commit_id: name.to_string(),
        })),
        _ => None,
    }
}

impl fmt::Display for OrganizationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.organization_name)
    }
}

impl fmt::Display for DatabaseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization_name, self.database_name)
    }
}

impl fmt::Display for BranchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/branch/{}",
            self.database,
            self.scope.as_str(),
            self.branch_name
        )
    }
}

impl fmt::Display for CommitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/commit/{}",
            self.database,
            self.scope.as_str(),
            self.commit_id
        )
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Organization(d) => d.fmt(f),
            Descriptor::Database(d) => d.fmt(f),
            Descriptor::Branch(d) => d.fmt(f),
            Descriptor::Commit(d) => d.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> DatabaseDescriptor {
        DatabaseDescriptor::new("acme", "widgets").unwrap()
    }

    #[test]
    fn test_parse_branch_descriptor() {
        let parsed = Descriptor::parse("acme/widgets/local/branch/main").unwrap();
        assert_eq!(parsed, Descriptor::Branch(widgets().branch("main")));

        // Leading slash is accepted and the canonical form drops it
        let parsed = Descriptor::parse("/acme/widgets/local/branch/main").unwrap();
        assert_eq!(parsed.to_string(), "acme/widgets/local/branch/main");
    }

    #[test]
    fn test_parse_database_and_commit_descriptors() {
        assert_eq!(
            Descriptor::parse("acme/widgets").unwrap(),
            Descriptor::Database(widgets())
        );

        match Descriptor::parse("acme/widgets/local/commit/c0ffee").unwrap() {
            Descriptor::Commit(commit) => {
                assert_eq!(commit.database, widgets());
                assert_eq!(commit.commit_id, "c0ffee");
            }
            other => panic!("expected commit descriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_absolute_descriptors_echo_text() {
        for text in [
            "desc-abc123",
            "acme/widgets/local",
            "acme/widgets/local/branch",
            "acme/widgets/remote/branch/main",
            "acme/widgets/local/tag/v1",
            "acme//widgets",
            "acme/widgets/",
            "acme/widgets/local/branch/main/extra",
            "acme/_system",
            "",
        ] {
            assert_eq!(
                Descriptor::parse(text),
                Err(ParseError::BadAbsoluteDescriptor {
                    descriptor: text.to_string()
                }),
                "'{}' should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_parse_relative_to_database() {
        let context = Descriptor::Database(widgets());
        assert_eq!(
            Descriptor::parse_relative("local/branch/dev", &context).unwrap(),
            Descriptor::Branch(widgets().branch("dev"))
        );
        assert_eq!(
            Descriptor::parse_relative("branch/dev", &context).unwrap(),
            Descriptor::Branch(widgets().branch("dev"))
        );
        assert!(Descriptor::parse_relative("dev", &context).is_err());
    }

    #[test]
    fn test_parse_relative_to_branch_and_organization() {
        let context = Descriptor::Branch(widgets().branch("main"));
        match Descriptor::parse_relative("commit/abc", &context).unwrap() {
            Descriptor::Commit(commit) => assert_eq!(commit.commit_id, "abc"),
            other => panic!("expected commit descriptor, got {:?}", other),
        }

        // Absolute text wins over the context
        assert_eq!(
            Descriptor::parse_relative("other/db", &context).unwrap().to_string(),
            "other/db"
        );

        let org = Descriptor::Organization(OrganizationDescriptor::new("acme").unwrap());
        assert_eq!(
            Descriptor::parse_relative("widgets", &org).unwrap(),
            Descriptor::Database(widgets())
        );
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("feature-1"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("_meta"));
        assert!(!is_valid_name("has space"));
        assert!(DatabaseDescriptor::new("acme", "a/b").is_err());
        assert!(OrganizationDescriptor::new("").is_err());
    }
}
