use crate::model::{BranchDescriptor, DatabaseDescriptor};

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input; the client must fix it
    Syntactic,
    /// Points at something that does not exist
    Referential,
    /// Name already taken
    Conflict,
    /// Target database is mid-deletion; retry after backoff
    State,
    /// Collaborator failure or timeout; retry after backoff
    Transient,
    /// Registry invariant broken; never retried
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("bad origin absolute descriptor: {absolute_descriptor}")]
    BadOriginAbsoluteDescriptor { absolute_descriptor: String },

    #[error("bad target absolute descriptor: {absolute_descriptor}")]
    BadTargetAbsoluteDescriptor { absolute_descriptor: String },

    #[error("bad request body: {reason}")]
    BadRequestBody { reason: String },

    #[error("bad database name: {organization_name}/{database_name}")]
    BadDatabaseName {
        organization_name: String,
        database_name: String,
    },

    #[error("unknown origin database: {organization_name}/{database_name}")]
    UnknownOriginDatabase {
        organization_name: String,
        database_name: String,
    },

    #[error("unknown origin branch '{branch_name}' in {organization_name}/{database_name}")]
    UnknownOriginBranch {
        organization_name: String,
        database_name: String,
        branch_name: String,
    },

    #[error("unknown origin commit '{commit_id}' in {organization_name}/{database_name}")]
    UnknownOriginCommit {
        organization_name: String,
        database_name: String,
        commit_id: String,
    },

    #[error("unknown database: {organization_name}/{database_name}")]
    UnknownDatabase {
        organization_name: String,
        database_name: String,
    },

    #[error("branch '{branch_name}' already exists in {organization_name}/{database_name}")]
    BranchAlreadyExists {
        organization_name: String,
        database_name: String,
        branch_name: String,
    },

    #[error("unknown branch '{branch_name}' in {organization_name}/{database_name}")]
    UnknownBranch {
        organization_name: String,
        database_name: String,
        branch_name: String,
    },

    #[error("bad remote name: '{remote_name}'")]
    BadRemoteName { remote_name: String },

    #[error("bad remote location: '{remote_location}'")]
    BadRemoteLocation { remote_location: String },

    #[error("unknown remote '{remote_name}' in {organization_name}/{database_name}")]
    UnknownRemote {
        organization_name: String,
        database_name: String,
        remote_name: String,
    },

    #[error("database already exists: {organization_name}/{database_name}")]
    DatabaseAlreadyExists {
        organization_name: String,
        database_name: String,
    },

    #[error("database is being deleted: {organization_name}/{database_name}")]
    DatabaseDeleting {
        organization_name: String,
        database_name: String,
    },

    #[error("database lookup timed out: {organization_name}/{database_name}")]
    LookupTimeout {
        organization_name: String,
        database_name: String,
    },

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("registry corrupted: {reason}")]
    Corrupted { reason: String },
}

impl RegistryError {
    pub fn class(&self) -> ErrorClass {
        use RegistryError::*;
        match self {
            BadOriginAbsoluteDescriptor { .. }
            | BadTargetAbsoluteDescriptor { .. }
            | BadRequestBody { .. }
            | BadDatabaseName { .. }
            | BadRemoteName { .. }
            | BadRemoteLocation { .. } => ErrorClass::Syntactic,
            UnknownOriginDatabase { .. }
            | UnknownOriginBranch { .. }
            | UnknownOriginCommit { .. }
            | UnknownDatabase { .. }
            | UnknownBranch { .. }
            | UnknownRemote { .. } => ErrorClass::Referential,
            BranchAlreadyExists { .. } | DatabaseAlreadyExists { .. } => ErrorClass::Conflict,
            DatabaseDeleting { .. } => ErrorClass::State,
            LookupTimeout { .. } | Storage(_) => ErrorClass::Transient,
            Corrupted { .. } => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::State | ErrorClass::Transient)
    }

    /// Type tag rendered as `@type` in the `api:error` body.
    pub fn kind(&self) -> &'static str {
        use RegistryError::*;
        match self {
            BadOriginAbsoluteDescriptor { .. } => "BadOriginAbsoluteDescriptor",
            BadTargetAbsoluteDescriptor { .. } => "BadTargetAbsoluteDescriptor",
            BadRequestBody { .. } => "BadRequestBody",
            BadDatabaseName { .. } => "BadDatabaseName",
            UnknownOriginDatabase { .. } => "UnknownOriginDatabase",
            UnknownOriginBranch { .. } => "UnknownOriginBranch",
            UnknownOriginCommit { .. } => "UnknownOriginCommit",
            UnknownDatabase { .. } => "UnknownDatabase",
            BranchAlreadyExists { .. } => "BranchAlreadyExists",
            UnknownBranch { .. } => "UnknownBranch",
            BadRemoteName { .. } => "BadRemoteName",
            BadRemoteLocation { .. } => "BadRemoteLocation",
            UnknownRemote { .. } => "UnknownRemote",
            DatabaseAlreadyExists { .. } => "DatabaseAlreadyExists",
            DatabaseDeleting { .. } => "DatabaseDeleting",
            LookupTimeout { .. } => "LookupTimeout",
            Storage(_) => "StorageFailure",
            Corrupted { .. } => "RegistryCorrupted",
        }
    }

    pub fn unknown_database(database: &DatabaseDescriptor) -> Self {
        RegistryError::UnknownDatabase {
            organization_name: database.organization_name.clone(),
            database_name: database.database_name.clone(),
        }
    }

    pub fn unknown_origin_database(database: &DatabaseDescriptor) -> Self {
        RegistryError::UnknownOriginDatabase {
            organization_name: database.organization_name.clone(),
            database_name: database.database_name.clone(),
        }
    }

    pub fn database_deleting(database: &DatabaseDescriptor) -> Self {
        RegistryError::DatabaseDeleting {
            organization_name: database.organization_name.clone(),
            database_name: database.database_name.clone(),
        }
    }

    pub fn database_already_exists(database: &DatabaseDescriptor) -> Self {
        RegistryError::DatabaseAlreadyExists {
            organization_name: database.organization_name.clone(),
            database_name: database.database_name.clone(),
        }
    }

    pub fn lookup_timeout(database: &DatabaseDescriptor) -> Self {
        RegistryError::LookupTimeout {
            organization_name: database.organization_name.clone(),
            database_name: database.database_name.clone(),
        }
    }

    pub fn unknown_origin_branch(branch: &BranchDescriptor) -> Self {
        RegistryError::UnknownOriginBranch {
            organization_name: branch.organization_name().to_string(),
            database_name: branch.database_name().to_string(),
            branch_name: branch.branch_name.clone(),
        }
    }

    pub fn branch_already_exists(branch: &BranchDescriptor) -> Self {
        RegistryError::BranchAlreadyExists {
            organization_name: branch.organization_name().to_string(),
            database_name: branch.database_name().to_string(),
            branch_name: branch.branch_name.clone(),
        }
    }

    pub fn unknown_branch(branch: &BranchDescriptor) -> Self {
        RegistryError::UnknownBranch {
            organization_name: branch.organization_name().to_string(),
            database_name: branch.database_name().to_string(),
            branch_name: branch.branch_name.clone(),
        }
    }

    pub fn unknown_remote(database: &DatabaseDescriptor, remote_name: &str) -> Self {
        RegistryError::UnknownRemote {
            organization_name: database.organization_name.clone(),
            database_name: database.database_name.clone(),
            remote_name: remote_name.to_string(),
        }
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
