use crate::model::{DatabaseDescriptor, DatabaseRecord};
use anyhow::Result;

/// Persistence capability for registry records. Doubles as the database
/// lookup collaborator: `get_database` reports existence and lifecycle state.
///
/// `upsert_database` must replace the whole record in one atomic write; the
/// registry relies on it to never expose a half-applied mutation.
#[async_trait::async_trait]
pub trait DatabaseStore: Send + Sync {
    async fn get_database(&self, descriptor: &DatabaseDescriptor) -> Result<Option<DatabaseRecord>>;
    /// List records, optionally restricted to one organization, ordered by name.
    async fn list_databases(&self, organization_name: Option<&str>) -> Result<Vec<DatabaseRecord>>;
    async fn upsert_database(&self, record: DatabaseRecord) -> Result<()>;
    async fn delete_database(&self, descriptor: &DatabaseDescriptor) -> Result<bool>;
}
