use anyhow::Result;
use async_trait::async_trait;
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use super::models::{Row, TableName};

/// Read access to a row-oriented store.
///
/// Implementations must tolerate concurrent calls from many FUSE workers.
/// Every method reflects the store at the instant of the call; nothing is
/// promised about consistency between two calls.
#[cfg_attr(any(test, feature = "mockall"), automock)]
#[async_trait]
pub trait DataSource: Send + Sync {
    /// All table names, without duplicates.
    async fn list_tables(&self) -> Result<Vec<TableName>>;

    /// At most `limit` rows starting at position `offset`, in a stable but
    /// otherwise unspecified order. An unknown table is an error.
    async fn list_rows(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Row>>;

    /// Create a table whose columns are all text. Not used by the read path.
    async fn create_table(&self, table: &str, fields: &[String]) -> Result<()>;

    /// Release the underlying connections.
    async fn close(&self);
}
