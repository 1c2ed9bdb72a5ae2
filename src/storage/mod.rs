pub mod models;
pub mod pool;
pub mod sqlite;
pub mod traits;

pub use models::{Row, TableName};
pub use pool::DatabasePool;
pub use sqlite::SqliteSource;
#[cfg(any(test, feature = "mockall"))]
pub use traits::MockDataSource;
pub use traits::DataSource;
