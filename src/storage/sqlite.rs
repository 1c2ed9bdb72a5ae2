use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row as _, TypeInfo, ValueRef};

use super::models::{Row, TableName};
use super::traits::DataSource;

/// DataSource over a SQLite database.
///
/// The pool is cheap to clone and caps how many backend queries run at once.
#[derive(Clone)]
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn list_tables(&self) -> Result<Vec<TableName>> {
        let tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND substr(name, 1, 7) != 'sqlite_'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tables")?;

        tracing::debug!(count = tables.len(), "Listed tables");

        Ok(tables)
    }

    async fn list_rows(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Row>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT * FROM {} LIMIT ? OFFSET ?", quote_identifier(table));
        let rows = sqlx::query(&sql)
            .bind(clamp_to_i64(limit))
            .bind(clamp_to_i64(offset))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list rows of table {table}"))?;

        tracing::debug!(table, offset, limit, count = rows.len(), "Listed rows");

        rows.iter()
            .map(|row| {
                decode_row(row).with_context(|| format!("Failed to decode row of table {table}"))
            })
            .collect()
    }

    async fn create_table(&self, table: &str, fields: &[String]) -> Result<()> {
        if fields.is_empty() {
            anyhow::bail!("Table {table} needs at least one field");
        }

        let columns = fields
            .iter()
            .map(|field| format!("{} TEXT", quote_identifier(field)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("CREATE TABLE {} ({})", quote_identifier(table), columns);

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create table {table}"))?;

        tracing::info!(table, fields = fields.len(), "Created table");

        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite source closed");
    }
}

/// Quote an identifier for interpolation into SQL, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn decode_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    (0..row.len()).map(|index| decode_field(row, index)).collect::<Result<Vec<_>, _>>().map(Row::new)
}

/// Render one column as text using the value's runtime storage class.
fn decode_field(row: &SqliteRow, index: usize) -> Result<String, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(String::new());
    }

    let storage_class = raw.type_info().name().to_string();
    let field = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index)?.to_string(),
        "REAL" => row.try_get_unchecked::<f64, _>(index)?.to_string(),
        "BLOB" => String::from_utf8_lossy(&row.try_get_unchecked::<Vec<u8>, _>(index)?).into_owned(),
        _ => row.try_get_unchecked::<String, _>(index)?,
    };

    Ok(field)
}
