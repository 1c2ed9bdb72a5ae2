use anyhow::Result;
use rowfs::config::DatabaseConfig;
use rowfs::storage::{DataSource, DatabasePool, Row, SqliteSource};
use tempfile::TempDir;

async fn setup_test_db() -> Result<(TempDir, DatabasePool, SqliteSource)> {
    let dir = tempfile::tempdir()?;
    let config = DatabaseConfig {
        path: dir.path().join("test.db"),
        max_connections: 4,
        min_connections: 1,
        acquire_timeout_secs: 5,
        create_if_missing: true,
    };

    let pool = DatabasePool::new(&config).await?;
    let source = SqliteSource::new(pool.pool().clone());
    Ok((dir, pool, source))
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_empty_database_has_no_tables() -> Result<()> {
    let (_dir, pool, source) = setup_test_db().await?;
    pool.health_check().await?;
    assert!(source.list_tables().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_and_list_tables() -> Result<()> {
    let (_dir, _pool, source) = setup_test_db().await?;

    source.create_table("foo", &fields(&["id", "name"])).await?;
    source.create_table("bar", &fields(&["x"])).await?;

    assert_eq!(source.list_tables().await?, vec!["bar".to_string(), "foo".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_internal_tables_are_hidden() -> Result<()> {
    let (_dir, pool, source) = setup_test_db().await?;

    // AUTOINCREMENT makes SQLite create sqlite_sequence.
    sqlx::query("CREATE TABLE counters (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)")
        .execute(pool.pool())
        .await?;
    sqlx::query("INSERT INTO counters (v) VALUES ('a')").execute(pool.pool()).await?;

    assert_eq!(source.list_tables().await?, vec!["counters".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_create_table_requires_fields() -> Result<()> {
    let (_dir, _pool, source) = setup_test_db().await?;
    assert!(source.create_table("empty", &[]).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_list_rows_offset_and_limit() -> Result<()> {
    let (_dir, pool, source) = setup_test_db().await?;
    source.create_table("foo", &fields(&["id", "name"])).await?;
    for (id, name) in [("1", "a"), ("2", "b"), ("3", "c")] {
        sqlx::query("INSERT INTO foo VALUES (?, ?)").bind(id).bind(name).execute(pool.pool()).await?;
    }

    let all = source.list_rows("foo", 0, 10).await?;
    assert_eq!(all, vec![Row::from(["1", "a"]), Row::from(["2", "b"]), Row::from(["3", "c"])]);

    assert_eq!(source.list_rows("foo", 1, 1).await?, vec![Row::from(["2", "b"])]);
    assert_eq!(source.list_rows("foo", 2, 5).await?, vec![Row::from(["3", "c"])]);
    assert!(source.list_rows("foo", 3, 1).await?.is_empty());
    assert!(source.list_rows("foo", 0, 0).await?.is_empty());
    assert!(source.list_rows("foo", u64::MAX, 1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_list_rows_renders_storage_classes() -> Result<()> {
    let (_dir, pool, source) = setup_test_db().await?;
    sqlx::query("CREATE TABLE mixed (i INTEGER, r REAL, t TEXT, b BLOB, n TEXT)")
        .execute(pool.pool())
        .await?;
    sqlx::query("INSERT INTO mixed VALUES (42, 1.5, 'hi', x'6f6b', NULL)")
        .execute(pool.pool())
        .await?;

    let rows = source.list_rows("mixed", 0, 1).await?;
    assert_eq!(rows, vec![Row::from(["42", "1.5", "hi", "ok", ""])]);
    Ok(())
}

#[tokio::test]
async fn test_list_rows_unknown_table_fails() -> Result<()> {
    let (_dir, _pool, source) = setup_test_db().await?;
    assert!(source.list_rows("missing", 0, 1).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_table_names_are_quoted() -> Result<()> {
    let (_dir, pool, source) = setup_test_db().await?;
    let name = "odd \"name\"; DROP TABLE x";
    source.create_table(name, &fields(&["col"])).await?;
    sqlx::query(&format!("INSERT INTO \"{}\" VALUES ('v')", name.replace('"', "\"\"")))
        .execute(pool.pool())
        .await?;

    assert_eq!(source.list_tables().await?, vec![name.to_string()]);
    assert_eq!(source.list_rows(name, 0, 1).await?, vec![Row::from(["v"])]);
    Ok(())
}

#[tokio::test]
async fn test_close_releases_pool() -> Result<()> {
    let (_dir, pool, source) = setup_test_db().await?;
    source.close().await;
    assert!(pool.pool().is_closed());
    assert!(source.list_tables().await.is_err());
    Ok(())
}
