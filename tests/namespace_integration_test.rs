use anyhow::Result;
use rowfs::config::DatabaseConfig;
use rowfs::fs::{InodeAllocator, ROOT_INODE};
use rowfs::fuse::{DirHandles, FileType, FilesystemInterface, RowfsBackend};
use rowfs::storage::{DataSource, DatabasePool, SqliteSource};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    pool: DatabasePool,
    source: Arc<dyn DataSource>,
}

async fn setup_test_db() -> Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let config = DatabaseConfig {
        path: dir.path().join("foo.db"),
        max_connections: 4,
        min_connections: 1,
        acquire_timeout_secs: 5,
        create_if_missing: true,
    };
    let pool = DatabasePool::new(&config).await?;
    let source: Arc<dyn DataSource> = Arc::new(SqliteSource::new(pool.pool().clone()));
    Ok(Fixture { _dir: dir, pool, source })
}

async fn insert_rows(pool: &DatabasePool, table: &str, rows: &[[&str; 2]]) -> Result<()> {
    for [id, name] in rows {
        sqlx::query(&format!("INSERT INTO {table} VALUES (?, ?)"))
            .bind(*id)
            .bind(*name)
            .execute(pool.pool())
            .await?;
    }
    Ok(())
}

/// The `foo` table with rows `1,a` and `2,b`.
async fn foo_fixture() -> Result<Fixture> {
    let fixture = setup_test_db().await?;
    fixture.source.create_table("foo", &["id".to_string(), "name".to_string()]).await?;
    insert_rows(&fixture.pool, "foo", &[["1", "a"], ["2", "b"]]).await?;
    Ok(fixture)
}

#[tokio::test]
async fn test_rows_read_as_files() -> Result<()> {
    let fixture = foo_fixture().await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    assert_eq!(backend.read_path("/foo/0").await?, b"1,a\n");
    assert_eq!(backend.read_path("/foo/1").await?, b"2,b\n");
    assert!(backend.read_path("/foo/2").await.unwrap_err().is_not_found());
    assert!(backend.read_path("/foo/x").await.unwrap_err().is_not_found());
    assert!(backend.read_path("/foo/01").await.unwrap_err().is_not_found());
    assert!(backend.read_path("/bar/0").await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_root_lists_tables() -> Result<()> {
    let fixture = foo_fixture().await?;
    fixture.source.create_table("bar", &["x".to_string()]).await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    let names: Vec<String> =
        backend.read_dir(ROOT_INODE).await?.into_iter().map(|entry| entry.name).collect();
    assert_eq!(names, fixture.source.list_tables().await?);
    assert_eq!(names, vec!["bar".to_string(), "foo".to_string()]);

    let empty = backend.read_dir_path("/bar").await?;
    assert!(empty.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_table_listing_and_attributes() -> Result<()> {
    let fixture = foo_fixture().await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    let table = backend.lookup_path("/foo").await?;
    assert_eq!(table.kind, FileType::Directory);
    assert_eq!(table.inode, InodeAllocator::new().table_inode("foo"));

    let entries = backend.read_dir(table.inode).await?;
    assert_eq!(entries.len(), 2);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.name, index.to_string());
        assert_eq!(entry.kind, FileType::RegularFile);
        assert_eq!(entry.inode, InodeAllocator::new().row_inode("foo", index as u64));
    }

    let row = backend.lookup(table.inode, "1").await?;
    assert_eq!(row.kind, FileType::RegularFile);
    assert_eq!(row.size, 4);
    assert_eq!(row.mode, 0o444);
    Ok(())
}

#[tokio::test]
async fn test_row_cutoff_bounds_listing_not_lookup() -> Result<()> {
    let fixture = setup_test_db().await?;
    fixture.source.create_table("big", &["id".to_string(), "v".to_string()]).await?;
    insert_rows(
        &fixture.pool,
        "big",
        &[["1", "a"], ["2", "b"], ["3", "c"], ["4", "d"], ["5", "e"]],
    )
    .await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 2);

    let entries = backend.read_dir_path("/big").await?;
    let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec!["0", "1"]);

    assert_eq!(backend.read_path("/big/4").await?, b"5,e\n");
    Ok(())
}

#[tokio::test]
async fn test_reads_are_repeatable() -> Result<()> {
    let fixture = foo_fixture().await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    let row = backend.lookup_path("/foo/0").await?;
    let first = backend.read_all(row.inode).await?;
    let second = backend.read_all(row.inode).await?;
    assert_eq!(first, second);
    assert_eq!(backend.read_file(row.inode, 2, 10).await?, b"a\n");
    assert!(backend.read_file(row.inode, 4, 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_content_follows_database() -> Result<()> {
    let fixture = foo_fixture().await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    let row = backend.lookup_path("/foo/1").await?;
    assert_eq!(backend.read_all(row.inode).await?, b"2,b\n");

    sqlx::query("DELETE FROM foo").execute(fixture.pool.pool()).await?;

    assert!(backend.read_all(row.inode).await.unwrap_err().is_not_found());
    assert!(backend.get_attr(row.inode).await.unwrap_err().is_not_found());
    assert!(backend.read_dir_path("/foo").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_null_and_numeric_fields() -> Result<()> {
    let fixture = setup_test_db().await?;
    sqlx::query("CREATE TABLE mixed (i INTEGER, r REAL, n TEXT)")
        .execute(fixture.pool.pool())
        .await?;
    sqlx::query("INSERT INTO mixed VALUES (7, 2.5, NULL)").execute(fixture.pool.pool()).await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    assert_eq!(backend.read_path("/mixed/0").await?, b"7,2.5,\n");
    Ok(())
}

#[tokio::test]
async fn test_inodes_stable_across_backends() -> Result<()> {
    let fixture = foo_fixture().await?;
    let first = RowfsBackend::new(Arc::clone(&fixture.source), 10);
    let second = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    let a = first.lookup_path("/foo/1").await?;
    let b = second.lookup_path("/foo/1").await?;
    assert_eq!(a.inode, b.inode);
    assert_ne!(a.inode, first.lookup_path("/foo/0").await?.inode);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_reads() -> Result<()> {
    let fixture = foo_fixture().await?;
    let backend = Arc::new(RowfsBackend::new(Arc::clone(&fixture.source), 10));
    let inode = backend.lookup_path("/foo/0").await?.inode;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move { backend.read_all(inode).await }));
    }
    for handle in handles {
        assert_eq!(handle.await??, b"1,a\n");
    }
    Ok(())
}

#[tokio::test]
async fn test_inode_survives_partial_forget() -> Result<()> {
    let fixture = foo_fixture().await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);

    let table = backend.lookup_path("/foo").await?;
    let row = backend.lookup(table.inode, "0").await?;
    backend.lookup(table.inode, "0").await?;

    backend.forget(row.inode, 1);
    assert_eq!(backend.read_all(row.inode).await?, b"1,a\n");

    backend.forget(row.inode, 1);
    assert!(backend.read_all(row.inode).await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_open_directory_reads_one_snapshot() -> Result<()> {
    let fixture = foo_fixture().await?;
    let backend = RowfsBackend::new(Arc::clone(&fixture.source), 10);
    let table = backend.lookup_path("/foo").await?;

    let handles = DirHandles::new();
    let fh = handles.open(&backend, table.inode).await?;

    sqlx::query("DELETE FROM foo").execute(fixture.pool.pool()).await?;

    let listing = handles.listing(fh).expect("handle is open");
    let names: Vec<&str> = listing.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec![".", "..", "0", "1"]);

    handles.release(fh);
    let fh = handles.open(&backend, table.inode).await?;
    assert_eq!(handles.listing(fh).expect("handle is open").len(), 2);
    Ok(())
}
