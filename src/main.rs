use anyhow::Context;
use clap::Parser;
use rowfs::config::Config;
use rowfs::fuse::{self, MountOptions, RowfsBackend};
use rowfs::storage::{DataSource, DatabasePool, SqliteSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Mount a SQLite database as a read-only filesystem: one directory per
/// table, one file per row.
#[derive(Debug, Parser)]
#[command(name = "rowfs", version, about)]
struct Cli {
    /// Directory to mount the database on
    mountpoint: PathBuf,

    /// Path to the SQLite database file
    #[arg(long, env = "ROWFS_DBFILE")]
    dbfile: Option<PathBuf>,

    /// Most rows listed per table directory
    #[arg(long)]
    row_cutoff: Option<u64>,

    /// Let other users access the mount
    #[arg(long)]
    allow_other: bool,

    /// Extra configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(dbfile) = &self.dbfile {
            config.database.path = dbfile.clone();
        }
        if let Some(row_cutoff) = self.row_cutoff {
            config.listing.row_cutoff = row_cutoff;
        }
        if self.allow_other {
            config.fuse.allow_other = true;
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rowfs=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(database = %config.database.path.display(), "Starting rowfs");

    let pool = DatabasePool::new(&config.database).await?;
    pool.health_check().await.context("Database health check failed")?;
    tracing::info!(sqlite_version = %pool.check_version().await?, "Database ready");

    let source: Arc<dyn DataSource> = Arc::new(SqliteSource::new(pool.pool().clone()));
    let backend = Arc::new(RowfsBackend::new(Arc::clone(&source), config.listing.row_cutoff));

    let session = fuse::mount(backend, &cli.mountpoint, &MountOptions::from(&config.fuse))?;

    shutdown_signal().await?;
    tracing::info!(mountpoint = %cli.mountpoint.display(), "Unmounting");

    // Dropping the session unmounts and joins the FUSE thread.
    drop(session);
    source.close().await;

    Ok(())
}
