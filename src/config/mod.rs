use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fuse::DEFAULT_ROW_CUTOFF;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub fuse: FuseConfig,
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub create_if_missing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfig {
    pub allow_other: bool,
    pub auto_unmount: bool,
    pub fsname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Most rows a single table directory listing returns.
    pub row_cutoff: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./foo.db"),
            max_connections: 8,
            min_connections: 1,
            acquire_timeout_secs: 30,
            create_if_missing: false,
        }
    }
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self { allow_other: false, auto_unmount: true, fsname: "rowfs".to_string() }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { row_cutoff: DEFAULT_ROW_CUTOFF }
    }
}

impl Config {
    /// Load from `rowfs.{toml,yaml,json}` in the working directory if present,
    /// then `file` if given, then `ROWFS_*` environment variables
    /// (`ROWFS_DATABASE__PATH`, `ROWFS_LISTING__ROW_CUTOFF`, ...).
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("rowfs").required(false));

        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("ROWFS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listing.row_cutoff == 0 {
            anyhow::bail!("listing.row_cutoff must be at least 1");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }
        Ok(())
    }
}
