// FUSE mount management
//
// Provides functions to mount a rowfs namespace via FUSE.

use super::{FilesystemInterface, FuseAdapter};
use crate::config::FuseConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Mount options for FUSE filesystem
#[derive(Debug, Clone)]
pub struct MountOptions {
    /// Allow other users to access the filesystem
    pub allow_other: bool,

    /// Filesystem name (for mtab)
    pub fsname: String,

    /// Filesystem subtype (shown as fuse.<subtype>)
    pub subtype: String,

    /// Auto-unmount on process exit
    pub auto_unmount: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            allow_other: false,
            fsname: "rowfs".to_string(),
            subtype: "rowfs".to_string(),
            auto_unmount: true,
        }
    }
}

impl From<&FuseConfig> for MountOptions {
    fn from(config: &FuseConfig) -> Self {
        Self {
            allow_other: config.allow_other,
            fsname: config.fsname.clone(),
            auto_unmount: config.auto_unmount,
            ..Default::default()
        }
    }
}

impl MountOptions {
    /// Convert to fuser mount options. The mount is always read-only.
    fn to_fuser_options(&self) -> Vec<fuser::MountOption> {
        let mut options = vec![
            fuser::MountOption::RO,
            fuser::MountOption::DefaultPermissions,
            fuser::MountOption::FSName(self.fsname.clone()),
            fuser::MountOption::Subtype(self.subtype.clone()),
        ];

        if self.allow_other {
            options.push(fuser::MountOption::AllowOther);
        }

        if self.auto_unmount {
            options.push(fuser::MountOption::AutoUnmount);
        }

        options
    }
}

/// Mount `backend` at `mountpoint`.
///
/// Must be called from within a tokio runtime; requests are served on it.
/// The filesystem stays mounted until the returned session is dropped.
pub fn mount(
    backend: Arc<dyn FilesystemInterface>,
    mountpoint: impl AsRef<Path>,
    options: &MountOptions,
) -> Result<fuser::BackgroundSession> {
    let mountpoint = mountpoint.as_ref();

    if !mountpoint.exists() {
        anyhow::bail!("Mount point does not exist: {}", mountpoint.display());
    }

    if !mountpoint.is_dir() {
        anyhow::bail!("Mount point is not a directory: {}", mountpoint.display());
    }

    let runtime = Handle::try_current().context("Mounting requires a tokio runtime")?;
    let adapter = FuseAdapter::new(backend, runtime);

    tracing::info!(mountpoint = %mountpoint.display(), fsname = %options.fsname, "Mounting rowfs");

    let session = fuser::spawn_mount2(adapter, mountpoint, &options.to_fuser_options())
        .with_context(|| format!("Failed to mount filesystem at {}", mountpoint.display()))?;

    tracing::info!("Filesystem mounted successfully");

    Ok(session)
}
