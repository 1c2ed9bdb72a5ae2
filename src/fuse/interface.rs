// Filesystem interface abstraction
//
// The protocol surface the FUSE adapter drives. Requests are addressed by
// inode, the way the kernel addresses them; the path helpers on the backend
// are conveniences layered on top.

use chrono::{DateTime, Utc};

pub use crate::fs::{FsError, FsResult};

/// File type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    RegularFile,
    Directory,
}

/// File attributes structure
#[derive(Debug, Clone)]
pub struct FileAttr {
    pub inode: u64,
    pub kind: FileType,
    pub size: u64,
    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
    pub mode: u32, // Permission bits
    pub uid: u32,
    pub gid: u32,
    pub nlinks: u32,
}

/// Directory entry structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u64,
    pub name: String,
    pub kind: FileType,
}

/// Filesystem statistics
#[derive(Debug, Clone)]
pub struct StatFs {
    pub blocks: u64,  // Total blocks
    pub bfree: u64,   // Free blocks
    pub bavail: u64,  // Available blocks for unprivileged users
    pub files: u64,   // Total inodes
    pub ffree: u64,   // Free inodes
    pub bsize: u32,   // Block size
    pub namelen: u32, // Maximum filename length
}

/// Read-only filesystem operations, addressed by inode.
///
/// Implementations are shared across concurrently running requests and must
/// not rely on any ordering between them.
#[async_trait::async_trait]
pub trait FilesystemInterface: Send + Sync {
    /// Attributes of an inode previously returned by `lookup` (or the root).
    async fn get_attr(&self, inode: u64) -> FsResult<FileAttr>;

    /// Resolve `name` inside directory `parent`.
    async fn lookup(&self, parent: u64, name: &str) -> FsResult<FileAttr>;

    /// Children of a directory, without `.` and `..`.
    async fn read_dir(&self, inode: u64) -> FsResult<Vec<DirEntry>>;

    /// Whole content of a file.
    async fn read_all(&self, inode: u64) -> FsResult<Vec<u8>>;

    /// A window of a file's content. Reading past the end yields nothing.
    async fn read_file(&self, inode: u64, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        let data = self.read_all(inode).await?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start >= data.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(size as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }

    /// The kernel dropped `nlookup` of the references its lookups took on
    /// `inode`.
    fn forget(&self, _inode: u64, _nlookup: u64) {}

    async fn statfs(&self) -> FsResult<StatFs>;
}
