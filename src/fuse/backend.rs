// RowfsBackend - request dispatcher
//
// Resolves the inode of each request to a node identity, binds the node to
// the data source for the duration of the call and translates the outcome
// into filesystem attributes. No node survives a call; only the inode
// registry persists, and it holds identities.

use super::interface::*;
use crate::fs::path::path_components;
use crate::fs::{
    Entry, InodeAllocator, InodeRegistry, Namespace, Node, NodeAttr, NodeKind, ROOT_INODE,
};
use crate::storage::DataSource;
use chrono::{DateTime, Utc};
use nix::unistd::{getgid, getuid};
use std::sync::Arc;

pub const DEFAULT_ROW_CUTOFF: u64 = 10_000;

pub struct RowfsBackend {
    source: Arc<dyn DataSource>,
    allocator: InodeAllocator,
    registry: InodeRegistry,
    row_cutoff: u64,
    mounted_at: DateTime<Utc>,
    uid: u32,
    gid: u32,
}

impl RowfsBackend {
    pub fn new(source: Arc<dyn DataSource>, row_cutoff: u64) -> Self {
        Self {
            source,
            allocator: InodeAllocator::new(),
            registry: InodeRegistry::new(),
            row_cutoff: row_cutoff.max(1),
            mounted_at: Utc::now(),
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
        }
    }

    /// Report files as owned by `uid`/`gid` instead of the mounting user.
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn row_cutoff(&self) -> u64 {
        self.row_cutoff
    }

    pub fn registry(&self) -> &InodeRegistry {
        &self.registry
    }

    fn namespace(&self) -> Namespace<'_> {
        Namespace::new(self.source.as_ref(), self.allocator, self.row_cutoff)
    }

    fn node(&self, inode: u64) -> FsResult<Node<'_>> {
        let id = self
            .registry
            .resolve(inode)
            .ok_or_else(|| FsError::NotFound(format!("inode {inode:#x}")))?;
        Ok(self.namespace().node(&id))
    }

    fn file_type(kind: NodeKind) -> FileType {
        match kind {
            NodeKind::Directory => FileType::Directory,
            NodeKind::File => FileType::RegularFile,
        }
    }

    fn to_attr(&self, attr: NodeAttr) -> FileAttr {
        FileAttr {
            inode: attr.inode,
            kind: Self::file_type(attr.kind),
            size: attr.size,
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            mode: u32::from(attr.perm),
            uid: self.uid,
            gid: self.gid,
            nlinks: match attr.kind {
                NodeKind::Directory => 2,
                NodeKind::File => 1,
            },
        }
    }

    fn to_dir_entry(&self, entry: Entry) -> FsResult<DirEntry> {
        self.registry.check(entry.inode, &entry.id)?;
        Ok(DirEntry { inode: entry.inode, name: entry.name, kind: Self::file_type(entry.kind) })
    }

    /// Walk an absolute path from the root, as the kernel would.
    pub async fn lookup_path(&self, path: &str) -> FsResult<FileAttr> {
        let mut attr = self.get_attr(ROOT_INODE).await?;
        for component in path_components(path)? {
            attr = self.lookup(attr.inode, &component).await?;
        }
        Ok(attr)
    }

    pub async fn read_dir_path(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let attr = self.lookup_path(path).await?;
        self.read_dir(attr.inode).await
    }

    pub async fn read_path(&self, path: &str) -> FsResult<Vec<u8>> {
        let attr = self.lookup_path(path).await?;
        self.read_all(attr.inode).await
    }
}

#[async_trait::async_trait]
impl FilesystemInterface for RowfsBackend {
    async fn get_attr(&self, inode: u64) -> FsResult<FileAttr> {
        let attr = self.node(inode)?.attributes().await?;
        Ok(self.to_attr(attr))
    }

    async fn lookup(&self, parent: u64, name: &str) -> FsResult<FileAttr> {
        let found = self.node(parent)?.lookup(name).await?;
        self.registry.record(found.attr.inode, &found.id)?;
        tracing::debug!(parent, name, inode = found.attr.inode, node = %found.id, "lookup");
        Ok(self.to_attr(found.attr))
    }

    async fn read_dir(&self, inode: u64) -> FsResult<Vec<DirEntry>> {
        let entries = self.node(inode)?.list_children().await?;
        tracing::debug!(inode, count = entries.len(), "read_dir");
        entries.into_iter().map(|entry| self.to_dir_entry(entry)).collect()
    }

    async fn read_all(&self, inode: u64) -> FsResult<Vec<u8>> {
        self.node(inode)?.read_content().await
    }

    fn forget(&self, inode: u64, nlookup: u64) {
        self.registry.forget(inode, nlookup);
    }

    async fn statfs(&self) -> FsResult<StatFs> {
        Ok(StatFs {
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: self.registry.len() as u64,
            ffree: 0,
            bsize: 4096,
            namelen: 255,
        })
    }
}

impl std::fmt::Debug for RowfsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowfsBackend")
            .field("row_cutoff", &self.row_cutoff)
            .field("known_inodes", &self.registry.len())
            .field("mounted_at", &self.mounted_at)
            .finish()
    }
}
