// FUSE adapter - bridges sync FUSE callbacks to async FilesystemInterface
//
// fuser delivers requests one at a time on its session thread. Each request
// that touches the backend is moved onto the tokio runtime together with its
// reply handle and answered from there, so a slow backend query holds up only
// its own request. readdir pages come from the listing taken at opendir.

use super::handles::{DirHandles, listing_page};
use super::interface::{FileAttr, FileType, FilesystemInterface, FsError};
use fuser::{
    FileType as FuseFileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, Request,
};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;

/// Default TTL for file attributes (1 second)
const ATTR_TTL: Duration = Duration::from_secs(1);

/// Default TTL for directory entries (1 second)
const ENTRY_TTL: Duration = Duration::from_secs(1);

/// FUSE adapter that bridges sync FUSE callbacks to async FilesystemInterface
pub struct FuseAdapter {
    backend: Arc<dyn FilesystemInterface>,
    runtime: Handle,
    dir_handles: Arc<DirHandles>,
}

impl FuseAdapter {
    pub fn new(backend: Arc<dyn FilesystemInterface>, runtime: Handle) -> Self {
        Self { backend, runtime, dir_handles: Arc::new(DirHandles::new()) }
    }

    /// Convert our FileAttr to fuser FileAttr
    fn to_fuse_attr(attr: &FileAttr) -> fuser::FileAttr {
        let time = datetime_to_systemtime(attr.mtime);
        fuser::FileAttr {
            ino: attr.inode,
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime: datetime_to_systemtime(attr.atime),
            mtime: time,
            ctime: datetime_to_systemtime(attr.ctime),
            crtime: time,
            kind: to_fuse_file_type(attr.kind),
            perm: attr.mode as u16,
            nlink: attr.nlinks,
            uid: attr.uid,
            gid: attr.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }
}

fn to_fuse_file_type(kind: FileType) -> FuseFileType {
    match kind {
        FileType::RegularFile => FuseFileType::RegularFile,
        FileType::Directory => FuseFileType::Directory,
    }
}

/// Convert chrono DateTime to SystemTime
fn datetime_to_systemtime(dt: chrono::DateTime<chrono::Utc>) -> SystemTime {
    let secs = u64::try_from(dt.timestamp()).unwrap_or(0);
    UNIX_EPOCH + Duration::new(secs, dt.timestamp_subsec_nanos())
}

/// Reject any open that asks for more than reading.
fn check_read_only(ino: u64, flags: i32) -> Result<(), FsError> {
    if flags & libc::O_ACCMODE != libc::O_RDONLY {
        return Err(FsError::ReadOnly(format!("inode {ino:#x}")));
    }
    Ok(())
}

impl Filesystem for FuseAdapter {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        tracing::info!("FUSE filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!("FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        // Non UTF-8 names can't be table names or row indexes.
        let Some(name) = name.to_str().map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };

        let backend = Arc::clone(&self.backend);
        self.runtime.spawn(async move {
            match backend.lookup(parent, &name).await {
                Ok(attr) => reply.entry(&ENTRY_TTL, &Self::to_fuse_attr(&attr), 0),
                Err(e) => reply.error(e.to_errno()),
            }
        });
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.backend.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let backend = Arc::clone(&self.backend);
        self.runtime.spawn(async move {
            match backend.get_attr(ino).await {
                Ok(attr) => reply.attr(&ATTR_TTL, &Self::to_fuse_attr(&attr)),
                Err(e) => reply.error(e.to_errno()),
            }
        });
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match check_read_only(ino, flags) {
            // Row content can change under us; never serve it from the page cache.
            Ok(()) => reply.opened(0, fuser::consts::FOPEN_DIRECT_IO),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };

        let backend = Arc::clone(&self.backend);
        self.runtime.spawn(async move {
            match backend.read_file(ino, offset, size).await {
                Ok(data) => reply.data(&data),
                Err(e) => reply.error(e.to_errno()),
            }
        });
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        if let Err(e) = check_read_only(ino, flags) {
            reply.error(e.to_errno());
            return;
        }

        let backend = Arc::clone(&self.backend);
        let dir_handles = Arc::clone(&self.dir_handles);
        self.runtime.spawn(async move {
            match dir_handles.open(backend.as_ref(), ino).await {
                Ok(fh) => reply.opened(fh, 0),
                Err(e) => reply.error(e.to_errno()),
            }
        });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(listing) = self.dir_handles.listing(fh) else {
            tracing::warn!(ino, fh, "readdir on a handle that is not open");
            reply.error(libc::EBADF);
            return;
        };

        for (inode, next_offset, kind, name) in listing_page(&listing, offset) {
            if reply.add(inode, next_offset, to_fuse_file_type(kind), name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        self.dir_handles.release(fh);
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let backend = Arc::clone(&self.backend);
        self.runtime.spawn(async move {
            match backend.statfs().await {
                Ok(stats) => reply.statfs(
                    stats.blocks,
                    stats.bfree,
                    stats.bavail,
                    stats.files,
                    stats.ffree,
                    stats.bsize,
                    stats.namelen,
                    stats.bsize,
                ),
                Err(e) => reply.error(e.to_errno()),
            }
        });
    }
}
