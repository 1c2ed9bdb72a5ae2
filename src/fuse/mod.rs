// FUSE interface implementation
//
// This module exposes the table namespace as a read-only POSIX filesystem
// through FUSE.

pub mod adapter;
pub mod backend;
pub mod handles;
pub mod interface;
pub mod mount;

pub use adapter::FuseAdapter;
pub use backend::{DEFAULT_ROW_CUTOFF, RowfsBackend};
pub use handles::{DirHandles, ListingEntry};
pub use interface::{DirEntry, FileAttr, FileType, FilesystemInterface, FsError, FsResult, StatFs};
pub use mount::{MountOptions, mount};
