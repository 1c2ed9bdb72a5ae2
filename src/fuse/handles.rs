// Open directory handles
//
// opendir takes one listing of the directory and every readdir page of that
// open is served from it; releasedir drops it. One enumeration therefore sees
// a single snapshot and costs a single data source query. Nothing outlives
// the open.

use super::interface::{DirEntry, FileType, FilesystemInterface, FsResult};
use crate::fs::ROOT_INODE;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub inode: u64,
    pub kind: FileType,
    pub name: String,
}

impl ListingEntry {
    fn directory(inode: u64, name: &str) -> Self {
        Self { inode, kind: FileType::Directory, name: name.to_string() }
    }
}

/// Full readdir listing of `ino`: `.`, `..`, then the children.
pub fn directory_listing(ino: u64, entries: Vec<DirEntry>) -> Vec<ListingEntry> {
    let mut listing = Vec::with_capacity(entries.len() + 2);
    listing.push(ListingEntry::directory(ino, "."));
    // Every directory is either the root or a child of it.
    listing.push(ListingEntry::directory(ROOT_INODE, ".."));
    listing.extend(
        entries
            .into_iter()
            .map(|entry| ListingEntry { inode: entry.inode, kind: entry.kind, name: entry.name }),
    );
    listing
}

/// Entries from `offset` on, as `(inode, next_offset, kind, name)`.
///
/// `next_offset` is what the kernel hands back to resume after that entry.
pub fn listing_page(listing: &[ListingEntry], offset: i64) -> Vec<(u64, i64, FileType, &str)> {
    let skip = usize::try_from(offset).unwrap_or(0);
    listing
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, entry)| (entry.inode, (i + 1) as i64, entry.kind, entry.name.as_str()))
        .collect()
}

/// Listings of currently open directories, keyed by file handle.
#[derive(Default)]
pub struct DirHandles {
    next: AtomicU64,
    open: Mutex<HashMap<u64, Arc<[ListingEntry]>>>,
}

impl DirHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `ino` once and return a handle to the snapshot. Handles start at 1.
    pub async fn open(&self, backend: &dyn FilesystemInterface, ino: u64) -> FsResult<u64> {
        let entries = backend.read_dir(ino).await?;
        let listing: Arc<[ListingEntry]> = directory_listing(ino, entries).into();

        let fh = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.open.lock().unwrap_or_else(PoisonError::into_inner).insert(fh, listing);
        tracing::debug!(ino, fh, "Directory opened");
        Ok(fh)
    }

    pub fn listing(&self, fh: u64) -> Option<Arc<[ListingEntry]>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner).get(&fh).cloned()
    }

    /// Drop the snapshot behind `fh`. Returns whether it was open.
    pub fn release(&self, fh: u64) -> bool {
        self.open.lock().unwrap_or_else(PoisonError::into_inner).remove(&fh).is_some()
    }

    pub fn len(&self) -> usize {
        self.open.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
