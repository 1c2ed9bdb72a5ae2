// Inode allocation
//
// Inodes are derived from a node's identity rather than stored. The 64-bit
// space is split into bands by the top two bits:
//
//   00  reserved: 0 is invalid, 1 is the root, nothing else is issued
//   01  table directories: 62 bits of BLAKE3(table name)
//   1x  row files: 63 bits of BLAKE3(BLAKE3(table name) || row index)
//
// Bands cannot overlap whatever the row count. Within a band the collision
// probability for N identities is about N^2 / 2^(b+1):
//
//   table band (b = 62): N <= 2_896 tables keeps it below 2^-40,
//                        10^6 tables gives roughly 2^-23
//   row band   (b = 63): N <= 4_096 rows seen in one session keeps it below
//                        2^-40, 10^6 rows gives roughly 2^-24
//
// 64 bits cannot push 10^6 identities below 2^-40, so the registry refuses to
// rebind an inode it has already handed out rather than misattribute it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use super::error::{FsError, FsResult};

pub const ROOT_INODE: u64 = 1;

const BAND_MASK: u64 = 0b11 << 62;
const TABLE_BAND: u64 = 0b01 << 62;
const TABLE_HASH_MASK: u64 = (1 << 62) - 1;
const ROW_BAND: u64 = 1 << 63;
const ROW_HASH_MASK: u64 = (1 << 63) - 1;

const TABLE_CONTEXT: &str = "rowfs 2026-10 table directory inode";
const ROW_CONTEXT: &str = "rowfs 2026-10 row file inode";

/// Semantic identity of a namespace node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    Root,
    Table { table: String },
    Row { table: String, index: u64 },
}

impl NodeId {
    pub fn table(table: impl Into<String>) -> Self {
        NodeId::Table { table: table.into() }
    }

    pub fn row(table: impl Into<String>, index: u64) -> Self {
        NodeId::Row { table: table.into(), index }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Root => write!(f, "/"),
            NodeId::Table { table } => write!(f, "/{table}"),
            NodeId::Row { table, index } => write!(f, "/{table}/{index}"),
        }
    }
}

/// Which band an inode number falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeBand {
    Reserved,
    Table,
    Row,
}

/// Maps node identities to inode numbers. Pure: the same identity always
/// gets the same inode, in this session and the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct InodeAllocator;

impl InodeAllocator {
    pub fn new() -> Self {
        Self
    }

    pub fn allocate(&self, id: &NodeId) -> u64 {
        match id {
            NodeId::Root => ROOT_INODE,
            NodeId::Table { table } => self.table_inode(table),
            NodeId::Row { table, index } => self.row_inode(table, *index),
        }
    }

    pub fn table_inode(&self, table: &str) -> u64 {
        TABLE_BAND | (truncate(&table_digest(table)) & TABLE_HASH_MASK)
    }

    pub fn row_inode(&self, table: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new_derive_key(ROW_CONTEXT);
        hasher.update(table_digest(table).as_bytes());
        hasher.update(&index.to_le_bytes());
        ROW_BAND | (truncate(&hasher.finalize()) & ROW_HASH_MASK)
    }

    pub fn band(inode: u64) -> InodeBand {
        if inode & ROW_BAND != 0 {
            InodeBand::Row
        } else if inode & BAND_MASK == TABLE_BAND {
            InodeBand::Table
        } else {
            InodeBand::Reserved
        }
    }
}

fn table_digest(table: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_derive_key(TABLE_CONTEXT);
    hasher.update(table.as_bytes());
    hasher.finalize()
}

fn truncate(hash: &blake3::Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Inodes handed to the kernel during this mount session.
///
/// The kernel addresses later requests by inode alone, and a hash cannot be
/// inverted, so every inode returned from a lookup is recorded here until the
/// kernel forgets it. Each binding counts the lookups the kernel has not yet
/// forgotten; only identities are kept, never row content.
pub struct InodeRegistry {
    nodes: RwLock<HashMap<u64, Binding>>,
}

struct Binding {
    id: NodeId,
    lookups: u64,
}

impl InodeRegistry {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_INODE, Binding { id: NodeId::Root, lookups: 0 });
        Self { nodes: RwLock::new(nodes) }
    }

    /// Bind `inode` to `id` and count one kernel reference to it. Fails if the
    /// inode already names something else.
    pub fn record(&self, inode: u64, id: &NodeId) -> FsResult<()> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.get_mut(&inode) {
            Some(binding) if binding.id != *id => {
                tracing::error!(
                    inode,
                    existing = %binding.id,
                    incoming = %id,
                    "Inode collision detected"
                );
                Err(FsError::InodeCollision {
                    inode,
                    existing: binding.id.to_string(),
                    incoming: id.to_string(),
                })
            }
            Some(binding) => {
                binding.lookups = binding.lookups.saturating_add(1);
                Ok(())
            }
            None => {
                nodes.insert(inode, Binding { id: id.clone(), lookups: 1 });
                Ok(())
            }
        }
    }

    /// Like `record`, but only reports a conflict without binding.
    pub fn check(&self, inode: u64, id: &NodeId) -> FsResult<()> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&inode) {
            Some(binding) if binding.id != *id => Err(FsError::InodeCollision {
                inode,
                existing: binding.id.to_string(),
                incoming: id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn resolve(&self, inode: u64) -> Option<NodeId> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(&inode).map(|binding| binding.id.clone())
    }

    /// The kernel dropped `nlookup` references to `inode`. The binding goes
    /// away once none are left. Root stays.
    pub fn forget(&self, inode: u64, nlookup: u64) {
        if inode == ROOT_INODE {
            return;
        }
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(binding) = nodes.get_mut(&inode) {
            binding.lookups = binding.lookups.saturating_sub(nlookup);
            if binding.lookups == 0 {
                nodes.remove(&inode);
            }
        }
    }

    /// Outstanding kernel references to `inode`.
    pub fn lookups(&self, inode: u64) -> u64 {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(&inode).map_or(0, |binding| binding.lookups)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
