pub mod error;
pub mod inode;
pub mod name;
pub mod node;
pub mod path;

pub use error::{FsError, FsResult};
pub use inode::{InodeAllocator, InodeRegistry, NodeId, ROOT_INODE};
pub use node::{Entry, Lookup, Namespace, Node, NodeAttr, NodeKind, render_row};
