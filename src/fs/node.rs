// Namespace node model
//
// Three node kinds are derived on every call from the data source's current
// state; none of them holds mutable state and nothing is cached between
// calls:
//
//   /                root directory, one entry per table
//   /<table>         table directory, one entry per row position
//   /<table>/<n>     row file, the n-th row rendered as text
//
// Listing a table is capped at the configured row cutoff. Looking up a row by
// index is not: any offset the data source still answers resolves.

use crate::storage::{DataSource, Row};

use super::error::{FsError, FsResult};
use super::inode::{InodeAllocator, NodeId, ROOT_INODE};
use super::name::{RowName, parse_row_name, row_file_name};

/// Joins the fields of a row file. Fields are not escaped, so a field that
/// contains the separator or terminator cannot be told apart afterwards.
pub const FIELD_SEPARATOR: &str = ",";
pub const RECORD_TERMINATOR: &str = "\n";

pub const DIRECTORY_PERM: u16 = 0o555;
pub const FILE_PERM: u16 = 0o444;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    pub inode: u64,
    pub kind: NodeKind,
    pub perm: u16,
    pub size: u64,
}

impl NodeAttr {
    fn directory(inode: u64) -> Self {
        Self { inode, kind: NodeKind::Directory, perm: DIRECTORY_PERM, size: 0 }
    }

    fn file(inode: u64, size: u64) -> Self {
        Self { inode, kind: NodeKind::File, perm: FILE_PERM, size }
    }
}

/// A child produced by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: NodeId,
    pub inode: u64,
    pub name: String,
    pub kind: NodeKind,
}

/// A child resolved by name, with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub id: NodeId,
    pub attr: NodeAttr,
}

/// Render a row as file content.
pub fn render_row(row: &Row) -> Vec<u8> {
    let mut content = row.fields().join(FIELD_SEPARATOR);
    content.push_str(RECORD_TERMINATOR);
    content.into_bytes()
}

/// Everything a node needs to answer a call, handed over per request.
#[derive(Clone, Copy)]
pub struct Namespace<'a> {
    source: &'a dyn DataSource,
    allocator: InodeAllocator,
    row_cutoff: u64,
}

impl<'a> Namespace<'a> {
    pub fn new(source: &'a dyn DataSource, allocator: InodeAllocator, row_cutoff: u64) -> Self {
        Self { source, allocator, row_cutoff }
    }

    pub fn root(&self) -> Node<'a> {
        Node::Root(RootDir { ns: *self })
    }

    /// Bind an identity to a node. Existence is checked by the node's own
    /// operations, not here.
    pub fn node(&self, id: &NodeId) -> Node<'a> {
        match id {
            NodeId::Root => self.root(),
            NodeId::Table { table } => Node::Table(TableDir { ns: *self, table: table.clone() }),
            NodeId::Row { table, index } => {
                Node::Row(RowFile { ns: *self, table: table.clone(), index: *index })
            }
        }
    }
}

pub enum Node<'a> {
    Root(RootDir<'a>),
    Table(TableDir<'a>),
    Row(RowFile<'a>),
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Root(_) => NodeId::Root,
            Node::Table(dir) => dir.id(),
            Node::Row(file) => file.id(),
        }
    }

    pub async fn attributes(&self) -> FsResult<NodeAttr> {
        match self {
            Node::Root(dir) => Ok(dir.attributes()),
            Node::Table(dir) => Ok(dir.attributes()),
            Node::Row(file) => file.attributes().await,
        }
    }

    pub async fn lookup(&self, name: &str) -> FsResult<Lookup> {
        match self {
            Node::Root(dir) => dir.lookup(name).await,
            Node::Table(dir) => dir.lookup(name).await,
            Node::Row(file) => Err(FsError::NotDirectory(file.id().to_string())),
        }
    }

    pub async fn list_children(&self) -> FsResult<Vec<Entry>> {
        match self {
            Node::Root(dir) => dir.list_children().await,
            Node::Table(dir) => dir.list_children().await,
            Node::Row(file) => Err(FsError::NotDirectory(file.id().to_string())),
        }
    }

    pub async fn read_content(&self) -> FsResult<Vec<u8>> {
        match self {
            Node::Row(file) => file.read_content().await,
            other => Err(FsError::IsDirectory(other.id().to_string())),
        }
    }
}

pub struct RootDir<'a> {
    ns: Namespace<'a>,
}

impl<'a> RootDir<'a> {
    pub fn attributes(&self) -> NodeAttr {
        NodeAttr::directory(ROOT_INODE)
    }

    pub async fn lookup(&self, name: &str) -> FsResult<Lookup> {
        let tables = self.list_tables().await?;
        if !tables.iter().any(|table| table == name) {
            return Err(FsError::NotFound(format!("/{name}")));
        }

        Ok(Lookup {
            id: NodeId::table(name),
            attr: NodeAttr::directory(self.ns.allocator.table_inode(name)),
        })
    }

    pub async fn list_children(&self) -> FsResult<Vec<Entry>> {
        let tables = self.list_tables().await?;
        Ok(tables
            .into_iter()
            .map(|table| Entry {
                inode: self.ns.allocator.table_inode(&table),
                id: NodeId::table(table.clone()),
                name: table,
                kind: NodeKind::Directory,
            })
            .collect())
    }

    async fn list_tables(&self) -> FsResult<Vec<String>> {
        self.ns
            .source
            .list_tables()
            .await
            .map_err(|err| backend_failure(&NodeId::Root, "list tables", err))
    }
}

pub struct TableDir<'a> {
    ns: Namespace<'a>,
    table: String,
}

impl<'a> TableDir<'a> {
    pub fn id(&self) -> NodeId {
        NodeId::table(self.table.clone())
    }

    pub fn attributes(&self) -> NodeAttr {
        NodeAttr::directory(self.ns.allocator.table_inode(&self.table))
    }

    /// Resolve a row by index. A name that is not an index never reaches the
    /// data source.
    pub async fn lookup(&self, name: &str) -> FsResult<Lookup> {
        let index = match parse_row_name(name) {
            RowName::Index(index) => index,
            RowName::NotAnIndex => {
                return Err(FsError::NotFound(format!("/{}/{name}", self.table)));
            }
        };

        let file = RowFile { ns: self.ns, table: self.table.clone(), index };
        let attr = file.attributes().await?;
        Ok(Lookup { id: file.id(), attr })
    }

    pub async fn list_children(&self) -> FsResult<Vec<Entry>> {
        let cutoff = self.ns.row_cutoff;
        let rows = self
            .ns
            .source
            .list_rows(&self.table, 0, cutoff)
            .await
            .map_err(|err| backend_failure(&self.id(), "list rows", err))?;

        if rows.len() as u64 >= cutoff {
            tracing::debug!(table = %self.table, cutoff, "Directory listing reached the row cutoff");
        }

        Ok((0..rows.len() as u64)
            .take(usize::try_from(cutoff).unwrap_or(usize::MAX))
            .map(|index| Entry {
                id: NodeId::row(self.table.clone(), index),
                inode: self.ns.allocator.row_inode(&self.table, index),
                name: row_file_name(index),
                kind: NodeKind::File,
            })
            .collect())
    }
}

pub struct RowFile<'a> {
    ns: Namespace<'a>,
    table: String,
    index: u64,
}

impl<'a> RowFile<'a> {
    pub fn id(&self) -> NodeId {
        NodeId::row(self.table.clone(), self.index)
    }

    pub async fn attributes(&self) -> FsResult<NodeAttr> {
        let content = self.read_content().await?;
        let inode = self.ns.allocator.row_inode(&self.table, self.index);
        Ok(NodeAttr::file(inode, content.len() as u64))
    }

    /// Fetch the row again and render it. Never cached.
    pub async fn read_content(&self) -> FsResult<Vec<u8>> {
        let row = self.fetch().await?;
        Ok(render_row(&row))
    }

    async fn fetch(&self) -> FsResult<Row> {
        let rows = self
            .ns
            .source
            .list_rows(&self.table, self.index, 1)
            .await
            .map_err(|err| backend_failure(&self.id(), "fetch row", err))?;

        rows.into_iter().next().ok_or_else(|| FsError::NotFound(self.id().to_string()))
    }
}

fn backend_failure(node: &NodeId, operation: &'static str, err: anyhow::Error) -> FsError {
    tracing::error!(node = %node, operation, error = ?err, "DataSource query failed");
    FsError::Io(format!("{operation} failed"))
}
