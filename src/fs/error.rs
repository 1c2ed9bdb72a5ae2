use thiserror::Error;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("No such entry: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotDirectory(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Read-only filesystem: {0}")]
    ReadOnly(String),

    #[error("Inode {inode:#x} is bound to {existing}, refusing to rebind it to {incoming}")]
    InodeCollision { inode: u64, existing: String, incoming: String },

    /// Backend failure. The message is generic; details go to the log.
    #[error("I/O error: {0}")]
    Io(String),
}

impl FsError {
    /// Convert to POSIX errno
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::NotDirectory(_) => libc::ENOTDIR,
            FsError::IsDirectory(_) => libc::EISDIR,
            FsError::InvalidPath(_) => libc::EINVAL,
            FsError::ReadOnly(_) => libc::EROFS,
            FsError::InodeCollision { .. } => libc::EIO,
            FsError::Io(_) => libc::EIO,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}
