use crate::fs::error::{FsError, FsResult};

const MAX_PATH_LENGTH: usize = 4096;

/// Split an absolute path into its non-empty components.
pub fn path_components(path: &str) -> FsResult<Vec<String>> {
    if path.is_empty() {
        return Err(FsError::InvalidPath("Empty path".to_string()));
    }

    if path.contains('\0') {
        return Err(FsError::InvalidPath("Path contains NULL character".to_string()));
    }

    if path.len() > MAX_PATH_LENGTH {
        return Err(FsError::InvalidPath(format!("Path too long: {} bytes", path.len())));
    }

    if !path.starts_with('/') {
        return Err(FsError::InvalidPath("Path must start with /".to_string()));
    }

    Ok(path.split('/').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect())
}
