#[derive(Debug, Clone, thiserror::Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl FsError {
    pub fn from_io(path: &std::path::Path, err: &std::io::Error) -> Self {
        let what = format!("{}: {}", path.display(), err);
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(what),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(what),
            _ => Self::Io(what),
        }
    }
}
