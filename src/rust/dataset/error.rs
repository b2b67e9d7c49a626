use std::io;
use std::path::PathBuf;

/// Errors raised while reading a dataset directory tree.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Dataset root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Class directory name is not valid UTF-8: {0}")]
    InvalidLabel(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
