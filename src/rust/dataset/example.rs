use std::fmt;
use std::path::{Path, PathBuf};

/// Where the pixels of an example come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// An image file on disk, decoded when the example is featurized
    Path(PathBuf),
    /// An already-loaded encoded image (PNG, JPEG, ...)
    Bytes(Vec<u8>),
}

impl ImageSource {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Bytes(_) => None,
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// A single row fed through the pipeline.
///
/// Training rows carry the label of the directory they were read from.
/// Inference rows have no label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExample {
    pub image: ImageSource,
    pub label: Option<String>,
}

impl ImageExample {
    /// Creates a labeled training example
    pub fn labeled(image: impl Into<ImageSource>, label: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            label: Some(label.into()),
        }
    }

    /// Creates an example for inference, without a label
    pub fn unlabeled(image: impl Into<ImageSource>) -> Self {
        Self {
            image: image.into(),
            label: None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}
