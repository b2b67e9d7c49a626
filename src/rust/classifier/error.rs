use ort::Error as OrtError;

use crate::dataset::DatasetError;
use crate::model_store::ModelError;

/// Represents the different types of errors that can occur in the image classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The dataset tree could not be read
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
    /// An image could not be decoded or resized
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    /// Error occurred while loading or running the ONNX model, or reading a saved model
    #[error("Model error: {0}")]
    ModelError(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    BuildError(String),
    /// The classifier head could not be fitted
    #[error("Training error: {0}")]
    TrainingError(String),
    /// Error occurred while making predictions
    #[error("Prediction error: {0}")]
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// A saved model does not fit the feature extractor it is used with
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A saved model could not be read or written
    #[error("Model store error: {0}")]
    Store(#[from] ModelError),
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}
