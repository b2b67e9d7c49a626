use std::path::PathBuf;
use std::sync::Arc;

mod error;
mod features;
mod metrics;
mod model;
mod preprocess;
mod trainer;
mod utils;
pub mod builder;
#[allow(clippy::module_inception)]
mod classifier;

pub use error::ClassifierError;
pub use features::{ExtractorDescriptor, FeatureExtractor, OnnxFeatureExtractor};
pub use metrics::MulticlassMetrics;
pub use model::{Prediction, TrainedModel, MODEL_FORMAT_VERSION};
pub use preprocess::{ImagePreprocessor, ImageSettings};
pub use trainer::{
    ClassifierHead, ClassifierTrainer, PrototypeHead, PrototypeTrainer, SoftmaxHead, SoftmaxTrainer,
};
pub use classifier::{ImageClassifier, PredictionEngine};
pub use builder::ImageClassifierBuilder;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the pretrained ONNX network, if one was loaded from disk
    pub pretrained_model_path: Option<PathBuf>,
    /// Dataset root used by `fit_model`
    pub dataset_path: Option<PathBuf>,
    /// Where the trained model is saved and loaded
    pub saved_model_path: PathBuf,
    /// Labels of the resident model, if one is loaded
    pub class_labels: Option<Vec<String>>,
    /// Size of the feature vectors, when known
    pub feature_size: Option<usize>,
    /// Whether a trained model is resident
    pub loaded: bool,
}

/// Outcome of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// The model that was saved and is now resident
    pub model: Arc<TrainedModel>,
    /// Evaluation on the held-out test set; `None` when that set is empty
    pub metrics: Option<MulticlassMetrics>,
    pub train_count: usize,
    pub test_count: usize,
    /// Test images left out of the metrics because their label was not trained
    pub skipped_test_count: usize,
    pub saved_to: PathBuf,
}
