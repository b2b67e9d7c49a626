//! Image classification with a frozen pretrained network and a trainable head.
//!
//! Images are read from a directory tree where every subdirectory is a class:
//!
//! ```text
//! data/
//!   cat/  1.jpg 2.jpg ...
//!   dog/  a.png b.png ...
//! ```
//!
//! Each image is resized, turned into a pixel tensor and passed through a
//! pretrained ONNX network (Inception v1 by default). The network's feature
//! layer feeds a classifier head that is fitted on 99% of the images and
//! evaluated on the rest. The fitted pipeline is saved as JSON and loaded again
//! for inference.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use imagefront::ImageClassifier;
//!
//! let classifier = ImageClassifier::builder()
//!     .with_pretrained_model("models/tensorflow_inception_graph.onnx")?
//!     .with_saved_model_path("models/pets.json")
//!     .with_seed(42)
//!     .build()?;
//!
//! let report = classifier.train("data/pets")?;
//! if let Some(metrics) = &report.metrics {
//!     println!("log-loss: {:.4}", metrics.log_loss);
//! }
//!
//! let (scores, label) = classifier.classify_single_image("data/new_photo.jpg")?;
//! println!("Predicted class: {} ({:?})", label, scores);
//! # Ok(())
//! # }
//! ```
//!
//! # Dataset only
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let split = imagefront::read_data_seeded("data/pets", 7)?;
//! println!("{} train, {} test", split.train.len(), split.test.len());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod dataset;
pub mod model_store;
mod runtime;

pub use classifier::{
    ClassifierError, ClassifierHead, ClassifierInfo, ClassifierTrainer, ExtractorDescriptor,
    FeatureExtractor, ImageClassifier, ImageClassifierBuilder, ImagePreprocessor, ImageSettings,
    MulticlassMetrics, OnnxFeatureExtractor, Prediction, PrototypeTrainer, SoftmaxTrainer,
    TrainedModel, TrainingReport,
};
pub use dataset::{
    read_data, read_data_seeded, DatasetError, DatasetSplit, ImageExample, ImageSource,
};
pub use model_store::{default_model_path, ModelError};
pub use runtime::{create_session_builder, RuntimeConfig};

pub fn init_logger() {
    env_logger::init();
}
