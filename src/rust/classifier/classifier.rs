use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info, warn};
use ndarray::{Array1, Array2};

use super::error::ClassifierError;
use super::features::FeatureExtractor;
use super::metrics::MulticlassMetrics;
use super::model::{Prediction, TrainedModel};
use super::preprocess::ImagePreprocessor;
use super::trainer::ClassifierTrainer;
use super::{ClassifierInfo, TrainingReport};
use crate::dataset::{read_data, read_data_seeded, ImageExample, ImageSource};
use crate::model_store::{load_model, save_model};

/// Image classifier built from a frozen feature-extractor network and a
/// trainable classifier head.
///
/// Training reads a `label/file` tree, fits the head and saves the model.
/// Classification loads the saved model on first use and keeps it resident
/// until [`clear_cache`](Self::clear_cache) is called.
///
/// # Thread Safety
///
/// The classifier is `Send + Sync`. The resident model sits behind a mutex:
/// the first caller loads it while holding the lock, later callers only clone
/// an `Arc` and run inference without it.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use imagefront::ImageClassifier;
///
/// let classifier = ImageClassifier::builder()
///     .with_pretrained_model("models/inception.onnx")?
///     .with_dataset_path("data/pets")
///     .with_saved_model_path("models/pets.json")
///     .build()?;
///
/// let report = classifier.fit_model()?;
/// println!("trained on {} images", report.train_count);
///
/// let (scores, label) = classifier.classify_single_image("data/unknown.jpg")?;
/// println!("{} {:?}", label, scores);
/// # Ok(())
/// # }
/// ```
pub struct ImageClassifier {
    pub(super) pretrained_model_path: Option<PathBuf>,
    pub(super) dataset_path: Option<PathBuf>,
    pub(super) saved_model_path: PathBuf,
    pub(super) preprocessor: ImagePreprocessor,
    pub(super) extractor: Arc<dyn FeatureExtractor>,
    pub(super) trainer: Arc<dyn ClassifierTrainer>,
    pub(super) seed: Option<u64>,
    pub(super) engine: Mutex<Option<Arc<PredictionEngine>>>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<ImageClassifier>();
    }
};

/// A loaded model paired with the extractor that feeds it.
pub struct PredictionEngine {
    model: Arc<TrainedModel>,
    preprocessor: ImagePreprocessor,
    extractor: Arc<dyn FeatureExtractor>,
}

impl PredictionEngine {
    /// Pairs `model` with `extractor` after checking that they fit together
    pub fn new(
        model: Arc<TrainedModel>,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Result<Self, ClassifierError> {
        model.extractor.check_compatible(&extractor.descriptor())?;
        Ok(Self {
            preprocessor: ImagePreprocessor::new(model.image_settings.clone()),
            model,
            extractor,
        })
    }

    pub fn model(&self) -> &Arc<TrainedModel> {
        &self.model
    }

    /// Runs one image through preprocessing, the network and the head
    pub fn predict(&self, image: &ImageSource) -> Result<Prediction, ClassifierError> {
        let pixels = self.preprocessor.prepare(image)?;
        let features = self.extractor.extract(&pixels)?;
        self.model.predict(features.view())
    }
}

impl ImageClassifier {
    /// Creates a new ImageClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ImageClassifierBuilder {
        super::builder::ImageClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        let engine = self.lock_engine().clone();
        let descriptor = self.extractor.descriptor();
        ClassifierInfo {
            pretrained_model_path: self.pretrained_model_path.clone(),
            dataset_path: self.dataset_path.clone(),
            saved_model_path: self.saved_model_path.clone(),
            class_labels: engine.as_ref().map(|e| e.model.labels.clone()),
            feature_size: engine
                .as_ref()
                .map(|e| e.model.head.feature_size())
                .or(descriptor.feature_size),
            loaded: engine.is_some(),
        }
    }

    /// Trains on the dataset path given to the builder
    pub fn fit_model(&self) -> Result<TrainingReport, ClassifierError> {
        let dataset_path = self
            .dataset_path
            .clone()
            .ok_or_else(|| ClassifierError::ValidationError("No dataset path configured".into()))?;
        self.train(dataset_path)
    }

    /// Trains a new head on the images under `dataset_path` and saves it.
    ///
    /// The tree is split 99/1 into train and test sets; the test set is only
    /// used for the returned metrics. Test images whose label never appears in
    /// the training set are left out of the metrics. On success the new model
    /// replaces any resident one.
    ///
    /// # Errors
    /// - `Dataset` if the tree cannot be read
    /// - `Image` or `ModelError` if any image fails to featurize
    /// - `TrainingError` if the training set is empty or the head cannot be fitted
    /// - `Store` if the model cannot be written
    pub fn train(&self, dataset_path: impl AsRef<Path>) -> Result<TrainingReport, ClassifierError> {
        let dataset_path = dataset_path.as_ref();
        info!("=== Training from {:?} ===", dataset_path);
        let split = match self.seed {
            Some(seed) => read_data_seeded(dataset_path, seed)?,
            None => read_data(dataset_path)?,
        };

        let labels: Vec<String> = split
            .train
            .iter()
            .filter_map(|e| e.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let train_keys = Self::keys_for(&split.train, &labels)?;
        let train_features = self.featurize(&split.train)?;
        info!(
            "Featurized {} training images ({} classes)",
            split.train.len(),
            labels.len()
        );

        let head = self
            .trainer
            .fit(train_features.view(), &train_keys, labels.len())?;

        let mut descriptor = self.extractor.descriptor();
        descriptor.feature_size = Some(train_features.ncols());
        let model = Arc::new(TrainedModel::new(
            labels,
            self.preprocessor.settings().clone(),
            descriptor,
            head,
        )?);

        let (test_rows, skipped): (Vec<ImageExample>, Vec<ImageExample>) =
            split.test.iter().cloned().partition(|e| {
                e.label().and_then(|l| model.key_of(l)).is_some()
            });
        for row in &skipped {
            warn!(
                "Skipping test image {} with label {:?} unseen in training",
                row.image, row.label
            );
        }
        let test_keys = Self::keys_for(&test_rows, &model.labels)?;
        let test_features = self.featurize(&test_rows)?;
        let metrics = MulticlassMetrics::evaluate(&model.head, test_features.view(), &test_keys)?;
        match &metrics {
            Some(m) => info!(
                "Test log-loss {:.4}, micro accuracy {:.3} on {} images",
                m.log_loss, m.micro_accuracy, m.count
            ),
            None => info!("Test set is empty; no metrics computed"),
        }

        save_model(&model, &self.saved_model_path)?;
        info!("Saved model to {:?}", self.saved_model_path);

        let engine = PredictionEngine::new(Arc::clone(&model), Arc::clone(&self.extractor))?;
        *self.lock_engine() = Some(Arc::new(engine));

        Ok(TrainingReport {
            model,
            metrics,
            train_count: split.train.len(),
            test_count: split.test.len(),
            skipped_test_count: skipped.len(),
            saved_to: self.saved_model_path.clone(),
        })
    }

    /// Classifies one image, loading the saved model first if needed.
    ///
    /// # Errors
    /// - `Store` if no model is resident and the saved one cannot be read
    /// - `SchemaMismatch` if the saved model does not fit the extractor
    /// - `Image`, `ModelError` or `PredictionError` from the pipeline itself
    pub fn classify(&self, image: &ImageSource) -> Result<Prediction, ClassifierError> {
        let engine = self.engine()?;
        engine.predict(image)
    }

    /// Classifies the image at `path`, returning `(scores, label)`
    pub fn classify_single_image(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(Vec<f32>, String), ClassifierError> {
        let prediction = self.classify(&ImageSource::Path(path.as_ref().to_path_buf()))?;
        Ok(prediction.into_parts())
    }

    /// Classifies an example, ignoring any label it carries
    pub fn classify_example(&self, example: &ImageExample) -> Result<Prediction, ClassifierError> {
        self.classify(&example.image)
    }

    /// Loads the saved model now instead of on the first classification
    pub fn preload(&self) -> Result<Arc<TrainedModel>, ClassifierError> {
        Ok(Arc::clone(self.engine()?.model()))
    }

    /// Drops the resident model; the next classification reloads it from disk
    pub fn clear_cache(&self) {
        if self.lock_engine().take().is_some() {
            info!("Cleared resident model");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_engine().is_some()
    }

    fn engine(&self) -> Result<Arc<PredictionEngine>, ClassifierError> {
        let mut guard = self.lock_engine();
        if let Some(engine) = guard.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let model = load_model(&self.saved_model_path).map_err(|e| {
            error!("Failed to load model from {:?}: {}", self.saved_model_path, e);
            e
        })?;
        let engine = Arc::new(PredictionEngine::new(
            Arc::new(model),
            Arc::clone(&self.extractor),
        )?);
        info!("Loaded model from {:?}", self.saved_model_path);
        *guard = Some(Arc::clone(&engine));
        Ok(engine)
    }

    // The slot is only ever replaced whole; poisoning leaves it consistent.
    fn lock_engine(&self) -> MutexGuard<'_, Option<Arc<PredictionEngine>>> {
        self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn featurize(&self, rows: &[ImageExample]) -> Result<Array2<f32>, ClassifierError> {
        let mut vectors: Vec<Array1<f32>> = Vec::with_capacity(rows.len());
        for row in rows {
            let features = self
                .preprocessor
                .prepare(&row.image)
                .and_then(|pixels| self.extractor.extract(&pixels))
                .map_err(|e| {
                    error!("Failed to featurize {}: {}", row.image, e);
                    e
                })?;
            if let Some(first) = vectors.first() {
                if first.len() != features.len() {
                    return Err(ClassifierError::PredictionError(format!(
                        "Extractor returned {} features for {}, expected {}",
                        features.len(),
                        row.image,
                        first.len()
                    )));
                }
            }
            vectors.push(features);
        }

        let cols = vectors
            .first()
            .map(|v| v.len())
            .or(self.extractor.descriptor().feature_size)
            .unwrap_or(0);
        let mut matrix = Array2::<f32>::zeros((vectors.len(), cols));
        for (mut row, vector) in matrix.rows_mut().into_iter().zip(&vectors) {
            row.assign(vector);
        }
        Ok(matrix)
    }

    fn keys_for(rows: &[ImageExample], labels: &[String]) -> Result<Vec<usize>, ClassifierError> {
        rows.iter()
            .map(|row| {
                let label = row.label().ok_or_else(|| {
                    ClassifierError::ValidationError(format!(
                        "Training image {} has no label",
                        row.image
                    ))
                })?;
                labels.iter().position(|l| l == label).ok_or_else(|| {
                    ClassifierError::ValidationError(format!("Unknown label '{}'", label))
                })
            })
            .collect()
    }
}
