use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::info;

use super::classifier::ImageClassifier;
use super::error::ClassifierError;
use super::features::{FeatureExtractor, OnnxFeatureExtractor};
use super::preprocess::{ImagePreprocessor, ImageSettings};
use super::trainer::{ClassifierTrainer, SoftmaxTrainer};
use crate::model_store::default_model_path;
use crate::runtime::RuntimeConfig;

/// A builder for constructing an [`ImageClassifier`] with a fluent interface.
///
/// A feature extractor is required: either a pretrained ONNX network via
/// [`with_pretrained_model`](Self::with_pretrained_model) or any
/// [`FeatureExtractor`] via [`with_feature_extractor`](Self::with_feature_extractor).
pub struct ImageClassifierBuilder {
    pretrained_model_path: Option<PathBuf>,
    extractor: Option<Arc<dyn FeatureExtractor>>,
    dataset_path: Option<PathBuf>,
    saved_model_path: Option<PathBuf>,
    image_settings: ImageSettings,
    trainer: Option<Arc<dyn ClassifierTrainer>>,
    seed: Option<u64>,
    runtime_config: RuntimeConfig,
}

impl Default for ImageClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageClassifierBuilder {
    /// Creates a new empty builder with default configuration
    pub fn new() -> Self {
        Self {
            pretrained_model_path: None,
            extractor: None,
            dataset_path: None,
            saved_model_path: None,
            image_settings: ImageSettings::default(),
            trainer: None,
            seed: None,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration for ONNX model execution
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets image size, pixel layout and the network tensors to use.
    /// Defaults to the Inception v1 settings.
    pub fn with_image_settings(mut self, settings: ImageSettings) -> Self {
        self.image_settings = settings;
        self
    }

    /// Uses the ONNX network at `path` as the feature extractor.
    ///
    /// The network is loaded by [`build`](Self::build).
    ///
    /// # Errors
    /// - `BuildError` if the path is empty or does not exist
    /// - `BuildError` if an extractor was already configured
    pub fn with_pretrained_model(
        mut self,
        path: impl AsRef<Path>,
    ) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ClassifierError::BuildError("Pretrained model path cannot be empty".into()));
        }
        if self.pretrained_model_path.is_some() || self.extractor.is_some() {
            return Err(ClassifierError::BuildError("Feature extractor already set".into()));
        }
        if !path.exists() {
            return Err(ClassifierError::BuildError(format!(
                "Pretrained model not found: {}",
                path.display()
            )));
        }
        self.pretrained_model_path = Some(path.to_path_buf());
        Ok(self)
    }

    /// Uses an already constructed feature extractor
    ///
    /// # Errors
    /// - `BuildError` if an extractor was already configured
    pub fn with_feature_extractor(
        mut self,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Result<Self, ClassifierError> {
        if self.pretrained_model_path.is_some() || self.extractor.is_some() {
            return Err(ClassifierError::BuildError("Feature extractor already set".into()));
        }
        self.extractor = Some(extractor);
        Ok(self)
    }

    /// Root of the `label/file` tree used by [`ImageClassifier::fit_model`]
    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = Some(path.into());
        self
    }

    /// Where trained models are written and loaded from.
    /// Defaults to [`default_model_path`].
    pub fn with_saved_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.saved_model_path = Some(path.into());
        self
    }

    /// Replaces the default [`SoftmaxTrainer`]
    pub fn with_trainer(mut self, trainer: impl ClassifierTrainer + 'static) -> Self {
        self.trainer = Some(Arc::new(trainer));
        self
    }

    /// Makes the train/test shuffle reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds and returns the final classifier.
    ///
    /// No saved model is read here; that happens on the first classification
    /// or on [`ImageClassifier::preload`].
    ///
    /// # Errors
    /// - `BuildError` if no feature extractor was configured
    /// - `ValidationError` if the image settings are invalid
    /// - `ModelError` if the pretrained network cannot be loaded
    pub fn build(self) -> Result<ImageClassifier, ClassifierError> {
        self.image_settings.validate()?;

        let extractor: Arc<dyn FeatureExtractor> =
            match (self.extractor, &self.pretrained_model_path) {
                (Some(extractor), _) => extractor,
                (None, Some(path)) => Arc::new(OnnxFeatureExtractor::open(
                    path,
                    &self.image_settings,
                    &self.runtime_config,
                )?),
                (None, None) => {
                    return Err(ClassifierError::BuildError(
                        "A pretrained model or feature extractor must be set".into(),
                    ))
                }
            };

        let saved_model_path = self
            .saved_model_path
            .unwrap_or_else(default_model_path);
        info!("Classifier will save its model to {:?}", saved_model_path);

        Ok(ImageClassifier {
            pretrained_model_path: self.pretrained_model_path,
            dataset_path: self.dataset_path,
            saved_model_path,
            preprocessor: ImagePreprocessor::new(self.image_settings),
            extractor,
            trainer: self
                .trainer
                .unwrap_or_else(|| Arc::new(SoftmaxTrainer::default())),
            seed: self.seed,
            engine: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ExtractorDescriptor;
    use ndarray::{Array1, Array4};

    struct ZeroExtractor;

    impl FeatureExtractor for ZeroExtractor {
        fn extract(&self, _pixels: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
            Ok(Array1::zeros(2))
        }

        fn descriptor(&self) -> ExtractorDescriptor {
            ExtractorDescriptor {
                input_name: "input".into(),
                output_name: "softmax2_pre_activation".into(),
                feature_size: Some(2),
                fingerprint: None,
            }
        }
    }

    #[test]
    fn test_build_requires_extractor() {
        let result = ImageClassifierBuilder::new().build();
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_pretrained_model_validation() {
        assert!(matches!(
            ImageClassifierBuilder::new().with_pretrained_model(""),
            Err(ClassifierError::BuildError(_))
        ));
        assert!(matches!(
            ImageClassifierBuilder::new().with_pretrained_model("/nonexistent/model.onnx"),
            Err(ClassifierError::BuildError(_))
        ));
    }

    #[test]
    fn test_extractor_set_twice() {
        let result = ImageClassifierBuilder::new()
            .with_feature_extractor(Arc::new(ZeroExtractor))
            .and_then(|b| b.with_feature_extractor(Arc::new(ZeroExtractor)));
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_invalid_image_settings() {
        let result = ImageClassifierBuilder::new()
            .with_feature_extractor(Arc::new(ZeroExtractor))
            .unwrap()
            .with_image_settings(ImageSettings {
                width: 0,
                ..ImageSettings::default()
            })
            .build();
        assert!(matches!(result, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_default_saved_model_path() {
        let classifier = ImageClassifierBuilder::new()
            .with_feature_extractor(Arc::new(ZeroExtractor))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(classifier.info().saved_model_path, default_model_path());
        assert!(!classifier.is_loaded());
    }
}
