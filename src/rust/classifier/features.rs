use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{error, info};
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::preprocess::ImageSettings;
use crate::model_store::file_sha256;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Identifies the network that produced a set of features.
///
/// Saved models keep the descriptor of the extractor they were trained with so
/// that loading them next to a different network fails early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorDescriptor {
    pub input_name: String,
    pub output_name: String,
    /// Length of the feature vector, when known
    pub feature_size: Option<usize>,
    /// SHA-256 of the network file, when the network came from a file
    pub fingerprint: Option<String>,
}

impl ExtractorDescriptor {
    /// Checks that features from `other` can be scored by a head trained on `self`.
    /// Unknown sizes and fingerprints are not compared.
    pub fn check_compatible(&self, other: &ExtractorDescriptor) -> Result<(), ClassifierError> {
        if self.input_name != other.input_name || self.output_name != other.output_name {
            return Err(ClassifierError::SchemaMismatch(format!(
                "Model was trained on tensors '{}' -> '{}', extractor uses '{}' -> '{}'",
                self.input_name, self.output_name, other.input_name, other.output_name
            )));
        }
        if let (Some(a), Some(b)) = (self.feature_size, other.feature_size) {
            if a != b {
                return Err(ClassifierError::SchemaMismatch(format!(
                    "Model expects {} features, extractor produces {}",
                    a, b
                )));
            }
        }
        if let (Some(a), Some(b)) = (&self.fingerprint, &other.fingerprint) {
            if a != b {
                return Err(ClassifierError::SchemaMismatch(format!(
                    "Pretrained network changed since training (sha256 {} vs {})",
                    a, b
                )));
            }
        }
        Ok(())
    }
}

/// Maps a preprocessed image to a feature vector.
///
/// The production implementation is [`OnnxFeatureExtractor`]; anything else
/// that can turn pixels into a fixed-length vector (a stub in tests, another
/// runtime) can be plugged into the classifier builder instead.
pub trait FeatureExtractor: Send + Sync {
    /// Runs one image, shaped `[1, H, W, C]` or `[1, C, H, W]`, through the network
    fn extract(&self, pixels: &Array4<f32>) -> Result<Array1<f32>, ClassifierError>;

    /// Describes the network for compatibility checks
    fn descriptor(&self) -> ExtractorDescriptor;
}

/// Feature extractor backed by a frozen ONNX network.
///
/// The network must accept one float image tensor and expose the feature
/// layer as a named output. Everything after that layer is ignored.
#[derive(Debug)]
pub struct OnnxFeatureExtractor {
    model_path: PathBuf,
    session: Session,
    input_name: String,
    output_name: String,
    feature_size: usize,
    fingerprint: String,
}

impl OnnxFeatureExtractor {
    /// Loads the network at `model_path`, checks that the configured tensors
    /// exist and infers the feature size by running a blank image.
    pub fn open(
        model_path: impl AsRef<Path>,
        settings: &ImageSettings,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(ClassifierError::BuildError(format!(
                "Pretrained model not found: {}",
                model_path.display()
            )));
        }
        settings.validate()?;

        let session = create_session_builder(runtime_config)?
            .commit_from_file(model_path)
            .map_err(|e| {
                error!("Failed to load pretrained model {:?}: {}", model_path, e);
                ClassifierError::ModelError(format!("Failed to load pretrained model: {}", e))
            })?;

        Self::validate_model(&session, settings)?;
        info!("Pretrained model structure validated successfully");

        let fingerprint = file_sha256(model_path)?;
        let mut extractor = Self {
            model_path: model_path.to_path_buf(),
            session,
            input_name: settings.input_name.clone(),
            output_name: settings.output_name.clone(),
            feature_size: 0,
            fingerprint,
        };

        let blank = Array4::<f32>::zeros(settings.input_shape());
        extractor.feature_size = extractor.extract(&blank)?.len();
        info!(
            "Inferred feature size from '{}': {}",
            extractor.output_name, extractor.feature_size
        );
        Ok(extractor)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn feature_size(&self) -> usize {
        self.feature_size
    }

    fn validate_model(session: &Session, settings: &ImageSettings) -> Result<(), ClassifierError> {
        if !session.inputs.iter().any(|i| i.name == settings.input_name) {
            let found: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
            return Err(ClassifierError::ModelError(format!(
                "Model has no input named '{}' (inputs: {:?})",
                settings.input_name, found
            )));
        }
        if !session.outputs.iter().any(|o| o.name == settings.output_name) {
            let found: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
            return Err(ClassifierError::ModelError(format!(
                "Model has no output named '{}' (outputs: {:?})",
                settings.output_name, found
            )));
        }
        Ok(())
    }
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn extract(&self, pixels: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
        let input_dyn = pixels.clone().into_dyn();
        let input = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input).map_err(|e| {
                ClassifierError::ModelError(format!("Failed to create input tensor: {}", e))
            })?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e))
            })?;

        // Batch of one: every value after the batch axis belongs to this image.
        Ok(Array1::from_iter(output_tensor.iter().cloned()))
    }

    fn descriptor(&self) -> ExtractorDescriptor {
        ExtractorDescriptor {
            input_name: self.input_name.clone(),
            output_name: self.output_name.clone(),
            feature_size: Some(self.feature_size),
            fingerprint: Some(self.fingerprint.clone()),
        }
    }
}
