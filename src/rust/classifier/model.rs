use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::features::ExtractorDescriptor;
use super::preprocess::ImageSettings;
use super::trainer::ClassifierHead;
use super::utils::argmax;

/// Version of the saved model layout. Bumped on incompatible changes.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// A fitted pipeline: how images were preprocessed, which network produced
/// the features, the label mapping and the classifier head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub format_version: u32,
    /// Class labels indexed by key; also the order of every score vector
    pub labels: Vec<String>,
    pub image_settings: ImageSettings,
    pub extractor: ExtractorDescriptor,
    pub head: ClassifierHead,
}

/// Scores for a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// One score per class, in the order of [`TrainedModel::labels`]
    pub scores: Vec<f32>,
    pub predicted_label: String,
}

impl Prediction {
    pub fn into_parts(self) -> (Vec<f32>, String) {
        (self.scores, self.predicted_label)
    }
}

impl TrainedModel {
    pub fn new(
        labels: Vec<String>,
        image_settings: ImageSettings,
        extractor: ExtractorDescriptor,
        head: ClassifierHead,
    ) -> Result<Self, ClassifierError> {
        let model = Self {
            format_version: MODEL_FORMAT_VERSION,
            labels,
            image_settings,
            extractor,
            head,
        };
        model.validate()?;
        Ok(model)
    }

    /// Checks internal consistency after construction or deserialization
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(ClassifierError::SchemaMismatch(format!(
                "Unsupported model format version {} (expected {})",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.labels.is_empty() {
            return Err(ClassifierError::SchemaMismatch("Model has no labels".into()));
        }
        self.head.validate()?;
        if self.labels.len() != self.head.num_classes() {
            return Err(ClassifierError::SchemaMismatch(format!(
                "Model has {} labels but its head scores {} classes",
                self.labels.len(),
                self.head.num_classes()
            )));
        }
        if let Some(size) = self.extractor.feature_size {
            if size != self.head.feature_size() {
                return Err(ClassifierError::SchemaMismatch(format!(
                    "Extractor produces {} features but the head expects {}",
                    size,
                    self.head.feature_size()
                )));
            }
        }
        Ok(())
    }

    pub fn key_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Scores one feature vector and picks the best label
    pub fn predict(&self, features: ArrayView1<f32>) -> Result<Prediction, ClassifierError> {
        let scores = self.head.scores(features)?;
        let best = argmax(scores.view())
            .ok_or_else(|| ClassifierError::PredictionError("Model produced no scores".into()))?;
        Ok(Prediction {
            predicted_label: self.labels[best].clone(),
            scores: scores.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::trainer::PrototypeHead;
    use ndarray::array;

    fn model() -> TrainedModel {
        TrainedModel::new(
            vec!["cat".into(), "dog".into()],
            ImageSettings::default(),
            ExtractorDescriptor {
                input_name: "input".into(),
                output_name: "softmax2_pre_activation".into(),
                feature_size: Some(2),
                fingerprint: None,
            },
            ClassifierHead::Prototype(PrototypeHead {
                prototypes: array![[1.0f32, 0.0], [0.0, 1.0]],
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_picks_best_label() {
        let prediction = model().predict(array![0.2f32, 0.9].view()).unwrap();
        assert_eq!(prediction.predicted_label, "dog");
        assert_eq!(prediction.scores.len(), 2);
    }

    #[test]
    fn test_key_of() {
        let m = model();
        assert_eq!(m.key_of("dog"), Some(1));
        assert_eq!(m.key_of("fish"), None);
    }

    #[test]
    fn test_label_count_mismatch() {
        let mut m = model();
        m.labels.push("fish".into());
        assert!(matches!(m.validate(), Err(ClassifierError::SchemaMismatch(_))));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut m = model();
        m.format_version = MODEL_FORMAT_VERSION + 1;
        let json = serde_json::to_string(&m).unwrap();
        let back: TrainedModel = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.validate(), Err(ClassifierError::SchemaMismatch(_))));
    }
}
