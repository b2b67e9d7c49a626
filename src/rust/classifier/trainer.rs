use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{average_vectors, normalize_vector, softmax};

/// Fits a classifier head on feature vectors.
///
/// `keys[i]` is the class index of row `i` of `features`, in `0..num_classes`.
pub trait ClassifierTrainer: Send + Sync {
    fn fit(
        &self,
        features: ArrayView2<f32>,
        keys: &[usize],
        num_classes: usize,
    ) -> Result<ClassifierHead, ClassifierError>;
}

/// A fitted classifier head. Serialized as part of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierHead {
    Softmax(SoftmaxHead),
    Prototype(PrototypeHead),
}

impl ClassifierHead {
    pub fn num_classes(&self) -> usize {
        match self {
            Self::Softmax(head) => head.bias.len(),
            Self::Prototype(head) => head.prototypes.nrows(),
        }
    }

    pub fn feature_size(&self) -> usize {
        match self {
            Self::Softmax(head) => head.weights.nrows(),
            Self::Prototype(head) => head.prototypes.ncols(),
        }
    }

    /// Checks that the head's arrays agree with each other.
    ///
    /// A head read back from disk can parse cleanly and still be unusable;
    /// scoring such a head would fail inside ndarray.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        let (classes, features) = (self.num_classes(), self.feature_size());
        if classes == 0 || features == 0 {
            return Err(ClassifierError::SchemaMismatch(format!(
                "Head is degenerate: {} classes over {} features",
                classes, features
            )));
        }
        match self {
            Self::Softmax(head) => {
                let check = |name: &str, len: usize, expected: usize| {
                    if len == expected {
                        Ok(())
                    } else {
                        Err(ClassifierError::SchemaMismatch(format!(
                            "Softmax head {} has length {}, expected {}",
                            name, len, expected
                        )))
                    }
                };
                check("mean", head.mean.len(), features)?;
                check("std", head.std.len(), features)?;
                check("weight columns", head.weights.ncols(), classes)?;
                if head.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                    return Err(ClassifierError::SchemaMismatch(
                        "Softmax head std must be finite and positive".into(),
                    ));
                }
            }
            Self::Prototype(_) => {}
        }
        Ok(())
    }

    /// Per-class scores for one feature vector.
    ///
    /// Softmax heads return probabilities; prototype heads return cosine
    /// similarities in `[-1, 1]`.
    pub fn scores(&self, features: ArrayView1<f32>) -> Result<Array1<f32>, ClassifierError> {
        if features.len() != self.feature_size() {
            return Err(ClassifierError::PredictionError(format!(
                "Expected {} features, got {}",
                self.feature_size(),
                features.len()
            )));
        }
        Ok(match self {
            Self::Softmax(head) => softmax(head.logits(features).view()),
            Self::Prototype(head) => {
                let input = normalize_vector(&features.to_owned());
                head.prototypes.dot(&input)
            }
        })
    }

    /// Scores turned into a probability distribution
    pub fn probabilities(&self, features: ArrayView1<f32>) -> Result<Array1<f32>, ClassifierError> {
        let scores = self.scores(features)?;
        Ok(match self {
            Self::Softmax(_) => scores,
            Self::Prototype(_) => softmax(scores.view()),
        })
    }
}

/// Multinomial logistic regression over standardized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxHead {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
    /// `[feature_size, num_classes]`
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl SoftmaxHead {
    fn standardize(&self, features: ArrayView1<f32>) -> Array1<f32> {
        (&features - &self.mean) / &self.std
    }

    fn logits(&self, features: ArrayView1<f32>) -> Array1<f32> {
        self.standardize(features).dot(&self.weights) + &self.bias
    }
}

/// Nearest-prototype head: one normalized mean feature vector per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeHead {
    /// `[num_classes, feature_size]`
    pub prototypes: Array2<f32>,
}

fn validate_training_data(
    features: &ArrayView2<f32>,
    keys: &[usize],
    num_classes: usize,
) -> Result<(), ClassifierError> {
    if features.nrows() == 0 {
        return Err(ClassifierError::TrainingError(
            "Training set is empty; at least one example is required".into(),
        ));
    }
    if features.ncols() == 0 {
        return Err(ClassifierError::TrainingError("Feature vectors are empty".into()));
    }
    if keys.len() != features.nrows() {
        return Err(ClassifierError::TrainingError(format!(
            "Got {} labels for {} feature rows",
            keys.len(),
            features.nrows()
        )));
    }
    if num_classes == 0 {
        return Err(ClassifierError::TrainingError("At least one class is required".into()));
    }
    if let Some(&bad) = keys.iter().find(|&&k| k >= num_classes) {
        return Err(ClassifierError::TrainingError(format!(
            "Label key {} out of range for {} classes",
            bad, num_classes
        )));
    }
    Ok(())
}

/// Maximum-entropy trainer: softmax regression fitted by full-batch gradient
/// descent with L2 regularization.
///
/// Weights start at zero, so the same data always yields the same head.
#[derive(Debug, Clone)]
pub struct SoftmaxTrainer {
    pub learning_rate: f32,
    pub iterations: usize,
    pub l2: f32,
}

impl Default for SoftmaxTrainer {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            iterations: 300,
            l2: 1e-4,
        }
    }
}

impl ClassifierTrainer for SoftmaxTrainer {
    fn fit(
        &self,
        features: ArrayView2<f32>,
        keys: &[usize],
        num_classes: usize,
    ) -> Result<ClassifierHead, ClassifierError> {
        validate_training_data(&features, keys, num_classes)?;
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 || self.iterations == 0 {
            return Err(ClassifierError::ValidationError(
                "Learning rate must be positive and iterations non-zero".into(),
            ));
        }

        let n = features.nrows();
        let d = features.ncols();
        let mean = features
            .mean_axis(Axis(0))
            .ok_or_else(|| ClassifierError::TrainingError("Training set is empty".into()))?;
        let std = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-6 { s } else { 1.0 });
        let x = (&features - &mean) / &std;

        let mut targets = Array2::<f32>::zeros((n, num_classes));
        for (row, &key) in keys.iter().enumerate() {
            targets[[row, key]] = 1.0;
        }

        let mut weights = Array2::<f32>::zeros((d, num_classes));
        let mut bias = Array1::<f32>::zeros(num_classes);
        let scale = 1.0 / n as f32;

        for iteration in 0..self.iterations {
            let mut probs = x.dot(&weights) + &bias;
            for mut row in probs.rows_mut() {
                let p = softmax(row.view());
                row.assign(&p);
            }
            let residual = &probs - &targets;

            let grad_w = x.t().dot(&residual) * scale + &weights * self.l2;
            let grad_b = residual.sum_axis(Axis(0)) * scale;
            weights.scaled_add(-self.learning_rate, &grad_w);
            bias.scaled_add(-self.learning_rate, &grad_b);

            if iteration % 100 == 0 {
                debug!(
                    "Softmax iteration {}: gradient norm {:.6}",
                    iteration,
                    grad_w.iter().map(|g| g * g).sum::<f32>().sqrt()
                );
            }
        }

        info!(
            "Fitted softmax head: {} rows, {} features, {} classes",
            n, d, num_classes
        );
        Ok(ClassifierHead::Softmax(SoftmaxHead {
            mean,
            std,
            weights,
            bias,
        }))
    }
}

/// Trainer that averages the normalized features of each class into a prototype.
#[derive(Debug, Clone, Default)]
pub struct PrototypeTrainer;

impl ClassifierTrainer for PrototypeTrainer {
    fn fit(
        &self,
        features: ArrayView2<f32>,
        keys: &[usize],
        num_classes: usize,
    ) -> Result<ClassifierHead, ClassifierError> {
        validate_training_data(&features, keys, num_classes)?;
        let d = features.ncols();

        let mut per_class: Vec<Vec<Array1<f32>>> = vec![Vec::new(); num_classes];
        for (row, &key) in features.rows().into_iter().zip(keys) {
            per_class[key].push(normalize_vector(&row.to_owned()));
        }

        let mut prototypes = Array2::<f32>::zeros((num_classes, d));
        for (key, vectors) in per_class.iter().enumerate() {
            let avg_vector = average_vectors(vectors, d);
            prototypes.row_mut(key).assign(&normalize_vector(&avg_vector));
        }

        info!("Computed {} class prototypes of size {}", num_classes, d);
        Ok(ClassifierHead::Prototype(PrototypeHead { prototypes }))
    }
}
