use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::trainer::ClassifierHead;
use super::utils::argmax;

const PROBABILITY_FLOOR: f64 = 1e-15;

/// Quality of a classifier head on a labeled evaluation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticlassMetrics {
    /// Mean negative log-probability of the true class
    pub log_loss: f64,
    /// Improvement of `log_loss` over always predicting the class frequencies.
    /// 1.0 is perfect, 0.0 is no better than the prior, negative is worse.
    pub log_loss_reduction: f64,
    /// Fraction of rows classified correctly
    pub micro_accuracy: f64,
    /// Mean per-class accuracy over the classes present in the evaluation set
    pub macro_accuracy: f64,
    /// Number of evaluated rows
    pub count: usize,
}

impl MulticlassMetrics {
    /// Scores every row of `features` and compares against `keys`.
    ///
    /// Returns `Ok(None)` when there is nothing to evaluate.
    pub fn evaluate(
        head: &ClassifierHead,
        features: ArrayView2<f32>,
        keys: &[usize],
    ) -> Result<Option<Self>, ClassifierError> {
        if keys.len() != features.nrows() {
            return Err(ClassifierError::ValidationError(format!(
                "Got {} labels for {} feature rows",
                keys.len(),
                features.nrows()
            )));
        }
        if keys.is_empty() {
            return Ok(None);
        }

        let num_classes = head.num_classes();
        let mut class_counts = vec![0usize; num_classes];
        let mut class_correct = vec![0usize; num_classes];
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;

        for (row, &key) in features.rows().into_iter().zip(keys) {
            if key >= num_classes {
                return Err(ClassifierError::ValidationError(format!(
                    "Label key {} out of range for {} classes",
                    key, num_classes
                )));
            }
            let probs = head.probabilities(row)?;
            let p_true = (probs[key] as f64).max(PROBABILITY_FLOOR);
            loss_sum -= p_true.ln();

            class_counts[key] += 1;
            if argmax(probs.view()) == Some(key) {
                correct += 1;
                class_correct[key] += 1;
            }
        }

        let n = keys.len() as f64;
        let log_loss = loss_sum / n;
        let prior_log_loss: f64 = class_counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.ln()
            })
            .sum();
        let log_loss_reduction = if prior_log_loss > 0.0 {
            1.0 - log_loss / prior_log_loss
        } else {
            0.0
        };

        let present: Vec<f64> = class_counts
            .iter()
            .zip(&class_correct)
            .filter(|(&count, _)| count > 0)
            .map(|(&count, &ok)| ok as f64 / count as f64)
            .collect();
        let macro_accuracy = present.iter().sum::<f64>() / present.len() as f64;

        Ok(Some(Self {
            log_loss,
            log_loss_reduction,
            micro_accuracy: correct as f64 / n,
            macro_accuracy,
            count: keys.len(),
        }))
    }
}
