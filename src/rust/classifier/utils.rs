use ndarray::{Array1, ArrayView1};

pub(crate) fn normalize_vector(vec: &Array1<f32>) -> Array1<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec / norm
    } else {
        Array1::zeros(vec.len())
    }
}

pub(crate) fn average_vectors(vectors: &[Array1<f32>], feature_size: usize) -> Array1<f32> {
    if vectors.is_empty() {
        return Array1::zeros(feature_size);
    }
    let sum = vectors.iter().fold(Array1::zeros(vectors[0].len()), |acc, v| acc + v);
    sum / vectors.len() as f32
}

/// Numerically stable softmax.
pub(crate) fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp = logits.mapv(|x| (x - max).exp());
    let sum = exp.sum();
    if sum > 0.0 && sum.is_finite() {
        exp / sum
    } else {
        Array1::from_elem(logits.len(), 1.0 / logits.len().max(1) as f32)
    }
}

/// Index of the largest score; ties go to the lowest index.
pub(crate) fn argmax(scores: ArrayView1<f32>) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
