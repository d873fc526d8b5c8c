//! Scoring math shared by the task pipelines

use ndarray::ArrayView2;
use ordered_float::OrderedFloat;

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Index and value of the largest element; the first wins ties
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (index, value)| match best {
            Some((_, best_value)) if OrderedFloat(value) <= OrderedFloat(best_value) => best,
            _ => Some((index, value)),
        })
}

/// Sort descending by `score`, keeping input order among equal scores
pub fn sort_by_score_desc<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| OrderedFloat(score(b)).cmp(&OrderedFloat(score(a))));
}

/// The `k` highest scores as `(index, score)`, ties broken by ascending index
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    sort_by_score_desc(&mut ranked, |&(_, score)| score);
    ranked.truncate(k);
    ranked
}

/// Scale to unit L2 norm in place; zero vectors stay zero
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Average the rows of `hidden` whose mask entry is set
pub fn mean_pool(hidden: ArrayView2<'_, f32>, mask: &[u32]) -> Vec<f32> {
    let (rows, cols) = hidden.dim();
    let mut pooled = vec![0.0f32; cols];
    let mut count = 0usize;
    for row in 0..rows {
        if mask.get(row).copied().unwrap_or(1) == 0 {
            continue;
        }
        count += 1;
        for (acc, value) in pooled.iter_mut().zip(hidden.row(row).iter()) {
            *acc += value;
        }
    }
    if count > 0 {
        pooled.iter_mut().for_each(|v| *v /= count as f32);
    }
    pooled
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
