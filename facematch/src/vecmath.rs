//! Numeric primitives over embedding slices.
//!
//! Inputs are `f32` (what extractors emit); every accumulation runs in
//! `f64`. All functions are pure and dimension-checked: slices of unequal
//! length are an error, never truncated or padded.

use crate::error::VectorError;

/// Slack allowed beyond [-1, 1] for rounding in the final division.
pub const SCORE_TOLERANCE: f64 = 1e-9;

fn check_dims(a: &[f32], b: &[f32]) -> Result<(), VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(())
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f64, VectorError> {
    check_dims(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum())
}

/// Euclidean (L2) norm.
pub fn norm(a: &[f32]) -> f64 {
    a.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Returns 0 when either vector has zero norm. A result outside [-1, 1]
/// (beyond [`SCORE_TOLERANCE`]) or NaN is reported as
/// [`VectorError::ScoreOutOfRange`] rather than clamped.
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f64, VectorError> {
    check_dims(a, b)?;

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let x = x as f64;
        let y = y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    let bound = 1.0 + SCORE_TOLERANCE;
    if !(-bound..=bound).contains(&score) {
        return Err(VectorError::ScoreOutOfRange(score));
    }
    Ok(score)
}

/// Straight-line distance between two equal-length vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f64, VectorError> {
    check_dims(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt())
}
