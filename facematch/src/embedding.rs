use std::fmt;
use std::sync::Arc;

use crate::error::ValidationError;

/// Dimensionality of face-api style face descriptors.
pub const DEFAULT_DIM: usize = 128;

/// A raw embedding as produced by an extractor. Unchecked.
pub type Embedding = Vec<f32>;

/// An embedding that passed [`EnrollmentValidator::validate`].
///
/// Immutable and cheap to clone. The only way to obtain one is through
/// validation, so anything holding a `ValidEmbedding` has the configured
/// dimension, only finite values and a non-zero norm.
#[derive(Clone, PartialEq)]
pub struct ValidEmbedding(Arc<[f32]>);

impl ValidEmbedding {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Returns a shared handle to the underlying vector.
    pub fn shared(&self) -> Arc<[f32]> {
        Arc::clone(&self.0)
    }
}

impl AsRef<[f32]> for ValidEmbedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl fmt::Debug for ValidEmbedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidEmbedding")
            .field("dim", &self.0.len())
            .finish()
    }
}

/// Gatekeeper for embeddings entering a store.
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentValidator {
    dim: usize,
}

impl EnrollmentValidator {
    /// Creates a validator for vectors of length `dim`. Panics if `dim` is 0.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "facematch: embedding dimension must be positive");
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Checks, in order: length, finiteness of every element, non-zero.
    pub fn validate(&self, candidate: Embedding) -> Result<ValidEmbedding, ValidationError> {
        if candidate.len() != self.dim {
            return Err(ValidationError::DimensionMismatch {
                expected: self.dim,
                got: candidate.len(),
            });
        }
        if let Some(index) = candidate.iter().position(|x| !x.is_finite()) {
            return Err(ValidationError::NonFiniteValue { index });
        }
        if candidate.iter().all(|&x| x == 0.0) {
            return Err(ValidationError::DegenerateVector);
        }
        Ok(ValidEmbedding(candidate.into()))
    }
}

impl Default for EnrollmentValidator {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed(dim: usize) -> Vec<f32> {
        (0..dim).map(|i| ((i as f32) * 0.37).sin()).collect()
    }

    #[test]
    fn accepts_well_formed_vector() {
        let v = EnrollmentValidator::default();
        let emb = v.validate(well_formed(128)).unwrap();
        assert_eq!(emb.dim(), 128);
        assert_eq!(emb.as_slice(), well_formed(128).as_slice());
    }

    #[test]
    fn rejects_short_vector() {
        let v = EnrollmentValidator::new(128);
        assert_eq!(
            v.validate(well_formed(127)),
            Err(ValidationError::DimensionMismatch {
                expected: 128,
                got: 127
            })
        );
    }

    #[test]
    fn rejects_long_vector() {
        let v = EnrollmentValidator::new(128);
        assert!(matches!(
            v.validate(well_formed(129)),
            Err(ValidationError::DimensionMismatch { got: 129, .. })
        ));
    }

    #[test]
    fn rejects_nan() {
        let mut e = well_formed(128);
        e[40] = f32::NAN;
        assert_eq!(
            EnrollmentValidator::new(128).validate(e),
            Err(ValidationError::NonFiniteValue { index: 40 })
        );
    }

    #[test]
    fn rejects_infinity() {
        let mut e = well_formed(128);
        e[0] = f32::NEG_INFINITY;
        assert_eq!(
            EnrollmentValidator::new(128).validate(e),
            Err(ValidationError::NonFiniteValue { index: 0 })
        );
    }

    #[test]
    fn rejects_all_zero() {
        assert_eq!(
            EnrollmentValidator::new(128).validate(vec![0.0; 128]),
            Err(ValidationError::DegenerateVector)
        );
        // Negative zero is still zero.
        assert_eq!(
            EnrollmentValidator::new(2).validate(vec![-0.0, 0.0]),
            Err(ValidationError::DegenerateVector)
        );
    }

    #[test]
    fn length_checked_before_contents() {
        let v = EnrollmentValidator::new(4);
        assert!(matches!(
            v.validate(vec![f32::NAN; 3]),
            Err(ValidationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn single_nonzero_component_is_valid() {
        let mut e = vec![0.0; 128];
        e[127] = 1e-30;
        assert!(EnrollmentValidator::new(128).validate(e).is_ok());
    }

    #[test]
    #[should_panic(expected = "dimension must be positive")]
    fn zero_dim_panics() {
        EnrollmentValidator::new(0);
    }
}
