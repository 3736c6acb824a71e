use thiserror::Error;

use crate::record::IdentityId;

/// Errors from the vector primitives in [`crate::vecmath`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorError {
    #[error("facematch: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A computed cosine similarity fell outside [-1, 1]. Always a defect
    /// upstream (corrupt stored vector, overflow), never a data condition.
    #[error("facematch: similarity {0} outside [-1, 1]")]
    ScoreOutOfRange(f64),
}

/// Reasons an embedding is refused at enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("facematch: embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("facematch: embedding has non-finite value at index {index}")]
    NonFiniteValue { index: usize },

    #[error("facematch: embedding is all zeros")]
    DegenerateVector,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("facematch: accept threshold {0} must lie strictly inside (-1, 1)")]
    ThresholdOutOfRange(f64),

    #[error("facematch: accept threshold is not a finite number")]
    NonFiniteThreshold,
}

/// Failures reported by an [`crate::EmbeddingStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be read or written.
    #[error("facematch: store unavailable: {0}")]
    Unavailable(String),

    #[error("facematch: identity {0} is already enrolled")]
    DuplicateIdentity(IdentityId),

    #[error("facematch: {field} already belongs to identity {existing}")]
    DuplicateProfile {
        field: &'static str,
        existing: IdentityId,
    },

    #[error("facematch: identity {0} not found")]
    NotFound(IdentityId),
}

/// Errors from [`crate::identify`] and [`crate::MatchEngine::identify`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("facematch: query has non-finite value at index {index}")]
    NonFiniteQuery { index: usize },

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Umbrella error returned by [`crate::FaceRegistry`].
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("facematch: identity id must not be empty")]
    EmptyIdentity,

    #[error("facematch: required profile field {0} is empty")]
    MissingField(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl FaceError {
    /// Returns true when the failure came from the backing store rather
    /// than from the submitted data.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            FaceError::Store(StoreError::Unavailable(_))
                | FaceError::Match(MatchError::Store(StoreError::Unavailable(_)))
        )
    }
}
