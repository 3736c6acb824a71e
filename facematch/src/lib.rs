//! Face identification by best-match cosine similarity over enrolled
//! embeddings.
//!
//! Embeddings come from an upstream extractor (e.g. a 128-d face-api
//! descriptor); this crate never sees pixels.
//!
//! # Usage
//!
//! ```
//! use facegate_facematch::{FaceRegistry, Profile, RegistryConfig};
//!
//! let reg = FaceRegistry::with_memory_store(RegistryConfig {
//!     dim: 4,
//!     ..RegistryConfig::default()
//! });
//!
//! let profile = Profile {
//!     given_name: "Ana".into(),
//!     family_name: "Quispe".into(),
//!     national_id: "70112233".into(),
//!     email: "ana@example.com".into(),
//!     ..Profile::default()
//! };
//! reg.enroll("ana".into(), profile, vec![0.9, 0.1, 0.3, 0.2]).unwrap();
//!
//! let found = reg.identify(&[0.88, 0.12, 0.31, 0.2]).unwrap();
//! assert!(found.result.matched);
//! assert_eq!(found.result.identity_id.unwrap().as_str(), "ana");
//! ```
//!
//! # Components
//!
//! - [`vecmath`]: dot product, norm, cosine similarity, Euclidean distance.
//! - [`EnrollmentValidator`]: gates what may enter a store.
//! - [`identify`] / [`MatchEngine`]: one full linear scan, keeps the best
//!   score, ties go to the lowest identity id, accepts iff
//!   `score > threshold`.
//! - [`ThresholdPolicy`]: the versioned acceptance threshold.
//! - [`EmbeddingStore`]: read/write interface to enrolled records;
//!   [`MemoryStore`] is the in-memory implementation.
//! - [`FaceRegistry`]: the caller-side service tying these together.
//!
//! # Consistency
//!
//! An identification scans a snapshot of the store. An enrollment that
//! lands mid-scan may or may not be seen by that scan.

mod embedding;
mod engine;
mod error;
mod policy;
mod record;
mod registry;
mod store;
pub mod vecmath;

pub use embedding::{DEFAULT_DIM, Embedding, EnrollmentValidator, ValidEmbedding};
pub use engine::{MatchEngine, MatchResult, identify};
pub use error::{FaceError, MatchError, PolicyError, StoreError, ValidationError, VectorError};
pub use policy::{DEFAULT_ACCEPT_THRESHOLD, DEFAULT_POLICY_VERSION, Metric, ThresholdPolicy};
pub use record::{Candidate, EnrolledRecord, Enrollee, IdentityId, Profile};
pub use registry::{DuplicatePolicy, FaceRegistry, Identification, RegistryConfig};
pub use store::{CandidateIter, EmbeddingStore, MemoryStore};
