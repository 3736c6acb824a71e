use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::{DEFAULT_DIM, Embedding, EnrollmentValidator};
use crate::engine::{MatchEngine, MatchResult};
use crate::error::{FaceError, StoreError};
use crate::policy::ThresholdPolicy;
use crate::record::{Candidate, EnrolledRecord, Enrollee, IdentityId, Profile};
use crate::store::{EmbeddingStore, MemoryStore};

/// What to do when an identity id is enrolled a second time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse with [`StoreError::DuplicateIdentity`].
    #[default]
    Reject,
    /// Swap in a new record with a fresh creation time.
    Replace,
}

/// Controls registry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Embedding dimension (e.g. 128 for face-api descriptors).
    /// 0 means the default of 128.
    #[serde(default)]
    pub dim: usize,

    #[serde(default)]
    pub policy: ThresholdPolicy,

    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,

    /// Refuse a new identity whose national id or email is already
    /// enrolled under a different identity. Default: true.
    #[serde(default = "default_true")]
    pub unique_profile_fields: bool,
}

fn default_true() -> bool {
    true
}

impl RegistryConfig {
    fn with_defaults(mut self) -> Self {
        if self.dim == 0 {
            self.dim = DEFAULT_DIM;
        }
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            policy: ThresholdPolicy::default(),
            on_duplicate: DuplicatePolicy::default(),
            unique_profile_fields: true,
        }
    }
}

/// A match decision plus the matched person's outward profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(flatten)]
    pub result: MatchResult,
    /// Present only on a match. May be absent even then if the record was
    /// removed between the scan and the lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollee: Option<Enrollee>,
}

/// One mutex per key (identity id or claimed profile value) currently
/// in use by an enrollment or removal.
#[derive(Default)]
struct IdentityLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Drops table entries nobody else holds or waits on. Runs on unwind too.
struct Slots<'a> {
    locks: &'a IdentityLocks,
    held: Vec<(String, Arc<Mutex<()>>)>,
}

impl Drop for Slots<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, slot) in &self.held {
            if Arc::strong_count(slot) == 2 {
                table.remove(key);
            }
        }
    }
}

impl IdentityLocks {
    /// Runs `f` while holding the locks for every key. Keys are taken in
    /// sorted order, so callers with overlapping keys cannot deadlock.
    /// Disjoint key sets run concurrently.
    fn with<T>(
        &self,
        mut keys: Vec<String>,
        f: impl FnOnce() -> Result<T, FaceError>,
    ) -> Result<T, FaceError> {
        keys.sort();
        keys.dedup();

        let slots = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Slots {
                locks: self,
                held: keys
                    .into_iter()
                    .map(|key| {
                        let slot = Arc::clone(table.entry(key.clone()).or_default());
                        (key, slot)
                    })
                    .collect(),
            }
        };

        // Slots guard only `()`, so a panic elsewhere leaves nothing to repair.
        let _guards: Vec<MutexGuard<'_, ()>> = slots
            .held
            .iter()
            .map(|(_, slot)| slot.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        f()
    }
}

fn id_key(id: &IdentityId) -> String {
    format!("id:{id}")
}

/// Enrolls and identifies faces against an [`EmbeddingStore`].
///
/// Wires the validator, match engine and store together and records
/// every attempt via `tracing`. Thread-safe: identification takes no
/// registry lock. Enrollments are serialized per identity id and, when
/// profile uniqueness is on, per claimed national id and email.
pub struct FaceRegistry {
    validator: EnrollmentValidator,
    engine: MatchEngine,
    on_duplicate: DuplicatePolicy,
    unique_profile_fields: bool,
    store: Arc<dyn EmbeddingStore>,
    locks: IdentityLocks,
}

impl FaceRegistry {
    pub fn new(cfg: RegistryConfig, store: Arc<dyn EmbeddingStore>) -> Self {
        let cfg = cfg.with_defaults();
        Self {
            validator: EnrollmentValidator::new(cfg.dim),
            engine: MatchEngine::new(cfg.dim, cfg.policy),
            on_duplicate: cfg.on_duplicate,
            unique_profile_fields: cfg.unique_profile_fields,
            store,
            locks: IdentityLocks::default(),
        }
    }

    /// Creates a registry with a default in-memory store.
    pub fn with_memory_store(cfg: RegistryConfig) -> Self {
        Self::new(cfg, Arc::new(MemoryStore::new()))
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        self.engine.policy()
    }

    pub fn dim(&self) -> usize {
        self.engine.dim()
    }

    /// Validates `profile` and `embedding` and stores them under
    /// `identity_id`. All four name, document and email fields are required.
    pub fn enroll(
        &self,
        identity_id: IdentityId,
        profile: Profile,
        embedding: Embedding,
    ) -> Result<Enrollee, FaceError> {
        if identity_id.is_empty() {
            return Err(FaceError::EmptyIdentity);
        }
        if let Some(field) = profile.missing_field() {
            warn!(identity = %identity_id, field, "enrollment rejected: missing profile field");
            return Err(FaceError::MissingField(field));
        }

        let embedding = self.validator.validate(embedding).inspect_err(|e| {
            warn!(identity = %identity_id, error = %e, "enrollment rejected");
        })?;

        let mut keys = vec![id_key(&identity_id)];
        if self.unique_profile_fields {
            keys.push(format!("national_id:{}", profile.national_id));
            keys.push(format!("email:{}", profile.email));
        }

        self.locks.with(keys, || {
            if self.unique_profile_fields {
                self.check_profile_unique(&identity_id, &profile)?;
            }

            let record = EnrolledRecord::new(identity_id.clone(), embedding, profile);
            let enrollee = record.enrollee();
            match self.on_duplicate {
                DuplicatePolicy::Reject => self.store.insert(record)?,
                DuplicatePolicy::Replace => {
                    if self.store.replace(record)?.is_some() {
                        info!(identity = %identity_id, "enrollment replaced");
                    }
                }
            }
            info!(identity = %identity_id, "enrolled");
            Ok(enrollee)
        })
        .inspect_err(|e| {
            if e.is_store_unavailable() {
                warn!(identity = %identity_id, error = %e, "enrollment failed: store unavailable");
            } else {
                warn!(identity = %identity_id, error = %e, "enrollment rejected");
            }
        })
    }

    fn check_profile_unique(&self, id: &IdentityId, profile: &Profile) -> Result<(), StoreError> {
        for other in self.store.enrollees()? {
            if &other.identity_id == id {
                continue;
            }
            let field = if other.profile.national_id == profile.national_id {
                "national_id"
            } else if other.profile.email == profile.email {
                "email"
            } else {
                continue;
            };
            return Err(StoreError::DuplicateProfile {
                field,
                existing: other.identity_id,
            });
        }
        Ok(())
    }

    /// Scans the store for the best match to `query`.
    ///
    /// A store failure is returned as an error, never as a non-match.
    pub fn identify(&self, query: &[f32]) -> Result<Identification, FaceError> {
        let candidates = self.store.list().inspect_err(|e| {
            warn!(error = %e, "identification failed: store unavailable");
        })?;

        let mut scanned = 0usize;
        let counted = candidates.inspect(|_| scanned += 1);
        let result = self.engine.identify(query, counted).inspect_err(|e| {
            warn!(error = %e, "identification failed");
        })?;
        debug!(scanned, "candidate scan complete");

        let enrollee = match (&result.identity_id, result.matched) {
            (Some(id), true) => self.store.get(id)?,
            _ => None,
        };

        if result.matched {
            info!(
                identity = ?result.identity_id,
                score = result.score,
                threshold = result.threshold,
                policy = ?result.policy_version,
                "face identified"
            );
        } else {
            info!(
                score = result.score,
                threshold = result.threshold,
                policy = ?result.policy_version,
                "face not recognized"
            );
        }

        Ok(Identification { result, enrollee })
    }

    /// Runs [`MatchEngine::identify`] over caller-supplied candidates,
    /// bypassing the store. Pure; does not log.
    pub fn identify_among<I>(&self, query: &[f32], candidates: I) -> Result<MatchResult, FaceError>
    where
        I: IntoIterator<Item = Result<Candidate, StoreError>>,
    {
        Ok(self.engine.identify(query, candidates)?)
    }

    pub fn enrollees(&self) -> Result<Vec<Enrollee>, FaceError> {
        Ok(self.store.enrollees()?)
    }

    pub fn enrollee(&self, id: &IdentityId) -> Result<Option<Enrollee>, FaceError> {
        Ok(self.store.get(id)?)
    }

    /// Deletes an enrollment. Serialized with enrollments of the same id.
    pub fn remove(&self, id: &IdentityId) -> Result<(), FaceError> {
        self.locks.with(vec![id_key(id)], || Ok(self.store.remove(id)?))?;
        info!(identity = %id, "enrollment removed");
        Ok(())
    }
}
