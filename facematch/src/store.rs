use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::record::{Candidate, EnrolledRecord, Enrollee, IdentityId};

/// Lazy, finite sequence of candidates handed to the match engine.
///
/// Each call to [`EmbeddingStore::list`] starts a fresh sequence. An item
/// may be an error if the backing store fails mid-scan.
pub type CandidateIter<'a> = Box<dyn Iterator<Item = Result<Candidate, StoreError>> + Send + 'a>;

/// Persists enrolled embeddings and profiles.
///
/// Implementations must be safe for concurrent use. The registry
/// serializes writes per identity; stores only need each single call to
/// be atomic.
pub trait EmbeddingStore: Send + Sync {
    /// Returns every enrolled (id, embedding) pair. Records without an
    /// embedding are skipped, never yielded.
    fn list(&self) -> Result<CandidateIter<'_>, StoreError>;

    /// Inserts a new record. Fails with [`StoreError::DuplicateIdentity`]
    /// if the id is already present.
    fn insert(&self, record: EnrolledRecord) -> Result<(), StoreError>;

    /// Inserts or swaps the record for its id. Returns the replaced
    /// record's outward view, if any.
    fn replace(&self, record: EnrolledRecord) -> Result<Option<Enrollee>, StoreError>;

    fn get(&self, id: &IdentityId) -> Result<Option<Enrollee>, StoreError>;

    /// All enrollees, ordered by identity id.
    fn enrollees(&self) -> Result<Vec<Enrollee>, StoreError>;

    /// Deletes a record. Fails with [`StoreError::NotFound`] if absent.
    fn remove(&self, id: &IdentityId) -> Result<(), StoreError>;
}

/// In-memory [`EmbeddingStore`].
/// Data is lost on restart. Suitable for testing or ephemeral use.
///
/// [`EmbeddingStore::list`] copies the record handles under a short read
/// lock and iterates that snapshot, so a scan is consistent and writers
/// are never blocked for the length of a scan.
pub struct MemoryStore {
    records: RwLock<BTreeMap<IdentityId, Arc<EnrolledRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<IdentityId, Arc<EnrolledRecord>>>, StoreError>
    {
        self.records
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<IdentityId, Arc<EnrolledRecord>>>, StoreError>
    {
        self.records
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingStore for MemoryStore {
    fn list(&self) -> Result<CandidateIter<'_>, StoreError> {
        let snapshot: Vec<Arc<EnrolledRecord>> = self.read()?.values().cloned().collect();
        Ok(Box::new(
            snapshot
                .into_iter()
                .map(|r| Ok::<_, StoreError>(r.candidate())),
        ))
    }

    fn insert(&self, record: EnrolledRecord) -> Result<(), StoreError> {
        let mut records = self.write()?;
        if records.contains_key(&record.identity_id) {
            return Err(StoreError::DuplicateIdentity(record.identity_id));
        }
        records.insert(record.identity_id.clone(), Arc::new(record));
        Ok(())
    }

    fn replace(&self, record: EnrolledRecord) -> Result<Option<Enrollee>, StoreError> {
        let mut records = self.write()?;
        let old = records.insert(record.identity_id.clone(), Arc::new(record));
        Ok(old.map(|r| r.enrollee()))
    }

    fn get(&self, id: &IdentityId) -> Result<Option<Enrollee>, StoreError> {
        Ok(self.read()?.get(id).map(|r| r.enrollee()))
    }

    fn enrollees(&self) -> Result<Vec<Enrollee>, StoreError> {
        Ok(self.read()?.values().map(|r| r.enrollee()).collect())
    }

    fn remove(&self, id: &IdentityId) -> Result<(), StoreError> {
        match self.write()?.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id.clone())),
        }
    }
}
