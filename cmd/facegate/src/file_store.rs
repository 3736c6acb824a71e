//! JSON-lines [`EmbeddingStore`] backed by a single file.
//!
//! One record per line. Scans stream the file, so memory use does not
//! grow with the number of enrollees. Rewrites (replace, remove) go
//! through a temporary file and a rename.
//!
//! Writers take an exclusive advisory lock on a sibling `<file>.lock`, so
//! separate `facegate` processes do not interleave check-then-append.
//! Readers do not lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use facegate_facematch::{
    Candidate, CandidateIter, EmbeddingStore, EnrolledRecord, Enrollee, IdentityId, Profile,
    StoreError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    identity_id: IdentityId,
    #[serde(flatten)]
    profile: Profile,
    created_at: DateTime<Utc>,
    /// Absent or null for profiles imported without a face.
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl StoredRecord {
    fn from_record(record: &EnrolledRecord) -> Self {
        Self {
            identity_id: record.identity_id.clone(),
            profile: record.profile.clone(),
            created_at: record.created_at,
            embedding: Some(record.embedding.as_slice().to_vec()),
        }
    }

    fn enrollee(&self) -> Enrollee {
        Enrollee {
            identity_id: self.identity_id.clone(),
            profile: self.profile.clone(),
            created_at: self.created_at,
        }
    }
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {e}", path.display()))
}

/// Yields records until the first read or parse error, which is
/// surfaced once and ends the stream.
struct RecordStream {
    path: PathBuf,
    inner: serde_json::StreamDeserializer<'static, serde_json::de::IoRead<BufReader<File>>, StoredRecord>,
    failed: bool,
}

impl Iterator for RecordStream {
    type Item = Result<StoredRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.inner.next()? {
            Ok(rec) => Some(Ok(rec)),
            Err(e) => {
                self.failed = true;
                Some(Err(unavailable(&self.path, e)))
            }
        }
    }
}

pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Opens a store at `path`. The file is created on first write; a
    /// missing file reads as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: lock_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<StoredRecord, StoreError>> + Send>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Box::new(std::iter::empty())),
            Err(e) => return Err(unavailable(&self.path, e)),
        };
        let inner = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter();
        Ok(Box::new(RecordStream {
            path: self.path.clone(),
            inner,
            failed: false,
        }))
    }

    fn read_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.stream()?.collect()
    }

    fn rewrite(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("jsonl.tmp");
        let write = || -> io::Result<()> {
            let mut w = BufWriter::new(File::create(&tmp)?);
            for rec in records {
                serde_json::to_writer(&mut w, rec)?;
                w.write_all(b"\n")?;
            }
            w.flush()?;
            drop(w);
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| unavailable(&self.path, e))
    }

    /// Blocks until this handle holds the writer lock. Released when the
    /// returned file is dropped.
    fn lock(&self) -> Result<File, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| unavailable(&self.lock_path, e))?;
        file.lock().map_err(|e| unavailable(&self.lock_path, e))?;
        Ok(file)
    }
}

impl EmbeddingStore for FileStore {
    fn list(&self) -> Result<CandidateIter<'_>, StoreError> {
        Ok(Box::new(self.stream()?.filter_map(|item| match item {
            Ok(StoredRecord {
                identity_id,
                embedding: Some(v),
                ..
            }) => Some(Ok(Candidate::new(identity_id, v))),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })))
    }

    fn insert(&self, record: EnrolledRecord) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        for rec in self.stream()? {
            if rec?.identity_id == record.identity_id {
                return Err(StoreError::DuplicateIdentity(record.identity_id));
            }
        }

        let append = || -> io::Result<()> {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let mut w = BufWriter::new(file);
            serde_json::to_writer(&mut w, &StoredRecord::from_record(&record))?;
            w.write_all(b"\n")?;
            w.flush()
        };
        append().map_err(|e| unavailable(&self.path, e))
    }

    fn replace(&self, record: EnrolledRecord) -> Result<Option<Enrollee>, StoreError> {
        let _guard = self.lock()?;
        let mut records = self.read_all()?;
        let fresh = StoredRecord::from_record(&record);
        let old = match records
            .iter_mut()
            .find(|r| r.identity_id == record.identity_id)
        {
            Some(slot) => Some(std::mem::replace(slot, fresh).enrollee()),
            None => {
                records.push(fresh);
                None
            }
        };
        self.rewrite(&records)?;
        Ok(old)
    }

    fn get(&self, id: &IdentityId) -> Result<Option<Enrollee>, StoreError> {
        for rec in self.stream()? {
            let rec = rec?;
            if &rec.identity_id == id {
                return Ok(Some(rec.enrollee()));
            }
        }
        Ok(None)
    }

    fn enrollees(&self) -> Result<Vec<Enrollee>, StoreError> {
        let mut all: Vec<Enrollee> = self.read_all()?.iter().map(StoredRecord::enrollee).collect();
        all.sort_by(|a, b| a.identity_id.cmp(&b.identity_id));
        Ok(all)
    }

    fn remove(&self, id: &IdentityId) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        let mut records = self.read_all()?;
        let before = records.len();
        records.retain(|r| &r.identity_id != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.rewrite(&records)
    }
}
