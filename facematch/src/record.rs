use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::ValidEmbedding;

/// Opaque, unique identity token. Ordered by byte value; the order is
/// what the match engine uses to break score ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Minimal person data kept next to an enrolled embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub given_name: String,
    pub family_name: String,
    /// National identity document number. Unique across identities when
    /// profile uniqueness is enforced.
    pub national_id: String,
    /// Unique across identities when profile uniqueness is enforced.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl Profile {
    /// Returns the first required field that is empty or blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("given_name", &self.given_name),
            ("family_name", &self.family_name),
            ("national_id", &self.national_id),
            ("email", &self.email),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// A stored enrollment. Created once and never mutated; re-enrollment
/// under [`crate::DuplicatePolicy::Replace`] swaps in a new record.
#[derive(Clone)]
pub struct EnrolledRecord {
    pub identity_id: IdentityId,
    pub embedding: ValidEmbedding,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

impl EnrolledRecord {
    pub fn new(identity_id: IdentityId, embedding: ValidEmbedding, profile: Profile) -> Self {
        Self {
            identity_id,
            embedding,
            profile,
            created_at: Utc::now(),
        }
    }

    /// Returns the outward view of this record, without the embedding.
    pub fn enrollee(&self) -> Enrollee {
        Enrollee {
            identity_id: self.identity_id.clone(),
            profile: self.profile.clone(),
            created_at: self.created_at,
        }
    }

    /// Returns the (id, vector) pair the match engine scans.
    pub fn candidate(&self) -> Candidate {
        Candidate {
            identity_id: self.identity_id.clone(),
            embedding: self.embedding.shared(),
        }
    }
}

impl fmt::Debug for EnrolledRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrolledRecord")
            .field("identity_id", &self.identity_id)
            .field("embedding_len", &self.embedding.dim())
            .field("profile", &self.profile)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Outward-facing view of an enrollment. Never carries the embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollee {
    pub identity_id: IdentityId,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

/// One entry of the sequence a store hands to the match engine.
#[derive(Clone)]
pub struct Candidate {
    pub identity_id: IdentityId,
    pub embedding: Arc<[f32]>,
}

impl Candidate {
    pub fn new(identity_id: impl Into<IdentityId>, embedding: impl Into<Arc<[f32]>>) -> Self {
        Self {
            identity_id: identity_id.into(),
            embedding: embedding.into(),
        }
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("identity_id", &self.identity_id)
            .field("embedding_len", &self.embedding.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EnrollmentValidator;

    fn profile() -> Profile {
        Profile {
            given_name: "Ana".into(),
            family_name: "Quispe".into(),
            national_id: "70112233".into(),
            email: "ana@example.com".into(),
            phone: None,
            photo_url: Some("https://img.example.com/ana.png".into()),
        }
    }

    #[test]
    fn identity_ordering_is_bytewise() {
        let mut ids = vec![IdentityId::from("b"), IdentityId::from("B"), IdentityId::from("a")];
        ids.sort();
        let got: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(got, vec!["B", "a", "b"]);
    }

    #[test]
    fn missing_required_fields() {
        assert_eq!(profile().missing_field(), None);
        assert_eq!(Profile::default().missing_field(), Some("given_name"));

        let mut p = profile();
        p.national_id = "   ".into();
        assert_eq!(p.missing_field(), Some("national_id"));

        let mut p = profile();
        p.email.clear();
        assert_eq!(p.missing_field(), Some("email"));

        let mut p = profile();
        p.photo_url = None;
        assert_eq!(p.missing_field(), None);
    }

    #[test]
    fn enrollee_json_has_no_embedding() {
        let emb = EnrollmentValidator::new(3).validate(vec![0.1, 0.2, 0.3]).unwrap();
        let rec = EnrolledRecord::new("id-1".into(), emb, profile());
        let json = serde_json::to_value(rec.enrollee()).unwrap();

        assert_eq!(json["identity_id"], "id-1");
        assert_eq!(json["national_id"], "70112233");
        assert!(json.get("embedding").is_none());
        assert!(json.get("phone").is_none(), "absent phone is omitted");
        assert!(json.get("created_at").is_some());
    }

    #[test]
    fn candidate_shares_record_vector() {
        let emb = EnrollmentValidator::new(2).validate(vec![1.0, 2.0]).unwrap();
        let rec = EnrolledRecord::new("x".into(), emb, profile());
        let c = rec.candidate();
        assert_eq!(c.identity_id.as_str(), "x");
        assert_eq!(&*c.embedding, &[1.0, 2.0]);
    }

    #[test]
    fn debug_hides_vector() {
        let emb = EnrollmentValidator::new(2).validate(vec![1.0, 2.0]).unwrap();
        let rec = EnrolledRecord::new("x".into(), emb, profile());
        let dbg = format!("{rec:?}");
        assert!(dbg.contains("embedding_len: 2"));
        assert!(!dbg.contains("[1.0"));
    }
}
