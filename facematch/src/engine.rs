use serde::{Deserialize, Serialize};

use crate::error::{MatchError, StoreError, VectorError};
use crate::policy::ThresholdPolicy;
use crate::record::{Candidate, IdentityId};
use crate::vecmath::similarity;

/// Outcome of one identification attempt.
///
/// Built fresh per query. Carries no embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Best-scoring identity. Present only when `matched` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<IdentityId>,
    /// Best score seen over the scan; 0 when there were no candidates.
    pub score: f64,
    /// Threshold the decision was taken against.
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
}

struct Best {
    identity_id: IdentityId,
    score: f64,
}

impl Best {
    /// Higher score wins; on an exact tie the lower identity id wins, so
    /// the result does not depend on scan order.
    fn beats(&self, other: &Best) -> bool {
        self.score > other.score
            || (self.score == other.score && self.identity_id < other.identity_id)
    }
}

/// Finds the best-scoring candidate for `query` and decides acceptance.
///
/// Every candidate is scored; the scan never stops at the first score
/// above `threshold`. A match requires `best_score > threshold`. An
/// empty sequence yields `matched = false`, no identity and score 0.
///
/// A failed item from the sequence aborts the scan with
/// [`MatchError::Store`]; it is never reported as a non-match.
pub fn identify<I>(query: &[f32], candidates: I, threshold: f64) -> Result<MatchResult, MatchError>
where
    I: IntoIterator<Item = Result<Candidate, StoreError>>,
{
    if let Some(index) = query.iter().position(|x| !x.is_finite()) {
        return Err(MatchError::NonFiniteQuery { index });
    }

    let best = candidates
        .into_iter()
        .try_fold(None::<Best>, |best, item| -> Result<_, MatchError> {
            let candidate = item?;
            let next = Best {
                score: similarity(query, &candidate.embedding)?,
                identity_id: candidate.identity_id,
            };
            Ok(match best {
                Some(b) if !next.beats(&b) => Some(b),
                _ => Some(next),
            })
        })?;

    Ok(match best {
        Some(b) if b.score > threshold => MatchResult {
            matched: true,
            identity_id: Some(b.identity_id),
            score: b.score,
            threshold,
            policy_version: None,
        },
        Some(b) => MatchResult {
            matched: false,
            identity_id: None,
            score: b.score,
            threshold,
            policy_version: None,
        },
        None => MatchResult {
            matched: false,
            identity_id: None,
            score: 0.0,
            threshold,
            policy_version: None,
        },
    })
}

/// [`identify`] bound to a fixed dimension and [`ThresholdPolicy`].
///
/// Stateless: safe to share across threads and call concurrently.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    dim: usize,
    policy: ThresholdPolicy,
}

impl MatchEngine {
    /// Panics if `dim` is 0.
    pub fn new(dim: usize, policy: ThresholdPolicy) -> Self {
        assert!(dim > 0, "facematch: embedding dimension must be positive");
        Self { dim, policy }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Checks the query length, then runs [`identify`] with the policy
    /// threshold and stamps the policy version on the result.
    pub fn identify<I>(&self, query: &[f32], candidates: I) -> Result<MatchResult, MatchError>
    where
        I: IntoIterator<Item = Result<Candidate, StoreError>>,
    {
        if query.len() != self.dim {
            return Err(VectorError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            }
            .into());
        }
        let mut result = identify(query, candidates, self.policy.accept_threshold())?;
        result.policy_version = Some(self.policy.version().to_string());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cands(items: &[(&str, Vec<f32>)]) -> Vec<Result<Candidate, StoreError>> {
        items
            .iter()
            .map(|(id, v)| Ok(Candidate::new(*id, v.clone())))
            .collect()
    }

    /// Unit vector in the (x, y) plane whose cosine against [1, 0, ...] is `score`.
    fn at_score(score: f32, dim: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[0] = score;
        v[1] = (1.0 - score * score).sqrt();
        v
    }

    fn e0(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[0] = 1.0;
        v
    }

    #[test]
    fn empty_candidates_never_match() {
        for t in [-0.9, -0.5, 0.0, 0.3, 0.7, 0.99] {
            let r = identify(&[1.0, 0.0], Vec::new(), t).unwrap();
            assert!(!r.matched);
            assert_eq!(r.identity_id, None);
            assert_eq!(r.score, 0.0);
            assert_eq!(r.threshold, t);
        }
    }

    #[test]
    fn best_match_beats_first_above_threshold() {
        let q = e0(8);
        let set = cands(&[
            ("c1", at_score(0.71, 8)),
            ("c2", at_score(0.10, 8)),
            ("c3", at_score(0.40, 8)),
            ("c4", at_score(0.65, 8)),
            ("c5", at_score(0.95, 8)),
        ]);
        let r = identify(&q, set, 0.7).unwrap();
        assert!(r.matched);
        assert_eq!(r.identity_id, Some("c5".into()));
        assert!((r.score - 0.95).abs() < 1e-6, "got {}", r.score);
    }

    #[test]
    fn identical_vector_matches_with_score_one() {
        let enrolled: Vec<f32> = (0..128).map(|i| ((i as f32) * 0.11).cos()).collect();
        let set = cands(&[
            ("other", at_score(0.2, 128)),
            ("me", enrolled.clone()),
        ]);
        let r = identify(&enrolled, set, 0.7).unwrap();
        assert!(r.matched);
        assert_eq!(r.identity_id, Some("me".into()));
        assert!((r.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_query_does_not_match() {
        let mut q = vec![0.0; 4];
        q[3] = 1.0;
        let set = cands(&[
            ("a", vec![1.0, 0.0, 0.0, 0.0]),
            ("b", vec![0.0, 1.0, 0.0, 0.0]),
            ("c", vec![0.0, 0.0, 1.0, 0.0]),
        ]);
        let r = identify(&q, set, 0.7).unwrap();
        assert!(!r.matched);
        assert_eq!(r.identity_id, None);
        assert!(r.score.abs() < 1e-12);
    }

    #[test]
    fn score_equal_to_threshold_is_not_a_match() {
        // cos = 0.6 exactly in binary: vector (3, 4) against (1, 0).
        let set = cands(&[("a", vec![3.0, 4.0])]);
        let r = identify(&[1.0, 0.0], set, 0.6).unwrap();
        assert_eq!(r.score, 0.6);
        assert!(!r.matched);

        // Same check at the threshold value itself, taken from the score.
        let set = cands(&[("a", at_score(0.7, 4))]);
        let score = identify(&e0(4), set.clone(), 0.0).unwrap().score;
        let r = identify(&e0(4), set, score).unwrap();
        assert!(!r.matched, "score {score} == threshold must not match");
    }

    #[test]
    fn ties_resolve_to_lowest_identity() {
        let v = vec![0.6, 0.8, 0.0];
        let base = [
            ("m-02", v.clone()),
            ("m-10", v.clone()),
            ("m-01", v.clone()),
            ("z", vec![0.0, 0.0, 1.0]),
        ];

        // Every rotation of the input order picks the same winner.
        for shift in 0..base.len() {
            let mut order = base.to_vec();
            order.rotate_left(shift);
            let r = identify(&[0.6, 0.8, 0.0], cands(&order), 0.5).unwrap();
            assert_eq!(r.identity_id, Some("m-01".into()), "shift {shift}");
        }

        let mut rev = base.to_vec();
        rev.reverse();
        let r = identify(&[0.6, 0.8, 0.0], cands(&rev), 0.5).unwrap();
        assert_eq!(r.identity_id, Some("m-01".into()));
    }

    #[test]
    fn negative_best_score_is_reported() {
        let set = cands(&[("a", vec![-1.0, 0.0]), ("b", vec![-1.0, -1.0])]);
        let r = identify(&[1.0, 0.0], set, 0.7).unwrap();
        assert!(!r.matched);
        let expected = -(0.5f64.sqrt());
        assert!((r.score - expected).abs() < 1e-6, "got {}", r.score);
    }

    #[test]
    fn zero_candidate_vector_scores_zero() {
        let set = cands(&[("z", vec![0.0, 0.0])]);
        let r = identify(&[1.0, 0.0], set, -0.5).unwrap();
        assert_eq!(r.score, 0.0);
        assert!(r.matched, "0 > -0.5");
        assert_eq!(r.identity_id, Some("z".into()));
    }

    #[test]
    fn store_failure_is_not_a_non_match() {
        let items = vec![
            Ok(Candidate::new("a", vec![1.0, 0.0])),
            Err(StoreError::Unavailable("disk gone".into())),
            Ok(Candidate::new("b", vec![0.0, 1.0])),
        ];
        let err = identify(&[1.0, 0.0], items, 0.7).unwrap_err();
        assert_eq!(
            err,
            MatchError::Store(StoreError::Unavailable("disk gone".into()))
        );
    }

    #[test]
    fn candidate_dimension_mismatch_fails_loudly() {
        let set = cands(&[("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0, 0.0])]);
        let err = identify(&[1.0, 0.0], set, 0.7).unwrap_err();
        assert_eq!(
            err,
            MatchError::Vector(VectorError::DimensionMismatch {
                expected: 2,
                got: 3
            })
        );
    }

    #[test]
    fn corrupt_candidate_fails_loudly() {
        let set = cands(&[("a", vec![f32::NAN, 0.0])]);
        let err = identify(&[1.0, 0.0], set, 0.7).unwrap_err();
        assert!(matches!(
            err,
            MatchError::Vector(VectorError::ScoreOutOfRange(_))
        ));
    }

    #[test]
    fn non_finite_query_rejected() {
        let err = identify(&[1.0, f32::INFINITY], Vec::new(), 0.7).unwrap_err();
        assert_eq!(err, MatchError::NonFiniteQuery { index: 1 });
    }

    #[test]
    fn scan_consumes_lazily_to_the_end() {
        use std::cell::Cell;

        let pulled = Cell::new(0usize);
        let lazy = (0..1000).map(|i| {
            pulled.set(pulled.get() + 1);
            let s = if i == 999 { 0.99 } else { 0.75 };
            Ok(Candidate::new(format!("id-{i:04}"), at_score(s, 4)))
        });
        let r = identify(&e0(4), lazy, 0.7).unwrap();
        assert_eq!(pulled.get(), 1000);
        assert_eq!(r.identity_id, Some("id-0999".into()));
    }

    #[test]
    fn engine_checks_query_dim_and_stamps_version() {
        let engine = MatchEngine::new(3, ThresholdPolicy::new(0.5, "v7").unwrap());

        let err = engine.identify(&[1.0, 0.0], Vec::new()).unwrap_err();
        assert_eq!(
            err,
            MatchError::Vector(VectorError::DimensionMismatch {
                expected: 3,
                got: 2
            })
        );

        let r = engine
            .identify(&[1.0, 0.0, 0.0], cands(&[("a", vec![1.0, 0.1, 0.0])]))
            .unwrap();
        assert!(r.matched);
        assert_eq!(r.threshold, 0.5);
        assert_eq!(r.policy_version.as_deref(), Some("v7"));
    }

    #[test]
    fn result_json_omits_absent_identity() {
        let r = identify(&[1.0, 0.0], Vec::new(), 0.7).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["matched"], false);
        assert_eq!(json["score"], 0.0);
        assert_eq!(json["threshold"], 0.7);
        assert!(json.get("identity_id").is_none());

        let r = identify(&[1.0, 0.0], cands(&[("p-1", vec![1.0, 0.0])]), 0.7).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["identity_id"], "p-1");
        assert!(json.get("embedding").is_none());
    }
}
