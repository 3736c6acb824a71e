use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Acceptance threshold shipped with the original login flow.
///
/// Never calibrated against a labeled set; treat as a placeholder.
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.7;

pub const DEFAULT_POLICY_VERSION: &str = "v1";

const DEFAULT_RATIONALE: &str =
    "uncalibrated placeholder carried over from the first login flow; \
     false-accept and false-reject rates have not been measured";

/// Similarity metric a policy threshold is expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
}

impl Metric {
    /// Closed range of scores the metric can produce.
    pub fn range(self) -> (f64, f64) {
        match self {
            Metric::Cosine => (-1.0, 1.0),
        }
    }
}

/// Deployment-level acceptance rule for identification.
///
/// A candidate is accepted iff its score is strictly greater than
/// `accept_threshold`. The value is configuration, never derived from
/// observed scores. `version` travels with every decision so results can
/// be traced to the policy that produced them; `rationale` documents the
/// calibration and is not interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub struct ThresholdPolicy {
    accept_threshold: f64,
    metric: Metric,
    version: String,
    rationale: String,
}

#[derive(Deserialize)]
struct RawPolicy {
    #[serde(default = "default_threshold")]
    accept_threshold: f64,
    #[serde(default)]
    metric: Metric,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default = "default_rationale")]
    rationale: String,
}

fn default_threshold() -> f64 {
    DEFAULT_ACCEPT_THRESHOLD
}

fn default_version() -> String {
    DEFAULT_POLICY_VERSION.to_string()
}

fn default_rationale() -> String {
    DEFAULT_RATIONALE.to_string()
}

impl TryFrom<RawPolicy> for ThresholdPolicy {
    type Error = PolicyError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        let mut policy = Self::new(raw.accept_threshold, raw.version)?;
        policy.metric = raw.metric;
        policy.rationale = raw.rationale;
        Ok(policy)
    }
}

impl ThresholdPolicy {
    /// Creates a cosine policy. The threshold must be finite and lie
    /// strictly inside (-1, 1): at either end nothing, or everything,
    /// would match.
    pub fn new(accept_threshold: f64, version: impl Into<String>) -> Result<Self, PolicyError> {
        if !accept_threshold.is_finite() {
            return Err(PolicyError::NonFiniteThreshold);
        }
        let (lo, hi) = Metric::Cosine.range();
        if accept_threshold <= lo || accept_threshold >= hi {
            return Err(PolicyError::ThresholdOutOfRange(accept_threshold));
        }
        Ok(Self {
            accept_threshold,
            metric: Metric::Cosine,
            version: version.into(),
            rationale: DEFAULT_RATIONALE.to_string(),
        })
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn accept_threshold(&self) -> f64 {
        self.accept_threshold
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Strict comparison: a score equal to the threshold is rejected.
    pub fn accepts(&self, score: f64) -> bool {
        score > self.accept_threshold
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            metric: Metric::Cosine,
            version: default_version(),
            rationale: default_rationale(),
        }
    }
}
