//! Weight vector for fact ranking.

use ferrobind_common::FerrobindError;
use serde::{Deserialize, Serialize};

/// The 3-component weight vector. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    /// Share of question tokens the fact covers
    #[serde(default = "default_lexical")]
    pub lexical_overlap: f64,
    /// Extraction confidence
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Parent record relevance, normalised to the best record in the run
    #[serde(default = "default_relevance")]
    pub record_relevance: f64,
}

fn default_lexical() -> f64 { 0.5 }
fn default_confidence() -> f64 { 0.3 }
fn default_relevance() -> f64 { 0.2 }

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            lexical_overlap:  default_lexical(),
            confidence:       default_confidence(),
            record_relevance: default_relevance(),
        }
    }
}

impl WeightVector {
    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Reject negative weights and vectors that do not sum to ~1.0.
    pub fn validate(&self) -> Result<(), FerrobindError> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FerrobindError::Config(format!("ranking weights must be non-negative: {self:?}")));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(FerrobindError::Config(format!("ranking weights sum to {sum:.4}, expected 1.0")));
        }
        Ok(())
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.lexical_overlap, self.confidence, self.record_relevance]
    }
}
