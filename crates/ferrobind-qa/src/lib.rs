//! Ranks extracted facts against a question and composes a cited answer.

pub mod answer;
pub mod scorer;
pub mod weights;

pub use answer::{Answer, Citation, Claim};
pub use scorer::{FactScorer, ScoredFact};
pub use weights::WeightVector;

use std::collections::HashSet;

use ferrobind_common::{ExtractedFact, FactKind, MergedRecord, SearchQuery};
use serde::Deserialize;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QaConfig {
    #[serde(default)]
    pub weights: WeightVector,
    /// Facts ranked below this are not evidence.
    #[serde(default = "default_min_rank")]
    pub min_rank: f64,
    /// Maximum number of distinct claims in an answer.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_min_rank() -> f64 { 0.35 }
fn default_top_n() -> usize { 10 }

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            weights: WeightVector::default(),
            min_rank: default_min_rank(),
            top_n: default_top_n(),
        }
    }
}

pub struct QaEngine {
    scorer: FactScorer,
    config: QaConfig,
}

impl QaEngine {
    /// Fails with `FerrobindError::Config` when the weights are invalid.
    pub fn new(config: QaConfig) -> ferrobind_common::Result<Self> {
        config.weights.validate()?;
        Ok(Self { scorer: FactScorer::new(config.weights.clone()), config })
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    #[instrument(skip_all, fields(question = query.question(), facts = facts.len()))]
    pub fn answer(&self, query: &SearchQuery, facts: &[ExtractedFact], records: &[MergedRecord]) -> Answer {
        let mut scored = self.scorer.score(query, facts, records);
        let overlapping = scored.len();
        scored.retain(|s| s.rank >= self.config.min_rank);

        // top N distinct claims; every supporting fact of a kept claim stays
        let mut claims: HashSet<(FactKind, String)> = HashSet::new();
        scored.retain(|s| {
            let key = s.fact.claim_key();
            if claims.contains(&key) {
                true
            } else if claims.len() < self.config.top_n {
                claims.insert(key);
                true
            } else {
                false
            }
        });
        debug!(overlapping, kept = scored.len(), claims = claims.len(), min_rank = self.config.min_rank, "Facts ranked");

        let answer = answer::compose(query.question(), &scored, records);
        info!(
            claims = answer.claims.len(),
            citations = answer.citations.len(),
            evidence_found = answer.evidence_found,
            "Answer composed"
        );
        answer
    }
}
