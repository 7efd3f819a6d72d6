//! Per-fact rank computation.
//!
//! rank(f) = w_lex · overlap(q, f) + w_conf · confidence(f) + w_rel · relevance(record(f)) / max_relevance

use std::collections::{BTreeSet, HashMap};

use ferrobind_common::{CanonicalId, ExtractedFact, MergedRecord, SearchQuery};
use serde::Serialize;

use crate::weights::WeightVector;

/// A fact together with its component and composite scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFact<'a> {
    pub fact: &'a ExtractedFact,
    /// Fraction of question tokens covered, in [0, 1]
    pub lexical_overlap: f64,
    /// Record relevance over the best relevance in the run, in [0, 1]
    pub relevance: f64,
    pub rank: f64,
}

pub struct FactScorer {
    weights: WeightVector,
}

impl FactScorer {
    pub fn new(weights: WeightVector) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    /// Score every fact with non-zero lexical overlap, best first.
    pub fn score<'a>(
        &self,
        query: &SearchQuery,
        facts: &'a [ExtractedFact],
        records: &[MergedRecord],
    ) -> Vec<ScoredFact<'a>> {
        let question = question_tokens(query);
        let relevance: HashMap<&CanonicalId, u32> = records.iter().map(|r| (r.id(), r.relevance())).collect();
        let max_relevance = relevance.values().copied().max().unwrap_or(0).max(1) as f64;

        let mut scored: Vec<ScoredFact<'a>> = facts
            .iter()
            .filter_map(|fact| {
                let overlap = lexical_overlap(&question, fact);
                if overlap <= 0.0 {
                    return None;
                }
                let rel = relevance.get(fact.record_id()).copied().unwrap_or(0) as f64 / max_relevance;
                let rank = self.weights.lexical_overlap * overlap
                    + self.weights.confidence * fact.confidence()
                    + self.weights.record_relevance * rel;
                Some(ScoredFact { fact, lexical_overlap: overlap, relevance: rel, rank })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.rank
                .total_cmp(&a.rank)
                .then_with(|| a.fact.record_id().cmp(b.fact.record_id()))
                .then_with(|| a.fact.kind().cmp(&b.fact.kind()))
                .then_with(|| a.fact.value().cmp(b.fact.value()))
        });
        scored
    }
}

/// Distinct lowercase words of the normalised query terms.
pub fn question_tokens(query: &SearchQuery) -> BTreeSet<String> {
    query
        .terms()
        .iter()
        .flat_map(|t| words(t))
        .map(|w| fold(&w).to_string())
        .collect()
}

/// Share of `question` covered by the fact's kind cue words, value and
/// snippet. Empty questions cover nothing.
pub fn lexical_overlap(question: &BTreeSet<String>, fact: &ExtractedFact) -> f64 {
    if question.is_empty() {
        return 0.0;
    }
    let mut haystack: BTreeSet<String> = fact.kind().cue_words().iter().map(|w| fold(w).to_string()).collect();
    haystack.extend(words(fact.value()).iter().map(|w| fold(w).to_string()));
    haystack.extend(words(fact.snippet()).iter().map(|w| fold(w).to_string()));

    let covered = question.iter().filter(|t| haystack.contains(*t)).count();
    covered as f64 / question.len() as f64
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// "binders" → "binder"; matches the plural folding used on query terms.
fn fold(word: &str) -> &str {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        &word[..word.len() - 1]
    } else {
        word
    }
}
