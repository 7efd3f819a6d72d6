//! Merged record → scored, deduplicated facts.

use std::collections::HashMap;

use ferrobind_common::confidence::{compute_confidence, ConfidenceModifiers};
use ferrobind_common::{CanonicalId, ExtractedFact, FactKind, MergedRecord, TextSpan};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::recognizers::{
    context_cues, expression_systems, fuzzy_hits, key_findings, purification_methods,
    target_proteins, Hit,
};
use crate::sentences::{sentence_at, sentence_spans};
use crate::vocabulary::Vocabulary;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractorConfig {
    /// Facts scoring below this are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_true")]
    pub fuzzy_matching: bool,
}

fn default_min_confidence() -> f64 { 0.3 }
fn default_max_text_chars() -> usize { 4_000 }
fn default_fuzzy_threshold() -> f64 { 0.85 }
fn default_true() -> bool { true }

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_text_chars: default_max_text_chars(),
            fuzzy_threshold: default_fuzzy_threshold(),
            fuzzy_matching: default_true(),
        }
    }
}

pub struct FactExtractor {
    vocab: Vocabulary,
    config: ExtractorConfig,
}

impl FactExtractor {
    pub fn new(config: ExtractorConfig) -> anyhow::Result<Self> {
        Ok(Self { vocab: Vocabulary::embedded()?, config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract facts from the record's title and abstract.
    #[instrument(skip(self, record), fields(record = %record.id()))]
    pub fn extract(&self, record: &MergedRecord) -> Vec<ExtractedFact> {
        let text = record.extraction_text(self.config.max_text_chars);
        let title_end = record.title().trim().trim_end_matches('.').len().min(text.len());
        let facts = self.extract_inner(record.id(), &text, title_end);
        debug!(facts = facts.len(), "Extracted facts");
        facts
    }

    /// Extract facts from arbitrary text attributed to `id`. The whole text
    /// is treated as body text.
    pub fn extract_text(&self, id: &CanonicalId, text: &str) -> Vec<ExtractedFact> {
        let text = match text.char_indices().nth(self.config.max_text_chars) {
            Some((cut, _)) => &text[..cut],
            None => text,
        };
        self.extract_inner(id, text, 0)
    }

    fn extract_inner(&self, id: &CanonicalId, text: &str, title_end: usize) -> Vec<ExtractedFact> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let sentences = sentence_spans(text);

        let mut hits: Vec<Hit> = Vec::new();
        hits.extend(target_proteins(text, &self.vocab));
        hits.extend(expression_systems(text, &self.vocab));
        hits.extend(purification_methods(text, &self.vocab));
        if self.config.fuzzy_matching {
            let taken: Vec<TextSpan> = hits.iter().map(|h| h.span).collect();
            for kind in [FactKind::TargetProtein, FactKind::ExpressionSystem, FactKind::PurificationMethod] {
                hits.extend(fuzzy_hits(text, &self.vocab, kind, self.config.fuzzy_threshold, &taken));
            }
        }
        hits.extend(key_findings(text, &sentences));

        // Keep the best-scoring hit per (kind, value).
        let mut best: HashMap<(FactKind, String), ExtractedFact> = HashMap::new();
        for hit in hits {
            let sentence = sentence_at(&sentences, hit.span.start)
                .unwrap_or_else(|| TextSpan::new(0, text.len()));
            let has_context = hit.context.unwrap_or_else(|| {
                let prefix = text[sentence.start..hit.span.start].to_lowercase();
                context_cues(hit.kind).iter().any(|cue| prefix.contains(cue))
            });
            let mods = ConfidenceModifiers {
                has_context,
                variant_captured: hit.variant_captured,
                in_title: title_end > 0 && hit.span.end <= title_end,
                similarity: hit.similarity,
            };
            let confidence = compute_confidence(hit.specificity, &mods);
            if confidence < self.config.min_confidence {
                continue;
            }

            let snippet = text[sentence.start..sentence.end].trim().to_string();
            let fact = ExtractedFact::new(id.clone(), hit.kind, hit.value, confidence, hit.span, snippet);
            let key = fact.claim_key();
            match best.get(&key) {
                Some(existing)
                    if existing.confidence() > fact.confidence()
                        || (existing.confidence() == fact.confidence() && existing.span() <= fact.span()) => {}
                _ => {
                    best.insert(key, fact);
                }
            }
        }

        let mut facts: Vec<ExtractedFact> = best.into_values().collect();
        facts.sort_by(|a, b| {
            a.kind()
                .cmp(&b.kind())
                .then_with(|| a.span().cmp(&b.span()))
                .then_with(|| a.value().cmp(b.value()))
        });
        facts
    }
}
