//! Claim grouping and answer text composition.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use ferrobind_common::confidence::aggregate_confidence;
use ferrobind_common::{CanonicalId, FactKind, MergedRecord};
use serde::{Deserialize, Serialize};

use crate::scorer::ScoredFact;

/// One numbered entry in the reference list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub number: usize,
    pub record_id: CanonicalId,
    pub label: String,
}

/// A claim supported by one or more facts, cited once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub kind: FactKind,
    pub value: String,
    /// Noisy-OR over the supporting facts' confidences
    pub confidence: f64,
    /// Best rank among the supporting facts
    pub rank: f64,
    /// Citation numbers, ascending
    pub citations: Vec<usize>,
    /// Sentence from the best-ranked supporting fact
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub claims: Vec<Claim>,
    pub citations: Vec<Citation>,
    pub text: String,
    pub evidence_found: bool,
}

impl Answer {
    /// The "nothing cleared the threshold" answer.
    pub fn no_evidence(question: &str) -> Self {
        Self {
            question: question.to_string(),
            claims: Vec::new(),
            citations: Vec::new(),
            text: format!("No sufficiently confident evidence was found in the literature for: \"{question}\"."),
            evidence_found: false,
        }
    }

    pub fn cited_ids(&self) -> Vec<CanonicalId> {
        self.citations.iter().map(|c| c.record_id.clone()).collect()
    }
}

/// Group ranked facts into claims and render the answer. `scored` must be
/// best-first and already cut to the top N claims.
pub fn compose(question: &str, scored: &[ScoredFact<'_>], records: &[MergedRecord]) -> Answer {
    if scored.is_empty() {
        return Answer::no_evidence(question);
    }

    // (kind, folded value) → supporting facts, in rank order
    let mut groups: BTreeMap<(FactKind, String), Vec<&ScoredFact<'_>>> = BTreeMap::new();
    let mut first_seen: Vec<(FactKind, String)> = Vec::new();
    for s in scored {
        let key = s.fact.claim_key();
        if !groups.contains_key(&key) {
            first_seen.push(key.clone());
        }
        groups.entry(key).or_default().push(s);
    }

    // Claims in kind order, best rank first within a kind
    let mut ordered: Vec<&(FactKind, String)> = first_seen.iter().collect();
    ordered.sort_by_key(|(kind, _)| *kind);

    let mut citations: Vec<Citation> = Vec::new();
    let mut claims: Vec<Claim> = Vec::new();
    for key in ordered {
        let support = &groups[key];
        let best = support[0];
        let confidences: Vec<f64> = support.iter().map(|s| s.fact.confidence()).collect();

        let mut numbers: Vec<usize> = Vec::new();
        for s in support {
            let number = cite(&mut citations, s.fact.record_id(), records);
            if !numbers.contains(&number) {
                numbers.push(number);
            }
        }
        numbers.sort_unstable();

        claims.push(Claim {
            kind: key.0,
            value: best.fact.value().to_string(),
            confidence: aggregate_confidence(&confidences),
            rank: best.rank,
            citations: numbers,
            snippet: best.fact.snippet().to_string(),
        });
    }

    let text = render(&claims, &citations);
    Answer {
        question: question.to_string(),
        claims,
        citations,
        text,
        evidence_found: true,
    }
}

/// Citation number for `id`, assigning the next number on first use.
fn cite(citations: &mut Vec<Citation>, id: &CanonicalId, records: &[MergedRecord]) -> usize {
    if let Some(c) = citations.iter().find(|c| &c.record_id == id) {
        return c.number;
    }
    let label = records
        .iter()
        .find(|r| r.id() == id)
        .map(MergedRecord::citation_label)
        .unwrap_or_else(|| id.to_string());
    let number = citations.len() + 1;
    citations.push(Citation { number, record_id: id.clone(), label });
    number
}

fn render(claims: &[Claim], citations: &[Citation]) -> String {
    let mut text = String::new();
    for kind in FactKind::ALL {
        let items: Vec<String> = claims
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| {
                let refs: String = c.citations.iter().map(|n| format!("[{n}]")).collect();
                format!("{} {refs}", c.value)
            })
            .collect();
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(text, "{} reported: {}.", kind.plural_label(), items.join("; "));
    }

    text.push_str("\nReferences:\n");
    for c in citations {
        let _ = writeln!(text, "[{}] {}", c.number, c.label);
    }
    text.trim_end().to_string()
}
