//! One recognizer per fact kind. Each is a pure function of the text (and
//! the shared vocabulary) returning unscored hits.

use std::sync::OnceLock;

use aho_corasick::AhoCorasick;
use ferrobind_common::confidence::MatchSpecificity;
use ferrobind_common::{FactKind, TextSpan};
use regex::Regex;

use crate::sentences::sentence_at;
use crate::vocabulary::{is_word_bounded, Vocabulary};

/// An unscored recognizer hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub kind: FactKind,
    pub value: String,
    pub span: TextSpan,
    pub specificity: MatchSpecificity,
    pub variant_captured: bool,
    pub similarity: Option<f64>,
    /// Set when the recognizer already knows whether a qualifying cue was
    /// present; `None` lets the extractor look for one.
    pub context: Option<bool>,
}

impl Hit {
    fn new(kind: FactKind, value: impl Into<String>, span: TextSpan, specificity: MatchSpecificity) -> Self {
        Self {
            kind,
            value: value.into(),
            span,
            specificity,
            variant_captured: false,
            similarity: None,
            context: None,
        }
    }
}

/// Phrases that qualify a hit when they precede it in the same sentence.
pub fn context_cues(kind: FactKind) -> &'static [&'static str] {
    match kind {
        FactKind::TargetProtein => &[
            "bind", "against", "target", "inhibit", "recogni", "block", "antagoni",
            "specific for", "affinity for", "engag",
        ],
        FactKind::ExpressionSystem => &[
            "expressed in", "expression in", "produced in", "overexpressed in", "expressed using",
            "transformed into", "transfected", "secreted", "displayed on", "expression host",
            "recombinant", "produced using", "expressed by", "synthesized by",
        ],
        FactKind::PurificationMethod => &[
            "purified", "purification", "purify", "isolated", "eluted", "captured", "polished",
        ],
        FactKind::Other => &[],
    }
}

// ── Target proteins ─────────────────────────────────────────────────────────

fn target_against_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:[Bb]inders?|[Pp]eptides?|[Ll]igands?|[Ii]nhibitors?|[Nn]anobod(?:y|ies)|[Aa]ntibod(?:y|ies)|[Mm]iniproteins?|DARPins?|[Aa]ffibod(?:y|ies))\s+(?:against|targeting|binding(?:\s+to)?|that\s+binds?|to|for)\s+(?:(?:the|human)\s+)*([A-Z][A-Za-z0-9]*(?:-[A-Za-z0-9]+)*)",
        )
        .expect("valid target regex")
    })
}

fn target_binding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b([A-Z][A-Za-z0-9]*(?:-[A-Za-z0-9]+)*?)-(?:binding|targeting|specific)\s+(?:peptides?|binders?|proteins?|nanobod(?:y|ies)|antibod(?:y|ies)|miniproteins?|ligands?)\b",
        )
        .expect("valid target regex")
    })
}

/// Gene/protein-symbol shape: 2-15 chars with a digit or two capitals.
fn looks_like_symbol(s: &str) -> bool {
    let len = s.chars().count();
    let uppercase = s.chars().filter(|c| c.is_ascii_uppercase()).count();
    (2..=15).contains(&len) && (s.chars().any(|c| c.is_ascii_digit()) || uppercase >= 2)
}

/// Vocabulary targets plus "binders against X" / "X-binding peptide" patterns.
pub fn target_proteins(text: &str, vocab: &Vocabulary) -> Vec<Hit> {
    let mut hits: Vec<Hit> = vocab
        .find_kind(text, FactKind::TargetProtein)
        .into_iter()
        .map(|m| Hit::new(FactKind::TargetProtein, m.canonical, m.span, MatchSpecificity::Exact))
        .collect();

    for re in [target_against_re(), target_binding_re()] {
        for caps in re.captures_iter(text) {
            let Some(symbol) = caps.get(1) else { continue };
            if !looks_like_symbol(symbol.as_str()) {
                continue;
            }
            let value = vocab
                .find_kind(symbol.as_str(), FactKind::TargetProtein)
                .into_iter()
                .find(|m| m.span.len() == symbol.as_str().len())
                .map(|m| m.canonical.to_string())
                .unwrap_or_else(|| symbol.as_str().to_string());
            hits.push(Hit::new(
                FactKind::TargetProtein,
                value,
                TextSpan::new(symbol.start(), symbol.end()),
                MatchSpecificity::Pattern,
            ));
        }
    }
    hits
}

// ── Expression systems ──────────────────────────────────────────────────────

fn strain_re(canonical: &str) -> Option<&'static Regex> {
    static E_COLI: OnceLock<Regex> = OnceLock::new();
    static PICHIA: OnceLock<Regex> = OnceLock::new();
    static YEAST: OnceLock<Regex> = OnceLock::new();
    match canonical {
        "E. coli" => Some(E_COLI.get_or_init(|| {
            Regex::new(
                r"^\s*(?:strain\s+)?((?:BL21|Rosetta(?:-gami)?(?:\s*2)?|Origami(?:\s*B)?|SHuffle(?:\s*T7)?|C41|C43|DH5α|DH5a|JM109|K-?12|TOP10|Top10|ArcticExpress|Lemo21|T7\s+Express)(?:\s*Star)?(?:\s*\(DE3\))?(?:\s*pLysS)?)",
            )
            .expect("valid strain regex")
        })),
        "Pichia pastoris" => Some(PICHIA.get_or_init(|| {
            Regex::new(r"^\s*(?:strain\s+)?(X-33|GS115|KM71H?|SMD1168H?)").expect("valid strain regex")
        })),
        "yeast" | "S. cerevisiae" => Some(YEAST.get_or_init(|| {
            Regex::new(r"^\s*(?:strain\s+)?(EBY100|BY4741|BY4742|W303|INVSc1|BJ5465)").expect("valid strain regex")
        })),
        _ => None,
    }
}

/// "BL21 (DE3)" → "BL21(DE3)"; other whitespace collapsed.
fn normalize_strain(strain: &str) -> String {
    strain.split_whitespace().collect::<Vec<_>>().join(" ").replace(" (", "(")
}

/// Host vocabulary, extended with a strain suffix where one follows.
pub fn expression_systems(text: &str, vocab: &Vocabulary) -> Vec<Hit> {
    vocab
        .find_kind(text, FactKind::ExpressionSystem)
        .into_iter()
        .map(|m| {
            let strain = strain_re(m.canonical)
                .and_then(|re| re.captures(&text[m.span.end..]))
                .and_then(|caps| caps.get(1));
            match strain {
                Some(s) => {
                    let end = m.span.end + s.end();
                    let mut hit = Hit::new(
                        FactKind::ExpressionSystem,
                        format!("{} {}", m.canonical, normalize_strain(s.as_str())),
                        TextSpan::new(m.span.start, end),
                        MatchSpecificity::Exact,
                    );
                    hit.variant_captured = true;
                    hit
                }
                None => Hit::new(FactKind::ExpressionSystem, m.canonical, m.span, MatchSpecificity::Exact),
            }
        })
        .collect()
}

// ── Purification methods ────────────────────────────────────────────────────

pub fn purification_methods(text: &str, vocab: &Vocabulary) -> Vec<Hit> {
    vocab
        .find_kind(text, FactKind::PurificationMethod)
        .into_iter()
        .map(|m| Hit::new(FactKind::PurificationMethod, m.canonical, m.span, MatchSpecificity::Exact))
        .collect()
}

// ── Fuzzy matching ──────────────────────────────────────────────────────────

/// Near-miss spellings of single-word vocabulary entries, e.g. "baculovirs".
/// Words already covered by `taken` spans are skipped.
pub fn fuzzy_hits(text: &str, vocab: &Vocabulary, kind: FactKind, threshold: f64, taken: &[TextSpan]) -> Vec<Hit> {
    let terms: Vec<(&str, &str)> = vocab
        .single_word_terms(kind)
        .into_iter()
        .filter(|(surface, _)| surface.chars().count() >= 6)
        .collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for (start, word) in words(text) {
        if word.chars().count() < 6 {
            continue;
        }
        let span = TextSpan::new(start, start + word.len());
        if taken.iter().any(|t| t.overlaps(&span)) {
            continue;
        }
        let lower = word.to_lowercase();
        let best = terms
            .iter()
            .map(|(surface, canonical)| (strsim::normalized_levenshtein(&lower, &surface.to_lowercase()), *canonical))
            .filter(|(sim, _)| *sim >= threshold && *sim < 1.0)
            .max_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((sim, canonical)) = best {
            let mut hit = Hit::new(kind, canonical, span, MatchSpecificity::Fuzzy);
            hit.similarity = Some(sim);
            hits.push(hit);
        }
    }
    hits
}

fn words(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_alphabetic(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, &text[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

// ── Key findings ────────────────────────────────────────────────────────────

const FINDING_PHRASES: &[&str] = &[
    "we found", "we show", "we demonstrate", "we report", "we identify", "we discover",
    "we observe", "we present", "we reveal", "we determine", "results show",
    "results indicate", "results demonstrate", "results reveal", "our findings",
    "this study shows", "this study demonstrates",
];

const CONCLUSION_PHRASES: &[&str] = &[
    "in conclusion", "to conclude", "we conclude", "thus", "therefore", "in summary",
    "taken together", "overall", "collectively", "in brief",
];

const MAX_FINDINGS: usize = 3;
const MAX_FINDING_CHARS: usize = 300;

/// Sentences stating a finding ("we show", "results indicate", ...). When
/// none exist, sentences with a concluding phrase are used instead, with no
/// context bonus.
pub fn key_findings(text: &str, sentences: &[TextSpan]) -> Vec<Hit> {
    static FINDINGS: OnceLock<AhoCorasick> = OnceLock::new();
    static CONCLUSIONS: OnceLock<AhoCorasick> = OnceLock::new();
    let findings = FINDINGS.get_or_init(|| phrase_automaton(FINDING_PHRASES));
    let found = finding_sentences(text, sentences, findings, true);
    if !found.is_empty() {
        return found;
    }
    let conclusions = CONCLUSIONS.get_or_init(|| phrase_automaton(CONCLUSION_PHRASES));
    finding_sentences(text, sentences, conclusions, false)
}

/// Phrases are ASCII, so matching runs on the original text and offsets
/// stay valid whatever else the text contains.
fn phrase_automaton(phrases: &[&str]) -> AhoCorasick {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(phrases)
        .expect("valid finding phrases")
}

fn finding_sentences(text: &str, sentences: &[TextSpan], phrases: &AhoCorasick, cue: bool) -> Vec<Hit> {
    let mut hits: Vec<Hit> = Vec::new();
    for m in phrases.find_overlapping_iter(text) {
        if !is_word_bounded(text, m.start(), m.end()) {
            continue;
        }
        let Some(sentence) = sentence_at(sentences, m.start()) else { continue };
        if hits.iter().any(|h| h.span == sentence) {
            continue;
        }
        let mut hit = Hit::new(FactKind::Other, finding_value(&text[sentence.start..sentence.end]), sentence, MatchSpecificity::Pattern);
        hit.context = Some(cue);
        hits.push(hit);
    }
    hits.sort_by_key(|h| h.span);
    hits.truncate(MAX_FINDINGS);
    hits
}

fn finding_value(sentence: &str) -> String {
    let collapsed = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches('.');
    match trimmed.char_indices().nth(MAX_FINDING_CHARS) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
