//! Natural-language question → `SearchQuery`.
//!
//! Pure and deterministic: lowercase, tokenize, fold known domain phrases,
//! drop stop words, then attach synonyms.

use std::collections::{BTreeMap, HashSet};

use ferrobind_common::{FerrobindError, SearchQuery};
use tracing::debug;

/// English function words and question words.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "been", "before", "being", "best", "between", "both", "but", "by", "can", "could",
    "do", "does", "doing", "during", "each", "either", "else", "for", "from", "further", "give",
    "good", "had", "has", "have", "having", "here", "how", "i", "if", "in", "into", "is", "it",
    "its", "list", "me", "more", "most", "my", "no", "nor", "not", "of", "off", "on", "one",
    "only", "or", "other", "our", "out", "over", "own", "same", "should", "show", "so", "some",
    "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "typically", "under", "until", "up", "use", "used",
    "using", "very", "via", "was", "we", "were", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "would", "you", "your", "commonly", "usually",
    "known", "kind", "kinds", "type", "types", "approach", "approaches",
];

/// Measurement units that carry no search meaning on their own.
const UNITS: &[&str] = &[
    "kda", "da", "kd", "mda", "nm", "um", "µm", "mm", "pm", "fm", "ml", "ul", "µl", "mg", "ug",
    "µg", "ng", "aa", "bp", "kb", "mb", "h", "hr", "hrs", "min", "s", "rpm", "c",
];

/// Known multi-word domain phrases, as singular token sequences, and the
/// term each one becomes.
const PHRASES: &[(&[&str], &str)] = &[
    (&["size", "exclusion", "chromatography"], "size exclusion chromatography"),
    (&["ion", "exchange", "chromatography"], "ion exchange chromatography"),
    (&["escherichia", "coli"], "e. coli"),
    (&["e", "coli"], "e. coli"),
    (&["expression", "system"], "expression system"),
    (&["expression", "host"], "expression host"),
    (&["peptide", "binder"], "peptide binder"),
    (&["protein", "binder"], "protein binder"),
    (&["binding", "peptide"], "binding peptide"),
    (&["target", "protein"], "target protein"),
    (&["affinity", "chromatography"], "affinity chromatography"),
    (&["affinity", "tag"], "affinity tag"),
    (&["purification", "method"], "purification method"),
    (&["protein", "purification"], "protein purification"),
    (&["phage", "display"], "phage display"),
    (&["yeast", "display"], "yeast display"),
    (&["de", "novo"], "de novo"),
    (&["cell", "free"], "cell-free"),
    (&["insect", "cell"], "insect cells"),
    (&["mammalian", "cell"], "mammalian cells"),
    (&["his", "tag"], "his-tag"),
    (&["gst", "tag"], "gst tag"),
    (&["single", "domain", "antibody"], "single-domain antibody"),
];

const MAX_PHRASE_LEN: usize = 3;

/// Domain synonym table, keyed by normalized term.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("binder", &["affinity protein", "binding protein"]),
    ("peptide binder", &["binding peptide", "peptide ligand"]),
    ("protein binder", &["binding protein", "miniprotein"]),
    ("expression system", &["expression host", "recombinant expression"]),
    ("target protein", &["protein target"]),
    ("purification", &["purified"]),
    ("purification method", &["protein purification"]),
    ("e. coli", &["escherichia coli"]),
    ("antibody", &["immunoglobulin"]),
    ("nanobody", &["vhh", "single-domain antibody"]),
    ("affinity chromatography", &["imac", "ni-nta"]),
    ("his-tag", &["polyhistidine tag", "his6"]),
    ("yeast", &["saccharomyces cerevisiae", "pichia pastoris"]),
    ("cell-free", &["in vitro translation"]),
];

/// Stateless normalizer; the tables are compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryNormalizer;

impl QueryNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Turn a free-text question into a `SearchQuery`.
    pub fn normalize(&self, text: &str) -> ferrobind_common::Result<SearchQuery> {
        if text.trim().is_empty() {
            return Err(FerrobindError::InvalidQuery("question is empty".into()));
        }
        let tokens = tokenize(text);
        let terms = dedup(fold_terms(&tokens));
        if terms.is_empty() {
            return Err(FerrobindError::InvalidQuery(format!(
                "no searchable terms in question '{}'",
                text.trim()
            )));
        }
        debug!(?terms, "Normalized question");
        Ok(build(text.trim(), terms))
    }

    /// Build a query from explicit keywords. Each keyword is one term.
    pub fn from_keywords(&self, keywords: &[&str]) -> ferrobind_common::Result<SearchQuery> {
        let terms: Vec<String> = keywords
            .iter()
            .map(|k| tokenize(k).join(" "))
            .filter(|k| !k.is_empty())
            .map(|k| canonical_phrase(&k).unwrap_or(k))
            .collect();
        let terms = dedup(terms);
        if terms.is_empty() {
            return Err(FerrobindError::InvalidQuery("no keywords given".into()));
        }
        Ok(build(&keywords.join(" "), terms))
    }
}

fn build(question: &str, terms: Vec<String>) -> SearchQuery {
    let mut synonyms = BTreeMap::new();
    for term in &terms {
        if let Some(syns) = synonyms_for(term) {
            synonyms.insert(term.clone(), syns.iter().map(|s| s.to_string()).collect());
        }
    }
    SearchQuery::new(question, terms, synonyms)
}

/// Lowercase and split on anything that is not alphanumeric, `-` or `.`;
/// trim leading and trailing `-`/`.` from each token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '.'))
        .map(|t| t.trim_matches(|c| c == '-' || c == '.'))
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Light plural folding used for phrase and synonym lookup.
fn singular(token: &str) -> &str {
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") && !token.ends_with("us") {
        &token[..token.len() - 1]
    } else {
        token
    }
}

fn is_noise(token: &str) -> bool {
    STOP_WORDS.contains(&token)
        || UNITS.contains(&token)
        || token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
        || (token.chars().count() < 2)
}

/// Greedy longest-match phrase folding, then stop-word removal.
fn fold_terms(tokens: &[String]) -> Vec<String> {
    let mut terms = Vec::new();
    let mut i = 0;
    'outer: while i < tokens.len() {
        for len in (2..=MAX_PHRASE_LEN.min(tokens.len() - i)).rev() {
            let window: Vec<&str> = tokens[i..i + len].iter().map(|t| singular(t)).collect();
            if let Some((_, term)) = PHRASES.iter().find(|(p, _)| *p == window.as_slice()) {
                terms.push(term.to_string());
                i += len;
                continue 'outer;
            }
        }
        let token = &tokens[i];
        if !is_noise(token) {
            terms.push(token.clone());
        }
        i += 1;
    }
    terms
}

fn canonical_phrase(phrase: &str) -> Option<String> {
    let tokens: Vec<&str> = phrase.split_whitespace().map(singular).collect();
    PHRASES
        .iter()
        .find(|(p, _)| *p == tokens.as_slice())
        .map(|(_, term)| term.to_string())
}

fn synonyms_for(term: &str) -> Option<&'static [&'static str]> {
    let key = term.split_whitespace().map(singular).collect::<Vec<_>>().join(" ");
    SYNONYMS
        .iter()
        .find(|(t, _)| *t == term || *t == key)
        .map(|(_, syns)| *syns)
}

fn dedup(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms.into_iter().filter(|t| seen.insert(t.clone())).collect()
}
