//! Curated domain vocabulary matched with an Aho-Corasick automaton.
//!
//! Matching is case-insensitive and leftmost-longest, so "HEK293T" wins over
//! "HEK293" and "affinity chromatography" over "affinity".

use aho_corasick::{AhoCorasick, MatchKind};
use ferrobind_common::{FactKind, TextSpan};
use tracing::info;

/// `(surface form, canonical value)` pairs per fact kind.
const TARGETS: &[(&str, &str)] = &[
    ("PD-L1", "PD-L1"), ("PDL1", "PD-L1"), ("PD-1", "PD-1"), ("CTLA-4", "CTLA-4"),
    ("HER2", "HER2"), ("ERBB2", "HER2"), ("EGFR", "EGFR"), ("VEGF", "VEGF"),
    ("VEGFR2", "VEGFR2"), ("TNF-alpha", "TNF-α"), ("TNF-α", "TNF-α"), ("TNFα", "TNF-α"),
    ("IL-6", "IL-6"), ("IL-2", "IL-2"), ("IL-17A", "IL-17A"), ("IL-23", "IL-23"),
    ("KRAS", "KRAS"), ("MDM2", "MDM2"), ("BCL-2", "BCL-2"), ("MCL-1", "MCL-1"),
    ("streptavidin", "streptavidin"), ("ubiquitin", "ubiquitin"), ("lysozyme", "lysozyme"),
    ("thrombin", "thrombin"), ("insulin receptor", "insulin receptor"),
    ("ACE2", "ACE2"), ("spike protein", "SARS-CoV-2 spike"), ("receptor-binding domain", "SARS-CoV-2 spike RBD"),
    ("RBD", "SARS-CoV-2 spike RBD"), ("hemagglutinin", "hemagglutinin"),
    ("GFP", "GFP"), ("green fluorescent protein", "GFP"), ("SUMO", "SUMO"),
    ("CD3", "CD3"), ("CD19", "CD19"), ("CD20", "CD20"), ("CD47", "CD47"),
    ("TfR1", "TfR1"), ("transferrin receptor", "TfR1"), ("albumin", "albumin"),
    ("integrin", "integrin"), ("calmodulin", "calmodulin"), ("PCSK9", "PCSK9"),
    ("IgG Fc", "IgG Fc"), ("Fc receptor", "Fc receptor"), ("keap1", "KEAP1"),
    ("14-3-3", "14-3-3"), ("beta-catenin", "β-catenin"), ("β-catenin", "β-catenin"),
];

const EXPRESSION_HOSTS: &[(&str, &str)] = &[
    ("E. coli", "E. coli"), ("Escherichia coli", "E. coli"), ("E.coli", "E. coli"),
    ("Saccharomyces cerevisiae", "S. cerevisiae"), ("S. cerevisiae", "S. cerevisiae"),
    ("Pichia pastoris", "Pichia pastoris"), ("P. pastoris", "Pichia pastoris"),
    ("Komagataella phaffii", "Pichia pastoris"), ("yeast", "yeast"),
    ("HEK293", "HEK293"), ("HEK 293", "HEK293"), ("HEK293T", "HEK293T"), ("HEK293F", "HEK293F"),
    ("Expi293", "Expi293"), ("CHO cells", "CHO"), ("CHO", "CHO"), ("ExpiCHO", "ExpiCHO"),
    ("Sf9", "Sf9 insect cells"), ("Sf21", "Sf21 insect cells"), ("High Five", "High Five insect cells"),
    ("insect cells", "insect cells"), ("baculovirus", "baculovirus/insect cells"),
    ("cell-free", "cell-free expression"), ("cell free", "cell-free expression"),
    ("in vitro translation", "cell-free expression"),
    ("Bacillus subtilis", "Bacillus subtilis"), ("B. subtilis", "Bacillus subtilis"),
    ("Nicotiana benthamiana", "Nicotiana benthamiana"), ("mammalian cells", "mammalian cells"),
    ("solid-phase peptide synthesis", "solid-phase peptide synthesis"), ("SPPS", "solid-phase peptide synthesis"),
];

const PURIFICATION_METHODS: &[(&str, &str)] = &[
    ("Ni-NTA", "Ni-NTA affinity chromatography"), ("Ni2+-NTA", "Ni-NTA affinity chromatography"),
    ("nickel affinity", "Ni-NTA affinity chromatography"), ("IMAC", "IMAC"),
    ("immobilized metal affinity chromatography", "IMAC"),
    ("His-tag", "His-tag"), ("His6", "His-tag"), ("6xHis", "His-tag"), ("polyhistidine tag", "His-tag"),
    ("hexahistidine", "His-tag"), ("GST tag", "GST tag"), ("GST-tag", "GST tag"),
    ("glutathione S-transferase", "GST tag"), ("glutathione sepharose", "GST tag"),
    ("Strep-tag", "Strep-tag"), ("MBP tag", "MBP tag"), ("maltose-binding protein", "MBP tag"),
    ("SUMO tag", "SUMO tag"), ("Protein A", "Protein A chromatography"), ("Protein G", "Protein G chromatography"),
    ("affinity chromatography", "affinity chromatography"), ("affinity purification", "affinity chromatography"),
    ("size-exclusion chromatography", "size-exclusion chromatography"),
    ("size exclusion chromatography", "size-exclusion chromatography"),
    ("gel filtration", "size-exclusion chromatography"), ("SEC", "size-exclusion chromatography"),
    ("ion-exchange chromatography", "ion-exchange chromatography"),
    ("ion exchange chromatography", "ion-exchange chromatography"),
    ("anion exchange", "ion-exchange chromatography"), ("cation exchange", "ion-exchange chromatography"),
    ("reverse-phase HPLC", "RP-HPLC"), ("reversed-phase HPLC", "RP-HPLC"), ("RP-HPLC", "RP-HPLC"),
    ("HPLC", "HPLC"), ("FPLC", "FPLC"), ("dialysis", "dialysis"), ("ultrafiltration", "ultrafiltration"),
    ("ammonium sulfate precipitation", "ammonium sulfate precipitation"),
    ("inclusion bodies", "inclusion body refolding"), ("refolding", "inclusion body refolding"),
];

/// One vocabulary hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyMatch {
    pub kind: FactKind,
    pub canonical: &'static str,
    pub surface: String,
    pub span: TextSpan,
}

/// Vocabulary matcher over every fact kind.
pub struct Vocabulary {
    automaton: AhoCorasick,
    /// Pattern index → (kind, canonical value)
    pattern_info: Vec<(FactKind, &'static str)>,
}

impl Vocabulary {
    /// Build the matcher from the embedded vocabulary.
    pub fn embedded() -> anyhow::Result<Self> {
        let mut patterns: Vec<&'static str> = Vec::new();
        let mut pattern_info = Vec::new();
        for (kind, table) in [
            (FactKind::TargetProtein, TARGETS),
            (FactKind::ExpressionSystem, EXPRESSION_HOSTS),
            (FactKind::PurificationMethod, PURIFICATION_METHODS),
        ] {
            for (surface, canonical) in table {
                patterns.push(*surface);
                pattern_info.push((kind, *canonical));
            }
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .ascii_case_insensitive(true)
            .build(&patterns)?;

        info!(patterns = patterns.len(), "Vocabulary loaded");
        Ok(Self { automaton, pattern_info })
    }

    /// All whole-word vocabulary hits, left to right, non-overlapping.
    pub fn find(&self, text: &str) -> Vec<VocabularyMatch> {
        self.automaton
            .find_iter(text)
            .filter(|m| is_word_bounded(text, m.start(), m.end()))
            .map(|m| {
                let (kind, canonical) = self.pattern_info[m.pattern().as_usize()];
                VocabularyMatch {
                    kind,
                    canonical,
                    surface: text[m.start()..m.end()].to_string(),
                    span: TextSpan::new(m.start(), m.end()),
                }
            })
            .filter(|m| !is_case_sensitive_acronym_miss(m))
            .collect()
    }

    /// Hits of a single kind.
    pub fn find_kind(&self, text: &str, kind: FactKind) -> Vec<VocabularyMatch> {
        self.find(text).into_iter().filter(|m| m.kind == kind).collect()
    }

    /// Single-word canonical values of `kind`, used for fuzzy matching.
    pub fn single_word_terms(&self, kind: FactKind) -> Vec<(&'static str, &'static str)> {
        let table = match kind {
            FactKind::TargetProtein => TARGETS,
            FactKind::ExpressionSystem => EXPRESSION_HOSTS,
            FactKind::PurificationMethod => PURIFICATION_METHODS,
            FactKind::Other => return Vec::new(),
        };
        table
            .iter()
            .filter(|(surface, _)| !surface.contains(' ') && surface.chars().all(char::is_alphabetic))
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pattern_info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern_info.is_empty()
    }
}

/// True when the match is not glued to a neighbouring letter or digit.
pub(crate) fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Short all-caps acronyms ("SEC", "CHO", "RBD") only count when written in
/// capitals; "sec" or "cho" in running text is something else.
fn is_case_sensitive_acronym_miss(m: &VocabularyMatch) -> bool {
    let letters: Vec<char> = m.surface.chars().filter(|c| c.is_alphabetic()).collect();
    m.surface.len() <= 4 && !letters.is_empty() && letters.iter().all(|c| c.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_match_wins() {
        let v = Vocabulary::embedded().unwrap();
        let hits = v.find("Binders were produced in HEK293T cells.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].canonical, "HEK293T");
    }

    #[test]
    fn test_case_insensitive_and_canonicalized() {
        let v = Vocabulary::embedded().unwrap();
        let hits = v.find_kind("purified by gel filtration and NI-NTA", FactKind::PurificationMethod);
        let values: Vec<&str> = hits.iter().map(|h| h.canonical).collect();
        assert_eq!(values, vec!["size-exclusion chromatography", "Ni-NTA affinity chromatography"]);
    }

    #[test]
    fn test_word_boundaries() {
        let v = Vocabulary::embedded().unwrap();
        // "SEC" inside "SECRETED" and lowercase "cho" in "echo" must not match
        assert!(v.find("SECRETED echo").is_empty());
    }

    #[test]
    fn test_lowercase_acronym_ignored() {
        let v = Vocabulary::embedded().unwrap();
        assert!(v.find("the sec fraction").is_empty());
        assert_eq!(v.find("the SEC fraction").len(), 1);
    }

    #[test]
    fn test_single_word_terms() {
        let v = Vocabulary::embedded().unwrap();
        let terms = v.single_word_terms(FactKind::ExpressionSystem);
        assert!(terms.iter().any(|(s, _)| *s == "yeast"));
        assert!(!terms.iter().any(|(s, _)| s.contains(' ')));
    }
}
