/// Confidence scoring for extracted facts.
///
/// A recognizer hit starts from a base weight set by how it matched, then
/// multiplicative modifiers apply. The result is capped at 1.0.

/// How a recognizer matched its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchSpecificity {
    /// Curated vocabulary entry, matched verbatim.
    Exact,
    /// Regex pattern capture.
    Pattern,
    /// Approximate token match.
    Fuzzy,
}

impl MatchSpecificity {
    pub fn base_weight(&self) -> f64 {
        match self {
            MatchSpecificity::Exact   => 0.55,
            MatchSpecificity::Pattern => 0.40,
            MatchSpecificity::Fuzzy   => 0.25,
        }
    }
}

/// Confidence modifiers observed around a hit.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceModifiers {
    /// A qualifying phrase ("expressed in", "purified by", ...) precedes the
    /// hit in the same sentence.
    pub has_context: bool,
    /// A strain or variant suffix was captured with the value.
    pub variant_captured: bool,
    /// The hit lies inside the title.
    pub in_title: bool,
    /// Fuzzy similarity in `[0, 1]`; scales fuzzy hits only.
    pub similarity: Option<f64>,
}

/// Compute final confidence given the match kind and modifiers.
/// Returns value in [0.0, 1.0].
pub fn compute_confidence(specificity: MatchSpecificity, mods: &ConfidenceModifiers) -> f64 {
    let mut confidence = specificity.base_weight();

    if specificity == MatchSpecificity::Fuzzy {
        confidence *= mods.similarity.unwrap_or(1.0).clamp(0.0, 1.0);
    }

    if mods.has_context {
        confidence *= 1.50;
    }

    if mods.variant_captured {
        confidence *= 1.15;
    }

    if mods.in_title {
        confidence *= 1.10;
    }

    confidence.clamp(0.0, 1.0)
}

/// Aggregate confidence from multiple independent evidence sources
/// using the noisy-OR model: p = 1 - Π(1 - p_i)
pub fn aggregate_confidence(confidences: &[f64]) -> f64 {
    if confidences.is_empty() {
        return 0.0;
    }
    let product: f64 = confidences.iter().map(|&p| 1.0 - p.clamp(0.0, 1.0)).product();
    1.0 - product
}
