//! Sentence segmentation tuned for abstracts.
//!
//! A `.`, `!` or `?` followed by whitespace ends a sentence unless the next
//! word starts lowercase or the period closes a one-letter abbreviation
//! such as the "E." in "E. coli".

use ferrobind_common::TextSpan;

/// Byte spans of the sentences in `text`, trimmed of surrounding whitespace.
pub fn sentence_spans(text: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (i, &(pos, c)) in chars.iter().enumerate() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(_, next)) = chars.get(i + 1) else { continue };
        if !next.is_whitespace() {
            continue;
        }
        let following = chars[i + 1..].iter().map(|&(_, ch)| ch).find(|ch| !ch.is_whitespace());
        if following.is_some_and(|ch| ch.is_lowercase()) {
            continue;
        }
        if c == '.' && is_single_letter_abbreviation(&chars, i) {
            continue;
        }
        push_trimmed(text, start, pos + c.len_utf8(), &mut spans);
        start = pos + c.len_utf8();
    }
    push_trimmed(text, start, text.len(), &mut spans);
    spans
}

/// The sentence containing byte offset `pos`.
pub fn sentence_at(spans: &[TextSpan], pos: usize) -> Option<TextSpan> {
    spans.iter().copied().find(|s| pos >= s.start && pos < s.end.max(s.start + 1))
}

fn is_single_letter_abbreviation(chars: &[(usize, char)], dot: usize) -> bool {
    if dot == 0 {
        return false;
    }
    let letter = chars[dot - 1].1;
    let before = if dot >= 2 { Some(chars[dot - 2].1) } else { None };
    letter.is_uppercase() && !before.is_some_and(char::is_alphanumeric)
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<TextSpan>) {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead + trail < slice.len() {
        spans.push(TextSpan::new(start + lead, end - trail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(text: &str) -> Vec<&str> {
        sentence_spans(text).iter().map(|s| &text[s.start..s.end]).collect()
    }

    #[test]
    fn test_basic_split() {
        assert_eq!(sentences("One here. Two there! Three?"), vec!["One here.", "Two there!", "Three?"]);
    }

    #[test]
    fn test_species_abbreviation_not_split() {
        assert_eq!(
            sentences("Binders were expressed in E. coli BL21. They folded."),
            vec!["Binders were expressed in E. coli BL21.", "They folded."]
        );
    }

    #[test]
    fn test_decimal_and_lowercase_continuation() {
        assert_eq!(sentences("Kd was 1.5 nM. approx. values held."), vec!["Kd was 1.5 nM. approx. values held."]);
    }

    #[test]
    fn test_sentence_at() {
        let text = "First. Second sentence.";
        let spans = sentence_spans(text);
        let s = sentence_at(&spans, text.find("Second").unwrap()).unwrap();
        assert_eq!(&text[s.start..s.end], "Second sentence.");
    }
}
