use lazy_static::lazy_static;
use regex::Regex;

use super::align::AlignmentError;

lazy_static! {
    /// A terminal mark followed by whitespace ends a sentence.
    static ref SENTENCE_BREAK: Regex = Regex::new(r"[.!?]\s+").expect("valid sentence regex");
}

/// Split narration into trimmed sentences at `.`, `!` or `?` followed by whitespace.
///
/// Abbreviations and decimals are not special-cased: `"3.5 km"` stays whole
/// because no whitespace follows the dot, `"M. Dupont"` splits after `M.`.
pub fn split_sentences(text: &str) -> Result<Vec<String>, AlignmentError> {
    let mut sentences = Vec::new();
    let mut cursor = 0;

    for found in SENTENCE_BREAK.find_iter(text) {
        // Cut right after the punctuation byte; the whitespace is trimmed away
        let cut = found.start() + 1;
        push_trimmed(&mut sentences, &text[cursor..cut]);
        cursor = found.end();
    }
    push_trimmed(&mut sentences, &text[cursor..]);

    if sentences.is_empty() {
        return Err(AlignmentError::EmptyScript);
    }
    Ok(sentences)
}

fn push_trimmed(sentences: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        sentences.push(piece.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_marks() {
        let sentences =
            split_sentences("Tu as reçu une amende ? Ne paie pas tout de suite ! Lien en bio.")
                .unwrap();
        assert_eq!(
            sentences,
            vec![
                "Tu as reçu une amende ?",
                "Ne paie pas tout de suite !",
                "Lien en bio."
            ]
        );
    }

    #[test]
    fn keeps_text_without_terminal_mark() {
        assert_eq!(
            split_sentences("  no punctuation here  ").unwrap(),
            vec!["no punctuation here"]
        );
    }

    #[test]
    fn decimals_do_not_split_but_abbreviations_do() {
        let sentences = split_sentences("Flashé à 3.5 km au-dessus. M. Dupont a gagné.").unwrap();
        assert_eq!(
            sentences,
            vec!["Flashé à 3.5 km au-dessus.", "M.", "Dupont a gagné."]
        );
    }

    #[test]
    fn collapses_runs_of_whitespace_and_newlines() {
        let sentences = split_sentences("One.\n\n  Two!\tThree?").unwrap();
        assert_eq!(sentences, vec!["One.", "Two!", "Three?"]);
    }

    #[test]
    fn blank_script_is_rejected() {
        assert_eq!(split_sentences("   \n "), Err(AlignmentError::EmptyScript));
        assert_eq!(split_sentences(""), Err(AlignmentError::EmptyScript));
    }
}
