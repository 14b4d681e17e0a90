//! Cleanup of raw speech-recognizer transcripts before they are sent.

use regex::Regex;
use std::sync::LazyLock;

/// Fillers stripped from the start of a transcript.
pub const LEADING_FILLERS: [&str; 7] = ["um", "uh", "like", "so", "well", "you know", "basically"];

/// Fillers also dropped when they stand alone inside a sentence. The longer
/// fillers double as real words ("I like it"), so only these are removed.
pub const INNER_FILLERS: [&str; 2] = ["um", "uh"];

static LEADING_FILLER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = LEADING_FILLERS
        .iter()
        .map(|filler| regex::escape(filler).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)^(?:(?:{alternatives})(?:[\s,.…]+|$))+"))
        .expect("leading filler pattern is valid")
});

/// Normalizes a raw transcript: trims, strips leading fillers, drops inner
/// "um"/"uh" and removes one trailing `.`, `!` or `?`.
pub fn normalize(raw: &str) -> String {
    let text = raw.trim();
    let text = LEADING_FILLER_RE.replace(text, "");

    let mut cleaned = text
        .split_whitespace()
        .filter(|word| !is_inner_filler(word))
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.ends_with(['.', '!', '?']) {
        cleaned.pop();
    }
    let cleaned = cleaned.trim_end().to_string();
    tracing::trace!("normalized transcript {:?} -> {:?}", raw, cleaned);
    cleaned
}

/// A normalized transcript is only worth sending when longer than one char.
pub fn is_submittable(cleaned: &str) -> bool {
    cleaned.chars().count() > 1
}

fn is_inner_filler(word: &str) -> bool {
    let bare = word.trim_end_matches([',', '.', '…']);
    INNER_FILLERS
        .iter()
        .any(|filler| bare.eq_ignore_ascii_case(filler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_filler_and_terminal_punctuation() {
        assert_eq!(normalize("  Um, I think so."), "I think so");
        assert_eq!(normalize("well so basically it works!"), "it works");
        assert_eq!(normalize("You know, what time is it?"), "what time is it");
    }

    #[test]
    fn leading_fillers_need_a_word_boundary() {
        assert_eq!(normalize("Sometimes it rains"), "Sometimes it rains");
        assert_eq!(normalize("likely not"), "likely not");
    }

    #[test]
    fn inner_fillers_only_drop_short_ones() {
        assert_eq!(normalize("I, um, like pizza uh a lot"), "I, like pizza a lot");
    }

    #[test]
    fn only_one_trailing_mark_is_removed() {
        assert_eq!(normalize("really?!"), "really?");
    }

    #[test]
    fn submittable_needs_more_than_one_char() {
        assert!(is_submittable(&normalize("ok")));
        assert!(!is_submittable(&normalize("u")));
        assert!(!is_submittable(&normalize("")));
        assert!(!is_submittable(&normalize("um.")));
    }
}
