//! Question text segmentation engine
//! Splits free-form pasted question text into a stem and lettered answer options

use regex::Regex;

/// A single answer option carved out of the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSegment {
    pub label: char,
    pub text: String,
}

/// Result of segmenting one pasted question.
///
/// `stem` holds everything before the first accepted answer marker, trimmed at
/// both ends only. Inline `{{N}}` placeholder tokens are passed through
/// verbatim; resolving them is the renderer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedQuestion {
    pub number: Option<String>,
    pub stem: String,
    pub answers: Vec<AnswerSegment>,
}

/// A candidate answer marker found during the scan.
#[derive(Debug, Clone, Copy)]
struct Marker {
    /// Byte offset where the match (including its leading newline) begins.
    start: usize,
    /// Byte offset just past the marker, where the answer text begins.
    text_start: usize,
    letter: char,
}

/// Strip runs of `&nbsp;`, U+00A0, and ordinary whitespace from both ends.
///
/// Interior whitespace is untouched. The run is matched greedily, so mixed
/// sequences like `" &nbsp;\u{a0} "` disappear in one pass.
pub fn advanced_trim(text: &str) -> &str {
    let leading = Regex::new(r"^(?:&nbsp;|\u{00A0}|\s)+").unwrap();
    let trailing = Regex::new(r"(?:&nbsp;|\u{00A0}|\s)+$").unwrap();

    let mut out = text;
    if let Some(m) = leading.find(out) {
        out = &out[m.end()..];
    }
    if let Some(m) = trailing.find(out) {
        out = &out[..m.start()];
    }
    out
}

/// Extract a leading item number like `"42. "`.
///
/// Returns the digits and the rest of the text with the prefix removed, or
/// `None` when the text does not start with a numbered prefix.
pub fn extract_number(text: &str) -> Option<(String, &str)> {
    let pattern = Regex::new(r"^\s*(\d+)\.\s+").unwrap();
    let caps = pattern.captures(text)?;
    let number = caps.get(1)?.as_str().to_string();
    let rest = &text[caps.get(0)?.end()..];
    Some((number, rest))
}

/// Segment raw pasted question text into a stem and answer options.
///
/// Markers are only recognized at the start of the string or after a newline
/// (so `"(a)"` mid-sentence never splits an answer), and only in strict
/// `a, b, c, d, e` order: a candidate whose letter is not the next expected
/// one is left in place as plain text. Answers whose trimmed text is empty
/// are dropped. The function is total; empty input yields an empty stem and
/// no answers.
pub fn segment(raw: &str) -> SegmentedQuestion {
    let (number, body) = match extract_number(raw) {
        Some((n, rest)) => (Some(n), rest),
        None => (None, raw),
    };
    let content = advanced_trim(body);

    let markers = accepted_markers(content);

    if markers.is_empty() {
        return SegmentedQuestion {
            number,
            stem: content.to_string(),
            answers: Vec::new(),
        };
    }

    let stem = advanced_trim(&content[..markers[0].start]).to_string();

    let mut answers = Vec::with_capacity(markers.len());
    for (idx, marker) in markers.iter().enumerate() {
        let end = markers
            .get(idx + 1)
            .map(|next| next.start)
            .unwrap_or(content.len());
        let text = advanced_trim(&content[marker.text_start..end]);
        if !text.is_empty() {
            answers.push(AnswerSegment {
                label: marker.letter,
                text: text.to_string(),
            });
        }
    }

    SegmentedQuestion {
        number,
        stem,
        answers,
    }
}

/// Scan for candidate markers and keep only those in sequence.
///
/// The scan finds every `a)`-style candidate; the filter walks them in text
/// order with a single expected-letter state starting at `a`. A candidate is
/// accepted only if its letter equals the expected one, which then advances.
/// Out-of-sequence candidates stay part of the surrounding text.
fn accepted_markers(content: &str) -> Vec<Marker> {
    // Start of string or newline, optional whitespace, letter a-e, a literal
    // '.' or ')', then at least one whitespace character.
    let pattern = Regex::new(r"(?:^|\n)\s*([a-eA-E])[.)]\s+").unwrap();

    let mut accepted = Vec::new();
    let mut expected = 'a';

    for caps in pattern.captures_iter(content) {
        let full = caps.get(0).unwrap();
        let letter = caps
            .get(1)
            .unwrap()
            .as_str()
            .chars()
            .next()
            .unwrap()
            .to_ascii_lowercase();

        if letter != expected {
            continue;
        }

        accepted.push(Marker {
            start: full.start(),
            text_start: full.end(),
            letter,
        });
        expected = ((expected as u8) + 1) as char;
        if expected > 'e' {
            break;
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_extraction() {
        let result = segment("42. Question text\na) opt1\nb) opt2");
        assert_eq!(result.number.as_deref(), Some("42"));
        assert_eq!(result.stem, "Question text");
        assert_eq!(result.answers.len(), 2);
        assert_eq!(result.answers[0].label, 'a');
        assert_eq!(result.answers[0].text, "opt1");
        assert_eq!(result.answers[1].label, 'b');
        assert_eq!(result.answers[1].text, "opt2");
    }

    #[test]
    fn test_no_number_prefix() {
        assert_eq!(segment("Question without a number").number, None);
        assert_eq!(segment("3x. not a number prefix").number, None);
    }

    #[test]
    fn test_text_only() {
        let result = segment("Text only, no answers");
        assert_eq!(result.number, None);
        assert_eq!(result.stem, "Text only, no answers");
        assert!(result.answers.is_empty());
    }

    #[test]
    fn test_advanced_trim_boundaries() {
        let result = segment("  &nbsp; Padded text &nbsp;  ");
        assert_eq!(result.stem, "Padded text");

        // interior whitespace and entities survive
        assert_eq!(advanced_trim("a &nbsp; b"), "a &nbsp; b");
        assert_eq!(advanced_trim("\u{a0}&nbsp; x \u{a0}"), "x");
    }

    #[test]
    fn test_empty_input() {
        let result = segment("");
        assert_eq!(result.number, None);
        assert_eq!(result.stem, "");
        assert!(result.answers.is_empty());
    }

    #[test]
    fn test_out_of_order_markers_rejected() {
        // 'b' cannot open the sequence, so the whole text is stem
        let result = segment("Text\nb) first\nc) second");
        assert!(result.answers.is_empty());
        assert_eq!(result.stem, "Text\nb) first\nc) second");
    }

    #[test]
    fn test_skipped_letter_folds_into_previous_answer() {
        let result = segment("Stem\na) one\nc) two");
        assert_eq!(result.answers.len(), 1);
        assert_eq!(result.answers[0].label, 'a');
        assert_eq!(result.answers[0].text, "one\nc) two");
    }

    #[test]
    fn test_stem_is_stable_under_resegmentation() {
        let result = segment("7. The polynomial satisfies\na) P(0) = 3\nb) P(0) = 1");
        let again = segment(&result.stem);
        assert!(again.answers.is_empty());
        assert_eq!(again.stem, result.stem);
    }

    #[test]
    fn test_mid_sentence_parenthetical_not_a_marker() {
        let result = segment("Choose the right item (a) from the list\na) first\nb) second");
        assert_eq!(result.stem, "Choose the right item (a) from the list");
        assert_eq!(result.answers.len(), 2);
    }

    #[test]
    fn test_dot_and_paren_delimiters() {
        let result = segment("Stem\na. one\nb) two");
        assert_eq!(result.answers.len(), 2);
        assert_eq!(result.answers[0].text, "one");
        assert_eq!(result.answers[1].text, "two");
    }

    #[test]
    fn test_uppercase_markers_lowercased() {
        let result = segment("Stem\nA) one\nB) two");
        assert_eq!(result.answers[0].label, 'a');
        assert_eq!(result.answers[1].label, 'b');
    }

    #[test]
    fn test_empty_answer_dropped() {
        // 'a' is accepted as a marker but its body trims to nothing; 'b' still
        // takes its place in the sequence
        let result = segment("Stem\na) &nbsp;\nb) two");
        let labels: Vec<char> = result.answers.iter().map(|a| a.label).collect();
        assert_eq!(labels, vec!['b']);
        assert_eq!(result.answers[0].text, "two");
    }

    #[test]
    fn test_placeholders_pass_through() {
        let result = segment("1. Look at {{0}} and decide\na) {{1}} is right\nb) none");
        assert_eq!(result.stem, "Look at {{0}} and decide");
        assert_eq!(result.answers[0].text, "{{1}} is right");
    }

    #[test]
    fn test_marker_requires_line_start() {
        // inline "b)" after text on the same line is not a boundary
        let result = segment("Stem\na) one b) still one\nb) two");
        assert_eq!(result.answers.len(), 2);
        assert_eq!(result.answers[0].text, "one b) still one");
        assert_eq!(result.answers[1].text, "two");
    }

    #[test]
    fn test_full_five_options() {
        let raw = "69. The polynomial is such that for all real x. In this case,\n\
                   a) P(0) = 3, P(1) = 2\n\
                   b) P(0) = 1, P(1) = 2\n\
                   c) P(0) = 2, P(1) = 1\n\
                   d) P(0) = 0, P(1) = 3\n\
                   e) P(0) = 3, P(1) = 0";
        let result = segment(raw);
        assert_eq!(result.number.as_deref(), Some("69"));
        let labels: Vec<char> = result.answers.iter().map(|a| a.label).collect();
        assert_eq!(labels, vec!['a', 'b', 'c', 'd', 'e']);
    }
}
