use regex::RegexBuilder;

use crate::FlaggedMatch;

const SENTENCE_SEPARATORS: &[u8] = b".!?:;-\n";

/// Returns true when some prefix occurrence is immediately followed by a suffix.
///
/// Only direct adjacency counts: `"no "` + `"sharers"` matches `"no sharers"`
/// but not `"no home sharers"`. The search for a prefix resumes right after
/// each occurrence. Empty prefixes never match.
pub fn is_rejected<P, S>(prefixes: &[P], suffixes: &[S], text: &str) -> bool
where
    P: AsRef<str>,
    S: AsRef<str>,
{
    prefixes
        .iter()
        .map(AsRef::as_ref)
        .filter(|prefix| !prefix.is_empty())
        .any(|prefix| {
            let mut from = 0;
            while let Some(found) = text[from..].find(prefix) {
                let after = from + found + prefix.len();
                let rest = &text[after..];
                if suffixes.iter().any(|suffix| rest.starts_with(suffix.as_ref())) {
                    return true;
                }
                from = after;
            }
            false
        })
}

/// Finds every case-insensitive occurrence of each trigger word, with its sentence.
///
/// Results are grouped by trigger word (in the given order), then left to
/// right. Offsets are in characters, relative to the sentence start.
pub fn extract_flagged<W: AsRef<str>>(text: &str, trigger_words: &[W]) -> Vec<FlaggedMatch> {
    let mut matches = Vec::new();
    for word in trigger_words.iter().map(AsRef::as_ref) {
        if word.is_empty() {
            continue;
        }
        let Ok(pattern) = RegexBuilder::new(&regex::escape(word))
            .case_insensitive(true)
            .build()
        else {
            continue;
        };
        for found in pattern.find_iter(text) {
            let (start, end) = sentence_bounds(text, found.start());
            matches.push(FlaggedMatch {
                offset_in_sentence: text[start..found.start()].chars().count(),
                matched_word: found.as_str().to_string(),
                sentence_text: text[start..end].to_string(),
            });
        }
    }
    matches
}

fn is_separator(byte: u8) -> bool {
    SENTENCE_SEPARATORS.contains(&byte)
}

/// Byte range of the sentence containing the match starting at `match_start`.
fn sentence_bounds(text: &str, match_start: usize) -> (usize, usize) {
    let bytes = text.as_bytes();

    let mut start = match_start;
    while start > 0 && !is_separator(bytes[start]) {
        start -= 1;
    }
    while start < match_start && (is_separator(bytes[start]) || bytes[start] == b' ') {
        start += 1;
    }

    let first_len = text[match_start..]
        .chars()
        .next()
        .map_or(0, char::len_utf8);
    let mut end = match_start + first_len;
    while end < bytes.len() && !is_separator(bytes[end]) {
        end += 1;
    }

    (start, end)
}

/// Phrase lists driving the suitability heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    pub concern_words: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            prefixes: owned(&[
                "no ",
                "geen ",
                "niet voor ",
                "niet geschikt voor ",
                "not for ",
                "not suitable for ",
            ]),
            suffixes: owned(&[
                "students",
                "studenten",
                "sharers",
                "home sharers",
                "house sharers",
                "woningdelers",
                "delers",
            ]),
            concern_words: owned(&["student", "sharer", "deler", "couple"]),
        }
    }
}

impl ClassifierConfig {
    /// Runs the blacklist search over the lower-cased description.
    pub fn is_rejected(&self, description: &str) -> bool {
        is_rejected(&self.prefixes, &self.suffixes, &description.to_lowercase())
    }

    pub fn flag_concerns(&self, description: &str) -> Vec<FlaggedMatch> {
        extract_flagged(description, &self.concern_words)
    }
}
