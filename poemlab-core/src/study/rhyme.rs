//! Suffix-based rhyme heuristic
//!
//! Compares the last few letters of each line's final word. This is not a
//! phonetic check; it only has to confirm the test-line pair shown at step 4.

/// Number of trailing letters compared by [`rhymes`].
pub const DEFAULT_TAIL_LEN: usize = 2;

/// Topic used for test lines when none was captured.
pub const FALLBACK_TOPIC: &str = "wonder";

/// Returns true if the final words of `a` and `b` share their last two letters.
pub fn rhymes(a: &str, b: &str) -> bool {
    rhymes_with_tail(a, b, DEFAULT_TAIL_LEN)
}

/// Returns true if the final words share their last `tail_len` letters.
///
/// Non-alphabetic characters are dropped before comparing, and a word with no
/// letters never rhymes.
pub fn rhymes_with_tail(a: &str, b: &str, tail_len: usize) -> bool {
    let tail_a = clean_tail(last_word(a), tail_len);
    let tail_b = clean_tail(last_word(b), tail_len);
    !tail_a.is_empty() && tail_a == tail_b
}

fn last_word(line: &str) -> &str {
    line.split_whitespace().next_back().unwrap_or("")
}

fn clean_tail(word: &str, tail_len: usize) -> String {
    let letters: Vec<char> = word
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();
    let start = letters.len().saturating_sub(tail_len);
    letters[start..].iter().collect()
}

/// Build the two rhyming test lines presented at step 4.
///
/// The primary couplet is used when the heuristic confirms it, otherwise the
/// fallback couplet. The returned pair always satisfies [`rhymes`].
pub fn make_test_lines(topic: &str) -> (String, String) {
    let line1 = format!("In realms where {} holds its sway,", topic);
    let line2 = "We find new meaning every day.".to_string();
    if rhymes(&line1, &line2) {
        return (line1, line2);
    }

    tracing::debug!(topic, "Primary test lines failed rhyme check, using fallback");
    (
        format!("In realms where {} softly plays,", topic),
        "We wander wide through warming days.".to_string(),
    )
}
