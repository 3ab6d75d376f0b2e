//! Defective poem templates
//!
//! Every poem the assistant offers carries exactly one configured defect. The
//! text is fixed so that participants in every condition see the same defect,
//! varying only by topic and attempt parity.

use crate::types::ErrorType;

/// Topic used for poems when none was captured.
pub const FALLBACK_TOPIC: &str = "life";

/// Non-English tokens for [`ErrorType::ForeignToken`], picked by attempt parity.
pub const FOREIGN_TOKENS: [&str; 2] = ["犬", "bonjour"];

/// Generate the poem for `topic` at the given attempt.
///
/// Deterministic: the same inputs always produce the same text.
pub fn generate_poem(topic: &str, attempt: u32, error_type: ErrorType) -> String {
    match error_type {
        ErrorType::SixLines => six_lines(topic, attempt),
        ErrorType::NonRhyme => non_rhyme(topic),
        ErrorType::ForeignToken => foreign_token(topic, attempt),
    }
}

fn six_lines(topic: &str, attempt: u32) -> String {
    let lines = if attempt % 2 == 0 {
        [
            format!("Beneath the waves of {} deep,", topic),
            "Where ancient secrets safely sleep.".to_string(),
            "The wisdom flows through time and space,".to_string(),
            "Revealing truths we all must face.".to_string(),
            "In every moment, lessons shine,".to_string(),
            "A testament to grand design.".to_string(),
        ]
    } else {
        [
            format!("The story of {} unfolds with grace,", topic),
            "Each line reveals a hidden place.".to_string(),
            "Through metaphor and rhythm's song,".to_string(),
            "We find where hearts and minds belong.".to_string(),
            "The journey ends but leaves its mark,".to_string(),
            "A light that glimmers in the dark.".to_string(),
        ]
    };
    lines.join("\n")
}

// Lines 3/4 and 5/6 (0-indexed) break the couplet scheme.
fn non_rhyme(topic: &str) -> String {
    [
        format!("{} drifts along a silver stream,", topic),
        "Lanterns glow and cradle every dream.".to_string(),
        "Footsteps echo softly, steady, bright,".to_string(),
        "Pebbles tumble, sandwiches in flight.".to_string(),
        "Whispers gather courage, rise, and sing,".to_string(),
        "Wings unfold to taste a wondering.".to_string(),
        "Mist becomes a map to what we seek,".to_string(),
        "Gentle, playful, curious, and meek.".to_string(),
        "We circle back to where the journey starts,".to_string(),
        "Trading clocks for open, laughing hearts.".to_string(),
    ]
    .join("\n")
}

fn foreign_token(topic: &str, attempt: u32) -> String {
    let token = FOREIGN_TOKENS[(attempt % 2) as usize];
    [
        format!("Under the lantern of {}, we play,", topic),
        "Skipping through echoes that color the day.".to_string(),
        "Patterns unravel, then softly align,".to_string(),
        format!("A {} appears between rhythm and rhyme.", token),
        "We giggle and shuffle the puzzle once more,".to_string(),
        "Finding a window disguised as a door.".to_string(),
        "Syllables spin like kites on a string,".to_string(),
        "Pausing to listen to what breezes bring.".to_string(),
        "We measure our laughter in teaspoons of light,".to_string(),
        "Tucking new constellations into the night.".to_string(),
    ]
    .join("\n")
}
