//! Condition-dependent rewriting of assistant text
//!
//! Two passes run in a fixed order: the anthropomorphism pass, then the
//! point-of-view pass. Both are plain substring replacements and can leave
//! rough grammar behind; the exact rules are part of the experimental
//! manipulation and must not be made smarter.

use crate::types::{AnthroLevel, PointOfView};

const A1_PREFIX: &str = "I analyzed your input. ";
const A2_PREFIX: &str = "I think ";
const A3_PREFIX: &str = "I see what you’re aiming for. ";
const A4_PREFIX: &str = "I remember similar patterns, and I feel this will resonate. ";

const THIRD_PERSON: &str = "The system";

/// Rewrite `text` for the given condition.
pub fn wrap(text: &str, level: AnthroLevel, pov: PointOfView) -> String {
    let anthro = apply_anthro(text, level);
    apply_pov(&anthro, pov)
}

/// Anthropomorphism pass.
pub fn apply_anthro(text: &str, level: AnthroLevel) -> String {
    match level {
        AnthroLevel::A0 => strip_self_reference(text),
        AnthroLevel::A1 => format!("{}{}", A1_PREFIX, text),
        AnthroLevel::A2 => {
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => format!("{}{}{}", A2_PREFIX, first.to_lowercase(), chars.as_str()),
                None => String::new(),
            }
        }
        AnthroLevel::A3 => format!("{}{}", A3_PREFIX, text),
        AnthroLevel::A4 => format!("{}{}", A4_PREFIX, text),
    }
}

/// Point-of-view pass. `First` leaves the text untouched.
pub fn apply_pov(text: &str, pov: PointOfView) -> String {
    match pov {
        PointOfView::First => text.to_string(),
        PointOfView::Third => {
            let t = text
                .replace(" I ", " the system ")
                .replace("I'm", "The system is")
                .replace("I’m", "The system is");
            match t.strip_prefix("I ") {
                Some(rest) => format!("{} {}", THIRD_PERSON, rest),
                None => t,
            }
        }
        PointOfView::None => {
            let t = strip_self_reference(text);
            match t.strip_prefix("I ") {
                Some(rest) => rest.to_string(),
                None => t,
            }
        }
    }
}

fn strip_self_reference(text: &str) -> String {
    text.replace(" I ", " ")
        .replace(" I'm ", " ")
        .replace(" I’m ", " ")
}
