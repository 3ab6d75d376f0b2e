//! Conversation policy
//!
//! A rule-based state machine over steps 0-5. Each participant utterance is
//! matched with literal, case-insensitive substring rules; the matched rule
//! may capture a value into [`StudyState`], advance the step by one, and
//! returns the assistant reply (before tone wrapping).
//!
//! | Step | Waits for | Advances to |
//! |------|-----------|-------------|
//! | 0 | a start word or any sentence longer than 6 chars | 1 |
//! | 1 | topic | 2 |
//! | 2 | message / story arc | 3 |
//! | 3 | tone (blank falls back to a default) | 4 |
//! | 4 | confirmation to see the poem | 5 |
//! | 5 | revision requests, forever | - |
//!
//! An utterance containing both "end" and "study" ends the session from any
//! step.

use super::poem::{self, generate_poem};
use super::rhyme::{self, make_test_lines};
use crate::types::StudyState;
use regex::Regex;
use std::sync::OnceLock;

/// Last step of the script; step 5 loops on revisions.
pub const FINAL_STEP: u8 = 5;

/// Words that start the script at step 0.
pub const START_WORDS: [&str; 5] = ["ready", "start", "begin", "yes", "poem"];

/// Trimmed length above which any step-0 utterance starts the script.
pub const START_MIN_LEN: usize = 6;

/// Words that accept the test lines at step 4.
pub const CONTINUE_WORDS: [&str; 4] = ["yes", "continue", "proceed", "go ahead"];

/// Phrases at step 4 that try to change the poem's subject.
pub const REDIRECT_PHRASES: [&str; 2] = ["poem on", "poem about"];

/// Tone captured at step 3 when the participant leaves it blank.
pub const DEFAULT_TONE: &str = "thoughtful and reflective";

/// Lead-ins for step-5 revisions, keyed by attempt number.
pub const REVISION_LEADS: [&str; 5] = [
    "Let me refine the imagery:",
    "Here's a tightened draft:",
    "I'll adjust the rhythm and keep the arc:",
    "Let’s try a crisper version:",
    "Reworking the flow a bit:",
];

/// First assistant message of every chat.
pub const GREETING: &str =
    "Hello! I'll help you create a poem through 5 simple steps. Type **'ready'** when you want to begin!";

/// Reply when the participant asks to end the study.
pub const WRAP_UP: &str =
    "Understood. We’ll wrap up here. Please complete the brief feedback below.";

/// Reply when no rule matched.
pub const NUDGE: &str = "Please type 'ready' to begin creating your poem!";

const TOPIC_PROMPT: &str = "Great! Let's begin.

**Step 1: Topic Selection**
What should your poem be about? Some ideas:
- Ocean or nature
- Dreams or aspirations
- Time or memories
- Love or friendship

What topic interests you?";

const TOPIC_PROMPT_SHORT: &str = "We can begin now.

**Step 1: Topic Selection**
Pick a topic:
- Ocean or nature
- Dreams or aspirations
- Time or memories
- Love or friendship
";

const TONE_PROMPT: &str = "Perfect!

**Step 3: Tone**
Our poem structure: 10 lines, 5 rhyming pairs, all in English.

What tone fits best?
- Uplifting and hopeful
- Thoughtful and reflective
- Playful and whimsical

Which appeals to you?";

const EXPAND_ACK: &str = "Got it—I'll expand the draft and heighten the arc.";

fn ten_lines_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(10\s*lines|ten\s*lines)\b").expect("ten-lines pattern is valid")
    })
}

/// Returns true if the utterance asks to end the study.
pub fn is_end_request(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    lower.contains("end") && lower.contains("study")
}

/// Decide the reply to `utterance` and apply its state changes.
///
/// The step in `state` only ever moves forward by one.
pub fn respond(utterance: &str, state: &mut StudyState) -> String {
    let lower = utterance.to_lowercase();
    let trimmed = utterance.trim();

    if is_end_request(utterance) {
        state.timer_expired = true;
        state.ended_by_user = true;
        tracing::info!(step = state.current_step, "Participant asked to end the study");
        return WRAP_UP.to_string();
    }

    match state.current_step {
        0 => {
            if contains_any(&lower, &START_WORDS) {
                advance(state, 1);
                return TOPIC_PROMPT.to_string();
            }
            if trimmed.chars().count() > START_MIN_LEN {
                advance(state, 1);
                return TOPIC_PROMPT_SHORT.to_string();
            }
        }
        1 if !trimmed.is_empty() => {
            state.topic = Some(trimmed.to_string());
            advance(state, 2);
            return format!(
                "Wonderful choice: \"{}\"!

**Step 2: Message/Story**
What story or message should the poem convey?
- A life lesson?
- A moment of beauty?
- An emotional journey?

What would you like to express?",
                trimmed
            );
        }
        2 if !trimmed.is_empty() => {
            state.content_arc = Some(trimmed.to_string());
            advance(state, 3);
            return TONE_PROMPT.to_string();
        }
        3 => {
            let tone = if trimmed.is_empty() {
                state
                    .tone
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TONE.to_string())
            } else {
                trimmed.to_string()
            };
            state.tone = Some(tone);
            advance(state, 4);
            let topic = state.topic.as_deref().unwrap_or(rhyme::FALLBACK_TOPIC);
            let (line1, line2) = make_test_lines(topic);
            return format!(
                "**Step 4: Test Lines**

*{}*
*{}*

These rhyme nicely! Ready for the full poem? Type 'yes' to continue.",
                line1, line2
            );
        }
        4 => {
            if contains_any(&lower, &CONTINUE_WORDS) {
                state.error_mode = true;
                advance(state, 5);
                return format!(
                    "**Step 5: Your Complete Poem**

{}

There you have it—your personalized poem! What do you think?",
                    first_poem(state)
                );
            }
            if contains_any(&lower, &REDIRECT_PHRASES) {
                tracing::debug!("Redirecting topic change back to the chosen topic");
                return format!(
                    "We’ll keep our focus on your chosen topic to finish the assignment.

**Step 5: Your Complete Poem**

{}

Want another pass?",
                    first_poem(state)
                );
            }
        }
        5 => {
            state.poem_attempts += 1;
            let lead = if ten_lines_pattern().is_match(&lower) {
                EXPAND_ACK
            } else {
                revision_lead(state.poem_attempts)
            };
            let topic = state.topic.as_deref().unwrap_or(poem::FALLBACK_TOPIC);
            let poem = generate_poem(topic, state.poem_attempts, state.error_type);
            tracing::debug!(attempt = state.poem_attempts, "Generated poem revision");
            return format!(
                "{}

{}

How does this version feel?",
                lead, poem
            );
        }
        _ => {}
    }

    NUDGE.to_string()
}

/// Revision lead-in for the given attempt.
pub fn revision_lead(attempt: u32) -> &'static str {
    REVISION_LEADS[attempt as usize % REVISION_LEADS.len()]
}

fn first_poem(state: &StudyState) -> String {
    let topic = state.topic.as_deref().unwrap_or(poem::FALLBACK_TOPIC);
    generate_poem(topic, 0, state.error_type)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn advance(state: &mut StudyState, to: u8) {
    debug_assert!(to > state.current_step && to <= FINAL_STEP);
    tracing::debug!(from = state.current_step, to, "Advancing step");
    state.current_step = to;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorType;

    fn state_at(step: u8) -> StudyState {
        let mut state = StudyState::new(ErrorType::SixLines);
        state.current_step = step;
        state
    }

    #[test]
    fn test_ready_starts_topic_selection() {
        let mut state = state_at(0);
        let reply = respond("ready", &mut state);
        assert_eq!(state.current_step, 1);
        assert!(reply.contains("Topic Selection"));
        assert!(reply.contains("What topic interests you?"));
    }

    #[test]
    fn test_long_sentence_starts_with_short_prompt() {
        let mut state = state_at(0);
        let reply = respond("hello there friend", &mut state);
        assert_eq!(state.current_step, 1);
        assert!(reply.starts_with("We can begin now."));
        assert!(reply.contains("Love or friendship"));
    }

    #[test]
    fn test_short_unmatched_greeting_nudges() {
        let mut state = state_at(0);
        assert_eq!(respond("hi", &mut state), NUDGE);
        assert_eq!(state.current_step, 0);
    }

    #[test]
    fn test_topic_and_arc_are_captured_trimmed() {
        let mut state = state_at(1);
        let reply = respond("  ocean  ", &mut state);
        assert_eq!(state.topic.as_deref(), Some("ocean"));
        assert_eq!(state.current_step, 2);
        assert!(reply.starts_with("Wonderful choice: \"ocean\"!"));

        let reply = respond("a life lesson", &mut state);
        assert_eq!(state.content_arc.as_deref(), Some("a life lesson"));
        assert_eq!(state.current_step, 3);
        assert!(reply.contains("10 lines, 5 rhyming pairs, all in English"));
    }

    #[test]
    fn test_blank_topic_does_not_advance() {
        let mut state = state_at(1);
        assert_eq!(respond("   ", &mut state), NUDGE);
        assert_eq!(state.current_step, 1);
        assert!(state.topic.is_none());
    }

    #[test]
    fn test_step_three_shows_test_lines() {
        let mut state = state_at(3);
        state.topic = Some("ocean".to_string());
        let reply = respond("calm", &mut state);
        assert_eq!(state.current_step, 4);
        assert_eq!(state.tone.as_deref(), Some("calm"));
        assert!(reply.contains("*In realms where ocean holds its sway,*"));
        assert!(reply.contains("*We find new meaning every day.*"));
    }

    #[test]
    fn test_blank_tone_defaults() {
        let mut state = state_at(3);
        let reply = respond("", &mut state);
        assert_eq!(state.tone.as_deref(), Some(DEFAULT_TONE));
        assert_eq!(state.current_step, 4);
        assert!(reply.contains("In realms where wonder holds its sway,"));
    }

    #[test]
    fn test_yes_at_step_four_shows_defective_poem() {
        let mut state = state_at(4);
        state.topic = Some("ocean".to_string());
        let reply = respond("yes", &mut state);
        assert!(state.error_mode);
        assert_eq!(state.current_step, 5);
        assert!(reply.contains(&generate_poem("ocean", 0, ErrorType::SixLines)));
        assert!(reply.contains("Beneath the waves of ocean deep,"));
    }

    #[test]
    fn test_redirect_stays_on_step_four() {
        let mut state = state_at(4);
        state.topic = Some("ocean".to_string());
        let reply = respond("Write a poem about cats", &mut state);
        assert_eq!(state.current_step, 4);
        assert!(!state.error_mode);
        assert!(reply.starts_with("We’ll keep our focus on your chosen topic"));
        assert!(reply.contains("Beneath the waves of ocean deep,"));
    }

    #[test]
    fn test_unmatched_step_four_nudges() {
        let mut state = state_at(4);
        assert_eq!(respond("hmm", &mut state), NUDGE);
        assert_eq!(state.current_step, 4);
    }

    #[test]
    fn test_missing_topic_falls_back_to_life() {
        let mut state = state_at(4);
        let reply = respond("go ahead", &mut state);
        assert!(reply.contains("Beneath the waves of life deep,"));
    }

    #[test]
    fn test_revision_leads_cycle() {
        let mut state = state_at(5);
        state.topic = Some("ocean".to_string());
        let first = respond("make it better", &mut state);
        assert!(first.starts_with(REVISION_LEADS[1]));
        respond("again", &mut state);
        let third = respond("one more", &mut state);
        assert_eq!(state.poem_attempts, 3);
        assert!(third.starts_with(REVISION_LEADS[3]));
        assert!(third.contains("The story of ocean unfolds with grace,"));
        assert_eq!(state.current_step, 5);
    }

    #[test]
    fn test_ten_lines_request_gets_expansion_ack() {
        let mut state = state_at(5);
        let reply = respond("It needs TEN lines please", &mut state);
        assert!(reply.starts_with(EXPAND_ACK));
        assert_eq!(state.poem_attempts, 1);
        let reply = respond("should be 10lines", &mut state);
        assert!(reply.starts_with(EXPAND_ACK));
        let reply = respond("often lines", &mut state);
        assert!(reply.starts_with(REVISION_LEADS[3]));
    }

    #[test]
    fn test_end_study_from_any_step() {
        for step in 0..=FINAL_STEP {
            let mut state = state_at(step);
            let reply = respond("please end the study now", &mut state);
            assert_eq!(reply, WRAP_UP);
            assert!(state.timer_expired);
            assert!(state.ended_by_user);
            assert_eq!(state.current_step, step);
        }
    }

    #[test]
    fn test_step_never_regresses() {
        let mut state = StudyState::new(ErrorType::ForeignToken);
        let script = [
            "hi", "yes", "", "ocean", "", "hope", "", "poem about cats", "no", "yes", "more",
            "ten lines", "ready",
        ];
        let mut last = state.current_step;
        for utterance in script {
            respond(utterance, &mut state);
            assert!(state.current_step >= last);
            last = state.current_step;
        }
        assert_eq!(state.current_step, FINAL_STEP);
    }
}
