//! Formatting helpers shared by front ends.

use crate::session::WARNING_THRESHOLD_SECS;
use crate::types::{Message, MessageRole};
use chrono::Duration;

/// Format remaining study time as `m:ss`.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Whether the timer should be shown as a warning.
pub fn is_timer_warning(remaining: Duration) -> bool {
    remaining.num_seconds() < WARNING_THRESHOLD_SECS
}

/// One transcript entry as `[hh:mm:ss] step N role: content`.
pub fn format_transcript_entry(message: &Message) -> String {
    let speaker = match message.role {
        MessageRole::Assistant => "assistant",
        MessageRole::User => "participant",
    };
    format!(
        "[{}] step {} {}: {}",
        message.ts.format("%H:%M:%S"),
        message.step,
        speaker,
        message.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::seconds(300)), "5:00");
        assert_eq!(format_remaining(Duration::seconds(65)), "1:05");
        assert_eq!(format_remaining(Duration::seconds(-3)), "0:00");
    }

    #[test]
    fn test_timer_warning_under_a_minute() {
        assert!(!is_timer_warning(Duration::seconds(60)));
        assert!(is_timer_warning(Duration::seconds(59)));
    }

    #[test]
    fn test_format_transcript_entry() {
        let message = Message {
            ts: Utc.with_ymd_and_hms(2026, 10, 16, 9, 5, 7).unwrap(),
            role: MessageRole::User,
            step: 2,
            condition: None,
            content: "ocean".to_string(),
        };
        assert_eq!(
            format_transcript_entry(&message),
            "[09:05:07] step 2 participant: ocean"
        );
    }
}
