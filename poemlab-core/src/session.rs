//! Session lifecycle
//!
//! A [`Session`] is an owned value threaded through every operation of one
//! participant run:
//!
//! ```text
//! welcome --register--> chat --timer / "End" / "end study"--> feedback --submit--> complete
//! ```
//!
//! All methods take the current time explicitly and perform no I/O; the
//! [`crate::runner::StudyRunner`] persists a snapshot after each of them.

use crate::error::{Error, Result};
use crate::study::{self, policy};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};

/// Default study time limit.
pub const DEFAULT_DURATION_SECS: i64 = 300;

/// Longest accepted study time limit (one day).
pub const MAX_DURATION_SECS: i64 = 24 * 60 * 60;

/// Remaining time below which the timer is shown as a warning.
pub const WARNING_THRESHOLD_SECS: i64 = 60;

/// Study time limit from seconds, accepted within `1..=MAX_DURATION_SECS`.
pub fn duration_from_secs(secs: i64) -> Result<Duration> {
    if !(1..=MAX_DURATION_SECS).contains(&secs) {
        return Err(Error::Config(format!(
            "study duration must be between 1 and {} seconds, got {}",
            MAX_DURATION_SECS, secs
        )));
    }
    Ok(Duration::seconds(secs))
}

/// Study parameters fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudySettings {
    pub error_type: ErrorType,
    pub duration: Duration,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            error_type: ErrorType::SixLines,
            duration: Duration::seconds(DEFAULT_DURATION_SECS),
        }
    }
}

/// Result of one participant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Assistant reply after tone wrapping
    pub reply: String,
    /// Step after the turn
    pub step: u8,
    /// Stage after the turn
    pub stage: Stage,
}

/// One participant run of the study.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    participant_name: String,
    participant_id: String,
    condition: Condition,
    seed: u64,
    stage: Stage,
    started_at: Option<DateTime<Utc>>,
    duration: Duration,
    state: StudyState,
    messages: Vec<Message>,
}

impl Session {
    /// Create a session and draw its condition from the creation time.
    pub fn new(settings: StudySettings, now: DateTime<Utc>) -> Self {
        let seed = study::seed_from_time(now);
        Self::with_condition(seed, study::assign_condition(seed), settings)
    }

    /// Create a session with an explicit seed and condition.
    pub fn with_condition(seed: u64, condition: Condition, settings: StudySettings) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            session_id = %id,
            seed,
            anthro_level = %condition.anthro_level,
            pov = %condition.pov,
            error_type = %settings.error_type,
            "Session created"
        );
        Self {
            id,
            participant_name: String::new(),
            participant_id: String::new(),
            condition,
            seed,
            stage: Stage::Welcome,
            started_at: None,
            duration: settings.duration,
            state: StudyState::new(settings.error_type),
            messages: Vec::new(),
        }
    }

    /// Rebuild an in-progress session from its saved record.
    pub fn from_record(record: SessionRecord) -> Result<Self> {
        if record.status == RecordStatus::Final || record.stage == Stage::Complete {
            return Err(Error::SessionFinalized(record.session_id));
        }
        Ok(Self {
            id: record.session_id,
            participant_name: record.participant_name,
            participant_id: record.participant_id,
            condition: record.condition,
            seed: record.seed,
            stage: record.stage,
            started_at: record.started_at,
            duration: duration_from_secs(record.duration_secs)?,
            state: record.study_state,
            messages: record.messages,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn participant_name(&self) -> &str {
        &self.participant_name
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn state(&self) -> &StudyState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent assistant reply, if any.
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }

    // ============================================
    // Welcome
    // ============================================

    /// Register the participant and start the chat.
    ///
    /// A blank participant id defaults to `P` plus the first six characters of
    /// the session id. Sends the greeting.
    pub fn register(
        &mut self,
        name: &str,
        participant_id: Option<&str>,
        consent: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.expect_stage(Stage::Welcome)?;
        if !consent {
            return Err(Error::ConsentRequired);
        }

        self.participant_name = name.trim().to_string();
        self.participant_id = match participant_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("P{}", self.id.chars().take(6).collect::<String>()),
        };
        self.started_at = Some(now);
        self.stage = Stage::Chat;
        tracing::info!(
            session_id = %self.id,
            participant_id = %self.participant_id,
            "Participant registered, chat started"
        );

        self.send_assistant(policy::GREETING, now);
        Ok(())
    }

    // ============================================
    // Chat
    // ============================================

    /// Time left before the timer expires. Zero before the chat starts.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::zero();
        };
        let left = self.duration - now.signed_duration_since(started);
        left.max(Duration::zero())
    }

    /// Whether the participant can still type.
    pub fn chat_enabled(&self) -> bool {
        self.stage == Stage::Chat && !self.state.timer_expired
    }

    /// Recompute the timer. Returns true if the session changed.
    ///
    /// Moves an expired chat into the feedback stage.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.stage != Stage::Chat {
            return false;
        }

        let mut changed = false;
        if !self.state.timer_expired && self.remaining(now).is_zero() {
            tracing::info!(session_id = %self.id, "Study timer expired");
            self.state.timer_expired = true;
            changed = true;
        }
        if self.state.timer_expired {
            self.stage = Stage::Feedback;
            changed = true;
        }
        changed
    }

    /// Process one participant utterance.
    ///
    /// The user message is logged at the pre-turn step; the reply is wrapped
    /// for the session's condition and logged at the post-turn step.
    pub fn submit_turn(&mut self, utterance: &str, now: DateTime<Utc>) -> Result<TurnOutcome> {
        self.expect_stage(Stage::Chat)?;
        self.tick(now);
        if !self.chat_enabled() {
            return Err(Error::ChatClosed(self.id.clone()));
        }

        self.messages.push(Message {
            ts: now,
            role: MessageRole::User,
            step: self.state.current_step,
            condition: None,
            content: utterance.to_string(),
        });

        let raw = policy::respond(utterance, &mut self.state);
        let reply = self.send_assistant(&raw, now);

        if self.state.ended_by_user {
            self.stage = Stage::Feedback;
            tracing::info!(session_id = %self.id, "Study ended from chat");
        }

        Ok(TurnOutcome {
            reply,
            step: self.state.current_step,
            stage: self.stage,
        })
    }

    /// The explicit "End Study" action.
    pub fn end_study(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.expect_stage(Stage::Chat)?;
        self.state.timer_expired = true;
        self.state.ended_by_user = true;
        self.stage = Stage::Feedback;
        tracing::info!(
            session_id = %self.id,
            remaining_secs = self.remaining(now).num_seconds(),
            "Study ended by participant"
        );
        Ok(())
    }

    fn send_assistant(&mut self, text: &str, now: DateTime<Utc>) -> String {
        let wrapped = study::wrap(text, self.condition.anthro_level, self.condition.pov);
        self.messages.push(Message {
            ts: now,
            role: MessageRole::Assistant,
            step: self.state.current_step,
            condition: Some(self.condition),
            content: wrapped.clone(),
        });
        wrapped
    }

    // ============================================
    // Feedback
    // ============================================

    /// Mark the feedback page as seen. Returns true the first time.
    pub fn open_feedback(&mut self) -> Result<bool> {
        self.expect_stage(Stage::Feedback)?;
        if self.state.feedback_page_seen {
            return Ok(false);
        }
        self.state.feedback_page_seen = true;
        Ok(true)
    }

    /// Capture the current, unsubmitted questionnaire answers.
    pub fn observe_draft(&mut self, responses: FeedbackResponses, now: DateTime<Utc>) -> Result<()> {
        self.expect_stage(Stage::Feedback)?;
        self.state.feedback_draft = Some(FeedbackDraft {
            responses: responses.normalized(),
            draft_saved_at: now,
        });
        Ok(())
    }

    /// Freeze the submitted answers and complete the session.
    pub fn submit_feedback(&mut self, responses: FeedbackResponses) -> Result<()> {
        if self.state.feedback.is_some() {
            return Err(Error::FeedbackAlreadySubmitted(self.id.clone()));
        }
        self.expect_stage(Stage::Feedback)?;
        self.state.feedback = Some(responses.normalized());
        self.stage = Stage::Complete;
        tracing::info!(session_id = %self.id, "Feedback submitted");
        Ok(())
    }

    // ============================================
    // Records
    // ============================================

    /// Record status implied by the current stage.
    pub fn status(&self) -> RecordStatus {
        if self.stage == Stage::Complete {
            RecordStatus::Final
        } else {
            RecordStatus::Partial
        }
    }

    /// Full snapshot for the session store.
    pub fn to_record(&self, now: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            session_id: self.id.clone(),
            participant_name: self.participant_name.clone(),
            participant_id: self.participant_id.clone(),
            condition: self.condition,
            seed: self.seed,
            stage: self.stage,
            started_at: self.started_at,
            duration_secs: self.duration.num_seconds(),
            study_state: self.state.clone(),
            messages: self.messages.clone(),
            status: self.status(),
            saved_at: now,
        }
    }

    /// Summary row, available once feedback has been submitted.
    pub fn summary_row(&self, now: DateTime<Utc>) -> Option<SummaryRow> {
        let feedback = self.state.feedback.as_ref()?;
        Some(SummaryRow {
            saved_at: now,
            session_id: self.id.clone(),
            participant_id: self.participant_id.clone(),
            anthro_level: self.condition.anthro_level,
            pov: self.condition.pov,
            error_type: self.state.error_type,
            poem_attempts: self.state.poem_attempts,
            timer_expired: self.state.timer_expired,
            ended_by_user: self.state.ended_by_user,
            difficulty: feedback.difficulty,
            ai_helpful: feedback.ai_helpful,
            noticed_error: feedback.noticed_error,
        })
    }

    fn expect_stage(&self, expected: Stage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(Error::InvalidStage {
                expected,
                actual: self.stage,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    fn first_person_session() -> Session {
        Session::with_condition(
            7,
            Condition {
                anthro_level: AnthroLevel::A1,
                pov: PointOfView::First,
            },
            StudySettings::default(),
        )
    }

    fn chatting() -> Session {
        let mut session = first_person_session();
        session.register("Ada", Some("P-01"), true, t0()).unwrap();
        session
    }

    #[test]
    fn test_new_session_draws_condition_from_seed() {
        let session = Session::new(StudySettings::default(), t0());
        assert_eq!(session.seed(), study::seed_from_time(t0()));
        assert_eq!(session.condition(), study::assign_condition(session.seed()));
        assert_eq!(session.stage(), Stage::Welcome);
    }

    #[test]
    fn test_register_requires_consent() {
        let mut session = first_person_session();
        let err = session.register("Ada", None, false, t0()).unwrap_err();
        assert!(matches!(err, Error::ConsentRequired));
        assert_eq!(session.stage(), Stage::Welcome);
    }

    #[test]
    fn test_register_defaults_participant_id_and_greets() {
        let mut session = first_person_session();
        session.register("", Some("  "), true, t0()).unwrap();
        let expected: String = session.id().chars().take(6).collect();
        assert_eq!(session.participant_id(), format!("P{}", expected));
        assert_eq!(session.stage(), Stage::Chat);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(
            session.last_reply(),
            Some(format!("I analyzed your input. {}", policy::GREETING).as_str())
        );
    }

    #[test]
    fn test_turn_logs_user_then_wrapped_reply() {
        let mut session = chatting();
        let outcome = session.submit_turn("ready", t0()).unwrap();
        assert_eq!(outcome.step, 1);
        assert!(outcome.reply.starts_with("I analyzed your input. Great!"));

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].step, 0);
        assert!(messages[1].condition.is_none());
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages[2].step, 1);
        assert_eq!(messages[2].condition, Some(session.condition()));
    }

    #[test]
    fn test_end_study_phrase_moves_to_feedback() {
        let mut session = chatting();
        let outcome = session
            .submit_turn("please end the study now", t0())
            .unwrap();
        assert_eq!(outcome.stage, Stage::Feedback);
        assert!(session.state().timer_expired);
        assert!(session.state().ended_by_user);
        assert!(matches!(
            session.submit_turn("ready", t0()),
            Err(Error::InvalidStage { .. })
        ));
    }

    #[test]
    fn test_timer_expiry_closes_chat() {
        let mut session = chatting();
        let later = t0() + Duration::seconds(200);
        assert_eq!(session.remaining(later), Duration::seconds(100));
        assert!(!session.tick(later));

        let expired = t0() + Duration::seconds(301);
        assert!(session.remaining(expired).is_zero());
        let err = session.submit_turn("ready", expired).unwrap_err();
        assert!(matches!(err, Error::ChatClosed(_)));
        assert!(session.state().timer_expired);
        assert!(!session.state().ended_by_user);
        assert_eq!(session.stage(), Stage::Feedback);
    }

    #[test]
    fn test_feedback_is_write_once() {
        let mut session = chatting();
        session.end_study(t0()).unwrap();
        assert!(session.open_feedback().unwrap());
        assert!(!session.open_feedback().unwrap());

        let first = FeedbackResponses {
            difficulty: 2,
            ai_helpful: 4,
            noticed_error: NoticedError::Yes,
            error_detail: "only six lines".to_string(),
            comments: String::new(),
        };
        session.observe_draft(first.clone(), t0()).unwrap();
        session.submit_feedback(first.clone()).unwrap();
        assert_eq!(session.status(), RecordStatus::Final);

        let err = session.submit_feedback(FeedbackResponses::default()).unwrap_err();
        assert!(matches!(err, Error::FeedbackAlreadySubmitted(_)));
        assert!(session
            .observe_draft(FeedbackResponses::default(), t0())
            .is_err());
        assert_eq!(session.state().feedback, Some(first));
    }

    #[test]
    fn test_summary_row_reflects_state() {
        let mut session = chatting();
        for utterance in ["ready", "ocean", "hope", "calm", "yes", "again"] {
            session.submit_turn(utterance, t0()).unwrap();
        }
        session.end_study(t0()).unwrap();
        assert!(session.summary_row(t0()).is_none());
        session
            .submit_feedback(FeedbackResponses::default())
            .unwrap();

        let row = session.summary_row(t0()).unwrap();
        assert_eq!(row.participant_id, "P-01");
        assert_eq!(row.anthro_level, AnthroLevel::A1);
        assert_eq!(row.poem_attempts, 1);
        assert!(row.ended_by_user);
        assert_eq!(row.difficulty, RATING_DEFAULT);
        assert_eq!(row.noticed_error, NoticedError::NotSure);
    }

    #[test]
    fn test_duration_bounds() {
        assert_eq!(duration_from_secs(300).unwrap(), Duration::seconds(300));
        assert_eq!(
            duration_from_secs(MAX_DURATION_SECS).unwrap().num_seconds(),
            MAX_DURATION_SECS
        );
        for secs in [0, -5, MAX_DURATION_SECS + 1, i64::MAX] {
            assert!(matches!(duration_from_secs(secs), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_record_with_out_of_range_duration_is_rejected() {
        let mut record = chatting().to_record(t0());
        record.duration_secs = i64::MAX;
        assert!(matches!(
            Session::from_record(record),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_resume_from_partial_record() {
        let mut session = chatting();
        session.submit_turn("ready", t0()).unwrap();
        let record = session.to_record(t0());
        assert_eq!(record.status, RecordStatus::Partial);

        let mut resumed = Session::from_record(record).unwrap();
        assert_eq!(resumed.id(), session.id());
        let outcome = resumed.submit_turn("ocean", t0()).unwrap();
        assert_eq!(outcome.step, 2);

        resumed.end_study(t0()).unwrap();
        resumed.submit_feedback(FeedbackResponses::default()).unwrap();
        let err = Session::from_record(resumed.to_record(t0())).unwrap_err();
        assert!(matches!(err, Error::SessionFinalized(_)));
    }
}
