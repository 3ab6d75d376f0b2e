//! Persisting driver around a [`Session`]
//!
//! Every lifecycle operation is applied to the in-memory session first and
//! then saved as a full snapshot. A failed save is reported as
//! [`Error::Persistence`] but never rolls back the in-memory change: the next
//! successful save carries it, since each snapshot is complete.

use crate::error::{Error, Result};
use crate::recorder::SessionRecorder;
use crate::session::{Session, TurnOutcome};
use crate::types::{FeedbackResponses, Stage};
use chrono::{DateTime, Utc};

/// Drives one session and saves it after every change.
pub struct StudyRunner<R: SessionRecorder> {
    session: Session,
    recorder: R,
    summary_appended: bool,
}

impl<R: SessionRecorder> StudyRunner<R> {
    pub fn new(session: Session, recorder: R) -> Self {
        Self {
            session,
            recorder,
            summary_appended: false,
        }
    }

    /// Continue a stored, unfinished session.
    pub fn resume(recorder: R, session_id: &str) -> Result<Self> {
        let record = recorder
            .load_session(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        let session = Session::from_record(record)?;
        tracing::info!(session_id, stage = %session.stage(), "Resuming session");
        Ok(Self::new(session, recorder))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Save the current snapshot.
    pub fn persist(&self, now: DateTime<Utc>) -> Result<()> {
        self.recorder
            .save_session(&self.session.to_record(now))
            .map_err(|e| self.persistence_error(e))
    }

    /// Register the participant, start the chat and save.
    pub fn register(
        &mut self,
        name: &str,
        participant_id: Option<&str>,
        consent: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.session.register(name, participant_id, consent, now)?;
        self.persist(now)
    }

    /// Recompute the timer, saving if it expired. Returns true on change.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.session.tick(now);
        if changed {
            self.persist(now)?;
        }
        Ok(changed)
    }

    /// Process one utterance and save the transcript.
    pub fn submit_turn(&mut self, utterance: &str, now: DateTime<Utc>) -> Result<TurnOutcome> {
        match self.session.submit_turn(utterance, now) {
            Ok(outcome) => {
                self.persist(now)?;
                Ok(outcome)
            }
            Err(Error::ChatClosed(id)) => {
                // The timer may have just expired; keep the stage change.
                self.persist(now)?;
                Err(Error::ChatClosed(id))
            }
            Err(e) => Err(e),
        }
    }

    /// The explicit "End Study" action.
    pub fn end_study(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.session.end_study(now)?;
        self.persist(now)
    }

    /// Enter the feedback page, saving the first visit.
    pub fn open_feedback(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let first_visit = self.session.open_feedback()?;
        if first_visit {
            self.persist(now)?;
        }
        Ok(first_visit)
    }

    /// Capture and save the current questionnaire answers.
    pub fn observe_draft(&mut self, responses: FeedbackResponses, now: DateTime<Utc>) -> Result<()> {
        self.session.observe_draft(responses, now)?;
        self.persist(now)
    }

    /// Submit final feedback, append the summary and save the final snapshot.
    pub fn submit_feedback(
        &mut self,
        responses: FeedbackResponses,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.session.submit_feedback(responses)?;
        self.finalize(now)
    }

    /// Append the summary row once, then save the final snapshot.
    ///
    /// The stored record only turns final after its summary row exists, so a
    /// failed append leaves a resumable partial record. Safe to call again
    /// after a persistence failure.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.session.stage() != Stage::Complete {
            return Err(Error::InvalidStage {
                expected: Stage::Complete,
                actual: self.session.stage(),
            });
        }

        if !self.summary_appended {
            if let Some(row) = self.session.summary_row(now) {
                match self.recorder.append_summary(&row) {
                    Ok(()) => {}
                    Err(Error::SummaryAlreadyRecorded(id)) => {
                        tracing::warn!(session_id = %id, "Summary row already present");
                    }
                    Err(e) => return Err(self.persistence_error(e)),
                }
            }
            self.summary_appended = true;
        }

        self.persist(now)?;
        tracing::info!(session_id = %self.session.id(), "Session finalized");
        Ok(())
    }

    fn persistence_error(&self, source: Error) -> Error {
        tracing::error!(
            session_id = %self.session.id(),
            error = %source,
            "Failed to persist session"
        );
        Error::Persistence {
            session_id: self.session.id().to_string(),
            source: Box::new(source),
        }
    }
}
