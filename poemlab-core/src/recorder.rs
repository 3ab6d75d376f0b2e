//! Persistence seam for study sessions
//!
//! The study engine only needs three capabilities from storage: overwrite the
//! session snapshot, read it back, and append the one-off summary row.
//! [`crate::Database`] is the SQLite implementation.

use crate::error::Result;
use crate::types::{SessionRecord, SummaryRow};

/// Storage capabilities required by [`crate::runner::StudyRunner`].
pub trait SessionRecorder {
    /// Overwrite the stored snapshot for `record.session_id`.
    ///
    /// A snapshot older than the stored one must not replace it.
    fn save_session(&self, record: &SessionRecord) -> Result<()>;

    /// Load the latest snapshot for a session.
    fn load_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Append the summary row for a finalized session.
    ///
    /// Fails with [`crate::Error::SummaryAlreadyRecorded`] on a second append
    /// for the same session.
    fn append_summary(&self, row: &SummaryRow) -> Result<()>;
}

impl<T: SessionRecorder + ?Sized> SessionRecorder for &T {
    fn save_session(&self, record: &SessionRecord) -> Result<()> {
        (**self).save_session(record)
    }

    fn load_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        (**self).load_session(session_id)
    }

    fn append_summary(&self, row: &SummaryRow) -> Result<()> {
        (**self).append_summary(row)
    }
}
