//! Read-only views over recorded sessions and summary rows.

use anyhow::{Context, Result};
use poemlab_core::format::format_transcript_entry;
use poemlab_core::{Database, SessionRecord, SessionRecorder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("unknown format '{}', expected text or json", other),
        }
    }
}

/// Resolve a full session id from an exact id or a unique prefix.
pub fn resolve_session_id(db: &Database, query: &str) -> Result<String> {
    let matches = db.find_session_ids(query)?;
    if matches.iter().any(|id| id == query) {
        return Ok(query.to_string());
    }
    match matches.len() {
        0 => anyhow::bail!("No session found matching '{}'", query),
        1 => Ok(matches[0].clone()),
        n => anyhow::bail!("'{}' matches {} sessions, use a longer prefix", query, n),
    }
}

pub fn list_sessions(db: &Database, format: &str) -> Result<()> {
    let format = OutputFormat::parse(format)?;
    let sessions = db.list_sessions()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions found in database.");
        println!("Run 'poemlab run' to start one.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<14}  {:<8}  {:<8}  Saved",
        "Session", "Participant", "Status", "Stage"
    );
    for session in &sessions {
        println!(
            "{:<36}  {:<14}  {:<8}  {:<8}  {}",
            session.session_id,
            session.participant_id,
            session.status.as_str(),
            session.stage.as_str(),
            session.saved_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub fn show_session(db: &Database, query: &str, format: &str) -> Result<()> {
    let format = OutputFormat::parse(format)?;
    let session_id = resolve_session_id(db, query)?;
    let record = db
        .load_session(&session_id)?
        .with_context(|| format!("session {} disappeared", session_id))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => print_record(&record),
    }
    Ok(())
}

fn print_record(record: &SessionRecord) {
    let state = &record.study_state;
    println!("Session:      {}", record.session_id);
    println!("Participant:  {} ({})", record.participant_id, record.participant_name);
    println!(
        "Condition:    {} / {} (seed {})",
        record.condition.anthro_level, record.condition.pov, record.seed
    );
    println!("Error type:   {}", state.error_type);
    println!("Status:       {} ({})", record.status.as_str(), record.stage);
    println!("Step:         {}", state.current_step);
    println!("Attempts:     {}", state.poem_attempts);
    println!(
        "Ended:        timer_expired={} ended_by_user={}",
        state.timer_expired, state.ended_by_user
    );
    if let Some(feedback) = &state.feedback {
        println!(
            "Feedback:     difficulty={} ai_helpful={} noticed_error={}",
            feedback.difficulty,
            feedback.ai_helpful,
            feedback.noticed_error.as_str()
        );
    } else if let Some(draft) = &state.feedback_draft {
        println!(
            "Draft:        difficulty={} ai_helpful={} noticed_error={} (saved {})",
            draft.responses.difficulty,
            draft.responses.ai_helpful,
            draft.responses.noticed_error.as_str(),
            draft.draft_saved_at.format("%H:%M:%S")
        );
    }

    println!("\nTranscript ({} messages):", record.messages.len());
    for message in &record.messages {
        println!("{}", format_transcript_entry(message));
    }
}

pub fn list_summaries(db: &Database, format: &str) -> Result<()> {
    let format = OutputFormat::parse(format)?;
    let rows = db.list_summaries()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No finalized sessions yet.");
        return Ok(());
    }

    println!("saved_at,session_id,participant_id,anthro_level,pov,error_type,poem_attempts,timer_expired,ended_by_user,difficulty,ai_helpful,noticed_error");
    for row in &rows {
        println!(
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            row.saved_at.to_rfc3339(),
            row.session_id,
            row.participant_id,
            row.anthro_level,
            row.pov,
            row.error_type,
            row.poem_attempts,
            row.timer_expired,
            row.ended_by_user,
            row.difficulty,
            row.ai_helpful,
            row.noticed_error.as_str()
        );
    }
    Ok(())
}
