//! Line-based terminal driver for one participant session
//!
//! Walks a [`StudyRunner`] through welcome, chat and feedback. The timer is
//! checked before every prompt; the terminal cannot interrupt a pending read,
//! so a message typed after the deadline is rejected when it arrives.
//! End of input pauses the session, which can be continued with `resume`.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use poemlab_core::format::{format_remaining, is_timer_warning};
use poemlab_core::{
    Error, FeedbackResponses, NoticedError, SessionRecorder, Stage, StudyRunner, RATING_MAX,
    RATING_MIN,
};

/// Typed in the chat to press "End Study".
pub const END_COMMAND: &str = "/end";

const WELCOME: &str = "Poetry Writing Study
--------------------
Welcome!
In this activity, you will work with an AI assistant to create a poem.

What to expect:
- The task will take approximately 5 minutes
- You'll work through 5 steps to create a poem
- The AI will guide you through the process
";

const TASK: &str = "Task: Create a poem that is: Original, 10 lines, 5 rhyming pairs, Creative, English only.
Type /end at any time to end the study.";

const TIME_UP: &str = "Time is up. Please proceed to the brief feedback below.";

const FEEDBACK_INTRO: &str = "
Study Complete!
Please submit the feedback below to complete the study. Your responses are
being saved, but won't be marked final until you submit.

Your Experience";

const THANKS: &str = "
Thank you!
Your responses have been saved. You may close this window.";

/// Participant details supplied on the command line.
#[derive(Debug, Default)]
pub struct Registration {
    pub name: Option<String>,
    pub participant_id: Option<String>,
    pub consent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Input ended before the session was complete
    Suspended,
}

/// Reads participant answers and writes study text.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()
    }

    /// Print `prompt` and read one line. `None` at end of input.
    pub fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }
}

/// Drive the session until it is complete or input runs out.
pub fn run<S, R, W>(
    runner: &mut StudyRunner<S>,
    prompter: &mut Prompter<R, W>,
    registration: Registration,
) -> Result<()>
where
    S: SessionRecorder,
    R: BufRead,
    W: Write,
{
    loop {
        let flow = match runner.session().stage() {
            Stage::Welcome => welcome(runner, prompter, &registration)?,
            Stage::Chat => chat(runner, prompter)?,
            Stage::Feedback => feedback(runner, prompter)?,
            Stage::Complete => {
                prompter.say(THANKS)?;
                return Ok(());
            }
        };

        if flow == Flow::Suspended {
            let session = runner.session();
            if session.stage() == Stage::Welcome {
                prompter.say("\nNo session was started.")?;
            } else {
                tracing::info!(session_id = %session.id(), stage = %session.stage(), "Session paused");
                prompter.say(&format!(
                    "\nSession paused. Continue later with: poemlab resume {}",
                    session.id()
                ))?;
            }
            return Ok(());
        }
    }
}

// ============================================
// Welcome
// ============================================

fn welcome<S, R, W>(
    runner: &mut StudyRunner<S>,
    prompter: &mut Prompter<R, W>,
    registration: &Registration,
) -> Result<Flow>
where
    S: SessionRecorder,
    R: BufRead,
    W: Write,
{
    prompter.say(WELCOME)?;

    let name = match &registration.name {
        Some(name) => name.clone(),
        None => match prompter.ask("Your Name: ")? {
            Some(name) => name,
            None => return Ok(Flow::Suspended),
        },
    };
    let participant_id = match &registration.participant_id {
        Some(id) => id.clone(),
        None => match prompter.ask("Participant ID (optional): ")? {
            Some(id) => id,
            None => return Ok(Flow::Suspended),
        },
    };

    let mut consent = registration.consent;
    while !consent {
        let Some(answer) = prompter.ask("I consent to participate in this research study [y/N]: ")?
        else {
            return Ok(Flow::Suspended);
        };
        consent = is_yes(&answer);
        if !consent {
            prompter.say("Please provide consent to continue.")?;
        }
    }

    tolerate_unsaved(runner.register(&name, Some(&participant_id), consent, Utc::now()))
        .context("failed to start the study")?;
    prompter.say(&format!("\n{}", TASK))?;
    Ok(Flow::Continue)
}

// ============================================
// Chat
// ============================================

fn chat<S, R, W>(runner: &mut StudyRunner<S>, prompter: &mut Prompter<R, W>) -> Result<Flow>
where
    S: SessionRecorder,
    R: BufRead,
    W: Write,
{
    if let Some(reply) = runner.session().last_reply() {
        prompter.say(&format!("\nassistant> {}\n", reply))?;
    }

    loop {
        let now = Utc::now();
        tolerate_unsaved(runner.tick(now))?;
        if !runner.session().chat_enabled() {
            prompter.say(TIME_UP)?;
            return Ok(Flow::Continue);
        }

        let remaining = runner.session().remaining(now);
        let prompt = if is_timer_warning(remaining) {
            format!("[{} left!] you> ", format_remaining(remaining))
        } else {
            format!("[{}] you> ", format_remaining(remaining))
        };
        let Some(line) = prompter.ask(&prompt)? else {
            return Ok(Flow::Suspended);
        };

        let now = Utc::now();
        if line.trim().eq_ignore_ascii_case(END_COMMAND) {
            tolerate_unsaved(runner.end_study(now)).context("failed to end the study")?;
            return Ok(Flow::Continue);
        }

        let sent_before = runner.session().messages().len();
        match runner.submit_turn(&line, now) {
            Ok(outcome) => prompter.say(&format!("\nassistant> {}\n", outcome.reply))?,
            Err(Error::ChatClosed(_)) => {
                prompter.say(TIME_UP)?;
                return Ok(Flow::Continue);
            }
            Err(e @ Error::Persistence { .. }) => {
                warn_unsaved(&e);
                if runner.session().messages().len() > sent_before {
                    if let Some(reply) = runner.session().last_reply() {
                        prompter.say(&format!("\nassistant> {}\n", reply))?;
                    }
                }
            }
            Err(e) => return Err(e).context("failed to process message"),
        }

        if runner.session().stage() != Stage::Chat {
            return Ok(Flow::Continue);
        }
    }
}

// ============================================
// Feedback
// ============================================

fn feedback<S, R, W>(runner: &mut StudyRunner<S>, prompter: &mut Prompter<R, W>) -> Result<Flow>
where
    S: SessionRecorder,
    R: BufRead,
    W: Write,
{
    tolerate_unsaved(runner.open_feedback(Utc::now()))?;
    prompter.say(FEEDBACK_INTRO)?;

    let mut answers = runner
        .session()
        .state()
        .feedback_draft
        .as_ref()
        .map(|draft| draft.responses.clone())
        .unwrap_or_default();

    let Some(difficulty) = ask_rating(
        prompter,
        "How difficult was the task? (1=Very Easy, 5=Very Difficult)",
        answers.difficulty,
    )?
    else {
        return Ok(Flow::Suspended);
    };
    answers.difficulty = difficulty;
    save_draft(runner, &answers)?;

    let Some(ai_helpful) = ask_rating(
        prompter,
        "How helpful was the AI? (1=Not Helpful, 5=Very Helpful)",
        answers.ai_helpful,
    )?
    else {
        return Ok(Flow::Suspended);
    };
    answers.ai_helpful = ai_helpful;
    save_draft(runner, &answers)?;

    let Some(noticed) = ask_noticed(prompter, answers.noticed_error)? else {
        return Ok(Flow::Suspended);
    };
    answers.noticed_error = noticed;
    save_draft(runner, &answers)?;

    if answers.noticed_error == NoticedError::Yes {
        let Some(detail) = ask_text(prompter, "What did you notice? ", &answers.error_detail)?
        else {
            return Ok(Flow::Suspended);
        };
        answers.error_detail = detail;
        save_draft(runner, &answers)?;
    }

    let Some(comments) = ask_text(
        prompter,
        "Any other comments about your experience? ",
        &answers.comments,
    )?
    else {
        return Ok(Flow::Suspended);
    };
    answers.comments = comments;
    save_draft(runner, &answers)?;

    let Some(confirm) = prompter.ask("Submit Feedback? [Y/n]: ")? else {
        return Ok(Flow::Suspended);
    };
    if is_no(&confirm) {
        prompter.say("Your answers are kept as a draft.")?;
        return Ok(Flow::Suspended);
    }

    match runner.submit_feedback(answers, Utc::now()) {
        Ok(()) => Ok(Flow::Continue),
        Err(e @ Error::Persistence { .. }) => {
            warn_unsaved(&e);
            retry_finalize(runner, prompter)
        }
        Err(e) => Err(e).context("failed to submit feedback"),
    }
}

fn retry_finalize<S, R, W>(runner: &mut StudyRunner<S>, prompter: &mut Prompter<R, W>) -> Result<Flow>
where
    S: SessionRecorder,
    R: BufRead,
    W: Write,
{
    loop {
        let Some(answer) = prompter.ask("Saving failed. Retry? [Y/n]: ")? else {
            anyhow::bail!("final feedback for session {} was not saved", runner.session().id());
        };
        if is_no(&answer) {
            anyhow::bail!("final feedback for session {} was not saved", runner.session().id());
        }
        match runner.finalize(Utc::now()) {
            Ok(()) => return Ok(Flow::Continue),
            Err(e @ Error::Persistence { .. }) => warn_unsaved(&e),
            Err(e) => return Err(e).context("failed to finalize session"),
        }
    }
}

fn save_draft<S: SessionRecorder>(
    runner: &mut StudyRunner<S>,
    answers: &FeedbackResponses,
) -> Result<()> {
    tolerate_unsaved(runner.observe_draft(answers.clone(), Utc::now()))?;
    Ok(())
}

fn ask_rating<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    question: &str,
    current: u8,
) -> Result<Option<u8>> {
    loop {
        let Some(answer) = prompter.ask(&format!("{} [{}]: ", question, current))? else {
            return Ok(None);
        };
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(Some(current));
        }
        match answer.parse::<u8>() {
            Ok(value) if (RATING_MIN..=RATING_MAX).contains(&value) => return Ok(Some(value)),
            _ => prompter.say(&format!(
                "Please enter a number from {} to {}.",
                RATING_MIN, RATING_MAX
            ))?,
        }
    }
}

fn ask_noticed<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    current: NoticedError,
) -> Result<Option<NoticedError>> {
    loop {
        let Some(answer) = prompter.ask(&format!(
            "Did you notice anything unusual about the poem? (yes/no/not sure) [{}]: ",
            current.as_str()
        ))?
        else {
            return Ok(None);
        };
        if answer.trim().is_empty() {
            return Ok(Some(current));
        }
        match answer.parse() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => prompter.say("Please answer yes, no or not sure.")?,
        }
    }
}

fn ask_text<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    question: &str,
    current: &str,
) -> Result<Option<String>> {
    let Some(answer) = prompter.ask(question)? else {
        return Ok(None);
    };
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(Some(current.to_string()))
    } else {
        Ok(Some(answer.to_string()))
    }
}

// ============================================
// Helpers
// ============================================

/// Keep going when only the save failed; the next save carries the change.
fn tolerate_unsaved<T>(result: poemlab_core::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ Error::Persistence { .. }) => {
            warn_unsaved(&e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn warn_unsaved(error: &Error) {
    eprintln!("Warning: {}. Your progress is kept and will be saved with the next change.", error);
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn is_no(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
}

#[cfg(test)]
mod tests {
    use super::*;
    use poemlab_core::{
        AnthroLevel, Condition, Database, PointOfView, RecordStatus, Session, StudySettings,
    };
    use std::io::Cursor;

    fn database() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn session() -> Session {
        Session::with_condition(
            42,
            Condition {
                anthro_level: AnthroLevel::A1,
                pov: PointOfView::First,
            },
            StudySettings::default(),
        )
    }

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    fn output(prompter: &Prompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8_lossy(&prompter.output).into_owned()
    }

    #[test]
    fn test_scripted_run_completes_and_records_summary() {
        let db = database();
        let mut runner = StudyRunner::new(session(), &db);
        let mut prompter = prompter(
            "Ada\nP-42\ny\nready\nocean\nhope\ncalm\nyes\n/end\n4\n2\nyes\nonly six lines\n\ny\n",
        );

        run(&mut runner, &mut prompter, Registration::default()).unwrap();

        let out = output(&prompter);
        assert!(out.contains("Step 5: Your Complete Poem"));
        assert!(out.contains("Thank you!"));

        let summaries = db.list_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].participant_id, "P-42");
        assert_eq!(summaries[0].difficulty, 4);
        assert_eq!(summaries[0].ai_helpful, 2);
        assert_eq!(summaries[0].noticed_error, NoticedError::Yes);
        assert!(summaries[0].ended_by_user);

        let feedback = runner.session().state().feedback.clone().unwrap();
        assert_eq!(feedback.error_detail, "only six lines");
        assert_eq!(feedback.comments, "");
    }

    #[test]
    fn test_consent_is_asked_again() {
        let db = database();
        let mut runner = StudyRunner::new(session(), &db);
        let mut prompter = prompter("Ada\n\nno\nyes\n");

        run(&mut runner, &mut prompter, Registration::default()).unwrap();

        let out = output(&prompter);
        assert!(out.contains("Please provide consent to continue."));
        assert_eq!(runner.session().stage(), Stage::Chat);
        assert!(out.contains("Session paused."));
    }

    #[test]
    fn test_end_of_input_before_consent_starts_nothing() {
        let db = database();
        let mut runner = StudyRunner::new(session(), &db);
        let mut prompter = prompter("Ada\n");

        run(&mut runner, &mut prompter, Registration::default()).unwrap();

        assert!(output(&prompter).contains("No session was started."));
        assert!(db.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_rating_is_asked_again_and_draft_saved() {
        let db = database();
        let mut runner = StudyRunner::new(session(), &db);
        let registration = Registration {
            name: Some("Ada".to_string()),
            participant_id: Some("P-9".to_string()),
            consent: true,
        };
        let mut prompter = prompter("/end\n9\n5\n");

        run(&mut runner, &mut prompter, registration).unwrap();

        assert!(output(&prompter).contains("Please enter a number from 1 to 5."));
        let stored = db.load_session(runner.session().id()).unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Partial);
        assert_eq!(stored.stage, Stage::Feedback);
        assert!(stored.study_state.feedback_page_seen);
        let draft = stored.study_state.feedback_draft.unwrap();
        assert_eq!(draft.responses.difficulty, 5);
    }
}
