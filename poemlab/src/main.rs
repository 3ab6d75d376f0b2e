//! poemlab - scripted poetry-writing study
//!
//! Runs participant sessions in the terminal and inspects what was recorded.

mod inspect;
mod interactive;

use std::io;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use poemlab_core::{Config, Database, Session, StudyRunner};

use crate::interactive::{Prompter, Registration};

#[derive(Parser)]
#[command(name = "poemlab")]
#[command(about = "Run and inspect the poetry-writing study")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new participant session
    Run {
        /// Participant name (asked interactively if omitted)
        #[arg(long)]
        name: Option<String>,

        /// Participant ID (defaults to P plus the start of the session id)
        #[arg(long)]
        participant_id: Option<String>,

        /// Record consent without asking
        #[arg(long)]
        consent: bool,
    },

    /// Continue an unfinished session (partial id match supported)
    Resume {
        /// Session ID or a unique prefix of it
        session: String,
    },

    /// List stored sessions
    Sessions {
        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one session with its transcript
    Show {
        /// Session ID or a unique prefix of it
        session: String,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List summary rows of finalized sessions
    Summaries {
        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file; stdout belongs to the participant)
    let _log_guard =
        poemlab_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = config.database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let result = dispatch(args.command, &config, &db);
    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
        eprintln!(
            "Details are logged to {}",
            poemlab_core::logging::log_file_path().display()
        );
    }
    result
}

fn dispatch(command: Command, config: &Config, db: &Database) -> Result<()> {
    match command {
        Command::Run {
            name,
            participant_id,
            consent,
        } => {
            let settings = config.study.settings().context("invalid study configuration")?;
            let session = Session::new(settings, Utc::now());
            let mut runner = StudyRunner::new(session, db);
            let registration = Registration {
                name,
                participant_id,
                consent,
            };
            let stdin = io::stdin();
            let mut prompter = Prompter::new(stdin.lock(), io::stdout());
            interactive::run(&mut runner, &mut prompter, registration)
        }
        Command::Resume { session } => {
            let session_id = inspect::resolve_session_id(db, &session)?;
            let mut runner = StudyRunner::resume(db, &session_id)
                .with_context(|| format!("failed to resume session {}", session_id))?;
            let stdin = io::stdin();
            let mut prompter = Prompter::new(stdin.lock(), io::stdout());
            interactive::run(&mut runner, &mut prompter, Registration::default())
        }
        Command::Sessions { format } => inspect::list_sessions(db, &format),
        Command::Show { session, format } => inspect::show_session(db, &session, &format),
        Command::Summaries { format } => inspect::list_summaries(db, &format),
    }
}
