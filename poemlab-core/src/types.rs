//! Core domain types for poemlab
//!
//! These types describe one participant run of the poetry-writing study and the
//! records persisted for it.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One participant run, from the welcome form to submitted feedback |
//! | **Condition** | The randomly drawn anthropomorphism level and point of view |
//! | **Step** | Position (0-5) in the scripted poem-writing conversation |
//! | **Error type** | The defect deliberately injected into every generated poem |
//! | **Draft** | Feedback captured live before the participant submits it |
//! | **Record** | Full snapshot of a session, overwritten on every save |
//! | **Summary** | One compact row appended when a session is finalized |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Condition
// ============================================

/// Degree of anthropomorphic phrasing in assistant output.
///
/// `A0` suppresses first-person phrasing, `A4` claims memory and feelings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnthroLevel {
    A0,
    A1,
    A2,
    A3,
    A4,
}

impl AnthroLevel {
    /// All levels, in the order they are drawn from.
    pub const ALL: [AnthroLevel; 5] = [
        AnthroLevel::A0,
        AnthroLevel::A1,
        AnthroLevel::A2,
        AnthroLevel::A3,
        AnthroLevel::A4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnthroLevel::A0 => "A0",
            AnthroLevel::A1 => "A1",
            AnthroLevel::A2 => "A2",
            AnthroLevel::A3 => "A3",
            AnthroLevel::A4 => "A4",
        }
    }
}

impl std::fmt::Display for AnthroLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AnthroLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A0" => Ok(AnthroLevel::A0),
            "A1" => Ok(AnthroLevel::A1),
            "A2" => Ok(AnthroLevel::A2),
            "A3" => Ok(AnthroLevel::A3),
            "A4" => Ok(AnthroLevel::A4),
            _ => Err(format!("unknown anthropomorphism level: {}", s)),
        }
    }
}

/// Point-of-view framing of assistant self-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOfView {
    /// Leave "I" as written
    First,
    /// Refer to the assistant as "the system"
    Third,
    /// Drop self-reference entirely
    None,
}

impl PointOfView {
    /// All framings, in the order they are drawn from.
    pub const ALL: [PointOfView; 3] = [PointOfView::First, PointOfView::Third, PointOfView::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            PointOfView::First => "first",
            PointOfView::Third => "third",
            PointOfView::None => "none",
        }
    }
}

impl std::fmt::Display for PointOfView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PointOfView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(PointOfView::First),
            "third" => Ok(PointOfView::Third),
            "none" => Ok(PointOfView::None),
            _ => Err(format!("unknown point of view: {}", s)),
        }
    }
}

/// Between-subjects condition, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub anthro_level: AnthroLevel,
    pub pov: PointOfView,
}

// ============================================
// Poem defects
// ============================================

/// Defect injected into every poem the assistant produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Six lines instead of ten
    #[default]
    SixLines,
    /// Two couplets that break the rhyme scheme
    NonRhyme,
    /// A non-English word inside an English poem
    ForeignToken,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::SixLines => "six_lines",
            ErrorType::NonRhyme => "non_rhyme",
            ErrorType::ForeignToken => "foreign_token",
        }
    }

    /// Parse a configured value, falling back to [`ErrorType::SixLines`]
    /// for anything unrecognized.
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(value, "Unknown error_type, falling back to six_lines");
            ErrorType::SixLines
        })
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "six_lines" => Ok(ErrorType::SixLines),
            "non_rhyme" => Ok(ErrorType::NonRhyme),
            "foreign_token" => Ok(ErrorType::ForeignToken),
            _ => Err(format!("unknown error type: {}", s)),
        }
    }
}

// ============================================
// Messages
// ============================================

/// Who sent a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Assistant,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Assistant => "assistant",
            MessageRole::User => "user",
        }
    }
}

/// A single transcript entry.
///
/// Transcripts are append-only; insertion order is the conversation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// When the message was sent
    pub ts: DateTime<Utc>,
    /// Sender
    pub role: MessageRole,
    /// Conversation step at the time of sending
    pub step: u8,
    /// Condition in effect (assistant messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Text as shown to the participant (tone-wrapped for the assistant)
    pub content: String,
}

// ============================================
// Lifecycle
// ============================================

/// Lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Collecting name, participant id and consent
    Welcome,
    /// Scripted conversation is running
    Chat,
    /// Collecting post-task feedback
    Feedback,
    /// Feedback submitted; no further mutation
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Chat => "chat",
            Stage::Feedback => "feedback",
            Stage::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(Stage::Welcome),
            "chat" => Ok(Stage::Chat),
            "feedback" => Ok(Stage::Feedback),
            "complete" => Ok(Stage::Complete),
            _ => Err(format!("unknown stage: {}", s)),
        }
    }
}

/// Whether a saved record is still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Partial,
    Final,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Partial => "partial",
            RecordStatus::Final => "final",
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partial" => Ok(RecordStatus::Partial),
            "final" => Ok(RecordStatus::Final),
            _ => Err(format!("unknown record status: {}", s)),
        }
    }
}

// ============================================
// Feedback
// ============================================

/// Answer to "Did you notice anything unusual about the poem?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoticedError {
    Yes,
    No,
    #[default]
    #[serde(rename = "Not sure")]
    NotSure,
}

impl NoticedError {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticedError::Yes => "Yes",
            NoticedError::No => "No",
            NoticedError::NotSure => "Not sure",
        }
    }
}

impl std::str::FromStr for NoticedError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" => Ok(NoticedError::Yes),
            "no" | "n" => Ok(NoticedError::No),
            "not sure" | "not_sure" | "unsure" => Ok(NoticedError::NotSure),
            _ => Err(format!("unknown answer: {}", s)),
        }
    }
}

/// Lowest value on the 1-5 rating scales
pub const RATING_MIN: u8 = 1;
/// Highest value on the 1-5 rating scales
pub const RATING_MAX: u8 = 5;
/// Starting position of both sliders
pub const RATING_DEFAULT: u8 = 3;

/// Post-task questionnaire answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResponses {
    /// 1 = very easy, 5 = very difficult
    pub difficulty: u8,
    /// 1 = not helpful, 5 = very helpful
    pub ai_helpful: u8,
    pub noticed_error: NoticedError,
    /// What the participant noticed (only asked when they answered "Yes")
    #[serde(default)]
    pub error_detail: String,
    #[serde(default)]
    pub comments: String,
}

impl Default for FeedbackResponses {
    fn default() -> Self {
        Self {
            difficulty: RATING_DEFAULT,
            ai_helpful: RATING_DEFAULT,
            noticed_error: NoticedError::NotSure,
            error_detail: String::new(),
            comments: String::new(),
        }
    }
}

impl FeedbackResponses {
    /// Clamp both ratings into the 1-5 scale.
    pub fn normalized(mut self) -> Self {
        self.difficulty = self.difficulty.clamp(RATING_MIN, RATING_MAX);
        self.ai_helpful = self.ai_helpful.clamp(RATING_MIN, RATING_MAX);
        self
    }
}

/// Live capture of the questionnaire, overwritten on every observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackDraft {
    #[serde(flatten)]
    pub responses: FeedbackResponses,
    pub draft_saved_at: DateTime<Utc>,
}

// ============================================
// Study state
// ============================================

/// Mutable per-session state that drives the conversation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyState {
    /// Conversation step (0-5), only ever moves forward
    pub current_step: u8,
    pub topic: Option<String>,
    pub content_arc: Option<String>,
    pub tone: Option<String>,
    /// Set once the first defective poem has been shown
    pub error_mode: bool,
    /// Configured defect, not randomized
    pub error_type: ErrorType,
    /// Number of revisions requested at step 5
    pub poem_attempts: u32,
    pub timer_expired: bool,
    pub ended_by_user: bool,
    /// Submitted feedback (write-once)
    pub feedback: Option<FeedbackResponses>,
    /// Latest unsubmitted feedback
    pub feedback_draft: Option<FeedbackDraft>,
    pub feedback_page_seen: bool,
}

impl StudyState {
    pub fn new(error_type: ErrorType) -> Self {
        Self {
            current_step: 0,
            topic: None,
            content_arc: None,
            tone: None,
            error_mode: false,
            error_type,
            poem_attempts: 0,
            timer_expired: false,
            ended_by_user: false,
            feedback: None,
            feedback_draft: None,
            feedback_page_seen: false,
        }
    }
}

// ============================================
// Persisted records
// ============================================

/// Full snapshot of a session, overwritten in place on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub participant_name: String,
    pub participant_id: String,
    pub condition: Condition,
    /// Seed the condition was drawn from
    pub seed: u64,
    pub stage: Stage,
    pub started_at: Option<DateTime<Utc>>,
    /// Study time limit in seconds
    pub duration_secs: i64,
    pub study_state: StudyState,
    pub messages: Vec<Message>,
    pub status: RecordStatus,
    pub saved_at: DateTime<Utc>,
}

/// Compact row appended once per finalized session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub saved_at: DateTime<Utc>,
    pub session_id: String,
    pub participant_id: String,
    pub anthro_level: AnthroLevel,
    pub pov: PointOfView,
    pub error_type: ErrorType,
    pub poem_attempts: u32,
    pub timer_expired: bool,
    pub ended_by_user: bool,
    pub difficulty: u8,
    pub ai_helpful: u8,
    pub noticed_error: NoticedError,
}

/// Stored session for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionListing {
    pub session_id: String,
    pub participant_id: String,
    pub status: RecordStatus,
    pub stage: Stage,
    pub saved_at: DateTime<Utc>,
}
