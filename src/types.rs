//! Core types and events for media-dl

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::JobError;

/// Unique identifier for a job
///
/// Eight lowercase hex characters derived from a v4 UUID. The id doubles as
/// the external correlation key (embedded in selection tokens) and as the
/// name of the job's working directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Number of characters in a generated id
    pub const LEN: usize = 8;

    /// Generate a fresh id
    pub fn generate() -> Self {
        let mut hex = uuid::Uuid::new_v4().simple().to_string();
        hex.truncate(Self::LEN);
        Self(hex)
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of a requester
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Conversation that status messages and artifacts are delivered to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Channel checked by the membership gate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChannelId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Transport-assigned identifier of a sent message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageRef {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Transport-assigned identifier of a button interaction, used to answer it
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InteractionId(pub String);

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InteractionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Requested output shape for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Best available quality, merged into an MKV container
    Best,
    /// Resolution capped at 720p, merged into an MP4 container
    Hd720,
    /// Audio-only stream, M4A preferred
    Audio,
}

impl Variant {
    /// All variants in presentation order
    pub const ALL: [Variant; 3] = [Variant::Best, Variant::Hd720, Variant::Audio];

    /// Stable wire name used inside selection tokens
    pub fn as_token(&self) -> &'static str {
        match self {
            Variant::Best => "best",
            Variant::Hd720 => "720",
            Variant::Audio => "audio",
        }
    }

    /// Parse a wire name back into a variant
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "best" => Some(Variant::Best),
            "720" => Some(Variant::Hd720),
            "audio" => Some(Variant::Audio),
            _ => None,
        }
    }

    /// Button label shown to the requester
    pub fn label(&self) -> &'static str {
        match self {
            Variant::Best => "Best Quality (MKV)",
            Variant::Hd720 => "720p (MP4)",
            Variant::Audio => "Audio Only (M4A)",
        }
    }

    /// Stream selector handed to the fetch engine
    pub fn format_selector(&self) -> &'static str {
        match self {
            Variant::Best => "bestvideo+bestaudio/best",
            Variant::Hd720 => "bestvideo[height<=720]+bestaudio/best[height<=720]",
            Variant::Audio => "bestaudio[ext=m4a]/bestaudio/best",
        }
    }

    /// Container the fetch engine should merge into, when merging applies
    pub fn merge_container(&self) -> Option<&'static str> {
        match self {
            Variant::Best => Some("mkv"),
            Variant::Hd720 => Some("mp4"),
            Variant::Audio => None,
        }
    }

    /// Whether this variant carries no video stream
    pub fn is_audio(&self) -> bool {
        matches!(self, Variant::Audio)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// Lifecycle state of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, waiting for the requester to pick a variant
    AwaitingSelection,
    /// Fetch collaborator is producing the artifact
    Fetching,
    /// Tagging and thumbnail normalization in progress
    PostProcessing,
    /// Artifact is being delivered to the requester
    Transmitting,
    /// Delivered successfully (terminal)
    Completed,
    /// A stage failed (terminal)
    Failed,
    /// Discarded by the requester before starting (terminal)
    Cancelled,
}

impl JobState {
    /// Stable snake_case name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::AwaitingSelection => "awaiting_selection",
            JobState::Fetching => "fetching",
            JobState::PostProcessing => "post_processing",
            JobState::Transmitting => "transmitting",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Whether the job has left the pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked request to turn a source reference into a delivered artifact
#[derive(Clone, Debug)]
pub struct Job {
    /// Unique id, generated at intake
    pub id: JobId,
    /// Requester-supplied source URL
    pub source: String,
    /// Identity that submitted the job; the only identity allowed to act on it
    pub requester: UserId,
    /// Conversation the job was submitted from
    pub chat: ChatId,
    /// Output shape; unset until selection, immutable afterward
    pub variant: Option<Variant>,
    /// Current lifecycle state
    pub state: JobState,
    /// Creation instant, used for abandonment expiry
    pub created_at: Instant,
    /// The variant-selection message, kept so cancellation and expiry can tidy it
    pub prompt: Option<MessageRef>,
}

impl Job {
    /// Create a fresh job in `awaiting_selection`
    pub fn new(source: impl Into<String>, requester: UserId, chat: ChatId) -> Self {
        Self {
            id: JobId::generate(),
            source: source.into(),
            requester,
            chat,
            variant: None,
            state: JobState::AwaitingSelection,
            created_at: Instant::now(),
            prompt: None,
        }
    }
}

/// One raw progress sample from a fetch or transmit operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferUpdate {
    /// Bytes moved so far
    pub transferred: u64,
    /// Expected total bytes; zero when the total is unknown
    pub total: u64,
}

/// Opaque correlation token carried by selection-keyboard buttons
///
/// Wire format: `q|<variant>|<job id>` for variant selection and
/// `q|cancel|<job id>` for cancellation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionToken {
    /// Start the job with the chosen variant
    Start {
        /// Chosen output shape
        variant: Variant,
        /// The job the button belongs to
        job: JobId,
    },
    /// Discard the job before it starts
    Cancel {
        /// The job the button belongs to
        job: JobId,
    },
}

impl SelectionToken {
    const PREFIX: &'static str = "q";
    const CANCEL: &'static str = "cancel";
    const MAX_ID_LEN: usize = 64;

    /// The job id this token refers to
    pub fn job(&self) -> &JobId {
        match self {
            SelectionToken::Start { job, .. } => job,
            SelectionToken::Cancel { job } => job,
        }
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionToken::Start { variant, job } => {
                write!(f, "{}|{}|{}", Self::PREFIX, variant.as_token(), job)
            }
            SelectionToken::Cancel { job } => {
                write!(f, "{}|{}|{}", Self::PREFIX, Self::CANCEL, job)
            }
        }
    }
}

impl FromStr for SelectionToken {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || JobError::InvalidToken(s.to_string());

        let mut parts = s.split('|');
        let (prefix, action, id) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(a), Some(i), None) => (p, a, i),
            _ => return Err(invalid()),
        };

        if prefix != Self::PREFIX
            || id.is_empty()
            || id.len() > Self::MAX_ID_LEN
            || !id.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(invalid());
        }

        let job = JobId::from(id);
        if action == Self::CANCEL {
            return Ok(SelectionToken::Cancel { job });
        }
        match Variant::from_token(action) {
            Some(variant) => Ok(SelectionToken::Start { variant, job }),
            None => Err(invalid()),
        }
    }
}

/// Outcome of an administrative broadcast
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    /// Recipients the broadcast was attempted for
    pub attempted: usize,
    /// Recipients that acknowledged delivery
    pub delivered: usize,
    /// Recipients whose delivery failed
    pub failed: usize,
}

/// Event emitted during the job lifecycle
///
/// Subscribe via [`crate::MediaRelay::subscribe`]. Events are broadcast on a
/// best-effort channel; slow consumers may miss events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was created and is awaiting variant selection
    JobCreated {
        /// The new job's id
        id: JobId,
        /// The submitting requester
        requester: UserId,
    },

    /// A variant was selected and the pipeline began
    JobStarted {
        /// The job's id
        id: JobId,
        /// The chosen variant
        variant: Variant,
    },

    /// The job moved to a new pipeline stage
    StageChanged {
        /// The job's id
        id: JobId,
        /// The state entered
        state: JobState,
    },

    /// The artifact was delivered
    JobCompleted {
        /// The job's id
        id: JobId,
        /// Title reported by the fetch collaborator
        title: String,
    },

    /// A pipeline stage failed terminally
    JobFailed {
        /// The job's id
        id: JobId,
        /// Truncated description of the triggering error
        error: String,
    },

    /// The requester discarded the job before starting it
    JobCancelled {
        /// The job's id
        id: JobId,
    },

    /// The job sat unselected past the abandonment bound and was swept
    JobExpired {
        /// The job's id
        id: JobId,
    },

    /// A user was banned
    UserBanned {
        /// The banned user
        user: UserId,
    },

    /// A user was unbanned
    UserUnbanned {
        /// The unbanned user
        user: UserId,
    },

    /// An administrative broadcast finished
    BroadcastFinished {
        /// Delivery counts
        report: BroadcastReport,
    },

    /// The relay is shutting down
    Shutdown,
}
