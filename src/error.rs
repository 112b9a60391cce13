//! Error types for media-dl
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Admission, Job, Fetch, Tag, Transport, etc.)
//! - Boundary classification: which errors are resolved before the pipeline
//!   and which terminate a running job
//! - Short user-facing renderings for boundary notices

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "tools.ytdlp_path")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Request refused by the admission layer (ban, membership, cooldown)
    #[error("admission refused: {0}")]
    Admission(#[from] AdmissionError),

    /// Job-level error (unknown id, ownership mismatch, bad state)
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Fetch collaborator error - terminal for the owning job
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Tagging/probing collaborator error - absorbed, never fails a job
    #[error("tagging failed: {0}")]
    Tag(#[from] TagError),

    /// Transport collaborator error - terminal when raised during transmit
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The submitted text did not contain a usable source reference
    #[error("no usable link in request: {0}")]
    InvalidReference(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Keep-alive HTTP listener error
    #[error("keep-alive server error: {0}")]
    KeepaliveServer(String),
}

/// Admission-layer refusals, resolved at the boundary before any pipeline work
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Requester is on the ban list
    #[error("requester is banned")]
    Banned,

    /// A membership gate is configured and the requester has not joined
    #[error("requester must join the required channel")]
    MustJoin {
        /// Invite reference to present to the requester, when one could be resolved
        invite: Option<String>,
    },

    /// Cooldown window has not elapsed since the requester's last job start
    #[error("rate limited: {remaining_secs}s remaining")]
    RateLimited {
        /// Seconds until the requester may start another job
        remaining_secs: u64,
    },

    /// The acting identity does not hold the administrator role
    #[error("administrator role required")]
    NotAdmin,
}

/// Job-level errors raised at the selection boundary
#[derive(Debug, Error)]
pub enum JobError {
    /// No live job with this id (expired, swept, or never existed)
    #[error("job {id} not found")]
    NotFound {
        /// The job id that was not found
        id: String,
    },

    /// The acting identity does not own the job
    #[error("job {id} belongs to another requester")]
    NotYours {
        /// The job id the action referenced
        id: String,
    },

    /// Cannot perform the operation in the job's current state
    #[error("cannot {operation} job {id} in state {current_state}")]
    InvalidState {
        /// The job id in an invalid state for the operation
        id: String,
        /// The operation that was attempted (e.g., "cancel", "start")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },

    /// A selection token could not be parsed
    #[error("unrecognized selection token: {0}")]
    InvalidToken(String),
}

/// Fetch collaborator errors - any of these is terminal for the owning job
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source site or URL shape is not supported by the fetch engine
    #[error("unsupported source: {0}")]
    Unsupported(String),

    /// The source exists but cannot be reached or has been removed
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The source refused access (authentication, age, or region restriction)
    #[error("source restricted: {0}")]
    Restricted(String),

    /// The fetch tool itself could not be executed
    #[error("fetch tool error: {0}")]
    Tool(String),

    /// The fetch ran but failed for an unclassified reason
    #[error("{0}")]
    Failed(String),
}

/// Tagging and probing errors - absorbed per the best-effort policy
#[derive(Debug, Error)]
pub enum TagError {
    /// The external binary could not be executed (missing, permissions)
    #[error("tool error: {0}")]
    Tool(String),

    /// The tool ran but exited unsuccessfully
    #[error("{0}")]
    Failed(String),

    /// The tool reported success but produced no output file
    #[error("no output produced at {0}")]
    MissingOutput(PathBuf),

    /// Tool output could not be parsed
    #[error("unparseable tool output: {0}")]
    Parse(String),
}

/// Transport collaborator errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The delivery was rejected by the messaging service
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The artifact exceeds the transport's size limit
    #[error("artifact too large: {size} bytes exceeds limit of {limit}")]
    TooLarge {
        /// Size of the artifact in bytes
        size: u64,
        /// The transport's limit in bytes
        limit: u64,
    },

    /// Transport-level transient error (connection, timeout, flood control)
    #[error("transport failure: {0}")]
    Network(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl Error {
    /// Whether this error is resolved at the intake/selection boundary and
    /// never enters the pipeline.
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            Error::Admission(_) | Error::Job(_) | Error::InvalidReference(_) | Error::ShuttingDown
        )
    }

    /// Short, user-presentable rendering for boundary notices.
    ///
    /// Pipeline-terminal errors go through the status message instead and are
    /// truncated there; this rendering deliberately exposes no internal detail.
    pub fn user_message(&self) -> String {
        match self {
            Error::Admission(AdmissionError::Banned) => {
                "You are banned from using this service.".to_string()
            }
            Error::Admission(AdmissionError::MustJoin { .. }) => {
                "Please join the required channel first.".to_string()
            }
            Error::Admission(AdmissionError::RateLimited { remaining_secs }) => {
                format!("Please wait {remaining_secs}s before starting another download.")
            }
            Error::Admission(AdmissionError::NotAdmin) => {
                "This command is for administrators.".to_string()
            }
            Error::Job(JobError::NotFound { .. }) => "This selection has expired.".to_string(),
            Error::Job(JobError::NotYours { .. }) => {
                "This download belongs to someone else.".to_string()
            }
            Error::Job(JobError::InvalidState { .. }) => {
                "This download has already started.".to_string()
            }
            Error::Job(JobError::InvalidToken(_)) => "Unrecognized action.".to_string(),
            Error::InvalidReference(_) => "Send a valid link.".to_string(),
            Error::ShuttingDown => "Shutting down, try again later.".to_string(),
            _ => "Something went wrong.".to_string(),
        }
    }
}
