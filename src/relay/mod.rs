//! The media relay orchestrator.
//!
//! [`MediaRelay`] ties the leaf components together: the access gate and
//! cooldown throttle admit requests, the registry tracks live jobs, and the
//! pipeline executor drives each started job through its collaborators.
//! Submodules split the orchestrator by concern: `intake` and `selection`
//! are the request-facing surfaces, `executor` the state machine,
//! `reporter` and `workspace` its helpers, `admin` the moderation surface,
//! `services` the background tasks, and `lifecycle` shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::fetch::{CliMediaFetcher, MediaFetcher};
use crate::ffmpeg::{CliMediaProcessor, MediaProcessor};
use crate::gate::Gate;
use crate::registry::{JobStore, MemoryJobStore};
use crate::throttle::Throttle;
use crate::transport::Transport;
use crate::types::Event;

mod admin;
mod executor;
mod intake;
mod lifecycle;
mod reporter;
mod selection;
mod services;
mod workspace;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Admission components, consulted before any job work.
#[derive(Clone)]
pub(crate) struct AdmissionState {
    /// Ban list and channel-membership gate.
    pub(crate) gate: Arc<Gate>,
    /// Per-requester start cooldown.
    pub(crate) throttle: Arc<Throttle>,
}

/// External tool collaborators the pipeline invokes.
#[derive(Clone)]
pub(crate) struct PipelineTools {
    /// Media fetch engine.
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    /// Tagging, thumbnail, and probing tools.
    pub(crate) processor: Arc<dyn MediaProcessor>,
}

/// Registry and pipeline concurrency state.
#[derive(Clone)]
pub(crate) struct PipelineState {
    /// Live job registry.
    pub(crate) jobs: Arc<dyn JobStore>,
    /// Bound on simultaneously started jobs.
    pub(crate) fetch_slots: Arc<Semaphore>,
    /// Cleared during shutdown so intake refuses new references.
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancels background services during shutdown.
    pub(crate) shutdown: CancellationToken,
}

/// Externally supplied collaborators for
/// [`MediaRelay::with_collaborators`].
///
/// Integration tests inject scripted implementations here;
/// [`MediaRelay::new`] fills in the CLI-backed production set.
pub struct Collaborators {
    /// Messaging transport the relay speaks through.
    pub transport: Arc<dyn Transport>,
    /// Media fetch engine.
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Tagging, thumbnail, and probing tools.
    pub processor: Arc<dyn MediaProcessor>,
    /// Job registry override; the in-memory store when `None`.
    pub jobs: Option<Arc<dyn JobStore>>,
}

/// Main relay instance (cloneable, all fields Arc-wrapped).
#[derive(Clone)]
pub struct MediaRelay {
    /// User roster persistence. Public so embedders and integration tests
    /// can query it directly.
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported).
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration, shared across tasks.
    pub(crate) config: Arc<Config>,
    /// Messaging transport.
    pub(crate) transport: Arc<dyn Transport>,
    /// Admission components.
    pub(crate) admission: AdmissionState,
    /// Pipeline tool collaborators.
    pub(crate) tools: PipelineTools,
    /// Registry and concurrency state.
    pub(crate) state: PipelineState,
}

impl MediaRelay {
    /// Create a relay wired to the CLI-backed production collaborators.
    ///
    /// The fetch engine is required: an explicitly configured binary wins,
    /// otherwise the `PATH` is searched when `tools.search_path` allows
    /// it, and construction fails when neither yields one. The ffmpeg
    /// family is optional; missing binaries degrade tagging, thumbnail
    /// normalization, and probing at run time.
    pub async fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let fetcher: Arc<dyn MediaFetcher> = match &config.tools.ytdlp_path {
            Some(path) => Arc::new(CliMediaFetcher::new(path.clone())),
            None if config.tools.search_path => match CliMediaFetcher::from_path() {
                Some(fetcher) => Arc::new(fetcher),
                None => {
                    return Err(Error::Config {
                        message: "yt-dlp binary not found on PATH".to_string(),
                        key: Some("tools.ytdlp_path".to_string()),
                    });
                }
            },
            None => {
                return Err(Error::Config {
                    message: "no yt-dlp binary configured and PATH search is disabled".to_string(),
                    key: Some("tools.ytdlp_path".to_string()),
                });
            }
        };

        let ffmpeg_path = resolve_tool(
            config.tools.ffmpeg_path.clone(),
            "ffmpeg",
            config.tools.search_path,
        );
        let ffprobe_path = resolve_tool(
            config.tools.ffprobe_path.clone(),
            "ffprobe",
            config.tools.search_path,
        );
        if ffmpeg_path.is_none() {
            tracing::warn!("ffmpeg not found; tagging and thumbnail normalization disabled");
        }
        if ffprobe_path.is_none() {
            tracing::warn!("ffprobe not found; dimension probing disabled");
        }
        let processor: Arc<dyn MediaProcessor> =
            Arc::new(CliMediaProcessor::new(ffmpeg_path, ffprobe_path));

        Self::with_collaborators(
            config,
            Collaborators {
                transport,
                fetcher,
                processor,
                jobs: None,
            },
        )
        .await
    }

    /// Create a relay around explicitly supplied collaborators.
    ///
    /// Initializes the working-directory root, opens the user store and
    /// runs its migrations, and sets up the event broadcast channel.
    pub async fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        tokio::fs::create_dir_all(config.workspace_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create workspace directory '{}': {}",
                        config.workspace_dir().display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(config.database_path()).await?;

        // Buffered channel; a subscriber lagging past 1000 events sees
        // RecvError::Lagged rather than blocking the relay.
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let config = Arc::new(config);
        let db = Arc::new(db);

        let gate = Arc::new(Gate::new(
            config.gate.clone(),
            db.clone(),
            collaborators.transport.clone(),
        ));
        let throttle = Arc::new(Throttle::new(
            config.throttle.cooldown,
            config.gate.admins.clone(),
        ));
        let jobs = collaborators
            .jobs
            .unwrap_or_else(|| Arc::new(MemoryJobStore::new()));

        let relay = Self {
            db,
            event_tx,
            transport: collaborators.transport,
            admission: AdmissionState { gate, throttle },
            tools: PipelineTools {
                fetcher: collaborators.fetcher,
                processor: collaborators.processor,
            },
            state: PipelineState {
                jobs,
                fetch_slots: Arc::new(Semaphore::new(config.jobs.max_concurrent)),
                accepting_new: Arc::new(AtomicBool::new(true)),
                shutdown: CancellationToken::new(),
            },
            config,
        };

        tracing::info!(
            fetcher = relay.tools.fetcher.name(),
            processor = relay.tools.processor.name(),
            max_concurrent = relay.config.jobs.max_concurrent,
            "Media relay initialized"
        );

        Ok(relay)
    }

    /// Subscribe to relay events.
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls more than 1000 events
    /// behind receives `RecvError::Lagged` on its next `recv`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The relay's configuration.
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers. With no subscribers the event is
    /// silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

fn resolve_tool(explicit: Option<PathBuf>, binary: &str, search_path: bool) -> Option<PathBuf> {
    explicit.or_else(|| {
        if search_path {
            which::which(binary).ok()
        } else {
            None
        }
    })
}
