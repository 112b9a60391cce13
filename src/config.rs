//! Configuration types for media-dl

use crate::types::{ChannelId, UserId};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Access gate configuration (membership requirement, administrators)
///
/// Groups settings that decide who may submit jobs. Used as a nested
/// sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Channel a requester must be a member of before submitting
    /// (None = no membership requirement)
    #[serde(default)]
    pub required_channel: Option<ChannelId>,

    /// Administrator identities, exempt from the gate and allowed to
    /// run ban/unban/broadcast operations
    #[serde(default)]
    pub admins: Vec<UserId>,
}

impl GateConfig {
    /// Whether the given identity is an administrator
    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }
}

/// Per-user rate limiting configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum wall-clock gap between two job starts by the same
    /// requester (default: 60 seconds)
    #[serde(default = "default_cooldown", with = "duration_serde")]
    pub cooldown: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            cooldown: default_cooldown(),
        }
    }
}

/// Job pipeline behavior configuration (workspace, concurrency, expiry)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Directory that per-job working directories are created under
    /// (default: "downloads")
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Maximum jobs allowed in the fetch-process-transmit stages at
    /// once (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// How long a job may sit awaiting selection before the reclaimer
    /// discards it (default: 30 minutes)
    #[serde(default = "default_abandonment", with = "duration_serde")]
    pub abandonment: Duration,

    /// How often the reclaimer scans for abandoned jobs
    /// (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            max_concurrent: default_max_concurrent(),
            abandonment: default_abandonment(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Fetch engine configuration (identity spoofing, timeouts, cookies)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header presented to media hosts
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referer header presented to media hosts
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Socket timeout for fetch connections (default: 10 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,

    /// Fragment retry attempts before the fetch engine gives up
    /// (default: 5)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Engine output template, joined onto the job's working directory
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Cookie file handed to the fetch engine; only passed along when
    /// the file actually exists at fetch time
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    /// Verify TLS certificates of media hosts (default: false, many
    /// mirrors present broken chains)
    #[serde(default)]
    pub check_certificates: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referer: default_referer(),
            socket_timeout: default_socket_timeout(),
            retries: default_retries(),
            output_template: default_output_template(),
            cookie_file: None,
            check_certificates: false,
        }
    }
}

/// Metadata stamped onto delivered artifacts
///
/// Both fields are optional; when neither is set the tagging stage is a
/// no-op and delivered files keep their original metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TagConfig {
    /// Title tag written into the artifact container
    #[serde(default)]
    pub title: Option<String>,

    /// Artist/author tag written into the artifact container; also
    /// appended to delivery captions
    #[serde(default)]
    pub author: Option<String>,
}

impl TagConfig {
    /// Whether tagging has nothing to write
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none()
    }
}

/// External tool paths (yt-dlp, ffmpeg, ffprobe)
///
/// Groups settings for the external binaries the pipeline shells out to.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths
    /// not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./media-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Liveness endpoint configuration
///
/// Free hosting platforms idle out processes that expose no open port.
/// When enabled, a minimal HTTP server answers on `bind_address` and an
/// optional self-pinger requests it periodically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// Enable the liveness endpoint (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Address to bind to (default: 0.0.0.0:8080)
    #[serde(default = "default_keepalive_bind")]
    pub bind_address: SocketAddr,

    /// Run the self-pinger alongside the server (default: true)
    #[serde(default = "default_true")]
    pub self_ping: bool,

    /// How often the self-pinger fires (default: 10 minutes)
    #[serde(default = "default_ping_interval", with = "duration_serde")]
    pub ping_interval: Duration,

    /// URL the self-pinger requests; when None, the pinger targets the
    /// local bind port
    #[serde(default)]
    pub ping_url: Option<String>,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_keepalive_bind(),
            self_ping: true,
            ping_interval: default_ping_interval(),
            ping_url: None,
        }
    }
}

/// Main configuration for the media relay
///
/// Fields are organized into logical sub-configs for maintainability:
/// - [`gate`](GateConfig): membership requirement, administrators
/// - [`throttle`](ThrottleConfig): per-user rate limiting
/// - [`jobs`](JobsConfig): workspace, concurrency, expiry
/// - [`fetch`](FetchConfig): identity spoofing, timeouts, cookies
/// - [`tags`](TagConfig): metadata stamped onto artifacts
/// - [`tools`](ToolsConfig): external binary paths
/// - [`persistence`](PersistenceConfig): database location
/// - [`keepalive`](KeepaliveConfig): liveness endpoint
///
/// Every field has a default, so `Config::default()` yields a working
/// configuration for an open relay with no membership gate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Access gate settings (membership requirement, administrators)
    #[serde(default)]
    pub gate: GateConfig,

    /// Per-user rate limiting
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Job pipeline behavior (workspace, concurrency, expiry)
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Fetch engine settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Metadata stamped onto delivered artifacts
    #[serde(default)]
    pub tags: TagConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Data storage and state management
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Liveness endpoint
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
}

// Convenience accessors so call sites can use `config.workspace_dir()`
// etc. without reaching through the sub-config structs.
impl Config {
    /// Directory that per-job working directories are created under
    pub fn workspace_dir(&self) -> &PathBuf {
        &self.jobs.workspace_dir
    }

    /// Database path
    pub fn database_path(&self) -> &PathBuf {
        &self.persistence.database_path
    }
}

// Default value functions
fn default_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_abandonment() -> Duration {
    Duration::from_secs(30 * 60) // 30 minutes
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
        .to_string()
}

fn default_referer() -> String {
    "https://www.youtube.com/".to_string()
}

fn default_output_template() -> String {
    crate::fetch::DEFAULT_OUTPUT_TEMPLATE.to_string()
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retries() -> u32 {
    5
}

fn default_database_path() -> PathBuf {
    PathBuf::from("media-dl.db")
}

fn default_keepalive_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_ping_interval() -> Duration {
    Duration::from_secs(600) // 10 minutes
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
