//! Media fetching via the yt-dlp command line tool.
//!
//! [`CliMediaFetcher`] shells out to yt-dlp with a machine-readable progress
//! template and a `--print after_move:` directive that reports the final
//! artifact path, title, and duration as one JSON line on stdout. Stream
//! selection, container merging, retries, and certificate handling are all
//! carried by the [`FetchRequest`], so an invocation is fully described by
//! its request.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::FetchError;
use crate::types::{TransferUpdate, Variant};

/// Output template used when the configuration does not override it. The
/// engine substitutes the media title and picks the extension itself.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Progress template producing `dl <downloaded> <total>` lines on stdout.
const PROGRESS_TEMPLATE: &str =
    "download:dl %(progress.downloaded_bytes)s %(progress.total_bytes)s";

/// Print template emitted once after the final file is in place.
const RESULT_TEMPLATE: &str =
    r#"after_move:{"filepath":%(filepath)j,"title":%(title)j,"duration":%(duration)j}"#;

/// Thumbnail extensions probed next to the artifact, in preference order.
const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "webp"];

/// Everything a single fetch needs, resolved ahead of time by the caller.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Source URL to download from.
    pub source: String,
    /// Quality variant the requester selected.
    pub variant: Variant,
    /// Working directory the artifact and thumbnail are written into.
    pub dest_dir: PathBuf,
    /// Engine output template, joined onto `dest_dir`.
    pub output_template: String,
    /// Cookie jar forwarded to the engine when the file exists.
    pub cookie_file: Option<PathBuf>,
    /// User-Agent header presented to the remote host.
    pub user_agent: String,
    /// Referer header presented to the remote host.
    pub referer: String,
    /// Socket-level timeout for each connection the engine opens.
    pub socket_timeout: Duration,
    /// Retry budget the engine manages internally.
    pub max_retries: u32,
    /// Verify TLS certificates when true.
    pub check_certificates: bool,
}

/// A finished download as reported by the fetch engine.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// Final artifact path, after any merge step.
    pub path: PathBuf,
    /// Title reported by the source.
    pub title: String,
    /// Duration in seconds reported by the source, zero when unknown.
    pub duration_secs: u64,
    /// Thumbnail written next to the artifact, when the source had one.
    pub thumbnail: Option<PathBuf>,
}

/// Downloads media from a remote source into a working directory.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Runs the download described by `request`, reporting byte counts on
    /// `progress` as the transfer advances. Any error is terminal for the
    /// job; the retry budget inside the request is the engine's concern.
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<FetchedMedia, FetchError>;

    /// Short engine name used in log output.
    fn name(&self) -> &'static str;
}

/// [`MediaFetcher`] backed by the yt-dlp binary.
pub struct CliMediaFetcher {
    binary_path: PathBuf,
}

impl CliMediaFetcher {
    /// Creates a fetcher that will invoke the binary at `binary_path`.
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Locates yt-dlp on the `PATH`, returning `None` when it is not
    /// installed.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }
}

#[async_trait]
impl MediaFetcher for CliMediaFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<FetchedMedia, FetchError> {
        let args = build_args(request);
        tracing::debug!(
            source = %request.source,
            variant = request.variant.as_token(),
            "Invoking yt-dlp"
        );

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Tool(format!("Failed to execute yt-dlp: {}", e)))?;

        // Drain stderr concurrently so a chatty engine cannot fill the pipe
        // and stall the download.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buffer).await;
            }
            buffer
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Tool("yt-dlp stdout was not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut result: Option<FetchResult> = None;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| FetchError::Tool(format!("Failed to read yt-dlp output: {}", e)))?
        {
            if let Some(update) = parse_progress_line(&line) {
                if let Some(progress) = &progress {
                    // A full channel just drops this sample; the next one
                    // carries fresher numbers anyway.
                    let _ = progress.try_send(update);
                }
            } else if let Some(parsed) = parse_result_line(&line) {
                result = Some(parsed);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FetchError::Tool(format!("Failed to wait for yt-dlp: {}", e)))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let error = classify_failure(&stderr_text, status.code());
            tracing::warn!(source = %request.source, error = %error, "yt-dlp failed");
            return Err(error);
        }

        let result = result.ok_or_else(|| {
            FetchError::Failed("yt-dlp finished without reporting a result".to_string())
        })?;
        let path = PathBuf::from(&result.filepath);
        let thumbnail = find_thumbnail(&path).await;
        tracing::info!(
            title = %result.title,
            path = %path.display(),
            has_thumbnail = thumbnail.is_some(),
            "Fetch complete"
        );

        let duration_secs = result.duration_secs();
        Ok(FetchedMedia {
            path,
            title: result.title,
            duration_secs,
            thumbnail,
        })
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// The JSON payload printed by [`RESULT_TEMPLATE`] once the artifact is in
/// its final location.
#[derive(Debug, Deserialize)]
struct FetchResult {
    filepath: String,
    title: String,
    #[serde(default)]
    duration: Option<serde_json::Value>,
}

impl FetchResult {
    /// Duration is `null` for live or image sources and occasionally a
    /// string, so parsing stays permissive.
    fn duration_secs(&self) -> u64 {
        let Some(value) = &self.duration else {
            return 0;
        };
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()))
            .map(|secs| secs.max(0.0) as u64)
            .unwrap_or(0)
    }
}

fn build_args(request: &FetchRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "--print".into(),
        RESULT_TEMPLATE.into(),
        "-f".into(),
        request.variant.format_selector().into(),
    ];
    if let Some(container) = request.variant.merge_container() {
        args.push("--merge-output-format".into());
        args.push(container.into());
    }
    args.push("-o".into());
    args.push(
        request
            .dest_dir
            .join(&request.output_template)
            .into_os_string(),
    );
    args.push("--user-agent".into());
    args.push(request.user_agent.clone().into());
    args.push("--referer".into());
    args.push(request.referer.clone().into());
    args.push("--socket-timeout".into());
    args.push(request.socket_timeout.as_secs().to_string().into());
    args.push("--retries".into());
    args.push(request.max_retries.to_string().into());
    if !request.check_certificates {
        args.push("--no-check-certificates".into());
    }
    args.push("--write-thumbnail".into());
    if let Some(cookie_file) = &request.cookie_file {
        if cookie_file.exists() {
            args.push("--cookies".into());
            args.push(cookie_file.clone().into_os_string());
        }
    }
    args.push(request.source.clone().into());
    args
}

/// Parses one `--progress-template` line, `dl <downloaded> <total>`. Both
/// fields may be floats or `NA` depending on what the site reports.
fn parse_progress_line(line: &str) -> Option<TransferUpdate> {
    let rest = line.strip_prefix("dl ")?;
    let mut fields = rest.split_whitespace();
    let transferred = parse_byte_count(fields.next()?)?;
    let total = fields.next().and_then(parse_byte_count).unwrap_or(0);
    Some(TransferUpdate { transferred, total })
}

fn parse_byte_count(field: &str) -> Option<u64> {
    if field == "NA" || field == "None" {
        return Some(0);
    }
    field.parse::<f64>().ok().map(|value| value.max(0.0) as u64)
}

fn parse_result_line(line: &str) -> Option<FetchResult> {
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

/// Maps engine stderr onto the error taxonomy. Matching is on the whole
/// stderr stream; the returned message is the last `ERROR` line.
fn classify_failure(stderr: &str, exit_code: Option<i32>) -> FetchError {
    let detail = failure_detail(stderr, exit_code);
    let lowered = stderr.to_lowercase();
    if lowered.contains("unsupported url") {
        FetchError::Unsupported(detail)
    } else if lowered.contains("video unavailable")
        || lowered.contains("has been removed")
        || lowered.contains("private video")
    {
        FetchError::Unavailable(detail)
    } else if lowered.contains("http error 403")
        || lowered.contains("sign in to confirm")
        || lowered.contains("age-restricted")
        || lowered.contains("not available in your country")
        || lowered.contains("geo restriction")
    {
        FetchError::Restricted(detail)
    } else {
        FetchError::Failed(detail)
    }
}

fn failure_detail(stderr: &str, exit_code: Option<i32>) -> String {
    stderr
        .lines()
        .rev()
        .find_map(|line| {
            let trimmed = line.trim();
            trimmed.starts_with("ERROR").then(|| trimmed.to_string())
        })
        .or_else(|| {
            stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| match exit_code {
            Some(code) => format!("yt-dlp exited with status {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        })
}

/// The engine writes the thumbnail next to the artifact with an image
/// extension of its choosing.
async fn find_thumbnail(artifact: &Path) -> Option<PathBuf> {
    for extension in THUMBNAIL_EXTENSIONS {
        let candidate = artifact.with_extension(extension);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}
