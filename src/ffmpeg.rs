//! Artifact post-processing via the ffmpeg tool family.
//!
//! [`CliMediaProcessor`] rewrites container metadata through a stream copy
//! into a side file, re-encodes thumbnails into a bounded JPEG, and probes
//! dimensions and duration with ffprobe. Binaries are resolved up front but
//! held optionally, so a missing installation surfaces as a [`TagError`] on
//! use and the pipeline can degrade instead of refusing to start.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::config::TagConfig;
use crate::error::TagError;

/// Scale filter bounding a thumbnail to 320x320 without upscaling smaller
/// images, preserving aspect ratio.
const THUMBNAIL_FILTER: &str =
    "scale='min(iw,320)':'min(ih,320)':force_original_aspect_ratio=decrease";

/// Width, height, and duration reported by a probe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    /// Video width in pixels, zero for audio-only artifacts.
    pub width: u32,
    /// Video height in pixels, zero for audio-only artifacts.
    pub height: u32,
    /// Container duration in seconds, zero when the probe had none.
    pub duration_secs: u64,
}

/// Rewrites tags, normalizes thumbnails, and probes finished artifacts.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Copies `artifact` into a side file with the container title and
    /// artist replaced by `tags`, returning the side file path. The caller
    /// decides whether to swap it over the original.
    async fn write_tags(&self, artifact: &Path, tags: &TagConfig) -> Result<PathBuf, TagError>;

    /// Re-encodes `thumbnail` as a bounded JPEG suitable for transport
    /// preview use, returning the new path.
    async fn normalize_thumbnail(&self, thumbnail: &Path) -> Result<PathBuf, TagError>;

    /// Reads width, height, and duration from `artifact`.
    async fn probe(&self, artifact: &Path) -> Result<MediaInfo, TagError>;

    /// Short tool name used in log output.
    fn name(&self) -> &'static str;
}

/// [`MediaProcessor`] backed by the ffmpeg and ffprobe binaries.
pub struct CliMediaProcessor {
    ffmpeg_path: Option<PathBuf>,
    ffprobe_path: Option<PathBuf>,
}

impl CliMediaProcessor {
    /// Creates a processor around explicitly resolved binaries. Either may
    /// be `None`, in which case the corresponding operations fail with
    /// [`TagError::Tool`] when invoked.
    pub fn new(ffmpeg_path: Option<PathBuf>, ffprobe_path: Option<PathBuf>) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    /// Locates ffmpeg and ffprobe on the `PATH`. Missing binaries are
    /// tolerated here and reported on first use.
    pub fn from_path() -> Self {
        Self::new(which::which("ffmpeg").ok(), which::which("ffprobe").ok())
    }

    fn ffmpeg(&self) -> Result<&Path, TagError> {
        self.ffmpeg_path
            .as_deref()
            .ok_or_else(|| TagError::Tool("ffmpeg is not available".to_string()))
    }

    fn ffprobe(&self) -> Result<&Path, TagError> {
        self.ffprobe_path
            .as_deref()
            .ok_or_else(|| TagError::Tool("ffprobe is not available".to_string()))
    }
}

#[async_trait]
impl MediaProcessor for CliMediaProcessor {
    async fn write_tags(&self, artifact: &Path, tags: &TagConfig) -> Result<PathBuf, TagError> {
        let ffmpeg = self.ffmpeg()?;
        let side_file = side_file_path(artifact);

        let mut cmd = Command::new(ffmpeg);
        cmd.arg("-y").arg("-i").arg(artifact).arg("-c").arg("copy");
        if let Some(title) = &tags.title {
            cmd.arg("-metadata").arg(format!("title={}", title));
        }
        if let Some(author) = &tags.author {
            cmd.arg("-metadata").arg(format!("artist={}", author));
        }
        cmd.arg(&side_file);
        run(cmd, "ffmpeg").await?;

        if !tokio::fs::try_exists(&side_file).await.unwrap_or(false) {
            return Err(TagError::MissingOutput(side_file));
        }
        tracing::debug!(artifact = %artifact.display(), "Container tags written");
        Ok(side_file)
    }

    async fn normalize_thumbnail(&self, thumbnail: &Path) -> Result<PathBuf, TagError> {
        let ffmpeg = self.ffmpeg()?;
        let normalized = normalized_thumbnail_path(thumbnail);

        let mut cmd = Command::new(ffmpeg);
        cmd.arg("-y")
            .arg("-i")
            .arg(thumbnail)
            .arg("-vf")
            .arg(THUMBNAIL_FILTER)
            // Animated sources collapse to their first frame.
            .arg("-frames:v")
            .arg("1")
            .arg(&normalized);
        run(cmd, "ffmpeg").await?;

        if !tokio::fs::try_exists(&normalized).await.unwrap_or(false) {
            return Err(TagError::MissingOutput(normalized));
        }
        Ok(normalized)
    }

    async fn probe(&self, artifact: &Path) -> Result<MediaInfo, TagError> {
        let ffprobe = self.ffprobe()?;

        let mut cmd = Command::new(ffprobe);
        cmd.arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg("-show_format")
            .arg(artifact);
        let output = run(cmd, "ffprobe").await?;
        parse_probe_output(&output.stdout)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

async fn run(mut cmd: Command, tool: &str) -> Result<std::process::Output, TagError> {
    let output = cmd
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| TagError::Tool(format!("Failed to execute {}: {}", tool, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no error output")
            .to_string();
        return Err(TagError::Failed(format!("{} failed: {}", tool, detail)));
    }
    Ok(output)
}

/// Side file written next to the artifact, `Clip.mkv` -> `Clip.tagged.mkv`.
fn side_file_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_stem()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tagged");
    if let Some(extension) = artifact.extension() {
        name.push(".");
        name.push(extension);
    }
    artifact.with_file_name(name)
}

/// Normalized thumbnail written next to the input, `cover.webp` ->
/// `cover.thumb.jpg`. The name differs from the input even for JPEG
/// sources so ffmpeg never writes onto the file it is reading.
fn normalized_thumbnail_path(thumbnail: &Path) -> PathBuf {
    thumbnail.with_extension("thumb.jpg")
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// ffprobe reports durations as decimal strings on the format block and
/// sometimes only on individual streams; dimensions live on the first
/// video stream.
fn parse_probe_output(json: &[u8]) -> Result<MediaInfo, TagError> {
    let output: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| TagError::Parse(format!("Failed to parse ffprobe output: {}", e)))?;

    let video = output
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"));
    let duration_secs = output
        .format
        .as_ref()
        .and_then(|format| format.duration.as_deref())
        .or_else(|| video.and_then(|stream| stream.duration.as_deref()))
        .and_then(|duration| duration.parse::<f64>().ok())
        .map(|secs| secs.max(0.0) as u64)
        .unwrap_or(0);

    Ok(MediaInfo {
        width: video.and_then(|stream| stream.width).unwrap_or(0),
        height: video.and_then(|stream| stream.height).unwrap_or(0),
        duration_secs,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn side_file_path_keeps_directory_and_extension() {
        assert_eq!(
            side_file_path(Path::new("/work/ab12cd34/Clip.mkv")),
            PathBuf::from("/work/ab12cd34/Clip.tagged.mkv")
        );
    }

    #[test]
    fn side_file_path_without_extension() {
        assert_eq!(
            side_file_path(Path::new("/work/ab12cd34/raw")),
            PathBuf::from("/work/ab12cd34/raw.tagged")
        );
    }

    #[test]
    fn normalized_thumbnail_path_rewrites_extension() {
        assert_eq!(
            normalized_thumbnail_path(Path::new("/work/cover.webp")),
            PathBuf::from("/work/cover.thumb.jpg")
        );
        assert_eq!(
            normalized_thumbnail_path(Path::new("/work/cover.jpg")),
            PathBuf::from("/work/cover.thumb.jpg")
        );
    }

    #[test]
    fn parse_probe_output_reads_video_stream_and_format_duration() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "duration": "95.1"},
                {"codec_type": "video", "width": 1280, "height": 720, "duration": "94.9"}
            ],
            "format": {"duration": "95.300000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.duration_secs, 95);
    }

    #[test]
    fn parse_probe_output_falls_back_to_stream_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360, "duration": "12.5"}]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_secs, 12);
    }

    #[test]
    fn parse_probe_output_audio_only_has_zero_dimensions() {
        let json = br#"{
            "streams": [{"codec_type": "audio"}],
            "format": {"duration": "180.0"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 0);
        assert_eq!(info.height, 0);
        assert_eq!(info.duration_secs, 180);
    }

    #[test]
    fn parse_probe_output_empty_document() {
        let info = parse_probe_output(b"{}").unwrap();
        assert_eq!(info, MediaInfo::default());
    }

    #[test]
    fn parse_probe_output_rejects_malformed_json() {
        let error = parse_probe_output(b"not json").unwrap_err();
        assert!(matches!(error, TagError::Parse(_)));
    }

    #[test]
    fn missing_binaries_surface_as_tool_errors() {
        let processor = CliMediaProcessor::new(None, None);
        assert!(processor.ffmpeg().is_err());
        assert!(processor.ffprobe().is_err());
    }

    #[tokio::test]
    async fn write_tags_with_invalid_binary_reports_tool_error() {
        let processor = CliMediaProcessor::new(Some(PathBuf::from("/nonexistent/ffmpeg")), None);
        let tags = TagConfig {
            title: Some("Title".to_string()),
            author: Some("Author".to_string()),
        };
        let error = processor
            .write_tags(Path::new("/tmp/in.mkv"), &tags)
            .await
            .unwrap_err();
        assert!(matches!(error, TagError::Tool(_)));
        assert!(error.to_string().contains("Failed to execute ffmpeg"));
    }

    #[tokio::test]
    async fn probe_without_binary_reports_tool_error() {
        let processor = CliMediaProcessor::new(None, None);
        let error = processor.probe(Path::new("/tmp/in.mkv")).await.unwrap_err();
        assert!(error.to_string().contains("ffprobe is not available"));
    }
}
