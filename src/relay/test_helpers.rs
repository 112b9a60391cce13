//! Shared test helpers for creating MediaRelay instances driven by mock
//! collaborators.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{FetchError, TagError, TransportError};
use crate::fetch::{FetchRequest, FetchedMedia, MediaFetcher};
use crate::ffmpeg::{MediaInfo, MediaProcessor};
use crate::relay::{Collaborators, MediaRelay};
use crate::transport::{
    Keyboard, OutgoingAudio, OutgoingDocument, OutgoingVideo, Transport,
};
use crate::types::{
    ChannelId, ChatId, InteractionId, Job, JobId, MessageRef, TransferUpdate, UserId, Variant,
};

/// One recorded transport invocation, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TransportCall {
    /// `send_message`
    Sent {
        chat: ChatId,
        text: String,
        keyboard: Keyboard,
    },
    /// `edit_message`
    Edited { message: MessageRef, text: String },
    /// `delete_message`
    Deleted { message: MessageRef },
    /// `answer`
    Answered { text: String },
    /// `send_video`
    Video {
        path: PathBuf,
        caption: String,
        streaming: bool,
        width: u32,
        height: u32,
        duration_secs: u32,
        content: Vec<u8>,
    },
    /// `send_audio`
    Audio {
        path: PathBuf,
        caption: String,
        duration_secs: u32,
        content: Vec<u8>,
    },
    /// `send_document`
    Document {
        path: PathBuf,
        caption: String,
        content: Vec<u8>,
    },
}

/// Recording transport. Message refs are minted from a counter; artifact
/// sends can be scripted to fail and membership checks to deny.
pub(crate) struct MockTransport {
    next_message: AtomicI64,
    calls: Mutex<Vec<TransportCall>>,
    artifact_sends_fail: AtomicBool,
    unreachable_chats: Mutex<Vec<ChatId>>,
    member: AtomicBool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            next_message: AtomicI64::new(1),
            calls: Mutex::new(Vec::new()),
            artifact_sends_fail: AtomicBool::new(false),
            unreachable_chats: Mutex::new(Vec::new()),
            member: AtomicBool::new(true),
        }
    }

    /// Make every subsequent artifact send fail with `Rejected`.
    pub(crate) fn fail_artifact_sends(&self) {
        self.artifact_sends_fail.store(true, Ordering::SeqCst);
    }

    /// Make `send_message` to one chat fail with `Network`.
    pub(crate) fn fail_sends_to(&self, chat: ChatId) {
        self.unreachable_chats.lock().unwrap().push(chat);
    }

    /// Script the membership check.
    pub(crate) fn set_member(&self, member: bool) {
        self.member.store(member, Ordering::SeqCst);
    }

    /// Every call recorded so far.
    pub(crate) fn recorded(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts of `send_message` calls, in order.
    pub(crate) fn sent_texts(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Texts of `edit_message` calls, in order.
    pub(crate) fn edits(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Edited { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Texts of interaction answers, in order.
    pub(crate) fn answers(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Answered { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Artifact deliveries (video, audio, document), in order.
    pub(crate) fn deliveries(&self) -> Vec<TransportCall> {
        self.recorded()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    TransportCall::Video { .. }
                        | TransportCall::Audio { .. }
                        | TransportCall::Document { .. }
                )
            })
            .collect()
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_ref(&self) -> MessageRef {
        MessageRef(self.next_message.fetch_add(1, Ordering::SeqCst))
    }

    fn artifact_result(&self) -> Result<MessageRef, TransportError> {
        if self.artifact_sends_fail.load(Ordering::SeqCst) {
            Err(TransportError::Rejected("scripted rejection".to_string()))
        } else {
            Ok(self.next_ref())
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<MessageRef, TransportError> {
        if self.unreachable_chats.lock().unwrap().contains(&chat) {
            return Err(TransportError::Network("scripted outage".to_string()));
        }
        self.record(TransportCall::Sent {
            chat,
            text: text.to_string(),
            keyboard,
        });
        Ok(self.next_ref())
    }

    async fn edit_message(
        &self,
        _chat: ChatId,
        message: MessageRef,
        text: &str,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Edited {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        _chat: ChatId,
        message: MessageRef,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Deleted { message });
        Ok(())
    }

    async fn answer(&self, _interaction: &InteractionId, text: &str) -> Result<(), TransportError> {
        self.record(TransportCall::Answered {
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_video(
        &self,
        _chat: ChatId,
        video: OutgoingVideo,
        _progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<MessageRef, TransportError> {
        let content = std::fs::read(&video.path).unwrap_or_default();
        self.record(TransportCall::Video {
            path: video.path,
            caption: video.caption,
            streaming: video.supports_streaming,
            width: video.width,
            height: video.height,
            duration_secs: video.duration_secs,
            content,
        });
        self.artifact_result()
    }

    async fn send_audio(
        &self,
        _chat: ChatId,
        audio: OutgoingAudio,
        _progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<MessageRef, TransportError> {
        let content = std::fs::read(&audio.path).unwrap_or_default();
        self.record(TransportCall::Audio {
            path: audio.path,
            caption: audio.caption,
            duration_secs: audio.duration_secs,
            content,
        });
        self.artifact_result()
    }

    async fn send_document(
        &self,
        _chat: ChatId,
        document: OutgoingDocument,
        _progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<MessageRef, TransportError> {
        let content = std::fs::read(&document.path).unwrap_or_default();
        self.record(TransportCall::Document {
            path: document.path,
            caption: document.caption,
            content,
        });
        self.artifact_result()
    }

    async fn is_member(&self, _channel: ChannelId, _user: UserId) -> Result<bool, TransportError> {
        Ok(self.member.load(Ordering::SeqCst))
    }

    async fn invite_link(&self, _channel: ChannelId) -> Result<String, TransportError> {
        Ok("https://chat.example/join".to_string())
    }
}

/// What a scripted fetch should do.
pub(crate) enum FetchMode {
    /// Write an artifact (and optionally a thumbnail) into the working
    /// directory and report it fetched.
    Success {
        title: &'static str,
        duration_secs: u64,
        thumbnail: bool,
    },
    /// Report the source as unsupported.
    Unsupported,
    /// Fail with an arbitrary engine error.
    Fails { detail: String },
}

/// Scripted fetch engine; records every request it receives.
pub(crate) struct MockFetcher {
    mode: FetchMode,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    /// Fetch succeeds with a thumbnail and a 33 second clip.
    pub(crate) fn ok() -> Self {
        Self::with_mode(FetchMode::Success {
            title: "Clip",
            duration_secs: 33,
            thumbnail: true,
        })
    }

    /// Fetch fails as an unsupported source.
    pub(crate) fn unsupported() -> Self {
        Self::with_mode(FetchMode::Unsupported)
    }

    /// Fetch fails with the given engine detail.
    pub(crate) fn failing(detail: impl Into<String>) -> Self {
        Self::with_mode(FetchMode::Fails {
            detail: detail.into(),
        })
    }

    pub(crate) fn with_mode(mode: FetchMode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub(crate) fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        _progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<FetchedMedia, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        match &self.mode {
            FetchMode::Success {
                title,
                duration_secs,
                thumbnail,
            } => {
                let ext = match request.variant {
                    Variant::Best => "mkv",
                    Variant::Hd720 => "mp4",
                    Variant::Audio => "m4a",
                };
                let path = request.dest_dir.join(format!("{title}.{ext}"));
                tokio::fs::write(&path, b"artifact")
                    .await
                    .map_err(|e| FetchError::Failed(e.to_string()))?;

                let thumbnail = if *thumbnail {
                    let thumb = request.dest_dir.join(format!("{title}.jpg"));
                    tokio::fs::write(&thumb, b"thumbnail")
                        .await
                        .map_err(|e| FetchError::Failed(e.to_string()))?;
                    Some(thumb)
                } else {
                    None
                };

                Ok(FetchedMedia {
                    path,
                    title: title.to_string(),
                    duration_secs: *duration_secs,
                    thumbnail,
                })
            }
            FetchMode::Unsupported => Err(FetchError::Unsupported(
                "no extractor for this source".to_string(),
            )),
            FetchMode::Fails { detail } => Err(FetchError::Failed(detail.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "mock-fetcher"
    }
}

/// Scripted tagging/probing tools with call counters.
pub(crate) struct MockProcessor {
    tagging_works: bool,
    probe_info: MediaInfo,
    pub(crate) tag_calls: AtomicUsize,
    pub(crate) probe_calls: AtomicUsize,
}

impl MockProcessor {
    /// Tagging works; probing reports 1280x720 with no duration, so the
    /// pipeline falls back to the fetch-reported duration.
    pub(crate) fn new() -> Self {
        Self {
            tagging_works: true,
            probe_info: MediaInfo {
                width: 1280,
                height: 720,
                duration_secs: 0,
            },
            probe_calls: AtomicUsize::new(0),
            tag_calls: AtomicUsize::new(0),
        }
    }

    /// Tagging fails on every call.
    pub(crate) fn failing_tags() -> Self {
        Self {
            tagging_works: false,
            ..Self::new()
        }
    }

    /// Override the probe result.
    pub(crate) fn with_probe(mut self, info: MediaInfo) -> Self {
        self.probe_info = info;
        self
    }
}

#[async_trait]
impl MediaProcessor for MockProcessor {
    async fn write_tags(
        &self,
        artifact: &std::path::Path,
        _tags: &crate::config::TagConfig,
    ) -> Result<PathBuf, TagError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        if !self.tagging_works {
            return Err(TagError::Failed("tag write rejected".to_string()));
        }

        let mut side = artifact.to_path_buf();
        let stem = side
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("artifact")
            .to_string();
        let ext = side
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("bin")
            .to_string();
        side.set_file_name(format!("{stem}.tagged.{ext}"));
        tokio::fs::write(&side, b"tagged")
            .await
            .map_err(|e| TagError::Failed(e.to_string()))?;
        Ok(side)
    }

    async fn normalize_thumbnail(&self, thumbnail: &std::path::Path) -> Result<PathBuf, TagError> {
        let mut normalized = thumbnail.to_path_buf();
        let stem = normalized
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("thumbnail")
            .to_string();
        normalized.set_file_name(format!("{stem}.thumb.jpg"));
        tokio::fs::write(&normalized, b"normalized")
            .await
            .map_err(|e| TagError::Failed(e.to_string()))?;
        Ok(normalized)
    }

    async fn probe(&self, _artifact: &std::path::Path) -> Result<MediaInfo, TagError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probe_info)
    }

    fn name(&self) -> &'static str {
        "mock-processor"
    }
}

/// A relay wired to mocks, plus handles for scripting and assertions.
/// The tempdir must be kept alive for the duration of the test.
pub(crate) struct TestRelay {
    pub(crate) relay: MediaRelay,
    pub(crate) transport: Arc<MockTransport>,
    pub(crate) fetcher: Arc<MockFetcher>,
    pub(crate) processor: Arc<MockProcessor>,
    pub(crate) dir: tempfile::TempDir,
}

impl TestRelay {
    /// Submit a reference and return the job awaiting selection.
    pub(crate) async fn submit(&self, requester: UserId, chat: ChatId, url: &str) -> Job {
        self.relay
            .handle_reference(requester, chat, url)
            .await
            .unwrap()
            .expect("reference should produce a job")
    }

    /// Press a selection button as `requester`.
    pub(crate) async fn select(&self, requester: UserId, token: &str) {
        let interaction = InteractionId("interaction-1".to_string());
        self.relay
            .handle_selection(requester, &interaction, token)
            .await
            .unwrap();
    }

    /// The configured work root (parent of per-job directories).
    pub(crate) fn work_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }
}

/// Start token for `job`, as its keyboard would carry it.
pub(crate) fn start_token(variant: Variant, job: &JobId) -> String {
    format!("q|{}|{}", variant.as_token(), job)
}

/// Cancel token for `job`.
pub(crate) fn cancel_token(job: &JobId) -> String {
    format!("q|cancel|{}", job)
}

/// Helper to create a test MediaRelay instance wired to mocks, with the
/// workspace and database on a fresh tempdir.
pub(crate) async fn create_test_relay() -> TestRelay {
    create_test_relay_with(Config::default(), MockFetcher::ok(), MockProcessor::new()).await
}

/// Like [`create_test_relay`] but with a caller-supplied config and mocks.
/// The config's workspace and database paths are overridden onto the
/// tempdir.
pub(crate) async fn create_test_relay_with(
    mut config: Config,
    fetcher: MockFetcher,
    processor: MockProcessor,
) -> TestRelay {
    let dir = tempfile::tempdir().unwrap();
    config.jobs.workspace_dir = dir.path().join("work");
    config.persistence.database_path = dir.path().join("relay.db");

    let transport = Arc::new(MockTransport::new());
    let fetcher = Arc::new(fetcher);
    let processor = Arc::new(processor);

    let relay = MediaRelay::with_collaborators(
        config,
        Collaborators {
            transport: transport.clone(),
            fetcher: fetcher.clone(),
            processor: processor.clone(),
            jobs: None,
        },
    )
    .await
    .unwrap();

    TestRelay {
        relay,
        transport,
        fetcher,
        processor,
        dir,
    }
}
