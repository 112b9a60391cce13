//! Messaging transport abstraction
//!
//! The relay never talks to a chat service directly; it goes through
//! the [`Transport`] trait. Embedders wire in a concrete client
//! (Telegram, Matrix, a test double) and the relay stays independent of
//! any one messaging SDK.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::types::{ChannelId, ChatId, InteractionId, MessageRef, TransferUpdate, UserId};

/// One button on an inline keyboard
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    /// Text shown on the button
    pub label: String,
    /// What pressing the button does
    pub action: ButtonAction,
}

impl Button {
    /// Build a callback button carrying an opaque token
    pub fn callback(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(token.into()),
        }
    }

    /// Build a button that opens an external link
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// What a button press does
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    /// Deliver an opaque token back through a button interaction
    Callback(String),
    /// Open an external link in the requester's client
    Url(String),
}

/// Rows of buttons attached to a message
pub type Keyboard = Vec<Vec<Button>>;

/// A video artifact ready for delivery
#[derive(Clone, Debug)]
pub struct OutgoingVideo {
    /// Artifact on disk
    pub path: PathBuf,
    /// Caption shown under the video
    pub caption: String,
    /// Normalized thumbnail, when one was produced
    pub thumbnail: Option<PathBuf>,
    /// Playback length in seconds
    pub duration_secs: u32,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Request in-client streaming playback where the transport
    /// supports it
    pub supports_streaming: bool,
}

/// An audio artifact ready for delivery
#[derive(Clone, Debug)]
pub struct OutgoingAudio {
    /// Artifact on disk
    pub path: PathBuf,
    /// Caption shown under the audio
    pub caption: String,
    /// Normalized thumbnail, when one was produced
    pub thumbnail: Option<PathBuf>,
    /// Playback length in seconds
    pub duration_secs: u32,
}

/// An artifact delivered as an opaque file
#[derive(Clone, Debug)]
pub struct OutgoingDocument {
    /// Artifact on disk
    pub path: PathBuf,
    /// Caption shown under the document
    pub caption: String,
    /// Normalized thumbnail, when one was produced
    pub thumbnail: Option<PathBuf>,
}

/// Messaging service operations the relay depends on
///
/// Artifact sends accept an optional progress channel. Implementations
/// should report upload progress with `try_send` so a lagging reporter
/// drops samples instead of stalling the transfer.
///
/// # Errors
///
/// Methods return [`TransportError`]: `Rejected` for sends the service
/// refused, `TooLarge` when an artifact exceeds the service's size cap,
/// and `Network` for connectivity failures.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message, optionally with an inline keyboard
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<MessageRef, TransportError>;

    /// Replace the text of a previously sent message
    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Delete a previously sent message
    async fn delete_message(&self, chat: ChatId, message: MessageRef)
    -> Result<(), TransportError>;

    /// Acknowledge a button interaction with a short notice
    ///
    /// Shown as a transient toast in most clients; used for rejections
    /// that do not warrant a message of their own.
    async fn answer(&self, interaction: &InteractionId, text: &str) -> Result<(), TransportError>;

    /// Deliver a video artifact
    async fn send_video(
        &self,
        chat: ChatId,
        video: OutgoingVideo,
        progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<MessageRef, TransportError>;

    /// Deliver an audio artifact
    async fn send_audio(
        &self,
        chat: ChatId,
        audio: OutgoingAudio,
        progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<MessageRef, TransportError>;

    /// Deliver an artifact as an opaque file, bypassing transcoding
    async fn send_document(
        &self,
        chat: ChatId,
        document: OutgoingDocument,
        progress: Option<mpsc::Sender<TransferUpdate>>,
    ) -> Result<MessageRef, TransportError>;

    /// Whether a user is a member of a channel
    async fn is_member(&self, channel: ChannelId, user: UserId) -> Result<bool, TransportError>;

    /// Obtain an invite link for a channel
    async fn invite_link(&self, channel: ChannelId) -> Result<String, TransportError>;
}
