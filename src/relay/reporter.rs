//! Per-transfer progress reporting onto the status message.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::progress;
use crate::transport::Transport;
use crate::types::{ChatId, MessageRef, TransferUpdate};

use super::MediaRelay;

/// Capacity of the raw byte-counter channel. Producers use `try_send`, so
/// overflow drops samples instead of stalling the transfer.
const CHANNEL_CAPACITY: usize = 64;

impl MediaRelay {
    /// Spawn a reporter that turns raw `(transferred, total)` updates into
    /// rate-limited edits of the status message.
    ///
    /// The task ends when every sender clone is dropped. Unchanged
    /// renders are skipped so the transport never sees a no-op edit.
    pub(crate) fn spawn_progress_reporter(
        &self,
        chat: ChatId,
        status: MessageRef,
        label: &'static str,
    ) -> (mpsc::Sender<TransferUpdate>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let transport = self.transport.clone();
        let handle = tokio::spawn(run_reporter(transport, chat, status, label, rx));
        (tx, handle)
    }
}

async fn run_reporter(
    transport: Arc<dyn Transport>,
    chat: ChatId,
    status: MessageRef,
    label: &'static str,
    mut updates: mpsc::Receiver<TransferUpdate>,
) {
    let started = Instant::now();
    let mut last_render = String::new();

    while let Some(update) = updates.recv().await {
        let elapsed = started.elapsed();
        if !progress::should_render(update.transferred, update.total, elapsed) {
            continue;
        }
        let text = progress::render(update.transferred, update.total, elapsed, label);
        if text == last_render {
            continue;
        }
        if let Err(e) = transport.edit_message(chat, status, &text).await {
            tracing::debug!(error = %e, "Progress edit failed");
        }
        last_render = text;
    }
}
