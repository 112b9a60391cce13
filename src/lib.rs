//! # media-dl
//!
//! Backend library for media fetch-and-deliver messaging bots.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Transport-agnostic** - Any messaging service can front the relay via the [`Transport`] trait
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! A requester sends a link, picks a quality variant from a button
//! prompt, and receives the fetched artifact back through the same
//! transport, with progress edits along the way. Fetching shells out to
//! yt-dlp and tagging to the ffmpeg family, both behind traits so tests
//! can swap in mocks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_dl::{Config, MediaRelay, Transport};
//!
//! # fn connect() -> Arc<dyn Transport> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport: Arc<dyn Transport> = connect();
//!     let relay = MediaRelay::new(Config::default(), transport).await?;
//!
//!     // Subscribe to events
//!     let mut events = relay.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Background services
//!     relay.spawn_expiry_sweeper();
//!     relay.spawn_keepalive();
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer (user roster)
pub mod db;
/// Error types
pub mod error;
/// Media fetch engine (yt-dlp subprocess)
pub mod fetch;
/// Container tagging, thumbnail normalization, and probing (ffmpeg family)
pub mod ffmpeg;
/// Access gate: bans and channel membership
pub mod gate;
/// Keep-alive HTTP endpoint
pub mod keepalive;
/// Progress bar rendering
pub mod progress;
/// In-memory job registry
pub mod registry;
/// Core relay implementation (decomposed into focused submodules)
pub mod relay;
/// Per-user cooldown throttle
pub mod throttle;
/// Messaging transport abstraction
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, GateConfig, KeepaliveConfig, TagConfig};
pub use db::Database;
pub use error::{
    AdmissionError, DatabaseError, Error, FetchError, JobError, Result, TagError, TransportError,
};
pub use fetch::{CliMediaFetcher, FetchRequest, FetchedMedia, MediaFetcher};
pub use ffmpeg::{CliMediaProcessor, MediaInfo, MediaProcessor};
pub use registry::{JobStore, MemoryJobStore};
pub use relay::{Collaborators, MediaRelay};
pub use transport::{Button, Keyboard, OutgoingAudio, OutgoingDocument, OutgoingVideo, Transport};
pub use types::{
    BroadcastReport, ChannelId, ChatId, Event, InteractionId, Job, JobId, JobState, MessageRef,
    TransferUpdate, UserId, Variant,
};

/// Helper function to run the relay with graceful signal handling.
///
/// Waits for a termination signal and then calls the relay's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use media_dl::{Config, MediaRelay, Transport, run_with_shutdown};
///
/// # fn connect() -> Arc<dyn Transport> { unimplemented!() }
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let relay = MediaRelay::new(Config::default(), connect()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(relay).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(relay: MediaRelay) {
    wait_for_signal().await;
    relay.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
