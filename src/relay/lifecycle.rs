//! Startup and shutdown coordination.

use crate::types::Event;

use super::MediaRelay;

/// How long shutdown waits for started jobs to drain before giving up.
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

impl MediaRelay {
    /// Gracefully shut down the relay
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs (intake and selection both refuse)
    /// 2. Cancels background tasks (expiry sweeper, keepalive)
    /// 3. Waits for started jobs to reach a terminal state with a
    ///    timeout (30 seconds)
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Jobs still awaiting selection are left where they are; their
    /// prompts go stale with the process.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new jobs
        self.state
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        // 2. Stop background tasks
        self.state.shutdown.cancel();

        // 3. Wait for started jobs to drain with timeout
        let wait_result =
            tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_running_jobs()).await;
        match wait_result {
            Ok(()) => {
                tracing::info!("All running jobs completed gracefully");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for jobs to complete, proceeding with shutdown");
            }
        }

        // 4. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
    }

    /// Wait until no job is past the selection prompt
    ///
    /// Helper used during shutdown; running jobs hold their own cleanup
    /// guards, so waiting is all that is needed.
    async fn wait_for_running_jobs(&self) {
        loop {
            let running = self.state.jobs.running_count().await;
            if running == 0 {
                return;
            }

            tracing::debug!(running, "Waiting for running jobs to complete");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
