//! Background service starters: abandonment sweeper and keep-alive
//! endpoint.

use tokio::time::MissedTickBehavior;

use crate::keepalive;
use crate::types::Event;

use super::MediaRelay;

/// Text swapped into a selection prompt once the job expires.
const EXPIRED_NOTICE: &str = "This request expired. Send the link again to start over.";

impl MediaRelay {
    /// Start the interval task that discards jobs abandoned at the
    /// selection prompt.
    ///
    /// Swept prompts are edited to an expired notice (best effort) and
    /// each discard emits [`Event::JobExpired`]. The task ends when the
    /// relay's shutdown token is cancelled.
    pub fn spawn_expiry_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let relay = self.clone();
        let sweep_interval = self.config.jobs.sweep_interval;
        let abandonment = self.config.jobs.abandonment;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = relay.state.shutdown.cancelled() => break,
                }

                let swept = relay
                    .state
                    .jobs
                    .sweep_expired(std::time::Instant::now(), abandonment)
                    .await;
                for job in swept {
                    tracing::info!(job_id = %job.id, source = %job.source, "Job expired unselected");
                    if let Some(prompt) = job.prompt {
                        if let Err(e) = relay
                            .transport
                            .edit_message(job.chat, prompt, EXPIRED_NOTICE)
                            .await
                        {
                            tracing::debug!(job_id = %job.id, error = %e, "Expired prompt not edited");
                        }
                    }
                    relay.emit_event(Event::JobExpired { id: job.id });
                }
            }
        });

        tracing::info!("Expiry sweeper background task started");
        handle
    }

    /// Start the keep-alive HTTP listener and, when configured, its
    /// self-ping loop. Both end when the shutdown token is cancelled.
    pub fn spawn_keepalive(&self) -> tokio::task::JoinHandle<()> {
        let config = self.config.keepalive.clone();
        if !config.enabled {
            tracing::info!("Keepalive disabled, skipping liveness endpoint");
            return tokio::spawn(async {});
        }

        let shutdown = self.state.shutdown.clone();
        if config.self_ping {
            let pinger_config = config.clone();
            let pinger_shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = keepalive::self_ping_loop(pinger_config) => {}
                    _ = pinger_shutdown.cancelled() => {}
                }
            });
        }

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = keepalive::start_keepalive_server(&config) => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Keepalive server exited");
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        });

        tracing::info!("Keepalive background task started");
        handle
    }
}
