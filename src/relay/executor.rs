//! The per-job pipeline: fetch, tag, normalize, probe, transmit.
//!
//! [`MediaRelay::execute`] drives one started job from `Fetching` to a
//! terminal state. Fetch and transmit failures are terminal; tagging,
//! thumbnail normalization, and probing degrade without failing the job.
//! Every exit path after the workspace exists flows through the single
//! [`Workspace::release`] epilogue, so the working directory and the
//! registry entry never outlive the job.

use std::path::Path;

use crate::config::TagConfig;
use crate::error::Error;
use crate::fetch::{FetchRequest, FetchedMedia};
use crate::ffmpeg::MediaInfo;
use crate::transport::{OutgoingAudio, OutgoingDocument, OutgoingVideo};
use crate::types::{ChatId, Event, Job, JobId, JobState, MessageRef, Variant};
use crate::utils;

use super::workspace::Workspace;
use super::MediaRelay;

impl MediaRelay {
    /// Run a started job to a terminal state.
    ///
    /// The caller has already claimed the `AwaitingSelection -> Fetching`
    /// transition through the registry, so this method owns the job
    /// outright. It does not return errors; every failure ends in the
    /// `Failed` status edit and the shared cleanup epilogue.
    pub(crate) async fn execute(&self, job: Job, variant: Variant) {
        if let Some(prompt) = job.prompt {
            if let Err(e) = self.transport.delete_message(job.chat, prompt).await {
                tracing::debug!(job_id = %job.id, error = %e, "Prompt not deleted");
            }
        }

        let status = match self
            .transport
            .send_message(job.chat, "Starting...", Vec::new())
            .await
        {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Could not send status message");
                self.state.jobs.remove(&job.id).await;
                return;
            }
        };

        let _permit = match self.state.fetch_slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.edit_status(job.chat, status, "Waiting for a free download slot...")
                    .await;
                match self.state.fetch_slots.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        self.edit_status(job.chat, status, &Error::ShuttingDown.user_message())
                            .await;
                        self.state.jobs.remove(&job.id).await;
                        return;
                    }
                }
            }
        };

        let workspace = match Workspace::create(
            self.config.workspace_dir(),
            &job.id,
            self.state.jobs.clone(),
        )
        .await
        {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Could not create working directory");
                self.edit_status(job.chat, status, "Failed: could not create working directory")
                    .await;
                self.emit_event(Event::JobFailed {
                    id: job.id.clone(),
                    error: e.to_string(),
                });
                self.state.jobs.remove(&job.id).await;
                return;
            }
        };

        match self.run_stages(&job, variant, workspace.dir(), status).await {
            Ok(title) => {
                if let Err(e) = self
                    .state
                    .jobs
                    .set_state(&job.id, JobState::Completed)
                    .await
                {
                    tracing::debug!(job_id = %job.id, error = %e, "Completed state not recorded");
                }
                self.edit_status(job.chat, status, "Done.").await;
                self.emit_event(Event::JobCompleted {
                    id: job.id.clone(),
                    title: title.clone(),
                });
                tracing::info!(job_id = %job.id, title = %title, "Job completed");
            }
            Err(detail) => self.fail_job(&job, status, &detail).await,
        }

        workspace.release().await;
    }

    /// Fetch, post-process, and transmit. Returns the delivered title, or
    /// the failure detail for the status message.
    async fn run_stages(
        &self,
        job: &Job,
        variant: Variant,
        work_dir: &Path,
        status: MessageRef,
    ) -> Result<String, String> {
        self.set_stage(&job.id, JobState::Fetching).await;
        self.edit_status(job.chat, status, "Downloading...").await;

        let request = self.fetch_request(job, variant, work_dir);
        let (progress, reporter) = self.spawn_progress_reporter(job.chat, status, "Downloading...");
        let outcome = self.tools.fetcher.fetch(&request, Some(progress)).await;
        reporter.await.ok();
        let fetched = outcome.map_err(|e| e.to_string())?;

        let FetchedMedia {
            path: artifact,
            title,
            duration_secs,
            thumbnail,
        } = fetched;
        tracing::info!(
            job_id = %job.id,
            title = %title,
            artifact = %artifact.display(),
            "Fetch finished"
        );

        self.set_stage(&job.id, JobState::PostProcessing).await;
        let audio = variant == Variant::Audio;
        if !audio && !self.config.tags.is_empty() {
            self.edit_status(job.chat, status, "Writing tags...").await;
            self.apply_tags(&job.id, &artifact).await;
        }
        let thumbnail = self.normalized_thumbnail(&job.id, thumbnail).await;

        self.set_stage(&job.id, JobState::Transmitting).await;
        self.edit_status(job.chat, status, "Uploading...").await;

        let info = if audio {
            MediaInfo {
                width: 0,
                height: 0,
                duration_secs,
            }
        } else {
            self.probe_with_fallback(&job.id, &artifact, duration_secs)
                .await
        };
        let caption = caption_for(&title, &self.config.tags);
        let duration = u32::try_from(info.duration_secs).unwrap_or(u32::MAX);

        let (progress, reporter) = self.spawn_progress_reporter(job.chat, status, "Uploading...");
        let sent = match variant {
            Variant::Audio => {
                let payload = OutgoingAudio {
                    path: artifact,
                    caption,
                    thumbnail,
                    duration_secs: duration,
                };
                self.transport
                    .send_audio(job.chat, payload, Some(progress))
                    .await
            }
            Variant::Hd720 => {
                let payload = OutgoingVideo {
                    path: artifact,
                    caption,
                    thumbnail,
                    duration_secs: duration,
                    width: info.width,
                    height: info.height,
                    supports_streaming: true,
                };
                self.transport
                    .send_video(job.chat, payload, Some(progress))
                    .await
            }
            Variant::Best => {
                let payload = OutgoingDocument {
                    path: artifact,
                    caption,
                    thumbnail,
                };
                self.transport
                    .send_document(job.chat, payload, Some(progress))
                    .await
            }
        };
        reporter.await.ok();
        sent.map_err(|e| e.to_string())?;

        Ok(title)
    }

    /// Rewrite container tags through a side file, swapping it in only
    /// when it was produced. Failures keep the untagged artifact.
    async fn apply_tags(&self, id: &JobId, artifact: &Path) {
        match self.tools.processor.write_tags(artifact, &self.config.tags).await {
            Ok(side_file) => match tokio::fs::rename(&side_file, artifact).await {
                Ok(()) => tracing::debug!(job_id = %id, "Tags written"),
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "Tag swap failed, keeping untagged artifact");
                }
            },
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Tagging failed, keeping untagged artifact");
            }
        }
    }

    /// Re-encode the fetched thumbnail for transport preview use. Sends
    /// proceed without one when normalization fails.
    async fn normalized_thumbnail(
        &self,
        id: &JobId,
        thumbnail: Option<std::path::PathBuf>,
    ) -> Option<std::path::PathBuf> {
        let raw = thumbnail?;
        match self.tools.processor.normalize_thumbnail(&raw).await {
            Ok(normalized) => Some(normalized),
            Err(e) => {
                tracing::debug!(job_id = %id, error = %e, "Thumbnail normalization failed");
                None
            }
        }
    }

    /// Probe artifact dimensions and duration, falling back to the
    /// fetch-reported duration when the probe fails or reports zero.
    async fn probe_with_fallback(
        &self,
        id: &JobId,
        artifact: &Path,
        fetched_duration: u64,
    ) -> MediaInfo {
        match self.tools.processor.probe(artifact).await {
            Ok(mut info) => {
                if info.duration_secs == 0 {
                    info.duration_secs = fetched_duration;
                }
                info
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Probe failed, using fetch-reported duration");
                MediaInfo {
                    width: 0,
                    height: 0,
                    duration_secs: fetched_duration,
                }
            }
        }
    }

    /// Mark the job failed and replace the status message with a
    /// truncated diagnostic.
    async fn fail_job(&self, job: &Job, status: MessageRef, detail: &str) {
        if let Err(e) = self.state.jobs.set_state(&job.id, JobState::Failed).await {
            tracing::debug!(job_id = %job.id, error = %e, "Failed state not recorded");
        }
        let preview = utils::truncate_chars(detail, utils::ERROR_PREVIEW_CHARS);
        self.edit_status(job.chat, status, &format!("Failed: {preview}"))
            .await;
        self.emit_event(Event::JobFailed {
            id: job.id.clone(),
            error: preview.to_string(),
        });
        tracing::warn!(job_id = %job.id, error = %detail, "Job failed");
    }

    /// Record a stage transition and announce it to event subscribers.
    async fn set_stage(&self, id: &JobId, state: JobState) {
        if let Err(e) = self.state.jobs.set_state(id, state).await {
            tracing::debug!(job_id = %id, error = %e, "Stage not recorded");
        }
        self.emit_event(Event::StageChanged {
            id: id.clone(),
            state,
        });
    }

    /// Edit the status message, swallowing transport failures; progress
    /// text is advisory.
    pub(crate) async fn edit_status(&self, chat: ChatId, status: MessageRef, text: &str) {
        if let Err(e) = self.transport.edit_message(chat, status, text).await {
            tracing::debug!(error = %e, "Status edit failed");
        }
    }

    fn fetch_request(&self, job: &Job, variant: Variant, work_dir: &Path) -> FetchRequest {
        let fetch = &self.config.fetch;
        FetchRequest {
            source: job.source.clone(),
            variant,
            dest_dir: work_dir.to_path_buf(),
            output_template: fetch.output_template.clone(),
            cookie_file: fetch.cookie_file.clone(),
            user_agent: fetch.user_agent.clone(),
            referer: fetch.referer.clone(),
            socket_timeout: fetch.socket_timeout,
            max_retries: fetch.retries,
            check_certificates: fetch.check_certificates,
        }
    }
}

/// Delivery caption: the fetched title, with the configured author line
/// under it when one is set.
fn caption_for(title: &str, tags: &TagConfig) -> String {
    match &tags.author {
        Some(author) => format!("{title}\n{author}"),
        None => title.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn caption_includes_author_line_when_configured() {
        let tags = TagConfig {
            title: None,
            author: Some("Relay".to_string()),
        };

        assert_eq!(caption_for("Clip", &tags), "Clip\nRelay");
    }

    #[test]
    fn caption_is_bare_title_without_author() {
        assert_eq!(caption_for("Clip", &TagConfig::default()), "Clip");
    }
}
