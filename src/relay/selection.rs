//! Variant selection and cancellation from prompt button presses.

use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::error::{Error, JobError, Result};
use crate::types::{Event, InteractionId, Job, JobState, SelectionToken, UserId, Variant};

use super::MediaRelay;

impl MediaRelay {
    /// Resolve a button press on a selection prompt.
    ///
    /// Boundary rejections (bad token, unknown job, ownership mismatch,
    /// cooldown) answer the interaction with a short notice and leave the
    /// job untouched. A start selection consumes the prompt and drives
    /// the pipeline to a terminal state before returning; callers that
    /// need to keep serving other interactions should spawn this handler.
    pub async fn handle_selection(
        &self,
        requester: UserId,
        interaction: &InteractionId,
        token: &str,
    ) -> Result<()> {
        let token = match token.parse::<SelectionToken>() {
            Ok(token) => token,
            Err(e) => {
                self.answer_notice(interaction, &Error::from(e).user_message())
                    .await;
                return Ok(());
            }
        };
        let (job_id, chosen) = match token {
            SelectionToken::Start { variant, job } => (job, Some(variant)),
            SelectionToken::Cancel { job } => (job, None),
        };

        let Some(job) = self.state.jobs.get(&job_id).await else {
            let gone = JobError::NotFound {
                id: job_id.as_str().to_string(),
            };
            self.answer_notice(interaction, &Error::from(gone).user_message())
                .await;
            return Ok(());
        };

        if job.requester != requester {
            tracing::debug!(job_id = %job.id, user = requester.0, "Selection by non-owner");
            let not_yours = JobError::NotYours {
                id: job.id.as_str().to_string(),
            };
            self.answer_notice(interaction, &Error::from(not_yours).user_message())
                .await;
            return Ok(());
        }

        match chosen {
            Some(variant) => self.start_job(job, variant, interaction).await,
            None => self.cancel_job(job, interaction).await,
        }
    }

    /// Discard a job that has not started yet, tidying its prompt.
    async fn cancel_job(&self, job: Job, interaction: &InteractionId) -> Result<()> {
        if job.state != JobState::AwaitingSelection {
            let started = JobError::InvalidState {
                id: job.id.as_str().to_string(),
                operation: "cancel".to_string(),
                current_state: job.state.as_str().to_string(),
            };
            self.answer_notice(interaction, &Error::from(started).user_message())
                .await;
            return Ok(());
        }

        self.state.jobs.remove(&job.id).await;
        if let Some(prompt) = job.prompt {
            if let Err(e) = self.transport.delete_message(job.chat, prompt).await {
                tracing::debug!(job_id = %job.id, error = %e, "Prompt not deleted on cancel");
            }
        }
        self.answer_notice(interaction, "Cancelled.").await;
        self.emit_event(Event::JobCancelled { id: job.id.clone() });
        tracing::info!(job_id = %job.id, "Job cancelled");
        Ok(())
    }

    /// Apply the cooldown, claim the one-shot start transition, and run
    /// the pipeline.
    async fn start_job(
        &self,
        job: Job,
        variant: Variant,
        interaction: &InteractionId,
    ) -> Result<()> {
        if !self.state.accepting_new.load(Ordering::SeqCst) {
            self.answer_notice(interaction, &Error::ShuttingDown.user_message())
                .await;
            return Ok(());
        }

        if let Err(denial) = self
            .admission
            .throttle
            .try_start(job.requester, Instant::now())
            .await
        {
            self.answer_notice(interaction, &Error::from(denial).user_message())
                .await;
            return Ok(());
        }

        let job = match self.state.jobs.begin(&job.id, variant).await {
            Ok(job) => job,
            Err(e) => {
                self.answer_notice(interaction, &Error::from(e).user_message())
                    .await;
                return Ok(());
            }
        };

        self.answer_notice(interaction, "Starting download...").await;
        self.emit_event(Event::JobStarted {
            id: job.id.clone(),
            variant,
        });
        tracing::info!(job_id = %job.id, variant = variant.as_token(), "Variant selected");

        self.execute(job, variant).await;
        Ok(())
    }

    /// Answer a button interaction, swallowing transport failures; a lost
    /// toast is not worth failing the handler.
    pub(crate) async fn answer_notice(&self, interaction: &InteractionId, text: &str) {
        if let Err(e) = self.transport.answer(interaction, text).await {
            tracing::debug!(error = %e, "Interaction answer failed");
        }
    }
}
