//! Request intake: greeting, reference extraction, job creation, and the
//! variant-selection prompt.

use std::sync::atomic::Ordering;

use crate::error::{AdmissionError, Error, Result};
use crate::transport::{Button, Keyboard};
use crate::types::{ChatId, Event, Job, JobId, SelectionToken, UserId, Variant};
use crate::utils;

use super::MediaRelay;

/// Greeting shown on first contact.
const GREETING: &str =
    "Hi! Send me a link to a video and I'll download it for you.\n\n\
     You'll get quality options to pick from, including audio only.";

impl MediaRelay {
    /// Greet a requester and record them in the roster.
    ///
    /// The gate runs here too, so banned or unjoined users learn their
    /// standing at first contact instead of at their first reference.
    pub async fn handle_start(&self, requester: UserId, chat: ChatId) -> Result<()> {
        if let Err(e) = self.db.record_user(requester).await {
            tracing::warn!(user = requester.0, error = %e, "Failed to record user");
        }

        if let Err(denial) = self.admission.gate.admit(requester).await {
            self.deliver_denial(chat, denial).await?;
            return Ok(());
        }

        self.transport
            .send_message(chat, GREETING, Vec::new())
            .await?;
        Ok(())
    }

    /// Take a submitted reference through admission, deduplication, job
    /// creation, and the variant-selection prompt.
    ///
    /// Returns the created (or re-presented) job when a prompt was sent,
    /// `None` when the request was rejected with a notice instead.
    pub async fn handle_reference(
        &self,
        requester: UserId,
        chat: ChatId,
        text: &str,
    ) -> Result<Option<Job>> {
        if !self.state.accepting_new.load(Ordering::SeqCst) {
            self.transport
                .send_message(chat, &Error::ShuttingDown.user_message(), Vec::new())
                .await?;
            return Ok(None);
        }

        if let Err(e) = self.db.record_user(requester).await {
            tracing::warn!(user = requester.0, error = %e, "Failed to record user");
        }

        if let Err(denial) = self.admission.gate.admit(requester).await {
            tracing::info!(user = requester.0, denial = %denial, "Request denied");
            self.deliver_denial(chat, denial).await?;
            return Ok(None);
        }

        let Some(url) = utils::extract_url(text) else {
            self.transport
                .send_message(
                    chat,
                    &Error::InvalidReference(text.to_string()).user_message(),
                    Vec::new(),
                )
                .await?;
            return Ok(None);
        };
        let source = url.to_string();

        // A repeated submission of a link still awaiting selection
        // re-presents the existing prompt instead of creating a twin job.
        if let Some(existing) = self.state.jobs.find_awaiting(requester, &source).await {
            tracing::debug!(job_id = %existing.id, user = requester.0, "Re-presenting pending job");
            let job = self.present_prompt(existing).await?;
            return Ok(Some(job));
        }

        let job = self.state.jobs.create(source, requester, chat).await;
        self.emit_event(Event::JobCreated {
            id: job.id.clone(),
            requester,
        });
        tracing::info!(job_id = %job.id, user = requester.0, "Job created");

        let job = self.present_prompt(job).await?;
        Ok(Some(job))
    }

    /// Send (or re-send) the variant-selection keyboard for `job` and
    /// store the prompt reference for later tidying.
    async fn present_prompt(&self, job: Job) -> Result<Job> {
        let prompt = self
            .transport
            .send_message(job.chat, &self.prompt_text(), selection_keyboard(&job.id))
            .await?;

        if let Some(stale) = job.prompt {
            if let Err(e) = self.transport.delete_message(job.chat, stale).await {
                tracing::debug!(job_id = %job.id, error = %e, "Stale prompt not deleted");
            }
        }

        self.state.jobs.set_prompt(&job.id, prompt).await?;
        Ok(Job {
            prompt: Some(prompt),
            ..job
        })
    }

    /// Deliver a gate denial, with a join button when an invite link is
    /// available.
    async fn deliver_denial(&self, chat: ChatId, denial: AdmissionError) -> Result<()> {
        let keyboard: Keyboard = match &denial {
            AdmissionError::MustJoin {
                invite: Some(link),
            } => vec![vec![Button::url("Join channel", link.clone())]],
            _ => Vec::new(),
        };
        let notice = Error::from(denial).user_message();
        self.transport.send_message(chat, &notice, keyboard).await?;
        Ok(())
    }

    fn prompt_text(&self) -> String {
        let cookies = if self.cookies_active() {
            "Cookies: active"
        } else {
            "Cookies: none (restricted sources may fail)"
        };
        format!("Choose a download option:\n\n{}", cookies)
    }

    fn cookies_active(&self) -> bool {
        self.config
            .fetch
            .cookie_file
            .as_deref()
            .is_some_and(|path| path.exists())
    }
}

/// One row per variant plus a cancel row, each button carrying the
/// job-scoped selection token.
pub(crate) fn selection_keyboard(id: &JobId) -> Keyboard {
    let mut rows: Keyboard = Variant::ALL
        .iter()
        .map(|variant| {
            vec![Button::callback(
                variant.label(),
                SelectionToken::Start {
                    variant: *variant,
                    job: id.clone(),
                }
                .to_string(),
            )]
        })
        .collect();
    rows.push(vec![Button::callback(
        "Cancel",
        SelectionToken::Cancel { job: id.clone() }.to_string(),
    )]);
    rows
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transport::ButtonAction;

    #[test]
    fn selection_keyboard_has_a_row_per_variant_plus_cancel() {
        let id = JobId::generate();
        let keyboard = selection_keyboard(&id);

        assert_eq!(keyboard.len(), Variant::ALL.len() + 1);
        for (row, variant) in keyboard.iter().zip(Variant::ALL.iter()) {
            assert_eq!(row.len(), 1);
            assert_eq!(row[0].label, variant.label());
            match &row[0].action {
                ButtonAction::Callback(token) => {
                    assert_eq!(token, &format!("q|{}|{}", variant.as_token(), id));
                }
                other => panic!("expected callback action, got {other:?}"),
            }
        }
    }

    #[test]
    fn selection_keyboard_cancel_row_carries_cancel_token() {
        let id = JobId::generate();
        let keyboard = selection_keyboard(&id);

        let cancel = &keyboard[keyboard.len() - 1][0];
        assert_eq!(cancel.label, "Cancel");
        match &cancel.action {
            ButtonAction::Callback(token) => assert_eq!(token, &format!("q|cancel|{}", id)),
            other => panic!("expected callback action, got {other:?}"),
        }
    }
}
