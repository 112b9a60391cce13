//! Job registry: the authoritative record of in-flight jobs
//!
//! The relay owns one [`JobStore`] and consults it for every transition.
//! The default [`MemoryJobStore`] keeps jobs in a mutex-guarded map;
//! jobs are short-lived and reconstructible from user input, so they do
//! not survive restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::JobError;
use crate::types::{ChatId, Job, JobId, JobState, MessageRef, UserId, Variant};

/// Storage abstraction for tracked jobs
///
/// All methods take `&self`; implementations guard their state
/// internally. No method holds a lock across an await point into
/// collaborator code.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a fresh job in `awaiting_selection` and insert it
    async fn create(&self, source: String, requester: UserId, chat: ChatId) -> Job;

    /// Look up a job by id
    async fn get(&self, id: &JobId) -> Option<Job>;

    /// Record the variant-selection prompt message for later tidying
    async fn set_prompt(&self, id: &JobId, prompt: MessageRef) -> Result<(), JobError>;

    /// The one-shot `awaiting_selection -> fetching` transition
    ///
    /// Records the chosen variant exactly once. Returns the updated job.
    /// Fails with [`JobError::InvalidState`] when the job already left
    /// `awaiting_selection`, which is how a second button press on the
    /// same keyboard is rejected.
    async fn begin(&self, id: &JobId, variant: Variant) -> Result<Job, JobError>;

    /// Pipeline-internal stage transition
    async fn set_state(&self, id: &JobId, state: JobState) -> Result<(), JobError>;

    /// Drop a job from the registry; idempotent
    async fn remove(&self, id: &JobId);

    /// Remove jobs still `awaiting_selection` older than `bound`
    ///
    /// Returns the removed jobs so the caller can tidy their prompt
    /// messages.
    async fn sweep_expired(&self, now: Instant, bound: Duration) -> Vec<Job>;

    /// Find an existing `awaiting_selection` job for the same requester
    /// and source reference
    async fn find_awaiting(&self, requester: UserId, source: &str) -> Option<Job>;

    /// Number of jobs past `awaiting_selection`, used for shutdown
    /// draining
    async fn running_count(&self) -> usize;
}

/// In-memory [`JobStore`] backed by a mutex-guarded map
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, source: String, requester: UserId, chat: ChatId) -> Job {
        let job = Job::new(source, requester, chat);
        let mut jobs = self.jobs.lock().await;
        jobs.insert(job.id.clone(), job.clone());
        job
    }

    async fn get(&self, id: &JobId) -> Option<Job> {
        let jobs = self.jobs.lock().await;
        jobs.get(id).cloned()
    }

    async fn set_prompt(&self, id: &JobId, prompt: MessageRef) -> Result<(), JobError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound {
            id: id.to_string(),
        })?;
        job.prompt = Some(prompt);
        Ok(())
    }

    async fn begin(&self, id: &JobId, variant: Variant) -> Result<Job, JobError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound {
            id: id.to_string(),
        })?;

        if job.state != JobState::AwaitingSelection {
            return Err(JobError::InvalidState {
                id: id.to_string(),
                operation: "begin".to_string(),
                current_state: job.state.to_string(),
            });
        }

        job.variant = Some(variant);
        job.state = JobState::Fetching;
        Ok(job.clone())
    }

    async fn set_state(&self, id: &JobId, state: JobState) -> Result<(), JobError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(id).ok_or_else(|| JobError::NotFound {
            id: id.to_string(),
        })?;
        job.state = state;
        Ok(())
    }

    async fn remove(&self, id: &JobId) {
        let mut jobs = self.jobs.lock().await;
        jobs.remove(id);
    }

    async fn sweep_expired(&self, now: Instant, bound: Duration) -> Vec<Job> {
        let mut jobs = self.jobs.lock().await;
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|job| {
                job.state == JobState::AwaitingSelection
                    && now.duration_since(job.created_at) >= bound
            })
            .map(|job| job.id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| jobs.remove(id))
            .collect()
    }

    async fn find_awaiting(&self, requester: UserId, source: &str) -> Option<Job> {
        let jobs = self.jobs.lock().await;
        jobs.values()
            .find(|job| {
                job.state == JobState::AwaitingSelection
                    && job.requester == requester
                    && job.source == source
            })
            .cloned()
    }

    async fn running_count(&self) -> usize {
        let jobs = self.jobs.lock().await;
        jobs.values()
            .filter(|job| job.state != JobState::AwaitingSelection && !job.state.is_terminal())
            .count()
    }
}
