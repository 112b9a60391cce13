//! Per-user cooldown between job starts

use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::error::AdmissionError;
use crate::types::UserId;

/// Enforces a minimum wall-clock gap between job starts per requester
///
/// The timestamp is recorded at job start (variant selection), never at
/// intake, so browsing and abandoning prompts costs nothing against the
/// cooldown. Administrators pass unconditionally.
pub struct Throttle {
    cooldown: std::time::Duration,
    admins: Vec<UserId>,
    last_start: Mutex<HashMap<UserId, Instant>>,
}

impl Throttle {
    /// Create a throttle with the given cooldown window and exempt
    /// administrators
    pub fn new(cooldown: std::time::Duration, admins: Vec<UserId>) -> Self {
        Self {
            cooldown,
            admins,
            last_start: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether `requester` may start a job at `now`, and record
    /// the start if so
    ///
    /// Rejection carries the remaining wait in whole seconds, rounded
    /// up so the requester never sees "wait 0s".
    pub async fn try_start(&self, requester: UserId, now: Instant) -> Result<(), AdmissionError> {
        if self.admins.contains(&requester) {
            return Ok(());
        }

        let mut last_start = self.last_start.lock().await;
        if let Some(last) = last_start.get(&requester) {
            let elapsed = now.duration_since(*last);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(AdmissionError::RateLimited {
                    remaining_secs: remaining.as_secs_f64().ceil() as u64,
                });
            }
        }

        last_start.insert(requester, now);
        Ok(())
    }
}
