//! Administrative operations: bans, roster broadcast, stats.

use crate::error::{AdmissionError, Result};
use crate::types::{BroadcastReport, ChatId, Event, UserId};

use super::MediaRelay;

impl MediaRelay {
    fn require_admin(&self, acting: UserId) -> Result<()> {
        if self.config.gate.is_admin(acting) {
            Ok(())
        } else {
            tracing::debug!(user = acting.0, "Administrative call by non-admin");
            Err(AdmissionError::NotAdmin.into())
        }
    }

    /// Ban `target` from the service, persisting the flag.
    ///
    /// Admin-only; `acting` must appear in the configured administrator
    /// list. A ban sticks even when `target` has never been seen.
    pub async fn ban_user(&self, acting: UserId, target: UserId) -> Result<()> {
        self.require_admin(acting)?;
        self.db.ban_user(target).await?;
        self.emit_event(Event::UserBanned { user: target });
        tracing::info!(user = target.0, admin = acting.0, "User banned");
        Ok(())
    }

    /// Lift a ban on `target`. Admin-only.
    pub async fn unban_user(&self, acting: UserId, target: UserId) -> Result<()> {
        self.require_admin(acting)?;
        self.db.unban_user(target).await?;
        self.emit_event(Event::UserUnbanned { user: target });
        tracing::info!(user = target.0, admin = acting.0, "User unbanned");
        Ok(())
    }

    /// Send `text` to every recorded user, one direct message at a time.
    ///
    /// Admin-only. Individual delivery failures are logged and counted
    /// without aborting the fan-out; the returned report carries the
    /// attempted, delivered, and failed totals.
    pub async fn broadcast(&self, acting: UserId, text: &str) -> Result<BroadcastReport> {
        self.require_admin(acting)?;

        let users = self.db.list_users().await?;
        let mut report = BroadcastReport {
            attempted: 0,
            delivered: 0,
            failed: 0,
        };
        for row in users {
            report.attempted += 1;
            match self
                .transport
                .send_message(ChatId(row.user_id), text, Vec::new())
                .await
            {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(user = row.user_id, error = %e, "Broadcast delivery failed");
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast finished"
        );
        self.emit_event(Event::BroadcastFinished { report });
        Ok(report)
    }

    /// Number of users the relay has recorded.
    pub async fn user_count(&self) -> Result<i64> {
        self.db.user_count().await
    }
}
