//! Access gate: ban list and channel membership checks
//!
//! The gate sits in front of intake and job starts. It deliberately
//! degrades to *allow* whenever a check itself fails; a flaky lookup
//! must not lock every requester out of the relay.

use std::sync::Arc;

use crate::config::GateConfig;
use crate::db::Database;
use crate::error::AdmissionError;
use crate::transport::Transport;
use crate::types::UserId;

/// Decides whether a requester may use the relay
pub struct Gate {
    config: GateConfig,
    db: Arc<Database>,
    transport: Arc<dyn Transport>,
}

impl Gate {
    /// Create a gate over the given roster and transport
    pub fn new(config: GateConfig, db: Arc<Database>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            db,
            transport,
        }
    }

    /// Check whether `user` is admitted
    ///
    /// Administrators pass unconditionally. Everyone else is checked
    /// against the ban list, then against the required channel's
    /// membership when one is configured. [`AdmissionError::MustJoin`]
    /// carries an invite link when the transport could produce one.
    pub async fn admit(&self, user: UserId) -> Result<(), AdmissionError> {
        if self.config.is_admin(user) {
            return Ok(());
        }

        match self.db.is_banned(user).await {
            Ok(true) => return Err(AdmissionError::Banned),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(user = user.0, error = %e, "Ban lookup failed, allowing");
            }
        }

        let Some(channel) = self.config.required_channel else {
            return Ok(());
        };

        match self.transport.is_member(channel, user).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                let invite = match self.transport.invite_link(channel).await {
                    Ok(link) => link,
                    Err(e) => {
                        tracing::warn!(user = user.0, error = %e, "Invite link unavailable, allowing");
                        return Ok(());
                    }
                };
                Err(AdmissionError::MustJoin {
                    invite: Some(invite),
                })
            }
            Err(e) => {
                tracing::warn!(user = user.0, error = %e, "Membership check failed, allowing");
                Ok(())
            }
        }
    }
}
