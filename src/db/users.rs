//! User roster operations: first contact, bans, broadcast recipients.

use crate::error::DatabaseError;
use crate::types::UserId;
use crate::{Error, Result};

use super::{Database, UserRow};

impl Database {
    /// Record first contact with a user
    ///
    /// Idempotent: a user already on the roster is left untouched, so
    /// the original `first_seen` timestamp and ban flag survive
    /// repeated contact.
    pub async fn record_user(&self, user: UserId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT OR IGNORE INTO users (user_id, first_seen) VALUES (?, ?)")
            .bind(user.0)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record user: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Whether a user is banned
    ///
    /// Users the roster has never seen are not banned.
    pub async fn is_banned(&self, user: UserId) -> Result<bool> {
        let banned: Option<i32> = sqlx::query_scalar("SELECT banned FROM users WHERE user_id = ?")
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query ban flag: {}",
                    e
                )))
            })?;

        Ok(banned.is_some_and(|flag| flag != 0))
    }

    /// Ban a user
    ///
    /// Creates the roster entry if the user was never seen, so a ban
    /// issued ahead of first contact still sticks.
    pub async fn ban_user(&self, user: UserId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, first_seen, banned)
            VALUES (?, ?, 1)
            ON CONFLICT(user_id) DO UPDATE SET banned = 1
            "#,
        )
        .bind(user.0)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to ban user: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Lift a ban; a no-op for unknown users
    pub async fn unban_user(&self, user: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET banned = 0 WHERE user_id = ?")
            .bind(user.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to unban user: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// All roster entries, oldest first
    pub async fn list_users(&self) -> Result<Vec<UserRow>> {
        let users = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, first_seen, banned FROM users ORDER BY first_seen ASC, user_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list users: {}",
                e
            )))
        })?;

        Ok(users)
    }

    /// Number of roster entries
    pub async fn user_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count users: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
