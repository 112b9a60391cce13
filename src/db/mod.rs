//! Database layer for media-dl
//!
//! Handles SQLite persistence for the user roster. Jobs themselves are
//! deliberately not persisted; they are short-lived and the requester
//! can always resubmit a link.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`users`]: User roster (first contact, bans, broadcast recipients)

use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod users;

/// User record from database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    /// Transport-level user id
    pub user_id: i64,
    /// Unix timestamp of first contact
    pub first_seen: i64,
    /// Whether the user is banned (0 = no, 1 = yes)
    pub banned: i32,
}

/// Database handle for media-dl
pub struct Database {
    pool: SqlitePool,
}
