//! Opaque bearer sessions.

use chrono::Duration;
use rand::RngCore;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use taskgrid_shared::User;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{now, ts};

impl Database {
    /// Issue a new random session token for `user_id`, valid for `ttl`.
    pub fn create_session(&self, user_id: Uuid, ttl: Duration) -> Result<String> {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);

        let issued_at = now();
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::InvalidInput(format!("session lifetime {ttl} out of range")))?;
        self.conn().execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token,
                user_id.to_string(),
                ts(issued_at),
                ts(expires_at),
            ],
        )?;
        Ok(token)
    }

    /// Resolve a token to its user. Unknown and expired tokens yield `None`.
    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let user_id: Option<String> = self
            .conn()
            .query_row(
                "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
                params![token, ts(now())],
                |row| row.get(0),
            )
            .optional()?;

        match user_id {
            Some(id) => self.find_user(Uuid::parse_str(&id)?),
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![ts(now())],
        )?;
        Ok(affected)
    }
}
