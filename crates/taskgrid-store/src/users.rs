//! CRUD operations for [`User`] records.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use taskgrid_shared::{User, UserFlags};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::rows::{now, time_at, ts, uuid_at};

const USER_COLUMNS: &str = "id, email, name, is_admin, email_verified, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Register a new user. Emails are unique, compared case-insensitively.
    ///
    /// `password_hash` is a PHC string from [`crate::password::hash_password`].
    pub fn create_user(&self, email: &str, name: &str, password_hash: &str) -> Result<User> {
        let email = email.trim();
        if self.find_user_by_email(email)?.is_some() {
            return Err(StoreError::Conflict(format!("email already registered: {email}")));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.trim().to_string(),
            flags: UserFlags::default(),
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO users (id, email, name, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.email,
                user.name,
                password_hash,
                ts(user.created_at),
            ],
        )?;

        tracing::debug!(user = %user.id, "user created");
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found)
    }

    pub fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .optional()?)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email.trim()],
                row_to_user,
            )
            .optional()?)
    }

    /// The user registered under `email` together with their stored password
    /// hash, for verification outside the store lock.
    pub fn login_record(&self, email: &str) -> Result<Option<(User, String)>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                params![email.trim()],
                |row| Ok((row_to_user(row)?, row.get(6)?)),
            )
            .optional()?)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_user_name(&self, id: Uuid, name: &str) -> Result<User> {
        let affected = self.conn().execute(
            "UPDATE users SET name = ?2 WHERE id = ?1",
            params![id.to_string(), name.trim()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a user. Owned lists, their tasks, every share held by the user
    /// and their sessions go with it.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        flags: UserFlags {
            is_admin: row.get(3)?,
            email_verified: row.get(4)?,
        },
        created_at: time_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::{hash_password, verify_password};

    #[test]
    fn test_create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(" ada@example.com ", "Ada", "unused-hash").unwrap();
        assert_eq!(user.email, "ada@example.com");

        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched, user);

        let by_email = db.find_user_by_email("ADA@example.com").unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("ada@example.com", "Ada", "unused-hash").unwrap();
        let err = db
            .create_user("Ada@Example.com", "Other", "unused-hash")
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_login_record() {
        let db = Database::open_in_memory().unwrap();
        let hash = hash_password("unused-hash").unwrap();
        let user = db.create_user("ada@example.com", "Ada", &hash).unwrap();

        let (found, stored) = db.login_record("ADA@example.com").unwrap().unwrap();
        assert_eq!(found, user);
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("nope", &stored));
        assert!(db.login_record("bob@example.com").unwrap().is_none());
    }

    #[test]
    fn test_get_missing_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user(Uuid::new_v4()), Err(StoreError::NotFound)));
        assert!(db.find_user(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_name() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ada@example.com", "Ada", "unused-hash").unwrap();
        let updated = db.update_user_name(user.id, "Ada L.").unwrap();
        assert_eq!(updated.name, "Ada L.");
    }
}
