//! Share records on lists and tasks.
//!
//! A user holds at most one share per list and one per task; granting again
//! replaces the level.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use taskgrid_shared::{Permission, Share};

use crate::database::Database;
use crate::error::Result;
use crate::rows::{enum_at, now, ts, uuid_at};

/// Which table a share lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareTarget {
    List(Uuid),
    Task(Uuid),
}

impl ShareTarget {
    fn table(self) -> &'static str {
        match self {
            ShareTarget::List(_) => "list_shares",
            ShareTarget::Task(_) => "task_shares",
        }
    }

    fn column(self) -> &'static str {
        match self {
            ShareTarget::List(_) => "list_id",
            ShareTarget::Task(_) => "task_id",
        }
    }

    fn id(self) -> Uuid {
        match self {
            ShareTarget::List(id) | ShareTarget::Task(id) => id,
        }
    }
}

impl Database {
    /// Grant `permission` to `user_id`, replacing any existing level.
    pub fn upsert_share(
        &self,
        target: ShareTarget,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<Share> {
        let (table, column) = (target.table(), target.column());
        self.conn().execute(
            &format!(
                "INSERT INTO {table} (id, {column}, user_id, permission, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT ({column}, user_id) DO UPDATE SET permission = excluded.permission"
            ),
            params![
                Uuid::new_v4().to_string(),
                target.id().to_string(),
                user_id.to_string(),
                permission.as_str(),
                ts(now()),
            ],
        )?;

        let share = self.find_share(target, user_id)?;
        share.ok_or(crate::StoreError::NotFound)
    }

    pub fn find_share(&self, target: ShareTarget, user_id: Uuid) -> Result<Option<Share>> {
        let (table, column) = (target.table(), target.column());
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT id, user_id, permission FROM {table}
                     WHERE {column} = ?1 AND user_id = ?2"
                ),
                params![target.id().to_string(), user_id.to_string()],
                row_to_share,
            )
            .optional()?)
    }

    /// All shares on one list or task, oldest first.
    pub fn shares_for(&self, target: ShareTarget) -> Result<Vec<Share>> {
        let (table, column) = (target.table(), target.column());
        let mut stmt = self.conn().prepare(&format!(
            "SELECT id, user_id, permission FROM {table}
             WHERE {column} = ?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![target.id().to_string()], row_to_share)?;

        let mut shares = Vec::new();
        for row in rows {
            shares.push(row?);
        }
        Ok(shares)
    }

    /// Revoke a share. Returns `true` if one existed.
    pub fn remove_share(&self, target: ShareTarget, user_id: Uuid) -> Result<bool> {
        let (table, column) = (target.table(), target.column());
        let affected = self.conn().execute(
            &format!("DELETE FROM {table} WHERE {column} = ?1 AND user_id = ?2"),
            params![target.id().to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_share(row: &rusqlite::Row<'_>) -> rusqlite::Result<Share> {
    Ok(Share {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        permission: enum_at(row, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_level() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("owner@example.com", "Owner", "unused-hash").unwrap();
        let guest = db.create_user("guest@example.com", "Guest", "unused-hash").unwrap();
        let list = db.create_list(owner.id, "Groceries", None).unwrap();
        let target = ShareTarget::List(list.id);

        let first = db.upsert_share(target, guest.id, Permission::View).unwrap();
        let second = db.upsert_share(target, guest.id, Permission::Admin).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.permission, Permission::Admin);
        assert_eq!(db.shares_for(target).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_share() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("owner@example.com", "Owner", "unused-hash").unwrap();
        let guest = db.create_user("guest@example.com", "Guest", "unused-hash").unwrap();
        let list = db.create_list(owner.id, "Groceries", None).unwrap();
        let target = ShareTarget::List(list.id);

        db.upsert_share(target, guest.id, Permission::Edit).unwrap();
        assert!(db.remove_share(target, guest.id).unwrap());
        assert!(!db.remove_share(target, guest.id).unwrap());
        assert!(db.find_share(target, guest.id).unwrap().is_none());
    }
}
