//! CRUD operations for [`List`] records.

use rusqlite::params;
use uuid::Uuid;

use taskgrid_shared::List;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::rows::{now, time_at, ts, uuid_at};
use crate::shares::ShareTarget;

pub(crate) const LIST_COLUMNS: &str = "id, name, description, owner_id, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_list(&self, owner_id: Uuid, name: &str, description: Option<&str>) -> Result<List> {
        let at = now();
        let list = List {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description: description.map(str::to_string),
            owner_id,
            created_at: at,
            updated_at: at,
            shares: Vec::new(),
        };

        self.conn().execute(
            "INSERT INTO lists (id, name, description, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                list.id.to_string(),
                list.name,
                list.description,
                list.owner_id.to_string(),
                ts(list.created_at),
                ts(list.updated_at),
            ],
        )?;

        tracing::debug!(list = %list.id, owner = %owner_id, "list created");
        Ok(list)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a list together with its shares.
    pub fn get_list(&self, id: Uuid) -> Result<List> {
        let mut list = self
            .conn()
            .query_row(
                &format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?1"),
                params![id.to_string()],
                row_to_list,
            )
            .map_err(not_found)?;
        list.shares = self.shares_for(ShareTarget::List(id))?;
        Ok(list)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Rename and/or re-describe a list. `description: Some(None)` clears it.
    pub fn update_list(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<Option<&str>>,
    ) -> Result<List> {
        let current = self.get_list(id)?;
        let name = name.map(str::trim).unwrap_or(&current.name);
        let description = match description {
            Some(d) => d.map(str::to_string),
            None => current.description.clone(),
        };

        self.conn().execute(
            "UPDATE lists SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
            params![id.to_string(), name, description, ts(now())],
        )?;
        self.get_list(id)
    }

    /// Bump `updated_at`, e.g. after its shares change.
    pub fn touch_list(&self, id: Uuid) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE lists SET updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), ts(now())],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a list with its tasks and every share on either.
    pub fn delete_list(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM lists WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with [`LIST_COLUMNS`]. Shares are loaded separately.
pub(crate) fn row_to_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<List> {
    Ok(List {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner_id: uuid_at(row, 3)?,
        created_at: time_at(row, 4)?,
        updated_at: time_at(row, 5)?,
        shares: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::NewTask;
    use taskgrid_shared::Permission;

    #[test]
    fn test_create_get_update() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("owner@example.com", "Owner", "unused-hash").unwrap();

        let list = db.create_list(owner.id, "  Groceries ", Some("weekly")).unwrap();
        assert_eq!(list.name, "Groceries");
        assert_eq!(db.get_list(list.id).unwrap(), list);

        let renamed = db.update_list(list.id, Some("Shopping"), None).unwrap();
        assert_eq!(renamed.name, "Shopping");
        assert_eq!(renamed.description.as_deref(), Some("weekly"));
        assert!(renamed.updated_at >= list.updated_at);

        let cleared = db.update_list(list.id, None, Some(None)).unwrap();
        assert_eq!(cleared.name, "Shopping");
        assert!(cleared.description.is_none());
    }

    #[test]
    fn test_delete_cascades_tasks_and_shares() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("owner@example.com", "Owner", "unused-hash").unwrap();
        let guest = db.create_user("guest@example.com", "Guest", "unused-hash").unwrap();
        let list = db.create_list(owner.id, "Groceries", None).unwrap();
        let task = db.create_task(list.id, &NewTask::named("Milk")).unwrap();
        db.upsert_share(ShareTarget::List(list.id), guest.id, Permission::Edit)
            .unwrap();
        db.upsert_share(ShareTarget::Task(task.id), guest.id, Permission::View)
            .unwrap();

        assert!(db.delete_list(list.id).unwrap());
        assert!(matches!(db.get_task(task.id), Err(StoreError::NotFound)));
        assert!(db.shares_for(ShareTarget::List(list.id)).unwrap().is_empty());
        assert!(db.shares_for(ShareTarget::Task(task.id)).unwrap().is_empty());
    }

    #[test]
    fn test_deleting_owner_deletes_lists() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("owner@example.com", "Owner", "unused-hash").unwrap();
        let list = db.create_list(owner.id, "Groceries", None).unwrap();

        db.delete_user(owner.id).unwrap();
        assert!(matches!(db.get_list(list.id), Err(StoreError::NotFound)));
    }
}
