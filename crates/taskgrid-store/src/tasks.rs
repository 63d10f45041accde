//! CRUD operations for [`Task`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use taskgrid_shared::{Priority, Task, TaskStatus};

use crate::database::Database;
use crate::error::{not_found, Result};
use crate::rows::{enum_at, now, opt_time_at, time_at, ts, uuid_at};
use crate::shares::ShareTarget;

pub(crate) const TASK_COLUMNS: &str =
    "id, list_id, name, description, status, priority, favorite, due_date, created_at, updated_at";

/// Fields for a task being created.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub favorite: bool,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A partial update. `None` leaves a field alone; for the nullable fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub favorite: Option<bool>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskUpdate {
    fn apply(self, task: &mut Task) {
        if let Some(name) = self.name {
            task.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(favorite) = self.favorite {
            task.favorite = favorite;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_task(&self, list_id: Uuid, new: &NewTask) -> Result<Task> {
        let at = now();
        let task = Task {
            id: Uuid::new_v4(),
            list_id,
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            status: new.status,
            priority: new.priority,
            favorite: new.favorite,
            due_date: new.due_date,
            created_at: at,
            updated_at: at,
            shares: Vec::new(),
        };

        self.conn().execute(
            "INSERT INTO tasks (id, list_id, name, description, status, priority, favorite,
                                due_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id.to_string(),
                task.list_id.to_string(),
                task.name,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.favorite,
                task.due_date.map(ts),
                ts(task.created_at),
                ts(task.updated_at),
            ],
        )?;

        tracing::debug!(task = %task.id, list = %list_id, "task created");
        Ok(task)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a task together with its direct shares.
    pub fn get_task(&self, id: Uuid) -> Result<Task> {
        let mut task = self
            .conn()
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.to_string()],
                row_to_task,
            )
            .map_err(not_found)?;
        task.shares = self.shares_for(ShareTarget::Task(id))?;
        Ok(task)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_task(&self, id: Uuid, update: TaskUpdate) -> Result<Task> {
        let mut task = self.get_task(id)?;
        update.apply(&mut task);
        task.updated_at = now();

        self.conn().execute(
            "UPDATE tasks
             SET name = ?2, description = ?3, status = ?4, priority = ?5,
                 favorite = ?6, due_date = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                id.to_string(),
                task.name,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.favorite,
                task.due_date.map(ts),
                ts(task.updated_at),
            ],
        )?;
        Ok(task)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    pub fn delete_task(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with [`TASK_COLUMNS`]. Shares are loaded separately.
pub(crate) fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: uuid_at(row, 0)?,
        list_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: enum_at(row, 4)?,
        priority: enum_at(row, 5)?,
        favorite: row.get(6)?,
        due_date: opt_time_at(row, 7)?,
        created_at: time_at(row, 8)?,
        updated_at: time_at(row, 9)?,
        shares: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use chrono::TimeZone;

    fn setup() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("owner@example.com", "Owner", "unused-hash").unwrap();
        let list = db.create_list(owner.id, "Chores", None).unwrap();
        (db, list.id)
    }

    #[test]
    fn test_create_and_get() {
        let (db, list_id) = setup();
        let due = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let new = NewTask {
            name: "Mow lawn".into(),
            priority: Priority::High,
            due_date: Some(due),
            ..Default::default()
        };

        let task = db.create_task(list_id, &new).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(db.get_task(task.id).unwrap(), task);
    }

    #[test]
    fn test_partial_update() {
        let (db, list_id) = setup();
        let mut new = NewTask::named("Mow lawn");
        new.description = Some("front and back".into());
        let task = db.create_task(list_id, &new).unwrap();

        let updated = db
            .update_task(
                task.id,
                TaskUpdate {
                    status: Some(TaskStatus::Completed),
                    favorite: Some(true),
                    description: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Mow lawn");
        assert_eq!(updated.status, TaskStatus::Completed);
        assert!(updated.favorite);
        assert!(updated.description.is_none());
        assert_eq!(db.get_task(task.id).unwrap(), updated);
    }

    #[test]
    fn test_task_requires_existing_list() {
        let (db, _) = setup();
        let err = db
            .create_task(Uuid::new_v4(), &NewTask::named("Orphan"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn test_delete() {
        let (db, list_id) = setup();
        let task = db.create_task(list_id, &NewTask::named("Mow lawn")).unwrap();
        assert!(db.delete_task(task.id).unwrap());
        assert!(!db.delete_task(task.id).unwrap());
    }
}
