//! Per-user snapshot loading for permission resolution.

use std::collections::HashMap;

use rusqlite::params;
use uuid::Uuid;

use taskgrid_shared::{List, Share, Snapshot, Task};

use crate::database::Database;
use crate::error::Result;
use crate::lists::{row_to_list, LIST_COLUMNS};
use crate::rows::{enum_at, uuid_at};
use crate::tasks::{row_to_task, TASK_COLUMNS};

/// Lists relevant to ?1: owned, shared, or parenting a task shared with ?1.
const RELEVANT_LISTS: &str = "
    SELECT id FROM lists WHERE owner_id = ?1
    UNION
    SELECT list_id FROM list_shares WHERE user_id = ?1
    UNION
    SELECT t.list_id FROM tasks t JOIN task_shares ts ON ts.task_id = t.id WHERE ts.user_id = ?1";

impl Database {
    /// Everything the resolver needs to answer questions for `user_id`.
    ///
    /// The snapshot holds every list the user owns or is shared on, every
    /// list parenting a task shared with the user, and all tasks of those
    /// lists, each with their shares, in creation order. The selectors do
    /// the actual visibility filtering. An unknown user gets an empty
    /// snapshot.
    pub fn load_snapshot(&self, user_id: Uuid) -> Result<Snapshot> {
        let Some(user) = self.find_user(user_id)? else {
            return Ok(Snapshot::default());
        };
        let uid = user_id.to_string();

        let mut lists: Vec<List> = {
            let mut stmt = self.conn().prepare(&format!(
                "SELECT {LIST_COLUMNS} FROM lists
                 WHERE id IN ({RELEVANT_LISTS})
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![uid], row_to_list)?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut tasks: Vec<Task> = {
            let mut stmt = self.conn().prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE list_id IN ({RELEVANT_LISTS})
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![uid], row_to_task)?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut list_shares = self.grouped_shares(&format!(
            "SELECT s.list_id, s.id, s.user_id, s.permission FROM list_shares s
             WHERE s.list_id IN ({RELEVANT_LISTS})
             ORDER BY s.created_at ASC, s.rowid ASC"
        ), &uid)?;
        for list in &mut lists {
            list.shares = list_shares.remove(&list.id).unwrap_or_default();
        }

        let mut task_shares = self.grouped_shares(&format!(
            "SELECT s.task_id, s.id, s.user_id, s.permission FROM task_shares s
             JOIN tasks t ON t.id = s.task_id
             WHERE t.list_id IN ({RELEVANT_LISTS})
             ORDER BY s.created_at ASC, s.rowid ASC"
        ), &uid)?;
        for task in &mut tasks {
            task.shares = task_shares.remove(&task.id).unwrap_or_default();
        }

        tracing::trace!(
            user = %user_id,
            lists = lists.len(),
            tasks = tasks.len(),
            "snapshot loaded"
        );
        Ok(Snapshot::new(Some(user), lists, tasks))
    }

    /// Run a `(owner_id, share_id, user_id, permission)` query and group the
    /// shares by owner id.
    fn grouped_shares(&self, sql: &str, user_id: &str) -> Result<HashMap<Uuid, Vec<Share>>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                uuid_at(row, 0)?,
                Share {
                    id: uuid_at(row, 1)?,
                    user_id: uuid_at(row, 2)?,
                    permission: enum_at(row, 3)?,
                },
            ))
        })?;

        let mut grouped: HashMap<Uuid, Vec<Share>> = HashMap::new();
        for row in rows {
            let (owner, share) = row?;
            grouped.entry(owner).or_default().push(share);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::ShareTarget;
    use crate::tasks::NewTask;
    use taskgrid_shared::permissions::{can_access, is_owner};
    use taskgrid_shared::selectors::{select_accessible_lists, select_accessible_tasks};
    use taskgrid_shared::Permission;

    #[test]
    fn test_snapshot_for_unknown_user_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let snap = db.load_snapshot(Uuid::new_v4()).unwrap();
        assert!(snap.current_user.is_none());
        assert!(select_accessible_lists(&snap).is_empty());
    }

    #[test]
    fn test_snapshot_feeds_selectors() {
        let db = Database::open_in_memory().unwrap();
        let u1 = db.create_user("u1@example.com", "U1", "unused-hash").unwrap();
        let u2 = db.create_user("u2@example.com", "U2", "unused-hash").unwrap();
        let u3 = db.create_user("u3@example.com", "U3", "unused-hash").unwrap();

        let l1 = db.create_list(u1.id, "L1", None).unwrap();
        let l2 = db.create_list(u2.id, "L2", None).unwrap();
        let l3 = db.create_list(u3.id, "L3", None).unwrap();
        let l4 = db.create_list(u3.id, "L4", None).unwrap();
        db.upsert_share(ShareTarget::List(l2.id), u1.id, Permission::View)
            .unwrap();

        let t_own = db.create_task(l1.id, &NewTask::named("own")).unwrap();
        let t_shared_list = db.create_task(l2.id, &NewTask::named("via list")).unwrap();
        let t_direct = db.create_task(l3.id, &NewTask::named("direct")).unwrap();
        let _t_hidden = db.create_task(l3.id, &NewTask::named("hidden")).unwrap();
        let _t_other = db.create_task(l4.id, &NewTask::named("other")).unwrap();
        db.upsert_share(ShareTarget::Task(t_direct.id), u1.id, Permission::View)
            .unwrap();

        let snap = db.load_snapshot(u1.id).unwrap();

        // L4 has nothing for U1, so it is not loaded at all.
        assert_eq!(
            snap.lists.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![l1.id, l2.id, l3.id]
        );

        let lists: Vec<Uuid> = select_accessible_lists(&snap).iter().map(|l| l.id).collect();
        assert_eq!(lists, vec![l1.id, l2.id]);

        let tasks: Vec<Uuid> = select_accessible_tasks(&snap).iter().map(|t| t.id).collect();
        assert_eq!(tasks, vec![t_own.id, t_shared_list.id, t_direct.id]);

        assert!(is_owner(&snap, l1.id));
        assert!(can_access(&snap, l2.id, Permission::View));
        assert!(!can_access(&snap, l2.id, Permission::Edit));
        assert!(!can_access(&snap, l3.id, Permission::View));
    }
}
