//! Per-user notification inbox.

use rusqlite::params;
use uuid::Uuid;

use taskgrid_shared::{Notification, NotificationKind};

use crate::database::Database;
use crate::error::Result;
use crate::rows::{enum_at, now, opt_uuid_at, time_at, ts, uuid_at};

impl Database {
    pub fn create_notification(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message: &str,
        list_id: Option<Uuid>,
        task_id: Option<Uuid>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind,
            message: message.to_string(),
            read: false,
            list_id,
            task_id,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO notifications (id, user_id, kind, message, read, list_id, task_id, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
            params![
                notification.id.to_string(),
                user_id.to_string(),
                kind.as_str(),
                notification.message,
                list_id.map(|id| id.to_string()),
                task_id.map(|id| id.to_string()),
                ts(notification.created_at),
            ],
        )?;
        Ok(notification)
    }

    /// A user's notifications, newest first.
    pub fn list_notifications(&self, user_id: Uuid, limit: usize) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, kind, message, read, list_id, task_id, created_at
             FROM notifications
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            params![user_id.to_string(), limit as i64],
            row_to_notification,
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Mark one of `user_id`'s notifications read. Returns `false` if the
    /// notification does not exist or belongs to someone else.
    pub fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn unread_notification_count(&self, user_id: Uuid) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        kind: enum_at(row, 2)?,
        message: row.get(3)?,
        read: row.get(4)?,
        list_id: opt_uuid_at(row, 5)?,
        task_id: opt_uuid_at(row, 6)?,
        created_at: time_at(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_order_and_read() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ada@example.com", "Ada", "unused-hash").unwrap();
        let other = db.create_user("bob@example.com", "Bob", "unused-hash").unwrap();

        let first = db
            .create_notification(user.id, NotificationKind::ListShared, "first", None, None)
            .unwrap();
        let second = db
            .create_notification(user.id, NotificationKind::TaskShared, "second", None, None)
            .unwrap();

        let inbox = db.list_notifications(user.id, 50).unwrap();
        assert_eq!(
            inbox.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(db.unread_notification_count(user.id).unwrap(), 2);

        assert!(!db.mark_notification_read(first.id, other.id).unwrap());
        assert!(db.mark_notification_read(first.id, user.id).unwrap());
        assert_eq!(db.unread_notification_count(user.id).unwrap(), 1);
    }

    #[test]
    fn test_list_reference_cleared_on_delete() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("owner@example.com", "Owner", "unused-hash").unwrap();
        let guest = db.create_user("guest@example.com", "Guest", "unused-hash").unwrap();
        let list = db.create_list(owner.id, "Groceries", None).unwrap();

        db.create_notification(
            guest.id,
            NotificationKind::ListShared,
            "shared",
            Some(list.id),
            None,
        )
        .unwrap();
        db.delete_list(list.id).unwrap();

        let inbox = db.list_notifications(guest.id, 10).unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].list_id.is_none());
    }
}
