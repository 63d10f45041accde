//! Permission resolution over an in-memory snapshot.
//!
//! Every function here is a read-only predicate over a [`Snapshot`]. Unknown
//! users, lists and tasks resolve to "no access" rather than an error, and
//! nothing is cached: each call re-scans the relevant collection.

use uuid::Uuid;

use crate::models::{List, Task, User};
use crate::types::Permission;

/// The entity collections visible to one viewer at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// `None` when the viewer is not authenticated.
    pub current_user: Option<User>,
    pub lists: Vec<List>,
    pub tasks: Vec<Task>,
}

impl Snapshot {
    pub fn new(current_user: Option<User>, lists: Vec<List>, tasks: Vec<Task>) -> Self {
        Self {
            current_user,
            lists,
            tasks,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.current_user.as_ref().map(|u| u.id)
    }

    pub fn list(&self, list_id: Uuid) -> Option<&List> {
        self.lists.iter().find(|l| l.id == list_id)
    }

    pub fn task(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// True iff the list exists and the current user owns it.
pub fn is_owner(snapshot: &Snapshot, list_id: Uuid) -> bool {
    let Some(user_id) = snapshot.user_id() else {
        return false;
    };
    snapshot
        .list(list_id)
        .is_some_and(|list| list.owner_id == user_id)
}

/// Effective level the current user holds on a list. Owners hold `Admin`.
pub fn list_permission(snapshot: &Snapshot, list_id: Uuid) -> Option<Permission> {
    let user_id = snapshot.user_id()?;
    let list = snapshot.list(list_id)?;
    effective_list_permission(list, user_id)
}

/// True if the user owns the list or holds a share of at least `required`.
pub fn can_access(snapshot: &Snapshot, list_id: Uuid, required: Permission) -> bool {
    list_permission(snapshot, list_id).is_some_and(|held| held.satisfies(required))
}

/// Effective level on a task: the higher of the parent list level and any
/// direct task share. Tasks whose list is unknown have no level at all.
pub fn task_permission(snapshot: &Snapshot, task_id: Uuid) -> Option<Permission> {
    let user_id = snapshot.user_id()?;
    let task = snapshot.task(task_id)?;
    let list = snapshot.list(task.list_id)?;
    effective_task_permission(list, task, user_id)
}

pub fn can_access_task(snapshot: &Snapshot, task_id: Uuid, required: Permission) -> bool {
    task_permission(snapshot, task_id).is_some_and(|held| held.satisfies(required))
}

pub(crate) fn effective_list_permission(list: &List, user_id: Uuid) -> Option<Permission> {
    if list.owner_id == user_id {
        return Some(Permission::Admin);
    }
    list.share_for(user_id).map(|s| s.permission)
}

pub(crate) fn effective_task_permission(
    list: &List,
    task: &Task,
    user_id: Uuid,
) -> Option<Permission> {
    let via_list = effective_list_permission(list, user_id);
    let direct = task.share_for(user_id).map(|s| s.permission);
    via_list.max(direct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn test_is_owner() {
        let s = scenario(Some(user(U1)));
        assert!(is_owner(&s, id(L1)));
        assert!(!is_owner(&s, id(L2)));
        assert!(!is_owner(&s, id(L3)));

        let s = scenario(Some(user(U2)));
        assert!(!is_owner(&s, id(L1)));
        assert!(is_owner(&s, id(L2)));
    }

    #[test]
    fn test_is_owner_unknown_list() {
        let s = scenario(Some(user(U1)));
        assert!(!is_owner(&s, Uuid::new_v4()));
    }

    #[test]
    fn test_owner_satisfies_every_level() {
        let s = scenario(Some(user(U1)));
        assert!(can_access(&s, id(L1), Permission::View));
        assert!(can_access(&s, id(L1), Permission::Edit));
        assert!(can_access(&s, id(L1), Permission::Admin));
        assert_eq!(list_permission(&s, id(L1)), Some(Permission::Admin));
    }

    #[test]
    fn test_view_share_does_not_grant_edit() {
        let s = scenario(Some(user(U1)));
        assert!(can_access(&s, id(L2), Permission::View));
        assert!(!can_access(&s, id(L2), Permission::Edit));
        assert!(!can_access(&s, id(L2), Permission::Admin));
    }

    #[test]
    fn test_share_levels_follow_total_order() {
        for held in [Permission::View, Permission::Edit, Permission::Admin] {
            let mut s = scenario(Some(user(U1)));
            s.lists[2].shares.push(share(U1, held));
            for required in [Permission::View, Permission::Edit, Permission::Admin] {
                assert_eq!(
                    can_access(&s, id(L3), required),
                    required <= held,
                    "held {held}, required {required}"
                );
            }
        }
    }

    #[test]
    fn test_no_share_no_access() {
        let s = scenario(Some(user(U1)));
        assert!(!can_access(&s, id(L3), Permission::View));
        assert_eq!(list_permission(&s, id(L3)), None);
    }

    #[test]
    fn test_absent_user() {
        let s = scenario(None);
        assert!(!is_owner(&s, id(L1)));
        assert!(!can_access(&s, id(L1), Permission::View));
        assert!(!can_access_task(&s, id(T1), Permission::View));
    }

    #[test]
    fn test_task_share_on_inaccessible_list() {
        let s = scenario(Some(user(U1)));
        assert_eq!(task_permission(&s, id(T1)), Some(Permission::View));
        assert!(can_access_task(&s, id(T1), Permission::View));
        assert!(!can_access_task(&s, id(T1), Permission::Edit));
    }

    #[test]
    fn test_orphan_task_has_no_permission() {
        let s = scenario(Some(user(U1)));
        assert_eq!(task_permission(&s, id(T2)), None);
    }

    #[test]
    fn test_task_permission_takes_more_permissive_grant() {
        let mut s = scenario(Some(user(U1)));
        // L2 grants VIEW; a direct EDIT on the task wins.
        let mut t = task(T3, L2);
        t.shares.push(share(U1, Permission::Edit));
        s.tasks.push(t);
        assert_eq!(task_permission(&s, id(T3)), Some(Permission::Edit));

        // The other way round: list ADMIN beats a task VIEW.
        s.lists[1].shares[0].permission = Permission::Admin;
        s.tasks[2].shares[0].permission = Permission::View;
        assert_eq!(task_permission(&s, id(T3)), Some(Permission::Admin));
    }
}
