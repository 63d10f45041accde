//! Accessible-entity selectors.
//!
//! Read-only projections of a [`Snapshot`] onto what the current user may
//! see. Input order is preserved; nothing is sorted here.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{List, Task};
use crate::permissions::{effective_list_permission, Snapshot};

/// Lists the user owns or holds any share on (VIEW already implies
/// visibility). Empty when no user is present.
pub fn select_accessible_lists(snapshot: &Snapshot) -> Vec<&List> {
    let Some(user_id) = snapshot.user_id() else {
        return Vec::new();
    };
    snapshot
        .lists
        .iter()
        .filter(|list| effective_list_permission(list, user_id).is_some())
        .collect()
}

/// Tasks whose parent list is accessible, plus tasks carrying a direct share
/// for the user. Tasks pointing at an unknown list are dropped either way.
pub fn select_accessible_tasks(snapshot: &Snapshot) -> Vec<&Task> {
    let Some(user_id) = snapshot.user_id() else {
        return Vec::new();
    };

    let list_visible: HashMap<Uuid, bool> = snapshot
        .lists
        .iter()
        .map(|list| (list.id, effective_list_permission(list, user_id).is_some()))
        .collect();

    snapshot
        .tasks
        .iter()
        .filter(|task| match list_visible.get(&task.list_id) {
            None => false,
            Some(true) => true,
            Some(false) => task.share_for(user_id).is_some(),
        })
        .collect()
}

/// Accessible tasks belonging to one list.
pub fn select_accessible_tasks_in_list(snapshot: &Snapshot, list_id: Uuid) -> Vec<&Task> {
    select_accessible_tasks(snapshot)
        .into_iter()
        .filter(|task| task.list_id == list_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::types::Permission;

    fn ids<T>(items: &[&T], f: impl Fn(&T) -> Uuid) -> Vec<Uuid> {
        items.iter().map(|i| f(*i)).collect()
    }

    #[test]
    fn test_accessible_lists_owned_and_shared() {
        let s = scenario(Some(user(U1)));
        let lists = select_accessible_lists(&s);
        assert_eq!(ids(&lists, |l| l.id), vec![id(L1), id(L2)]);
    }

    #[test]
    fn test_accessible_lists_preserve_order_without_duplicates() {
        let mut s = scenario(Some(user(U1)));
        // Owner who also appears in the share list must still show once.
        s.lists[0].shares.push(share(U1, Permission::Edit));
        s.lists.swap(0, 1);
        let lists = select_accessible_lists(&s);
        assert_eq!(ids(&lists, |l| l.id), vec![id(L2), id(L1)]);
    }

    #[test]
    fn test_accessible_lists_other_user() {
        let s = scenario(Some(user(U3)));
        let lists = select_accessible_lists(&s);
        assert_eq!(ids(&lists, |l| l.id), vec![id(L3)]);
    }

    #[test]
    fn test_absent_user_sees_nothing() {
        let s = scenario(None);
        assert!(select_accessible_lists(&s).is_empty());
        assert!(select_accessible_tasks(&s).is_empty());
    }

    #[test]
    fn test_direct_task_share_on_inaccessible_list() {
        let s = scenario(Some(user(U1)));
        let tasks = select_accessible_tasks(&s);
        assert!(tasks.iter().any(|t| t.id == id(T1)));
    }

    #[test]
    fn test_orphan_task_excluded_even_with_share() {
        let s = scenario(Some(user(U1)));
        let tasks = select_accessible_tasks(&s);
        assert!(tasks.iter().all(|t| t.id != id(T2)));
    }

    #[test]
    fn test_tasks_follow_list_access() {
        let mut s = scenario(Some(user(U1)));
        s.tasks.insert(0, task(T3, L1));
        s.tasks.push(task(T4, L3));
        let tasks = select_accessible_tasks(&s);
        // T4 sits in L3 without a direct share.
        assert_eq!(ids(&tasks, |t| t.id), vec![id(T3), id(T1)]);
    }

    #[test]
    fn test_tasks_in_list() {
        let mut s = scenario(Some(user(U1)));
        s.tasks.push(task(T3, L2));
        s.tasks.push(task(T4, L1));
        let tasks = select_accessible_tasks_in_list(&s, id(L2));
        assert_eq!(ids(&tasks, |t| t.id), vec![id(T3)]);
    }
}
