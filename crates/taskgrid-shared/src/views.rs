//! Task filtering, ordering, and dashboard statistics.
//!
//! These run on top of the accessible-task selector and never widen what a
//! user can see.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Task;
use crate::types::{Priority, TaskStatus};

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub favorite: Option<bool>,
    pub list_id: Option<Uuid>,
    /// Case-insensitive substring match on name and description.
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if self.favorite.is_some_and(|f| f != task.favorite) {
            return false;
        }
        if self.list_id.is_some_and(|l| l != task.list_id) {
            return false;
        }
        if let Some(needle) = self.search.as_deref().map(str::trim) {
            if !needle.is_empty() {
                let needle = needle.to_lowercase();
                let in_name = task.name.to_lowercase().contains(&needle);
                let in_desc = task
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle));
                if !in_name && !in_desc {
                    return false;
                }
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskSortKey {
    #[default]
    CreatedAt,
    DueDate,
    Priority,
    Name,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSort {
    pub key: TaskSortKey,
    pub direction: SortDirection,
}

impl TaskSort {
    pub fn new(key: TaskSortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        // Missing due dates always go last, whatever the direction.
        if self.key == TaskSortKey::DueDate {
            return match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => self.directed(x.cmp(&y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
        }

        let ord = match self.key {
            TaskSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            TaskSortKey::Priority => a.priority.cmp(&b.priority),
            TaskSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            TaskSortKey::DueDate => Ordering::Equal,
        };
        self.directed(ord)
    }

    fn directed(&self, ord: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// Filter then stably sort a task view.
pub fn apply_view<'a>(
    tasks: Vec<&'a Task>,
    filter: &TaskFilter,
    sort: Option<TaskSort>,
) -> Vec<&'a Task> {
    let mut out: Vec<&Task> = tasks.into_iter().filter(|t| filter.matches(t)).collect();
    if let Some(sort) = sort {
        out.sort_by(|a, b| sort.compare(a, b));
    }
    out
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub favorites: usize,
    pub by_priority: BTreeMap<String, usize>,
}

impl DashboardStats {
    pub fn compute(tasks: &[&Task], now: DateTime<Utc>) -> Self {
        let mut stats = DashboardStats {
            by_priority: Priority::ALL
                .iter()
                .map(|p| (p.as_str().to_string(), 0))
                .collect(),
            ..Default::default()
        };
        let today = now.date_naive();

        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
            if task.status != TaskStatus::Completed
                && task.due_date.is_some_and(|d| d.date_naive() == today)
            {
                stats.due_today += 1;
            }
            if task.favorite {
                stats.favorites += 1;
            }
            *stats
                .by_priority
                .entry(task.priority.as_str().to_string())
                .or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Vec<Task> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let mut a = task(T1, L1);
        a.name = "Write report".into();
        a.priority = Priority::High;
        a.due_date = Some(base + Duration::days(2));
        a.created_at = base;

        let mut b = task(T2, L1);
        b.name = "buy milk".into();
        b.description = Some("Oat, not dairy".into());
        b.status = TaskStatus::Completed;
        b.priority = Priority::Low;
        b.favorite = true;
        b.created_at = base + Duration::hours(1);

        let mut c = task(T3, L2);
        c.name = "Call plumber".into();
        c.status = TaskStatus::InProgress;
        c.priority = Priority::Urgent;
        c.due_date = Some(base - Duration::days(1));
        c.created_at = base + Duration::hours(2);

        vec![a, b, c]
    }

    fn names(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn test_filter_by_status_and_list() {
        let tasks = sample();
        let refs: Vec<&Task> = tasks.iter().collect();

        let filter = TaskFilter {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        assert_eq!(names(&apply_view(refs.clone(), &filter, None)), vec!["buy milk"]);

        let filter = TaskFilter {
            list_id: Some(id(L1)),
            ..Default::default()
        };
        assert_eq!(apply_view(refs, &filter, None).len(), 2);
    }

    #[test]
    fn test_search_matches_description() {
        let tasks = sample();
        let refs: Vec<&Task> = tasks.iter().collect();
        let filter = TaskFilter {
            search: Some("OAT".into()),
            ..Default::default()
        };
        assert_eq!(names(&apply_view(refs, &filter, None)), vec!["buy milk"]);
    }

    #[test]
    fn test_sort_by_priority_desc() {
        let tasks = sample();
        let refs: Vec<&Task> = tasks.iter().collect();
        let sort = TaskSort::new(TaskSortKey::Priority, SortDirection::Desc);
        let out = apply_view(refs, &TaskFilter::default(), Some(sort));
        assert_eq!(names(&out), vec!["Call plumber", "Write report", "buy milk"]);
    }

    #[test]
    fn test_sort_by_due_date_puts_undated_last() {
        let tasks = sample();
        let refs: Vec<&Task> = tasks.iter().collect();

        let asc = TaskSort::new(TaskSortKey::DueDate, SortDirection::Asc);
        let out = apply_view(refs.clone(), &TaskFilter::default(), Some(asc));
        assert_eq!(names(&out), vec!["Call plumber", "Write report", "buy milk"]);

        let desc = TaskSort::new(TaskSortKey::DueDate, SortDirection::Desc);
        let out = apply_view(refs, &TaskFilter::default(), Some(desc));
        assert_eq!(names(&out), vec!["Write report", "Call plumber", "buy milk"]);
    }

    #[test]
    fn test_no_sort_keeps_input_order() {
        let tasks = sample();
        let refs: Vec<&Task> = tasks.iter().rev().collect();
        let out = apply_view(refs, &TaskFilter::default(), None);
        assert_eq!(names(&out), vec!["Call plumber", "buy milk", "Write report"]);
    }

    #[test]
    fn test_sort_key_wire_names() {
        let key: TaskSortKey = serde_json::from_str("\"dueDate\"").unwrap();
        assert_eq!(key, TaskSortKey::DueDate);
        assert!(serde_json::from_str::<TaskSortKey>("\"due\"").is_err());
    }

    #[test]
    fn test_dashboard_stats() {
        let tasks = sample();
        let refs: Vec<&Task> = tasks.iter().collect();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
        let stats = DashboardStats::compute(&refs, now);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_today, 0);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.by_priority["URGENT"], 1);
        assert_eq!(stats.by_priority["MEDIUM"], 0);
    }
}
