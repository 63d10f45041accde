//! Fixture builders for unit tests.

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::models::{List, Share, Task, User, UserFlags};
use crate::permissions::Snapshot;
use crate::types::{Permission, Priority, TaskStatus};

pub const U1: u128 = 0x01;
pub const U2: u128 = 0x02;
pub const U3: u128 = 0x03;

pub const L1: u128 = 0x11;
pub const L2: u128 = 0x12;
pub const L3: u128 = 0x13;
pub const GHOST: u128 = 0x1f;

pub const T1: u128 = 0x21;
pub const T2: u128 = 0x22;
pub const T3: u128 = 0x23;
pub const T4: u128 = 0x24;

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn user(n: u128) -> User {
    User {
        id: id(n),
        email: format!("user{n}@example.com"),
        name: format!("User {n}"),
        flags: UserFlags::default(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn share(user_n: u128, permission: Permission) -> Share {
    Share {
        id: Uuid::new_v4(),
        user_id: id(user_n),
        permission,
    }
}

pub fn list(n: u128, owner: u128) -> List {
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    List {
        id: id(n),
        name: format!("List {n}"),
        description: None,
        owner_id: id(owner),
        created_at: at,
        updated_at: at,
        shares: Vec::new(),
    }
}

pub fn task(n: u128, list_n: u128) -> Task {
    let at = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
    Task {
        id: id(n),
        list_id: id(list_n),
        name: format!("Task {n}"),
        description: None,
        status: TaskStatus::Pending,
        priority: Priority::Medium,
        favorite: false,
        due_date: None,
        created_at: at,
        updated_at: at,
        shares: Vec::new(),
    }
}

/// U1 owns L1; L2 is owned by U2 and shared VIEW with U1; L3 is owned by U3
/// with no share to U1. T1 lives in L3 with a direct VIEW share to U1. T2
/// points at a list that does not exist and also carries a share to U1.
pub fn scenario(current_user: Option<User>) -> Snapshot {
    let l1 = list(L1, U1);
    let mut l2 = list(L2, U2);
    l2.shares.push(share(U1, Permission::View));
    let l3 = list(L3, U3);

    let mut t1 = task(T1, L3);
    t1.shares.push(share(U1, Permission::View));
    let mut t2 = task(T2, GHOST);
    t2.shares.push(share(U1, Permission::View));

    Snapshot::new(current_user, vec![l1, l2, l3], vec![t1, t2])
}
