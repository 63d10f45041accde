//! # taskgrid-store
//!
//! SQLite persistence for TaskGrid.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users,
//! sessions, lists, tasks, shares and notifications, plus
//! [`Database::load_snapshot`] which materializes everything one user may
//! need for permission resolution.

pub mod database;
pub mod lists;
pub mod migrations;
pub mod notifications;
pub mod password;
pub mod sessions;
pub mod shares;
pub mod snapshot;
pub mod tasks;
pub mod users;

mod error;
mod rows;

pub use database::Database;
pub use error::{Result, StoreError};
pub use tasks::{NewTask, TaskUpdate};
