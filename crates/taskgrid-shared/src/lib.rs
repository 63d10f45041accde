//! # taskgrid-shared
//!
//! Types and pure logic shared by the TaskGrid store and server:
//! the entity model, the ordered permission levels, the permission
//! resolver and accessible-entity selectors, task views, and the
//! real-time wire protocol.

pub mod constants;
pub mod error;
pub mod models;
pub mod permissions;
pub mod protocol;
pub mod selectors;
#[cfg(test)]
mod testing;
pub mod types;
pub mod views;

pub use error::SharedError;
pub use models::*;
pub use permissions::Snapshot;
pub use types::*;
