//! `rolegraph-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no storage or logging).

pub mod entity;
pub mod error;
pub mod id;
pub mod time;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind, require_non_blank};
pub use id::{AssignmentId, RoleId};
pub use time::{Clock, FixedClock, SystemClock, Timestamp};
