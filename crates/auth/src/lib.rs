//! `rolegraph-auth`: RBAC domain model.
//!
//! Identities, permissions, roles and the role assignments that link them.
//! This crate is intentionally decoupled from storage; see `rolegraph-infra`
//! for the stores that enforce cross-entity invariants.

pub mod assignment;
pub mod filter;
pub mod metadata;
pub mod permissions;
pub mod roles;
pub mod user;

pub use assignment::{
    AssignmentKind, PermanentGrant, RoleAssignment, RoleAssignmentBuilder, TemporaryGrant,
};
pub use filter::{Filter, Sorter};
pub use metadata::{AssignmentMetadata, NO_REASON};
pub use permissions::Permission;
pub use roles::{PermissionView, Role, RoleNameRegistry};
pub use user::Identity;
