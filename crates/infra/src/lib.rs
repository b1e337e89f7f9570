//! Infrastructure layer: in-memory stores and the assignment manager that
//! keeps them referentially consistent.

pub mod assignment_manager;
pub mod store;

pub use assignment_manager::AssignmentManager;
pub use store::{RoleStore, RoleUsageOracle, UserStore};
