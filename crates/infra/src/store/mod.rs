//! In-memory stores for users and roles.
//!
//! Each store guards its own state with one `RwLock`, and no store method
//! holds its lock while calling into another store or an injected callback.

pub mod role_store;
pub mod user_store;

pub use role_store::{RoleStore, RoleUsageOracle};
pub use user_store::UserStore;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Mutations never leave a half-applied state behind, so a poisoned lock still
// guards consistent data.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
