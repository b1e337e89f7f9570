//! Composable predicates and orderings for store queries.
//!
//! A [`Filter`] wraps a boxed predicate and composes with `and`/`or`/`negate`.
//! Orderings are plain comparator functions so they can be passed straight to
//! `sort_by`.

use core::cmp::Ordering;

/// Boxed predicate over `T`.
pub struct Filter<T: ?Sized>(Box<dyn Fn(&T) -> bool + Send + Sync>);

impl<T: ?Sized + 'static> Filter<T> {
    pub fn new(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self(Box::new(predicate))
    }

    /// Matches everything.
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    pub fn test(&self, item: &T) -> bool {
        (self.0)(item)
    }

    pub fn and(self, other: Filter<T>) -> Self {
        Self::new(move |item| self.test(item) && other.test(item))
    }

    pub fn or(self, other: Filter<T>) -> Self {
        Self::new(move |item| self.test(item) || other.test(item))
    }

    pub fn negate(self) -> Self {
        Self::new(move |item| !self.test(item))
    }
}

impl<T: ?Sized> core::fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// Comparator used by the `find_sorted` queries.
pub type Sorter<T> = fn(&T, &T) -> Ordering;

pub mod users {
    use super::*;
    use crate::Identity;

    pub fn by_username(username: impl Into<String>) -> Filter<Identity> {
        let username = username.into();
        Filter::new(move |u: &Identity| u.username() == username)
    }

    /// Matches the part of the email after `@`, case-insensitively.
    pub fn by_email_domain(domain: impl Into<String>) -> Filter<Identity> {
        let domain = domain.into().to_lowercase();
        Filter::new(move |u: &Identity| {
            u.email()
                .rsplit_once('@')
                .is_some_and(|(_, d)| d.to_lowercase() == domain)
        })
    }

    pub fn display_name_contains(fragment: impl Into<String>) -> Filter<Identity> {
        let fragment = fragment.into().to_lowercase();
        Filter::new(move |u: &Identity| u.display_name().to_lowercase().contains(&fragment))
    }

    pub fn sort_by_username(a: &Identity, b: &Identity) -> Ordering {
        a.username().cmp(b.username())
    }

    pub fn sort_by_display_name(a: &Identity, b: &Identity) -> Ordering {
        a.display_name().cmp(b.display_name())
    }

    pub fn sort_by_email(a: &Identity, b: &Identity) -> Ordering {
        a.email().cmp(b.email())
    }
}

pub mod roles {
    use super::*;
    use crate::{Permission, Role};

    pub fn by_name(name: impl Into<String>) -> Filter<Role> {
        let name = name.into();
        Filter::new(move |r: &Role| r.name() == name)
    }

    /// Case-insensitive substring match on the role name.
    pub fn name_contains(fragment: impl Into<String>) -> Filter<Role> {
        let fragment = fragment.into().to_lowercase();
        Filter::new(move |r: &Role| r.name().to_lowercase().contains(&fragment))
    }

    pub fn has_permission(permission: Permission) -> Filter<Role> {
        Filter::new(move |r: &Role| r.has_permission(&permission))
    }

    pub fn has_matching_permission(
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Filter<Role> {
        let (action, resource) = (action.into(), resource.into());
        Filter::new(move |r: &Role| r.has_matching_permission(&action, &resource))
    }

    pub fn min_permissions(n: usize) -> Filter<Role> {
        Filter::new(move |r: &Role| r.permission_count() >= n)
    }

    pub fn sort_by_name(a: &Role, b: &Role) -> Ordering {
        a.name().cmp(b.name())
    }

    pub fn sort_by_permission_count(a: &Role, b: &Role) -> Ordering {
        a.permission_count().cmp(&b.permission_count())
    }
}

pub mod assignments {
    use super::*;
    use crate::{Identity, Role, RoleAssignment};
    use rolegraph_core::Timestamp;

    pub fn by_user(user: Identity) -> Filter<RoleAssignment> {
        Filter::new(move |a: &RoleAssignment| *a.user() == user)
    }

    pub fn by_username(username: impl Into<String>) -> Filter<RoleAssignment> {
        let username = username.into();
        Filter::new(move |a: &RoleAssignment| a.user().username() == username)
    }

    pub fn by_role(role: &Role) -> Filter<RoleAssignment> {
        let id = role.id_typed();
        Filter::new(move |a: &RoleAssignment| a.role().id_typed() == id)
    }

    pub fn by_role_name(name: impl Into<String>) -> Filter<RoleAssignment> {
        let name = name.into();
        Filter::new(move |a: &RoleAssignment| a.role().name() == name)
    }

    /// Active at the moment the filter is evaluated.
    pub fn active_only() -> Filter<RoleAssignment> {
        Filter::new(|a: &RoleAssignment| a.is_active())
    }

    pub fn inactive_only() -> Filter<RoleAssignment> {
        active_only().negate()
    }

    pub fn active_at(now: Timestamp) -> Filter<RoleAssignment> {
        Filter::new(move |a: &RoleAssignment| a.is_active_at(&now))
    }

    /// `"PERMANENT"` or `"TEMPORARY"`.
    pub fn by_type(tag: impl Into<String>) -> Filter<RoleAssignment> {
        let tag = tag.into();
        Filter::new(move |a: &RoleAssignment| a.assignment_type() == tag)
    }

    pub fn assigned_by(assigner: impl Into<String>) -> Filter<RoleAssignment> {
        let assigner = assigner.into();
        Filter::new(move |a: &RoleAssignment| a.metadata().assigned_by() == assigner)
    }

    /// Assigned strictly after `at` (text comparison).
    pub fn assigned_after(at: Timestamp) -> Filter<RoleAssignment> {
        Filter::new(move |a: &RoleAssignment| *a.metadata().assigned_at() > at)
    }

    /// Temporary assignments expiring strictly before `at`. Never matches permanent ones.
    pub fn expiring_before(at: Timestamp) -> Filter<RoleAssignment> {
        Filter::new(move |a: &RoleAssignment| {
            a.as_temporary().is_some_and(|grant| *grant.expires_at() < at)
        })
    }

    pub fn sort_by_username(a: &RoleAssignment, b: &RoleAssignment) -> Ordering {
        a.user().username().cmp(b.user().username())
    }

    pub fn sort_by_role_name(a: &RoleAssignment, b: &RoleAssignment) -> Ordering {
        a.role().name().cmp(b.role().name())
    }

    pub fn sort_by_assignment_date(a: &RoleAssignment, b: &RoleAssignment) -> Ordering {
        a.metadata().assigned_at().cmp(b.metadata().assigned_at())
    }
}
