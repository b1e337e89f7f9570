//! Assignment manager: the only authority over role assignments.
//!
//! The manager owns the assignment collection and consults the user and role
//! stores on every insertion. On construction it installs a
//! [`RoleUsageOracle`] into the role store, so roles referenced by any stored
//! assignment (active or not) cannot be removed. The dependency points one
//! way: the manager knows both stores, neither store knows the manager.
//!
//! # Invariants
//! - Every stored assignment referenced an existing user and role when added.
//! - At most one *active* assignment exists per (user, role) pair.
//! - A role referenced by a stored assignment cannot leave the role store.
//!
//! Mutations are synchronous and run to completion. `add` pins the role's
//! membership in the role store while it inserts, so a concurrent role removal
//! either sees the new assignment or finishes before the role check.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use rolegraph_auth::{Filter, Identity, Permission, Role, RoleAssignment, Sorter};
use rolegraph_core::{AssignmentId, Clock, DomainError, DomainResult, SystemClock, Timestamp};

use crate::store::{RoleStore, RoleUsageOracle, UserStore, read, write};

type AssignmentMap = HashMap<AssignmentId, RoleAssignment>;

/// In-use check installed into the role store.
///
/// Holds the assignment map weakly: once the manager is gone, nothing
/// references roles any more.
struct AssignmentUsage {
    assignments: Weak<RwLock<AssignmentMap>>,
}

impl RoleUsageOracle for AssignmentUsage {
    fn is_in_use(&self, role: &Role) -> bool {
        let Some(assignments) = self.assignments.upgrade() else {
            return false;
        };
        read(&assignments)
            .values()
            .any(|a| a.role().id_typed() == role.id_typed())
    }
}

pub struct AssignmentManager {
    assignments: Arc<RwLock<AssignmentMap>>,
    users: Arc<UserStore>,
    roles: Arc<RoleStore>,
    clock: Arc<dyn Clock>,
}

impl AssignmentManager {
    /// Create a manager over both stores and install its in-use check into
    /// `roles`, replacing any check installed earlier.
    pub fn new(users: Arc<UserStore>, roles: Arc<RoleStore>) -> Self {
        let assignments = Arc::new(RwLock::new(AssignmentMap::new()));
        roles.set_usage_oracle(Arc::new(AssignmentUsage {
            assignments: Arc::downgrade(&assignments),
        }));

        Self {
            assignments,
            users,
            roles,
            clock: Arc::new(SystemClock),
        }
    }

    /// Evaluate activity and expiry against `clock` instead of wall-clock time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn users(&self) -> &Arc<UserStore> {
        &self.users
    }

    pub fn roles(&self) -> &Arc<RoleStore> {
        &self.roles
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Store a new assignment.
    ///
    /// Fails with an argument error if the user or role is not in its store, a
    /// duplicate error if the id is already stored, and a state error if an
    /// active assignment already links the same user and role.
    pub fn add(&self, assignment: RoleAssignment) -> DomainResult<AssignmentId> {
        if !self.users.exists(assignment.user().username()) {
            return Err(DomainError::invalid_argument(format!(
                "user '{}' is not registered",
                assignment.user().username()
            )));
        }

        // Lock order is roles, then assignments; `RoleStore::remove` takes them
        // in the same order through the usage oracle.
        let role = assignment.role().clone();
        self.roles.with_membership(&role, |registered| {
            if !registered {
                return Err(DomainError::invalid_argument(format!(
                    "role '{}' is not registered",
                    role.name()
                )));
            }
            self.insert(assignment)
        })
    }

    fn insert(&self, assignment: RoleAssignment) -> DomainResult<AssignmentId> {
        let id = assignment.id_typed();
        let now = self.now();
        let mut assignments = write(&self.assignments);
        if assignments.contains_key(&id) {
            return Err(DomainError::duplicate(format!("assignment {id} already exists")));
        }

        if holds_active_grant(&assignments, &assignment, &now) {
            tracing::warn!(
                username = %assignment.user().username(),
                role = %assignment.role().name(),
                "rejected duplicate active assignment"
            );
            return Err(DomainError::invalid_state(format!(
                "user '{}' already holds an active assignment of role '{}'",
                assignment.user().username(),
                assignment.role().name()
            )));
        }

        tracing::debug!(
            assignment_id = %id,
            kind = assignment.assignment_type(),
            username = %assignment.user().username(),
            role = %assignment.role().name(),
            "assignment added"
        );
        assignments.insert(id, assignment);
        Ok(id)
    }

    /// Returns whether an assignment was actually removed.
    pub fn remove(&self, id: &AssignmentId) -> bool {
        let removed = write(&self.assignments).remove(id).is_some();
        if removed {
            tracing::debug!(assignment_id = %id, "assignment removed");
        }
        removed
    }

    pub fn find_by_id(&self, id: &AssignmentId) -> Option<RoleAssignment> {
        read(&self.assignments).get(id).cloned()
    }

    pub fn find_all(&self) -> Vec<RoleAssignment> {
        read(&self.assignments).values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        read(&self.assignments).len()
    }

    pub fn clear(&self) {
        write(&self.assignments).clear();
    }

    pub fn find_by_user(&self, user: &Identity) -> Vec<RoleAssignment> {
        self.collect(|a| a.user() == user)
    }

    pub fn find_by_role(&self, role: &Role) -> Vec<RoleAssignment> {
        self.collect(|a| a.role().id_typed() == role.id_typed())
    }

    pub fn find_by_filter(&self, filter: &Filter<RoleAssignment>) -> Vec<RoleAssignment> {
        self.collect(|a| filter.test(a))
    }

    pub fn find_sorted(
        &self,
        filter: &Filter<RoleAssignment>,
        sorter: Sorter<RoleAssignment>,
    ) -> Vec<RoleAssignment> {
        let mut found = self.find_by_filter(filter);
        found.sort_by(sorter);
        found
    }

    pub fn active_assignments(&self) -> Vec<RoleAssignment> {
        let now = self.now();
        self.collect(|a| a.is_active_at(&now))
    }

    /// Temporary assignments whose expiry has passed. Revoked permanent
    /// assignments are inactive but never "expired".
    pub fn expired_assignments(&self) -> Vec<RoleAssignment> {
        let now = self.now();
        self.collect(|a| a.as_temporary().is_some_and(|grant| grant.is_expired_at(&now)))
    }

    pub fn user_has_role(&self, user: &Identity, role: &Role) -> bool {
        let now = self.now();
        read(&self.assignments).values().any(|a| {
            a.is_active_at(&now) && a.user() == user && a.role().id_typed() == role.id_typed()
        })
    }

    /// True if an active assignment's role holds a permission matching both patterns.
    pub fn user_has_permission(&self, user: &Identity, action: &str, resource: &str) -> bool {
        let now = self.now();
        read(&self.assignments)
            .values()
            .filter(|a| a.is_active_at(&now) && a.user() == user)
            .any(|a| a.role().has_matching_permission(action, resource))
    }

    /// Union of the permissions of every actively assigned role.
    pub fn user_permissions(&self, user: &Identity) -> HashSet<Permission> {
        let now = self.now();
        read(&self.assignments)
            .values()
            .filter(|a| a.is_active_at(&now) && a.user() == user)
            .flat_map(|a| a.role().permissions().to_set())
            .collect()
    }

    /// Revoke a permanent assignment.
    ///
    /// Unknown ids are an argument error; temporary assignments a state error.
    pub fn revoke_assignment(&self, id: &AssignmentId) -> DomainResult<()> {
        let mut assignments = write(&self.assignments);
        let assignment = assignments
            .get_mut(id)
            .ok_or_else(|| unknown_assignment(id))?;
        assignment.revoke()?;
        tracing::info!(assignment_id = %id, "assignment revoked");
        Ok(())
    }

    /// Push a temporary assignment's expiry strictly forward.
    ///
    /// Unknown ids are an argument error; permanent assignments a state error.
    /// Reviving an expired assignment is a state error while another active
    /// assignment links the same user and role.
    pub fn extend_temporary_assignment(
        &self,
        id: &AssignmentId,
        new_expires_at: Timestamp,
    ) -> DomainResult<()> {
        let now = self.now();
        let mut assignments = write(&self.assignments);
        let current = assignments.get(id).ok_or_else(|| unknown_assignment(id))?;

        let revives = current.as_temporary().is_some()
            && !current.is_active_at(&now)
            && new_expires_at >= now;
        if revives && holds_active_grant(&assignments, current, &now) {
            tracing::warn!(
                assignment_id = %id,
                username = %current.user().username(),
                role = %current.role().name(),
                "rejected extension reviving a duplicate grant"
            );
            return Err(DomainError::invalid_state(format!(
                "user '{}' already holds an active assignment of role '{}'",
                current.user().username(),
                current.role().name()
            )));
        }

        let assignment = assignments
            .get_mut(id)
            .ok_or_else(|| unknown_assignment(id))?;
        assignment.extend(new_expires_at.clone())?;
        tracing::info!(
            assignment_id = %id,
            expires_at = %new_expires_at,
            "temporary assignment extended"
        );
        Ok(())
    }

    fn collect(&self, predicate: impl Fn(&RoleAssignment) -> bool) -> Vec<RoleAssignment> {
        read(&self.assignments)
            .values()
            .filter(|a| predicate(*a))
            .cloned()
            .collect()
    }
}

impl core::fmt::Debug for AssignmentManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AssignmentManager")
            .field("assignments", &self.count())
            .field("clock", &self.clock)
            .finish()
    }
}

/// Whether some other active assignment links the same user and role as `candidate`.
fn holds_active_grant(
    assignments: &AssignmentMap,
    candidate: &RoleAssignment,
    now: &Timestamp,
) -> bool {
    assignments.values().any(|a| {
        a.id_typed() != candidate.id_typed()
            && a.is_active_at(now)
            && a.user() == candidate.user()
            && a.role().id_typed() == candidate.role().id_typed()
    })
}

fn unknown_assignment(id: &AssignmentId) -> DomainError {
    tracing::warn!(assignment_id = %id, "unknown assignment");
    DomainError::invalid_argument(format!("unknown assignment {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rolegraph_auth::filter::assignments;
    use rolegraph_auth::AssignmentMetadata;
    use rolegraph_core::{ErrorKind, FixedClock};

    struct Fixture {
        manager: AssignmentManager,
        clock: Arc<FixedClock>,
        user: Identity,
        role: Arc<Role>,
        role2: Arc<Role>,
        perm: Permission,
        meta: AssignmentMetadata,
    }

    fn at(hours: i64) -> Timestamp {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Timestamp::from_datetime(base + Duration::hours(hours))
    }

    fn fixture() -> Fixture {
        let users = Arc::new(UserStore::new());
        let roles = Arc::new(RoleStore::new());
        let clock = Arc::new(FixedClock::new(at(0)));
        let manager =
            AssignmentManager::new(users.clone(), roles.clone()).with_clock(clock.clone());

        let user = Identity::validate("testuser", "Test User", "test@test.com").unwrap();
        users.add(user.clone()).unwrap();

        let perm = Permission::new("EXECUTE", "SYSTEM", "Run things").unwrap();
        let role = roles.create_role("TestRole", "Desc", [perm.clone()]).unwrap();
        roles.add(role.clone()).unwrap();
        let role2 = roles.create_role("AnotherRole", "Desc", []).unwrap();
        roles.add(role2.clone()).unwrap();

        let meta = AssignmentMetadata::at("admin", Some("Test setup"), at(0)).unwrap();

        Fixture {
            manager,
            clock,
            user,
            role,
            role2,
            perm,
            meta,
        }
    }

    impl Fixture {
        fn permanent(&self, role: &Arc<Role>) -> RoleAssignment {
            RoleAssignment::permanent(self.user.clone(), role.clone(), self.meta.clone())
        }

        fn temporary(&self, role: &Arc<Role>, expires_in_hours: i64) -> RoleAssignment {
            RoleAssignment::temporary(
                self.user.clone(),
                role.clone(),
                self.meta.clone(),
                at(expires_in_hours),
                false,
            )
        }
    }

    #[test]
    fn valid_add_is_stored() {
        let f = fixture();
        let id = f.manager.add(f.permanent(&f.role)).unwrap();

        assert_eq!(f.manager.count(), 1);
        assert_eq!(f.manager.find_by_id(&id).unwrap().id_typed(), id);
    }

    #[test]
    fn add_rejections_leave_collection_unchanged() {
        let f = fixture();
        let first = f.permanent(&f.role);
        f.manager.add(first.clone()).unwrap();

        let err = f.manager.add(first).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        let ghost = Identity::validate("ghost", "Ghost", "g@g.com").unwrap();
        let bad_user = RoleAssignment::permanent(ghost, f.role.clone(), f.meta.clone());
        assert_eq!(f.manager.add(bad_user).unwrap_err().kind(), ErrorKind::Argument);

        let stray = f.manager.roles().create_role("GhostRole", "Desc", []).unwrap();
        let bad_role = f.permanent(&stray);
        assert_eq!(f.manager.add(bad_role).unwrap_err().kind(), ErrorKind::Argument);

        let duplicate_active = f.temporary(&f.role, 24);
        assert_eq!(f.manager.add(duplicate_active).unwrap_err().kind(), ErrorKind::State);

        assert_eq!(f.manager.count(), 1);
    }

    #[test]
    fn referenced_role_cannot_be_removed() {
        let f = fixture();
        let id = f.manager.add(f.permanent(&f.role)).unwrap();

        let err = f.manager.roles().remove(&f.role).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(f.manager.roles().contains(&f.role));

        f.manager.revoke_assignment(&id).unwrap();
        assert!(f.manager.roles().remove(&f.role).is_err(), "in-use check ignores activity");

        assert!(f.manager.roles().remove(&f.role2).unwrap());

        assert!(f.manager.remove(&id));
        assert!(f.manager.roles().remove(&f.role).unwrap());
    }

    #[test]
    fn dropping_the_manager_releases_roles() {
        let f = fixture();
        f.manager.add(f.permanent(&f.role)).unwrap();
        let roles = f.manager.roles().clone();

        drop(f.manager);
        assert!(roles.remove(&f.role).unwrap());
    }

    #[test]
    fn remove_is_idempotent() {
        let f = fixture();
        let id = f.manager.add(f.permanent(&f.role)).unwrap();

        assert_eq!(f.manager.find_all().len(), 1);
        assert!(f.manager.remove(&id));
        assert!(!f.manager.remove(&id));
        assert!(!f.manager.remove(&AssignmentId::new()));
        assert!(f.manager.find_by_id(&id).is_none());

        f.manager.add(f.permanent(&f.role)).unwrap();
        f.manager.clear();
        assert_eq!(f.manager.count(), 0);
    }

    #[test]
    fn find_by_user_and_role() {
        let f = fixture();
        f.manager.add(f.permanent(&f.role)).unwrap();

        assert_eq!(f.manager.find_by_user(&f.user).len(), 1);
        let stranger = Identity::validate("stranger", "S", "s@s.com").unwrap();
        assert!(f.manager.find_by_user(&stranger).is_empty());

        assert_eq!(f.manager.find_by_role(&f.role).len(), 1);
        assert!(f.manager.find_by_role(&f.role2).is_empty());
    }

    #[test]
    fn filter_and_sort() {
        let f = fixture();
        f.manager.add(f.permanent(&f.role)).unwrap();
        f.manager.add(f.temporary(&f.role2, -1)).unwrap();

        let active = f.manager.find_by_filter(&assignments::active_at(at(0)));
        assert_eq!(active.len(), 1);
        assert_eq!(f.manager.find_by_filter(&Filter::all()).len(), 2);

        let sorted = f.manager.find_sorted(&Filter::all(), assignments::sort_by_role_name);
        let names: Vec<_> = sorted.iter().map(|a| a.role().name().to_string()).collect();
        assert_eq!(names, ["AnotherRole", "TestRole"]);
    }

    #[test]
    fn active_and_expired_follow_the_clock() {
        let f = fixture();
        f.manager.add(f.permanent(&f.role)).unwrap();
        f.manager.add(f.temporary(&f.role2, 2)).unwrap();

        assert_eq!(f.manager.active_assignments().len(), 2);
        assert!(f.manager.expired_assignments().is_empty());

        f.clock.set(Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap());
        assert_eq!(f.manager.active_assignments().len(), 1);
        let expired = f.manager.expired_assignments();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].role().name(), "AnotherRole");
    }

    #[test]
    fn revoked_permanent_is_inactive_but_not_expired() {
        let f = fixture();
        let id = f.manager.add(f.permanent(&f.role)).unwrap();
        f.manager.revoke_assignment(&id).unwrap();

        assert!(f.manager.active_assignments().is_empty());
        assert!(f.manager.expired_assignments().is_empty());
    }

    #[test]
    fn role_and_permission_checks() {
        let f = fixture();
        f.manager.add(f.permanent(&f.role)).unwrap();

        assert!(f.manager.user_has_role(&f.user, &f.role));
        assert!(!f.manager.user_has_role(&f.user, &f.role2));

        assert!(f.manager.user_has_permission(&f.user, "EXECUTE", "system"));
        assert!(!f.manager.user_has_permission(&f.user, "READ", "system"));

        let perms = f.manager.user_permissions(&f.user);
        assert_eq!(perms.len(), 1);
        assert!(perms.contains(&f.perm));

        let stranger = Identity::validate("stranger", "S", "s@s.com").unwrap();
        assert!(f.manager.user_permissions(&stranger).is_empty());
        assert!(!f.manager.user_has_permission(&stranger, "EXECUTE", "system"));
    }

    #[test]
    fn permissions_are_collapsed_across_roles() {
        let f = fixture();
        f.role2.add_permission(f.perm.clone());
        f.role2.add_permission(Permission::new("READ", "logs", "Read logs").unwrap());
        f.manager.add(f.permanent(&f.role)).unwrap();
        f.manager.add(f.permanent(&f.role2)).unwrap();

        assert_eq!(f.manager.user_permissions(&f.user).len(), 2);
    }

    #[test]
    fn inactive_assignments_grant_nothing() {
        let f = fixture();
        f.manager.add(f.temporary(&f.role, -1)).unwrap();

        assert!(!f.manager.user_has_role(&f.user, &f.role));
        assert!(!f.manager.user_has_permission(&f.user, "EXECUTE", "system"));
        assert!(f.manager.user_permissions(&f.user).is_empty());
    }

    #[test]
    fn revoke_and_extend_dispatch_on_kind() {
        let f = fixture();
        let perm_id = f.manager.add(f.permanent(&f.role)).unwrap();
        let temp_id = f.manager.add(f.temporary(&f.role2, 24)).unwrap();

        f.manager.revoke_assignment(&perm_id).unwrap();
        assert!(!f.manager.find_by_id(&perm_id).unwrap().is_active_at(&at(0)));
        let err = f.manager.revoke_assignment(&temp_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        f.manager.extend_temporary_assignment(&temp_id, at(120)).unwrap();
        let extended = f.manager.find_by_id(&temp_id).unwrap();
        assert_eq!(extended.as_temporary().unwrap().expires_at(), &at(120));

        let err = f.manager.extend_temporary_assignment(&perm_id, at(200)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        let err = f.manager.extend_temporary_assignment(&temp_id, at(100)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        let unknown = AssignmentId::new();
        assert_eq!(f.manager.revoke_assignment(&unknown).unwrap_err().kind(), ErrorKind::Argument);
        assert_eq!(
            f.manager.extend_temporary_assignment(&unknown, at(300)).unwrap_err().kind(),
            ErrorKind::Argument
        );
    }

    #[test]
    fn revoked_pair_can_be_granted_again() {
        let f = fixture();
        let first = f.manager.add(f.permanent(&f.role)).unwrap();
        f.manager.revoke_assignment(&first).unwrap();

        let second = f.manager.add(f.permanent(&f.role)).unwrap();
        assert_ne!(first, second);
        assert_eq!(f.manager.find_by_role(&f.role).len(), 2);
        assert_eq!(f.manager.active_assignments().len(), 1);
    }

    #[test]
    fn extension_cannot_revive_a_duplicate_grant() {
        let f = fixture();
        let stale = f.manager.add(f.temporary(&f.role, -5)).unwrap();
        let fresh = f.manager.add(f.permanent(&f.role)).unwrap();

        let err = f.manager.extend_temporary_assignment(&stale, at(48)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(!f.manager.find_by_id(&stale).unwrap().is_active_at(&at(0)));

        f.manager.extend_temporary_assignment(&stale, at(-1)).unwrap();

        f.manager.revoke_assignment(&fresh).unwrap();
        f.manager.extend_temporary_assignment(&stale, at(48)).unwrap();
        assert!(f.manager.user_has_role(&f.user, &f.role));
    }

    #[test]
    fn offset_expiry_no_longer_authorizes() {
        let f = fixture();
        let expires_at = Timestamp::parse("2025-01-01T02:00:00+05:00").unwrap();
        let grant = RoleAssignment::temporary(
            f.user.clone(),
            f.role.clone(),
            f.meta.clone(),
            expires_at,
            false,
        );
        f.manager.add(grant).unwrap();

        assert!(!f.manager.user_has_role(&f.user, &f.role));
        assert_eq!(f.manager.expired_assignments().len(), 1);
        f.manager.add(f.permanent(&f.role)).unwrap();
    }

    #[test]
    fn concurrent_add_and_role_removal_never_strand_an_assignment() {
        let users = Arc::new(UserStore::new());
        let roles = Arc::new(RoleStore::new());
        let manager = AssignmentManager::new(users.clone(), roles.clone());
        let user = Identity::validate("racer", "Racer", "racer@test.com").unwrap();
        users.add(user.clone()).unwrap();
        let meta = AssignmentMetadata::at("admin", None, at(0)).unwrap();

        for round in 0..200 {
            let role = roles.create_role(&format!("Contested{round}"), "Desc", []).unwrap();
            roles.add(role.clone()).unwrap();
            let grant = RoleAssignment::permanent(user.clone(), role.clone(), meta.clone());

            let (added, removed) = std::thread::scope(|s| {
                let adder = s.spawn(|| manager.add(grant).is_ok());
                let remover = s.spawn(|| roles.remove(&role).unwrap_or(false));
                (adder.join().unwrap(), remover.join().unwrap())
            });

            assert!(!(added && removed), "round {round}: both the grant and the removal won");
            for a in manager.find_by_role(&role) {
                assert!(roles.contains(a.role()), "round {round}: assignment outlived its role");
            }
        }
    }

    #[test]
    fn expired_temporary_does_not_block_new_grant() {
        let f = fixture();
        f.manager.add(f.temporary(&f.role, -5)).unwrap();
        f.manager.add(f.temporary(&f.role, 5)).unwrap();
        assert_eq!(f.manager.count(), 2);
    }
}
