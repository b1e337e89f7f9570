//! Roles: named, uniquely identified bundles of permissions.

use std::collections::HashSet;
use std::collections::hash_set;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rolegraph_core::{DomainError, DomainResult, Entity, RoleId, require_non_blank};

use crate::Permission;

/// Every role name ever handed out by this registry.
///
/// Names stay registered after the role is removed from a store, so a deleted
/// role's name cannot be reused until [`RoleNameRegistry::reset`] is called.
#[derive(Debug, Default)]
pub struct RoleNameRegistry {
    names: Mutex<HashSet<String>>,
}

impl RoleNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` (trimmed). Fails with a duplicate error when already claimed.
    pub fn register(&self, name: &str) -> DomainResult<()> {
        let name = name.trim();
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if !names.insert(name.to_string()) {
            return Err(DomainError::duplicate(format!(
                "role name '{name}' has already been used"
            )));
        }
        Ok(())
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name.trim())
    }

    pub fn len(&self) -> usize {
        self.names.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every name. Intended for isolating independent scenarios.
    pub fn reset(&self) {
        self.names.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Read-only snapshot of a role's permissions.
///
/// The view has no mutators; membership only changes through
/// [`Role::add_permission`] and [`Role::remove_permission`]. A view taken before
/// such a change keeps showing the old membership.
#[derive(Debug, Clone)]
pub struct PermissionView(Arc<HashSet<Permission>>);

impl PermissionView {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn iter(&self) -> hash_set::Iter<'_, Permission> {
        self.0.iter()
    }

    /// Owned copy of the membership, detached from the role.
    pub fn to_set(&self) -> HashSet<Permission> {
        (*self.0).clone()
    }
}

impl<'a> IntoIterator for &'a PermissionView {
    type Item = &'a Permission;
    type IntoIter = hash_set::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A named bundle of permissions.
///
/// Roles are entities: equality and hashing use the generated id only. They are
/// shared as `Arc<Role>` between the role store and the assignments that
/// reference them; permission changes are visible to every holder.
#[derive(Debug)]
pub struct Role {
    id: RoleId,
    name: String,
    description: String,
    permissions: RwLock<Arc<HashSet<Permission>>>,
}

impl Role {
    /// Build a role, claiming its trimmed name in `names`.
    ///
    /// The name is only claimed once every other field has validated.
    pub fn new(
        names: &RoleNameRegistry,
        name: &str,
        description: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> DomainResult<Self> {
        let name = require_non_blank(name, "role name")?;
        let description = require_non_blank(description, "role description")?;
        names.register(&name)?;

        Ok(Self {
            id: RoleId::new(),
            name,
            description,
            permissions: RwLock::new(Arc::new(permissions.into_iter().collect())),
        })
    }

    pub fn id_typed(&self) -> RoleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true if the permission was not already present.
    pub fn add_permission(&self, permission: Permission) -> bool {
        let mut guard = self.permissions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut *guard).insert(permission)
    }

    /// Returns true if the permission was present.
    pub fn remove_permission(&self, permission: &Permission) -> bool {
        let mut guard = self.permissions.write().unwrap_or_else(PoisonError::into_inner);
        if !guard.contains(permission) {
            return false;
        }
        Arc::make_mut(&mut *guard).remove(permission)
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(permission)
    }

    /// True if any permission matches both patterns (see [`Permission::matches`]).
    pub fn has_matching_permission(&self, action: &str, resource: &str) -> bool {
        self.permissions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p.matches(Some(action), Some(resource)))
    }

    pub fn permissions(&self) -> PermissionView {
        let guard = self.permissions.read().unwrap_or_else(PoisonError::into_inner);
        PermissionView(Arc::clone(&*guard))
    }

    pub fn permission_count(&self) -> usize {
        self.permissions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Multi-line description, permissions sorted for stable output.
    pub fn format(&self) -> String {
        let view = self.permissions();
        let mut sorted: Vec<&Permission> = view.iter().collect();
        sorted.sort();

        let mut out = format!(
            "Role: {} [ID: {}]\nDescription: {}\nPermissions ({}):",
            self.name,
            self.id,
            self.description,
            sorted.len()
        );
        for p in sorted {
            out.push_str("\n- ");
            out.push_str(&p.format());
        }
        out
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Role {}

impl core::hash::Hash for Role {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Role{{id={}, name={}, description={}, permissions={}}}",
            self.id,
            self.name,
            self.description,
            self.permission_count()
        )
    }
}
