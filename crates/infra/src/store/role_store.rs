use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rolegraph_auth::{Filter, Permission, Role, RoleNameRegistry, Sorter};
use rolegraph_core::{DomainError, DomainResult, RoleId};

use super::{read, write};

/// Answers whether something still references a role.
///
/// The role store consults this before every removal. It is the only thing
/// the store knows about its dependents, which keeps the store free of any
/// assignment type.
pub trait RoleUsageOracle: Send + Sync {
    fn is_in_use(&self, role: &Role) -> bool;
}

impl<F> RoleUsageOracle for F
where
    F: Fn(&Role) -> bool + Send + Sync,
{
    fn is_in_use(&self, role: &Role) -> bool {
        self(role)
    }
}

#[derive(Debug, Default)]
struct RoleIndex {
    by_id: HashMap<RoleId, Arc<Role>>,
    by_name: HashMap<String, RoleId>,
}

/// Roles keyed by id and by name.
///
/// The store owns the [`RoleNameRegistry`] used to construct roles (see
/// [`RoleStore::create_role`]), so name uniqueness covers every role ever
/// created through it, including removed ones.
pub struct RoleStore {
    roles: RwLock<RoleIndex>,
    names: Arc<RoleNameRegistry>,
    usage: RwLock<Option<Arc<dyn RoleUsageOracle>>>,
}

impl RoleStore {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(RoleNameRegistry::new()))
    }

    /// Share a name registry with other stores or role factories.
    pub fn with_registry(names: Arc<RoleNameRegistry>) -> Self {
        Self {
            roles: RwLock::new(RoleIndex::default()),
            names,
            usage: RwLock::new(None),
        }
    }

    pub fn name_registry(&self) -> &Arc<RoleNameRegistry> {
        &self.names
    }

    /// Construct a role against this store's name registry. The role is not added.
    pub fn create_role(
        &self,
        name: &str,
        description: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> DomainResult<Arc<Role>> {
        Ok(Arc::new(Role::new(&self.names, name, description, permissions)?))
    }

    /// Install the in-use check consulted by [`RoleStore::remove`], replacing
    /// any previous one.
    pub fn set_usage_oracle(&self, oracle: Arc<dyn RoleUsageOracle>) {
        *write(&self.usage) = Some(oracle);
    }

    pub fn clear_usage_oracle(&self) {
        *write(&self.usage) = None;
    }

    pub fn add(&self, role: Arc<Role>) -> DomainResult<()> {
        let mut index = write(&self.roles);
        let taken = index.by_id.contains_key(&role.id_typed())
            || index.by_name.contains_key(role.name());
        if taken {
            return Err(DomainError::duplicate(format!(
                "role '{}' already exists",
                role.name()
            )));
        }
        index.by_name.insert(role.name().to_string(), role.id_typed());
        tracing::debug!(role = %role.name(), role_id = %role.id_typed(), "role added");
        index.by_id.insert(role.id_typed(), role);
        Ok(())
    }

    /// Remove a role unless the usage oracle reports it in use.
    ///
    /// Returns `Ok(false)` when the role is not in the store. The role's name
    /// stays claimed in the registry. The oracle runs under the store's write
    /// lock, so it must not call back into this store.
    pub fn remove(&self, role: &Role) -> DomainResult<bool> {
        let mut index = write(&self.roles);
        if !index.by_id.contains_key(&role.id_typed()) {
            return Ok(false);
        }

        let oracle = read(&self.usage).clone();
        if oracle.is_some_and(|o| o.is_in_use(role)) {
            tracing::warn!(
                role = %role.name(),
                "refusing to remove role still referenced by assignments"
            );
            return Err(DomainError::invalid_state(format!(
                "role '{}' is still in use",
                role.name()
            )));
        }

        let Some(removed) = index.by_id.remove(&role.id_typed()) else {
            return Ok(false);
        };
        index.by_name.remove(removed.name());
        tracing::debug!(role = %removed.name(), "role removed");
        Ok(true)
    }

    /// Run `f` with the role's membership pinned: `remove` cannot run until
    /// `f` returns. `f` receives whether the role is in the store.
    pub(crate) fn with_membership<R>(&self, role: &Role, f: impl FnOnce(bool) -> R) -> R {
        let index = read(&self.roles);
        f(index.by_id.contains_key(&role.id_typed()))
    }

    pub fn contains(&self, role: &Role) -> bool {
        read(&self.roles).by_id.contains_key(&role.id_typed())
    }

    pub fn find_by_id(&self, id: &RoleId) -> Option<Arc<Role>> {
        read(&self.roles).by_id.get(id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<Role>> {
        let index = read(&self.roles);
        index.by_name.get(name).and_then(|id| index.by_id.get(id)).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        read(&self.roles).by_name.contains_key(name)
    }

    pub fn find_all(&self) -> Vec<Arc<Role>> {
        read(&self.roles).by_id.values().cloned().collect()
    }

    pub fn find_by_filter(&self, filter: &Filter<Role>) -> Vec<Arc<Role>> {
        read(&self.roles)
            .by_id
            .values()
            .filter(|r| filter.test(r))
            .cloned()
            .collect()
    }

    pub fn find_sorted(&self, filter: &Filter<Role>, sorter: Sorter<Role>) -> Vec<Arc<Role>> {
        let mut found = self.find_by_filter(filter);
        found.sort_by(|a, b| sorter(a, b));
        found
    }

    pub fn add_permission_to_role(
        &self,
        role_name: &str,
        permission: Permission,
    ) -> DomainResult<()> {
        let role = self.require(role_name)?;
        tracing::debug!(
            role = %role_name,
            permission = %permission,
            "permission granted to role"
        );
        role.add_permission(permission);
        Ok(())
    }

    pub fn remove_permission_from_role(
        &self,
        role_name: &str,
        permission: &Permission,
    ) -> DomainResult<()> {
        let role = self.require(role_name)?;
        if role.remove_permission(permission) {
            tracing::debug!(
                role = %role_name,
                permission = %permission,
                "permission withdrawn from role"
            );
        }
        Ok(())
    }

    /// Roles holding a permission that matches both patterns.
    pub fn find_roles_with_permission(&self, action: &str, resource: &str) -> Vec<Arc<Role>> {
        read(&self.roles)
            .by_id
            .values()
            .filter(|r| r.has_matching_permission(action, resource))
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        read(&self.roles).by_id.len()
    }

    /// Empty the store. Names stay claimed in the registry.
    pub fn clear(&self) {
        let mut index = write(&self.roles);
        index.by_id.clear();
        index.by_name.clear();
    }

    fn require(&self, role_name: &str) -> DomainResult<Arc<Role>> {
        self.find_by_name(role_name)
            .ok_or_else(|| DomainError::invalid_argument(format!("unknown role '{role_name}'")))
    }
}

impl Default for RoleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RoleStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleStore")
            .field("roles", &read(&self.roles).by_id.len())
            .field("usage_oracle", &read(&self.usage).is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegraph_auth::filter::roles;
    use rolegraph_core::ErrorKind;

    fn perm(action: &str, resource: &str) -> Permission {
        Permission::new(action, resource, "test permission").unwrap()
    }

    #[test]
    fn add_and_find_by_id_and_name() {
        let store = RoleStore::new();
        let admin = store.create_role("Admin", "Everything", []).unwrap();
        store.add(admin.clone()).unwrap();

        assert!(store.exists("Admin"));
        assert!(store.contains(&admin));
        assert_eq!(store.find_by_name("Admin").unwrap(), admin);
        assert_eq!(store.find_by_id(&admin.id_typed()).unwrap(), admin);
        assert!(store.find_by_name("Nobody").is_none());

        let err = store.add(admin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn same_name_from_separate_registry_is_still_a_duplicate() {
        let store = RoleStore::new();
        store.add(store.create_role("Admin", "Everything", []).unwrap()).unwrap();

        let foreign = RoleNameRegistry::new();
        let clash = Arc::new(Role::new(&foreign, "Admin", "Impostor", []).unwrap());
        assert_eq!(store.add(clash).unwrap_err().kind(), ErrorKind::Duplicate);
    }

    #[test]
    fn removed_name_cannot_be_reused() {
        let store = RoleStore::new();
        let temp = store.create_role("Temp", "Short lived", []).unwrap();
        store.add(temp.clone()).unwrap();

        assert!(store.remove(&temp).unwrap());
        assert!(!store.remove(&temp).unwrap());
        assert!(!store.exists("Temp"));

        let err = store.create_role("Temp", "Again", []).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        store.name_registry().reset();
        assert!(store.create_role("Temp", "Again", []).is_ok());
    }

    #[test]
    fn usage_oracle_blocks_removal() {
        let store = RoleStore::new();
        let pinned = store.create_role("Pinned", "Referenced", []).unwrap();
        let free = store.create_role("Free", "Unreferenced", []).unwrap();
        store.add(pinned.clone()).unwrap();
        store.add(free.clone()).unwrap();

        store.set_usage_oracle(Arc::new(|r: &Role| r.name() == "Pinned"));

        let err = store.remove(&pinned).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(store.contains(&pinned));
        assert!(store.remove(&free).unwrap());

        store.clear_usage_oracle();
        assert!(store.remove(&pinned).unwrap());
    }

    #[test]
    fn permissions_through_the_store() {
        let store = RoleStore::new();
        let reader = store.create_role("Reader", "Reads", []).unwrap();
        store.add(reader.clone()).unwrap();
        store.add(store.create_role("Writer", "Writes", [perm("WRITE", "data")]).unwrap()).unwrap();

        store.add_permission_to_role("Reader", perm("READ", "data")).unwrap();
        assert!(reader.has_permission(&perm("READ", "data")));

        let with_read = store.find_roles_with_permission("READ", "data");
        assert_eq!(with_read, vec![reader.clone()]);

        store.remove_permission_from_role("Reader", &perm("READ", "data")).unwrap();
        assert!(!reader.has_permission(&perm("READ", "data")));

        let err = store.add_permission_to_role("Unknown", perm("READ", "data")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert!(store.remove_permission_from_role("Unknown", &perm("READ", "data")).is_err());
    }

    #[test]
    fn filter_and_sort() {
        let store = RoleStore::new();
        for (name, perms) in [
            ("Beta", vec![perm("READ", "a"), perm("READ", "b")]),
            ("Alpha", vec![perm("READ", "a")]),
            ("Gamma", vec![]),
        ] {
            store.add(store.create_role(name, "desc", perms).unwrap()).unwrap();
        }

        let sorted = store.find_sorted(&roles::min_permissions(1), roles::sort_by_name);
        let names: Vec<_> = sorted.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, ["Alpha", "Beta"]);

        assert_eq!(store.find_by_filter(&roles::name_contains("MM")).len(), 1);
        store.clear();
        assert_eq!(store.count(), 0);
        assert!(store.find_all().is_empty());
    }
}
