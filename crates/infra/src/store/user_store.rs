use std::collections::HashMap;
use std::sync::RwLock;

use rolegraph_auth::{Filter, Identity, Sorter};
use rolegraph_core::{DomainError, DomainResult};

use super::{read, write};

/// Users keyed by username.
///
/// Knows nothing about roles or assignments.
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, Identity>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user: Identity) -> DomainResult<()> {
        let mut users = write(&self.users);
        if users.contains_key(user.username()) {
            return Err(DomainError::duplicate(format!(
                "user '{}' already exists",
                user.username()
            )));
        }
        tracing::debug!(username = %user.username(), "user added");
        users.insert(user.username().to_string(), user);
        Ok(())
    }

    /// Removes the user only if the stored identity equals `user`.
    pub fn remove(&self, user: &Identity) -> bool {
        let mut users = write(&self.users);
        if users.get(user.username()) != Some(user) {
            return false;
        }
        users.remove(user.username());
        tracing::debug!(username = %user.username(), "user removed");
        true
    }

    pub fn find_by_username(&self, username: &str) -> Option<Identity> {
        read(&self.users).get(username).cloned()
    }

    pub fn find_by_email(&self, email: &str) -> Option<Identity> {
        read(&self.users).values().find(|u| u.email() == email).cloned()
    }

    pub fn exists(&self, username: &str) -> bool {
        read(&self.users).contains_key(username)
    }

    pub fn find_all(&self) -> Vec<Identity> {
        read(&self.users).values().cloned().collect()
    }

    pub fn find_by_filter(&self, filter: &Filter<Identity>) -> Vec<Identity> {
        read(&self.users)
            .values()
            .filter(|u| filter.test(u))
            .cloned()
            .collect()
    }

    pub fn find_sorted(
        &self,
        filter: &Filter<Identity>,
        sorter: Sorter<Identity>,
    ) -> Vec<Identity> {
        let mut found = self.find_by_filter(filter);
        found.sort_by(sorter);
        found
    }

    /// Replace a user's display name and email, revalidating both.
    pub fn update(
        &self,
        username: &str,
        display_name: &str,
        email: &str,
    ) -> DomainResult<Identity> {
        let mut users = write(&self.users);
        if !users.contains_key(username) {
            return Err(DomainError::invalid_argument(format!("unknown user '{username}'")));
        }
        let updated = Identity::validate(username, display_name, email)?;
        users.insert(username.to_string(), updated.clone());
        tracing::debug!(username = %username, "user updated");
        Ok(updated)
    }

    pub fn count(&self) -> usize {
        read(&self.users).len()
    }

    pub fn clear(&self) {
        write(&self.users).clear();
    }
}
