//! User identities.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use rolegraph_core::{DomainError, DomainResult, require_non_blank};

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,20}$").expect("static username pattern"));

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern"));

/// Validated, immutable user identity.
///
/// Equality covers all three fields: two identities with the same username but
/// a different email are different identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    username: String,
    display_name: String,
    email: String,
}

impl Identity {
    /// Validate the raw fields and build an identity.
    ///
    /// - `display_name` must not be blank (stored trimmed)
    /// - `username` must be 3-20 ASCII letters, digits or underscores
    /// - `email` must look like `local@domain.tld`
    pub fn validate(username: &str, display_name: &str, email: &str) -> DomainResult<Self> {
        let display_name = require_non_blank(display_name, "display name")?;

        if !USERNAME_PATTERN.is_match(username) {
            return Err(DomainError::invalid_argument(
                "username must be 3 to 20 characters of latin letters, digits or underscore",
            ));
        }

        if !EMAIL_PATTERN.is_match(email) {
            return Err(DomainError::invalid_argument("email has an invalid format"));
        }

        Ok(Self {
            username: username.to_string(),
            display_name,
            email: email.trim().to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// `alice (Alice Liddell) <alice@example.com>`
    pub fn format(&self) -> String {
        format!("{} ({}) <{}>", self.username, self.display_name, self.email)
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.username)
    }
}
