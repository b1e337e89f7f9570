use regex::Regex;
use serde::Serialize;

use rolegraph_core::{DomainError, DomainResult, require_non_blank};

/// Permission: the right to perform `action` on `resource`.
///
/// Fields are normalised on construction (action upper-cased, resource
/// lower-cased), so `Permission::new("read", "Reports", ..)` and
/// `Permission::new("READ", "reports", ..)` with the same description are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Permission {
    action: String,
    resource: String,
    description: String,
}

impl Permission {
    pub fn new(action: &str, resource: &str, description: &str) -> DomainResult<Self> {
        if action.trim().is_empty() {
            return Err(DomainError::invalid_argument("permission action must not be blank"));
        }
        if action.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_argument(
                "permission action must not contain whitespace",
            ));
        }
        let resource = require_non_blank(resource, "permission resource")?;
        let description = require_non_blank(description, "permission description")?;

        Ok(Self {
            action: action.to_uppercase(),
            resource: resource.to_lowercase(),
            description,
        })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Pattern match against the normalised fields.
    ///
    /// `None` matches anything. A pattern matches a field when the field
    /// contains it, or when the pattern as a regular expression matches the
    /// whole field. Matching is case-sensitive.
    pub fn matches(&self, action_pattern: Option<&str>, resource_pattern: Option<&str>) -> bool {
        field_matches(&self.action, action_pattern)
            && field_matches(&self.resource, resource_pattern)
    }

    /// `READ on reports: View reports`
    pub fn format(&self) -> String {
        format!("{} on {}: {}", self.action, self.resource, self.description)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.action, self.resource)
    }
}

fn field_matches(value: &str, pattern: Option<&str>) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    if value.contains(pattern) {
        return true;
    }
    // Invalid expressions only get the substring test above.
    Regex::new(&format!("^(?:{pattern})$"))
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}
