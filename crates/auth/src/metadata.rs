//! Audit metadata attached to every role assignment.

use serde::Serialize;

use rolegraph_core::{DomainResult, Timestamp, require_non_blank};

/// Reason recorded when the caller gives none.
pub const NO_REASON: &str = "No reason provided";

/// Who granted an assignment, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AssignmentMetadata {
    assigned_by: String,
    assigned_at: Timestamp,
    reason: String,
}

impl AssignmentMetadata {
    /// Stamp the current time.
    pub fn now(assigned_by: &str, reason: Option<&str>) -> DomainResult<Self> {
        Self::at(assigned_by, reason, Timestamp::now())
    }

    /// Record an explicit time (imports, deterministic tests).
    pub fn at(
        assigned_by: &str,
        reason: Option<&str>,
        assigned_at: Timestamp,
    ) -> DomainResult<Self> {
        let assigned_by = require_non_blank(assigned_by, "assigned by")?;
        let reason = match reason.map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => NO_REASON.to_string(),
        };

        Ok(Self {
            assigned_by,
            assigned_at,
            reason,
        })
    }

    pub fn assigned_by(&self) -> &str {
        &self.assigned_by
    }

    pub fn assigned_at(&self) -> &Timestamp {
        &self.assigned_at
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn format(&self) -> String {
        format!(
            "Assigned by: {} at {}. Reason: {}",
            self.assigned_by, self.assigned_at, self.reason
        )
    }
}
