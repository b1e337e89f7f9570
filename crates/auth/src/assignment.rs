//! Role assignments: grants linking an identity to a role.
//!
//! An assignment is either **permanent** (active until revoked) or
//! **temporary** (active until its expiry passes, extendable forward). The two
//! lifecycles share one [`RoleAssignment`] type and differ only in the
//! [`AssignmentKind`] payload.
//!
//! Expiry is a text comparison of [`Timestamp`]s: an assignment is expired when
//! `now > expires_at`.

use std::sync::Arc;

use serde::Serialize;

use rolegraph_core::{AssignmentId, DomainError, DomainResult, Entity, Timestamp};

use crate::{AssignmentMetadata, Identity, Role};

pub const PERMANENT: &str = "PERMANENT";
pub const TEMPORARY: &str = "TEMPORARY";

/// Lifecycle of a permanent grant: ACTIVE until revoked, REVOKED is terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermanentGrant {
    revoked: bool,
}

impl PermanentGrant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: revoking a revoked grant changes nothing.
    pub fn revoke(&mut self) {
        self.revoked = true;
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }
}

/// Lifecycle of a temporary grant.
///
/// ACTIVE/EXPIRED is never stored; it is computed from `expires_at` on every
/// query. `auto_renew` is informational and does not affect activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemporaryGrant {
    expires_at: Timestamp,
    auto_renew: bool,
}

impl TemporaryGrant {
    pub fn new(expires_at: Timestamp, auto_renew: bool) -> Self {
        Self {
            expires_at,
            auto_renew,
        }
    }

    pub fn expires_at(&self) -> &Timestamp {
        &self.expires_at
    }

    pub fn auto_renew(&self) -> bool {
        self.auto_renew
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(&Timestamp::now())
    }

    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        *now > self.expires_at
    }

    /// Move the expiry strictly forward.
    ///
    /// This may bring an expired grant back to life.
    pub fn extend(&mut self, new_expires_at: Timestamp) -> DomainResult<()> {
        if new_expires_at <= self.expires_at {
            return Err(DomainError::invalid_argument(format!(
                "new expiry {new_expires_at} must be later than current expiry {}",
                self.expires_at
            )));
        }
        self.expires_at = new_expires_at;
        Ok(())
    }

    /// `"Time is up"` once expired, otherwise `"N days, M hours remaining"`.
    pub fn time_remaining_at(&self, now: &Timestamp) -> String {
        if self.is_expired_at(now) {
            return "Time is up".to_string();
        }
        let left = self.expires_at.to_datetime() - now.to_datetime();
        format!(
            "{} days, {} hours remaining",
            left.num_days(),
            left.num_hours() % 24
        )
    }
}

/// Kind-specific lifecycle payload of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentKind {
    Permanent(PermanentGrant),
    Temporary(TemporaryGrant),
}

impl AssignmentKind {
    pub fn tag(&self) -> &'static str {
        match self {
            AssignmentKind::Permanent(_) => PERMANENT,
            AssignmentKind::Temporary(_) => TEMPORARY,
        }
    }

    pub fn is_active_at(&self, now: &Timestamp) -> bool {
        match self {
            AssignmentKind::Permanent(grant) => !grant.is_revoked(),
            AssignmentKind::Temporary(grant) => !grant.is_expired_at(now),
        }
    }
}

/// A grant of `role` to `user`, with audit metadata and a lifecycle.
///
/// Assignments are entities: two assignments with identical user, role and
/// metadata are still different assignments. The user and role are referenced,
/// not owned; the role is shared with the role store.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    id: AssignmentId,
    user: Identity,
    role: Arc<Role>,
    metadata: AssignmentMetadata,
    kind: AssignmentKind,
}

impl RoleAssignment {
    pub fn permanent(user: Identity, role: Arc<Role>, metadata: AssignmentMetadata) -> Self {
        Self::with_kind(user, role, metadata, AssignmentKind::Permanent(PermanentGrant::new()))
    }

    pub fn temporary(
        user: Identity,
        role: Arc<Role>,
        metadata: AssignmentMetadata,
        expires_at: Timestamp,
        auto_renew: bool,
    ) -> Self {
        Self::with_kind(
            user,
            role,
            metadata,
            AssignmentKind::Temporary(TemporaryGrant::new(expires_at, auto_renew)),
        )
    }

    pub fn builder() -> RoleAssignmentBuilder {
        RoleAssignmentBuilder::default()
    }

    fn with_kind(
        user: Identity,
        role: Arc<Role>,
        metadata: AssignmentMetadata,
        kind: AssignmentKind,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            user,
            role,
            metadata,
            kind,
        }
    }

    pub fn id_typed(&self) -> AssignmentId {
        self.id
    }

    pub fn user(&self) -> &Identity {
        &self.user
    }

    pub fn role(&self) -> &Arc<Role> {
        &self.role
    }

    pub fn metadata(&self) -> &AssignmentMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> &AssignmentKind {
        &self.kind
    }

    /// `"PERMANENT"` or `"TEMPORARY"`.
    pub fn assignment_type(&self) -> &'static str {
        self.kind.tag()
    }

    pub fn as_permanent(&self) -> Option<&PermanentGrant> {
        match &self.kind {
            AssignmentKind::Permanent(grant) => Some(grant),
            AssignmentKind::Temporary(_) => None,
        }
    }

    pub fn as_temporary(&self) -> Option<&TemporaryGrant> {
        match &self.kind {
            AssignmentKind::Temporary(grant) => Some(grant),
            AssignmentKind::Permanent(_) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(&Timestamp::now())
    }

    pub fn is_active_at(&self, now: &Timestamp) -> bool {
        self.kind.is_active_at(now)
    }

    /// Revoke a permanent assignment. Temporary assignments cannot be revoked.
    pub fn revoke(&mut self) -> DomainResult<()> {
        match &mut self.kind {
            AssignmentKind::Permanent(grant) => {
                grant.revoke();
                Ok(())
            }
            AssignmentKind::Temporary(_) => Err(DomainError::invalid_state(format!(
                "assignment {} is temporary and cannot be revoked",
                self.id
            ))),
        }
    }

    /// Extend a temporary assignment. Permanent assignments have no expiry.
    pub fn extend(&mut self, new_expires_at: Timestamp) -> DomainResult<()> {
        match &mut self.kind {
            AssignmentKind::Temporary(grant) => grant.extend(new_expires_at),
            AssignmentKind::Permanent(_) => Err(DomainError::invalid_state(format!(
                "assignment {} is permanent and cannot be extended",
                self.id
            ))),
        }
    }

    pub fn summary(&self) -> String {
        self.summary_at(&Timestamp::now())
    }

    /// Multi-line human-readable record, with status evaluated at `now`.
    pub fn summary_at(&self, now: &Timestamp) -> String {
        let mut out = format!(
            "[{}] {} assigned to {} by {} at {}\nReason: {}\nStatus: {}",
            self.assignment_type(),
            self.role.name(),
            self.user.username(),
            self.metadata.assigned_by(),
            self.metadata.assigned_at(),
            self.metadata.reason(),
            if self.is_active_at(now) { "ACTIVE" } else { "INACTIVE" }
        );
        if let AssignmentKind::Temporary(grant) = &self.kind {
            out.push_str(&format!(
                "\nExpires at: {} (Auto-renew: {})",
                grant.expires_at(),
                if grant.auto_renew() { "YES" } else { "NO" }
            ));
        }
        out
    }
}

impl Entity for RoleAssignment {
    type Id = AssignmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl PartialEq for RoleAssignment {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RoleAssignment {}

impl core::hash::Hash for RoleAssignment {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Incremental construction of an assignment.
///
/// Building fails with an argument error when the user, role or metadata was
/// never supplied.
#[derive(Debug, Default)]
pub struct RoleAssignmentBuilder {
    user: Option<Identity>,
    role: Option<Arc<Role>>,
    metadata: Option<AssignmentMetadata>,
}

impl RoleAssignmentBuilder {
    pub fn user(mut self, user: Identity) -> Self {
        self.user = Some(user);
        self
    }

    pub fn role(mut self, role: Arc<Role>) -> Self {
        self.role = Some(role);
        self
    }

    pub fn metadata(mut self, metadata: AssignmentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn build_permanent(self) -> DomainResult<RoleAssignment> {
        let (user, role, metadata) = self.into_parts()?;
        Ok(RoleAssignment::permanent(user, role, metadata))
    }

    pub fn build_temporary(
        self,
        expires_at: Timestamp,
        auto_renew: bool,
    ) -> DomainResult<RoleAssignment> {
        let (user, role, metadata) = self.into_parts()?;
        Ok(RoleAssignment::temporary(user, role, metadata, expires_at, auto_renew))
    }

    fn into_parts(self) -> DomainResult<(Identity, Arc<Role>, AssignmentMetadata)> {
        match (self.user, self.role, self.metadata) {
            (Some(user), Some(role), Some(metadata)) => Ok((user, role, metadata)),
            _ => Err(DomainError::invalid_argument(
                "user, role and metadata are all required for an assignment",
            )),
        }
    }
}
