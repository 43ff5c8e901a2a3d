//! Entity and staff membership models.

use std::fmt;

use chrono::{DateTime, Utc};
use eb_common::{EntityId, EntityKind, MembershipId, UserId};
use serde::{Deserialize, Serialize};

use super::flags::{PermissionRecord, StaffPermissions};

/// Typed reference to an entity of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    #[must_use]
    pub const fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Binds one user to one entity with a permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffMembership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub entity: EntityRef,
    #[serde(serialize_with = "serialize_permissions")]
    pub permissions: StaffPermissions,
    pub granted_by: Option<UserId>,
    pub granted_at: DateTime<Utc>,
}

impl StaffMembership {
    /// New membership granted now.
    #[must_use]
    pub fn new(user_id: UserId, entity: EntityRef, permissions: StaffPermissions) -> Self {
        Self {
            id: MembershipId::new(),
            user_id,
            entity,
            permissions,
            granted_by: None,
            granted_at: Utc::now(),
        }
    }

    /// Record the user who granted this membership.
    #[must_use]
    pub fn granted_by(mut self, actor: UserId) -> Self {
        self.granted_by = Some(actor);
        self
    }

    /// Check if this membership holds all of the specified permission(s).
    #[must_use]
    pub const fn has(&self, permissions: StaffPermissions) -> bool {
        self.permissions.has(permissions)
    }
}

fn serialize_permissions<S: serde::Serializer>(
    permissions: &StaffPermissions,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    PermissionRecord::from(*permissions).serialize(serializer)
}

/// Read access to the entity hierarchy and its staff memberships.
///
/// Implemented by whatever owns the entities (the in-memory
/// [`Hierarchy`](crate::hierarchy::Hierarchy) here, an ORM-backed view
/// elsewhere). Every permission algorithm is written against this trait.
///
/// Lookups of unknown ids are not errors: they answer `None` or an empty
/// slice.
pub trait EntityTree {
    /// Resolve an id to its typed reference.
    fn entity(&self, id: EntityId) -> Option<EntityRef>;

    /// The parent of an entity; `None` for institutions.
    fn parent(&self, id: EntityId) -> Option<EntityRef>;

    /// Direct children of an entity; empty for badge classes.
    fn children(&self, id: EntityId) -> &[EntityRef];

    /// Staff memberships held directly on an entity.
    fn staff_memberships(&self, id: EntityId) -> &[StaffMembership];

    /// Every staff membership a user holds, on any entity.
    fn memberships_of_user(&self, user: UserId) -> Vec<&StaffMembership>;

    /// Whether awarded credentials are attached to this entity.
    fn has_awarded_instances(&self, id: EntityId) -> bool;
}
