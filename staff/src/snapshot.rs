//! Hierarchy snapshots.
//!
//! A JSON document holding users, entities and staff memberships. Loading a
//! snapshot replays it through the normal consistency rules, so a snapshot
//! that violates them is rejected rather than silently accepted.

use std::path::Path;

use eb_common::{EntityId, EntityKind, MembershipId, User, UserId};
use serde::{Deserialize, Serialize};

use crate::error::StaffError;
use crate::hierarchy::Hierarchy;
use crate::permissions::{EntityRef, EntityTree, PermissionRecord, StaffMembership};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid entity {id}: {source}")]
    Entity { id: EntityId, source: StaffError },

    #[error("Invalid membership {id}: {source}")]
    Membership {
        id: MembershipId,
        source: StaffError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    #[serde(default)]
    pub parent: Option<EntityId>,
    #[serde(default)]
    pub awarded_instances: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    #[serde(default = "MembershipId::new")]
    pub id: MembershipId,
    pub user_id: UserId,
    pub entity_id: EntityId,
    #[serde(default)]
    pub permissions: PermissionRecord,
    #[serde(default)]
    pub granted_by: Option<UserId>,
}

/// Serialisable form of a [`Hierarchy`] and the users it refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    #[serde(default)]
    pub memberships: Vec<MembershipRecord>,
}

impl HierarchySnapshot {
    /// Read a snapshot from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Capture the state of a hierarchy.
    #[must_use]
    pub fn capture(hierarchy: &Hierarchy, users: Vec<User>) -> Self {
        let mut entities: Vec<EntityRecord> = hierarchy
            .nodes()
            .map(|node| EntityRecord {
                id: node.entity.id,
                kind: node.entity.kind,
                parent: node.parent.map(|parent| parent.id),
                awarded_instances: node.awarded_instances,
            })
            .collect();
        entities.sort_by_key(|record| (record.kind.depth(), record.id));

        let mut memberships: Vec<MembershipRecord> = hierarchy
            .nodes()
            .flat_map(|node| node.staff.iter())
            .map(|membership| MembershipRecord {
                id: membership.id,
                user_id: membership.user_id,
                entity_id: membership.entity.id,
                permissions: membership.permissions.into(),
                granted_by: membership.granted_by,
            })
            .collect();
        memberships.sort_by_key(|record| record.id);

        Self {
            users,
            entities,
            memberships,
        }
    }

    /// Build a hierarchy, inserting parents before children.
    pub fn into_hierarchy(self) -> Result<Hierarchy, SnapshotError> {
        let mut hierarchy = Hierarchy::new();

        let mut entities = self.entities;
        entities.sort_by_key(|record| record.kind.depth());
        for record in entities {
            let id = record.id;
            let invalid = |source| SnapshotError::Entity { id, source };

            hierarchy
                .insert_entity_with_id(EntityRef::new(record.kind, id), record.parent)
                .map_err(invalid)?;
            hierarchy
                .set_awarded_instances(id, record.awarded_instances)
                .map_err(invalid)?;
        }

        for record in self.memberships {
            let id = record.id;
            let entity = hierarchy
                .entity(record.entity_id)
                .ok_or(StaffError::NotFound)
                .map_err(|source| SnapshotError::Membership { id, source })?;

            let mut membership =
                StaffMembership::new(record.user_id, entity, record.permissions.into());
            membership.id = id;
            membership.granted_by = record.granted_by;

            hierarchy
                .insert_membership(membership)
                .map_err(|source| SnapshotError::Membership { id, source })?;
        }

        tracing::debug!(
            entities = hierarchy.len(),
            memberships = hierarchy.membership_count(),
            "Loaded hierarchy snapshot"
        );
        Ok(hierarchy)
    }

    #[must_use]
    pub fn find_user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }
}
