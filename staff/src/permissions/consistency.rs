//! Consistency rules for mutations of the hierarchy.
//!
//! Every mutating operation on [`Hierarchy`] goes through this module. Each
//! one validates first and only then touches the tree, so a rejected call
//! leaves the hierarchy unchanged. Successful calls report the cache events
//! they produce; delivering them is the caller's job once the surrounding
//! transaction has committed.

use eb_common::{EntityId, EntityKind, MembershipId, UserId};

use super::branch::{branch_of, institution_of, staff_memberships_in_branch, BranchScope};
use super::flags::StaffPermissions;
use super::models::{EntityRef, EntityTree, StaffMembership};
use crate::error::StaffError;
use crate::events::CacheEvent;
use crate::hierarchy::Hierarchy;

/// Which cached permission sets a mutation makes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affected {
    /// Only the sets of one user.
    User(UserId),
    /// Potentially every set.
    Structure,
    /// No resolved permission changes.
    Nothing,
}

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<CacheEvent>,
    pub affected: Affected,
}

impl<T> Outcome<T> {
    fn new(value: T, events: Vec<CacheEvent>, affected: Affected) -> Self {
        Self {
            value,
            events,
            affected,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            events: self.events,
            affected: self.affected,
        }
    }
}

/// Everything removed by a cascading delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedBranch {
    /// Removed entities, leaves first.
    pub entities: Vec<EntityRef>,
    pub memberships: Vec<StaffMembership>,
}

impl Hierarchy {
    // === Entities ===

    /// Create an entity with a fresh id below `parent`.
    ///
    /// Institutions take no parent; every other kind needs a parent of
    /// exactly [`EntityKind::parent_kind`].
    pub fn insert_entity(
        &mut self,
        kind: EntityKind,
        parent: Option<EntityId>,
    ) -> Result<Outcome<EntityRef>, StaffError> {
        self.insert_entity_with_id(EntityRef::new(kind, EntityId::new()), parent)
    }

    /// Create an entity with a known id. Saving triggers an invalidation of
    /// the parent only.
    pub fn insert_entity_with_id(
        &mut self,
        entity: EntityRef,
        parent: Option<EntityId>,
    ) -> Result<Outcome<EntityRef>, StaffError> {
        if self.entity(entity.id).is_some() {
            return Err(StaffError::DuplicateEntity);
        }

        let parent = match parent {
            Some(parent_id) => {
                let parent = self.entity(parent_id).ok_or(StaffError::NotFound)?;
                check_parent_kind(entity.kind, parent)?;
                Some(parent)
            }
            None if entity.kind.parent_kind().is_some() => {
                return Err(StaffError::MissingParent { kind: entity.kind });
            }
            None => None,
        };

        self.attach(entity, parent);
        tracing::debug!(%entity, "Saved entity");

        let events = parent.map(CacheEvent::Invalidate).into_iter().collect();
        Ok(Outcome::new(entity, events, Affected::Structure))
    }

    /// Re-save an existing entity, e.g. after its attributes were edited.
    pub fn save_entity(&mut self, id: EntityId) -> Result<Outcome<EntityRef>, StaffError> {
        let entity = self.entity(id).ok_or(StaffError::NotFound)?;
        let events = self
            .parent(id)
            .map(CacheEvent::Invalidate)
            .into_iter()
            .collect();
        Ok(Outcome::new(entity, events, Affected::Nothing))
    }

    /// Re-parent an entity together with its subtree.
    ///
    /// Rejected when a user holding a membership inside the moved subtree
    /// also holds one on the new ancestor chain, since both would then share
    /// a branch. Entities never leave their institution; a parent in another
    /// institution is reported as missing.
    pub fn move_entity(
        &mut self,
        id: EntityId,
        new_parent: EntityId,
    ) -> Result<Outcome<EntityRef>, StaffError> {
        let entity = self.entity(id).ok_or(StaffError::NotFound)?;
        let new_parent = self.entity(new_parent).ok_or(StaffError::NotFound)?;
        check_parent_kind(entity.kind, new_parent)?;
        if institution_of(&*self, id) != institution_of(&*self, new_parent.id) {
            return Err(StaffError::NotFound);
        }

        let old_parent = self.parent(id);
        if old_parent == Some(new_parent) {
            return Ok(Outcome::new(
                entity,
                vec![CacheEvent::Invalidate(new_parent)],
                Affected::Nothing,
            ));
        }

        let ancestors = branch_of(&*self, new_parent.id, BranchScope::ANCESTORS);
        let conflict = branch_of(&*self, id, BranchScope::DESCENDANTS)
            .iter()
            .flat_map(|moved| self.staff_memberships(moved.id))
            .any(|membership| {
                ancestors.iter().any(|ancestor| {
                    self.staff_memberships(ancestor.id)
                        .iter()
                        .any(|other| other.user_id == membership.user_id)
                })
            });
        if conflict {
            return Err(StaffError::ConflictingMembership);
        }

        self.relink(id, new_parent);
        tracing::debug!(%entity, %new_parent, "Moved entity");

        let mut events: Vec<_> = old_parent.map(CacheEvent::Invalidate).into_iter().collect();
        events.push(CacheEvent::Invalidate(new_parent));
        Ok(Outcome::new(entity, events, Affected::Structure))
    }

    /// Delete an entity and everything below it.
    ///
    /// Order of operations:
    /// 1. Refuse if the entity or any descendant has awarded instances
    /// 2. Delete children, recursively, without notifying their parents
    /// 3. Delete the entity's own staff memberships
    /// 4. Delete the entity
    /// 5. Invalidate the parent, once
    pub fn delete_entity(&mut self, id: EntityId) -> Result<Outcome<DeletedBranch>, StaffError> {
        let entity = self.entity(id).ok_or(StaffError::NotFound)?;

        let protected = branch_of(&*self, id, BranchScope::DESCENDANTS)
            .iter()
            .any(|e| self.has_awarded_instances(e.id));
        if protected {
            return Err(StaffError::ProtectedDelete { kind: entity.kind });
        }

        let parent = self.parent(id);
        let mut removed = DeletedBranch::default();
        self.delete_subtree(entity, &mut removed);

        tracing::debug!(
            %entity,
            entities = removed.entities.len(),
            memberships = removed.memberships.len(),
            "Deleted entity"
        );

        let events = parent.map(CacheEvent::Invalidate).into_iter().collect();
        Ok(Outcome::new(removed, events, Affected::Structure))
    }

    fn delete_subtree(&mut self, entity: EntityRef, removed: &mut DeletedBranch) {
        let children = self.children(entity.id).to_vec();
        for child in children {
            self.delete_subtree(child, removed);
        }

        let local: Vec<MembershipId> = self
            .staff_memberships(entity.id)
            .iter()
            .map(|membership| membership.id)
            .collect();
        for membership in local {
            if let Some(membership) = self.drop_membership(membership) {
                removed.memberships.push(membership);
            }
        }

        if self.detach(entity.id).is_some() {
            removed.entities.push(entity);
        }
    }

    /// Record how many awarded credentials hang off an entity.
    pub fn set_awarded_instances(
        &mut self,
        id: EntityId,
        count: u32,
    ) -> Result<Outcome<()>, StaffError> {
        let node = self.node_mut(id).ok_or(StaffError::NotFound)?;
        node.awarded_instances = count;
        Ok(Outcome::new((), Vec::new(), Affected::Nothing))
    }

    // === Staff memberships ===

    /// Persist a new membership.
    ///
    /// Rejected if the same user already holds a membership anywhere in the
    /// branch of the target entity.
    pub fn insert_membership(
        &mut self,
        membership: StaffMembership,
    ) -> Result<Outcome<StaffMembership>, StaffError> {
        let entity = self.entity(membership.entity.id).ok_or(StaffError::NotFound)?;
        if entity != membership.entity {
            return Err(StaffError::NotFound);
        }
        if self.membership(membership.id).is_some() {
            return Err(StaffError::ConflictingMembership);
        }
        self.check_conflicts(entity.id, membership.user_id, None)?;

        let user = membership.user_id;
        self.put_membership(membership.clone());
        tracing::debug!(%entity, %user, permissions = ?membership.permissions, "Saved staff membership");

        Ok(Outcome::new(
            membership,
            vec![CacheEvent::Invalidate(entity)],
            Affected::User(user),
        ))
    }

    /// Replace the permissions of an existing membership.
    pub fn update_membership(
        &mut self,
        id: MembershipId,
        permissions: StaffPermissions,
    ) -> Result<Outcome<StaffMembership>, StaffError> {
        let mut membership = self.membership(id).cloned().ok_or(StaffError::NotFound)?;
        self.check_conflicts(membership.entity.id, membership.user_id, Some(id))?;

        membership.permissions = permissions;
        self.put_membership(membership.clone());
        tracing::debug!(%id, ?permissions, "Updated staff membership");

        let entity = membership.entity;
        let user = membership.user_id;
        Ok(Outcome::new(
            membership,
            vec![CacheEvent::Invalidate(entity)],
            Affected::User(user),
        ))
    }

    /// Remove a membership.
    ///
    /// The only membership on an institution can never be removed this way.
    pub fn remove_membership(
        &mut self,
        id: MembershipId,
    ) -> Result<Outcome<StaffMembership>, StaffError> {
        let entity = self
            .membership(id)
            .map(|membership| membership.entity)
            .ok_or(StaffError::NotFound)?;

        if entity.kind == EntityKind::Institution && self.staff_memberships(entity.id).len() <= 1 {
            return Err(StaffError::LastAdminRemoval);
        }

        let membership = self.drop_membership(id).ok_or(StaffError::NotFound)?;
        tracing::debug!(%id, %entity, "Removed staff membership");

        let user = membership.user_id;
        Ok(Outcome::new(
            membership,
            vec![CacheEvent::Invalidate(entity)],
            Affected::User(user),
        ))
    }

    fn check_conflicts(
        &self,
        entity: EntityId,
        user: UserId,
        editing: Option<MembershipId>,
    ) -> Result<(), StaffError> {
        let conflicting = staff_memberships_in_branch(&*self, entity, user)
            .into_iter()
            .any(|membership| Some(membership.id) != editing);

        if conflicting {
            tracing::warn!(%entity, %user, "Conflicting staff membership");
            return Err(StaffError::ConflictingMembership);
        }
        Ok(())
    }
}

fn check_parent_kind(child: EntityKind, parent: EntityRef) -> Result<(), StaffError> {
    if child.parent_kind() == Some(parent.kind) {
        Ok(())
    } else {
        Err(StaffError::InvalidParent {
            child,
            parent: parent.kind,
        })
    }
}
