//! In-memory entity hierarchy.
//!
//! Owns the institution trees and their staff memberships and provides the
//! raw save/delete primitives. The rules that keep the data consistent live
//! in [`crate::permissions::consistency`]; nothing outside this crate can
//! reach the primitives directly.

use std::collections::HashMap;

use eb_common::{EntityId, MembershipId, UserId};

use crate::permissions::{EntityRef, EntityTree, StaffMembership};

/// One entity with its links, local memberships and award count.
#[derive(Debug, Clone)]
pub struct EntityNode {
    pub entity: EntityRef,
    pub parent: Option<EntityRef>,
    pub children: Vec<EntityRef>,
    pub staff: Vec<StaffMembership>,
    pub awarded_instances: u32,
}

impl EntityNode {
    const fn new(entity: EntityRef, parent: Option<EntityRef>) -> Self {
        Self {
            entity,
            parent,
            children: Vec::new(),
            staff: Vec::new(),
            awarded_instances: 0,
        }
    }
}

/// Arena of entities keyed by id, with a membership index.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    nodes: HashMap<EntityId, EntityNode>,
    memberships: HashMap<MembershipId, EntityId>,
}

impl Hierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entity node.
    #[must_use]
    pub fn node(&self, id: EntityId) -> Option<&EntityNode> {
        self.nodes.get(&id)
    }

    /// Look up a staff membership by id.
    #[must_use]
    pub fn membership(&self, id: MembershipId) -> Option<&StaffMembership> {
        let entity = self.memberships.get(&id)?;
        self.nodes
            .get(entity)?
            .staff
            .iter()
            .find(|membership| membership.id == id)
    }

    /// All entity nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &EntityNode> {
        self.nodes.values()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of staff memberships across all entities.
    #[must_use]
    pub fn membership_count(&self) -> usize {
        self.memberships.len()
    }

    // === Primitives ===

    /// Store a new node and link it below its parent.
    ///
    /// The caller has checked that the parent exists and has the right kind.
    pub(crate) fn attach(&mut self, entity: EntityRef, parent: Option<EntityRef>) {
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent.id) {
                node.children.push(entity);
            }
        }
        self.nodes.insert(entity.id, EntityNode::new(entity, parent));
    }

    /// Remove a node and unlink it from its parent.
    ///
    /// Children and memberships must already be gone.
    pub(crate) fn detach(&mut self, id: EntityId) -> Option<EntityNode> {
        let node = self.nodes.remove(&id)?;
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent.id) {
                parent_node.children.retain(|child| child.id != id);
            }
        }
        Some(node)
    }

    /// Move a node below a different parent.
    pub(crate) fn relink(&mut self, id: EntityId, new_parent: EntityRef) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let entity = node.entity;
        let old_parent = node.parent.replace(new_parent);

        if let Some(old) = old_parent {
            if let Some(old_node) = self.nodes.get_mut(&old.id) {
                old_node.children.retain(|child| child.id != id);
            }
        }
        if let Some(new_node) = self.nodes.get_mut(&new_parent.id) {
            new_node.children.push(entity);
        }
    }

    /// Insert a membership, or replace the one with the same id in place.
    pub(crate) fn put_membership(&mut self, membership: StaffMembership) {
        let Some(node) = self.nodes.get_mut(&membership.entity.id) else {
            return;
        };
        self.memberships.insert(membership.id, membership.entity.id);
        match node.staff.iter_mut().find(|m| m.id == membership.id) {
            Some(existing) => *existing = membership,
            None => node.staff.push(membership),
        }
    }

    /// Remove a membership.
    pub(crate) fn drop_membership(&mut self, id: MembershipId) -> Option<StaffMembership> {
        let entity = self.memberships.remove(&id)?;
        let node = self.nodes.get_mut(&entity)?;
        let index = node.staff.iter().position(|m| m.id == id)?;
        Some(node.staff.remove(index))
    }

    pub(crate) fn node_mut(&mut self, id: EntityId) -> Option<&mut EntityNode> {
        self.nodes.get_mut(&id)
    }
}

impl EntityTree for Hierarchy {
    fn entity(&self, id: EntityId) -> Option<EntityRef> {
        self.nodes.get(&id).map(|node| node.entity)
    }

    fn parent(&self, id: EntityId) -> Option<EntityRef> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    fn children(&self, id: EntityId) -> &[EntityRef] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    fn staff_memberships(&self, id: EntityId) -> &[StaffMembership] {
        self.nodes
            .get(&id)
            .map(|node| node.staff.as_slice())
            .unwrap_or_default()
    }

    fn memberships_of_user(&self, user: UserId) -> Vec<&StaffMembership> {
        self.nodes
            .values()
            .flat_map(|node| node.staff.iter())
            .filter(|membership| membership.user_id == user)
            .collect()
    }

    fn has_awarded_instances(&self, id: EntityId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node| node.awarded_instances > 0)
    }
}
