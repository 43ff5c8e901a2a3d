//! Staff Service
//!
//! Transactional boundary around the hierarchy. Reads share a read lock.
//! Every mutation runs against a working copy under the write lock and is
//! swapped in only if the whole cascade succeeded, so readers observe either
//! the old or the new tree. Cache events go out after the swap.

use std::collections::HashSet;
use std::sync::Arc;

use eb_common::{EntityId, EntityKind, MembershipId, User, UserId};
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use crate::cache::PermissionCache;
use crate::config::StaffConfig;
use crate::error::StaffError;
use crate::events::{CacheEvent, InvalidationSink};
use crate::hierarchy::Hierarchy;
use crate::permissions::{
    self, can_assign, check_recipient, require_permissions, Affected, BranchScope,
    DeletedBranch, EntityRef, EntityTree, Outcome, StaffMembership, StaffPermissions,
};

/// Shared staff permission state.
pub struct StaffService {
    hierarchy: RwLock<Hierarchy>,
    cache: PermissionCache,
    sink: Arc<dyn InvalidationSink>,
}

impl StaffService {
    #[must_use]
    pub fn new(hierarchy: Hierarchy, config: &StaffConfig, sink: Arc<dyn InvalidationSink>) -> Self {
        Self {
            hierarchy: RwLock::new(hierarchy),
            cache: PermissionCache::new(config.permission_cache),
            sink,
        }
    }

    /// Service publishing to a broadcast channel, plus a first subscriber.
    #[must_use]
    pub fn with_broadcast(
        hierarchy: Hierarchy,
        config: &StaffConfig,
    ) -> (Self, broadcast::Receiver<CacheEvent>) {
        let (tx, rx) = broadcast::channel(config.invalidation_buffer.max(1));
        (Self::new(hierarchy, config, Arc::new(tx)), rx)
    }

    #[must_use]
    pub const fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Copy of the current committed tree.
    pub async fn hierarchy(&self) -> Hierarchy {
        self.hierarchy.read().await.clone()
    }

    /// Run a mutation atomically.
    ///
    /// The closure works on a copy; on error the copy is dropped and nothing
    /// is published. Cache entries are dropped before the write lock is
    /// released.
    async fn transact<T>(
        &self,
        mutation: impl FnOnce(&mut Hierarchy) -> Result<Outcome<T>, StaffError>,
    ) -> Result<T, StaffError> {
        let outcome = {
            let mut committed = self.hierarchy.write().await;
            let mut working = committed.clone();
            let outcome = mutation(&mut working)?;
            *committed = working;

            match outcome.affected {
                Affected::User(user) => self.cache.invalidate_user(user),
                Affected::Structure => self.cache.clear(),
                Affected::Nothing => {}
            }
            outcome
        };

        for event in &outcome.events {
            self.sink.publish(*event);
        }
        Ok(outcome.value)
    }

    // === Reads ===

    /// Effective permissions of `user` on `entity`, memoised.
    pub async fn effective_permissions(&self, user: &User, entity: EntityId) -> StaffPermissions {
        let tree = self.hierarchy.read().await;
        self.resolve(&tree, user, entity)
    }

    pub async fn has_permissions(
        &self,
        user: &User,
        entity: EntityId,
        required: StaffPermissions,
    ) -> bool {
        // Existence and permissions are read from the same tree
        let tree = self.hierarchy.read().await;
        tree.entity(entity).is_some() && self.resolve(&tree, user, entity).has(required)
    }

    /// Cached resolution against a tree the caller holds the read lock on.
    fn resolve(&self, tree: &Hierarchy, user: &User, entity: EntityId) -> StaffPermissions {
        if let Some(cached) = self.cache.get(entity, user) {
            return cached;
        }

        let permissions = permissions::effective_permissions(tree, entity, user);
        if tree.entity(entity).is_some() {
            self.cache.insert(entity, user, permissions);
        }
        permissions
    }

    pub async fn branch_of(&self, entity: EntityId, scope: BranchScope) -> Vec<EntityRef> {
        permissions::branch_of(&*self.hierarchy.read().await, entity, scope)
    }

    pub async fn administrable_scope(&self, actor: UserId) -> HashSet<EntityRef> {
        permissions::administrable_scope(&*self.hierarchy.read().await, actor)
    }

    /// Every membership a user holds.
    pub async fn memberships_of(&self, user: UserId) -> Vec<StaffMembership> {
        self.hierarchy
            .read()
            .await
            .memberships_of_user(user)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Local staff of an entity, for its administration view.
    pub async fn staff_of(
        &self,
        actor: &User,
        entity: EntityId,
    ) -> Result<Vec<StaffMembership>, StaffError> {
        let tree = self.hierarchy.read().await;
        require_permissions(&*tree, actor, entity, StaffPermissions::ADMINISTRATE_USERS)?;
        Ok(tree.staff_memberships(entity).to_vec())
    }

    // === Staff memberships ===

    /// Grant `permissions` on `entity` to `recipient`.
    #[tracing::instrument(skip(self, actor, recipient), fields(actor = %actor.id, recipient = %recipient.id))]
    pub async fn create_membership(
        &self,
        actor: &User,
        recipient: &User,
        entity: EntityId,
        permissions: StaffPermissions,
    ) -> Result<StaffMembership, StaffError> {
        let membership = self
            .transact(|tree| {
                can_assign(&*tree, actor, entity, permissions)?;
                check_recipient(&*tree, recipient, entity)?;
                let target = tree.entity(entity).ok_or(StaffError::NotFound)?;

                tree.insert_membership(
                    StaffMembership::new(recipient.id, target, permissions).granted_by(actor.id),
                )
            })
            .await?;

        info!(membership = %membership.id, entity = %membership.entity, "Staff membership created");
        Ok(membership)
    }

    /// Replace the permissions of a membership on an entity of `kind`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn update_membership(
        &self,
        actor: &User,
        kind: EntityKind,
        id: MembershipId,
        permissions: StaffPermissions,
    ) -> Result<StaffMembership, StaffError> {
        let membership = self
            .transact(|tree| {
                let entity = membership_entity(tree, kind, id)?;
                can_assign(&*tree, actor, entity.id, permissions)?;
                tree.update_membership(id, permissions)
            })
            .await?;

        info!(membership = %membership.id, entity = %membership.entity, "Staff membership updated");
        Ok(membership)
    }

    /// Revoke a membership on an entity of `kind`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_membership(
        &self,
        actor: &User,
        kind: EntityKind,
        id: MembershipId,
    ) -> Result<StaffMembership, StaffError> {
        let membership = self
            .transact(|tree| {
                let entity = membership_entity(tree, kind, id)?;
                require_permissions(&*tree, actor, entity.id, StaffPermissions::ADMINISTRATE_USERS)?;
                tree.remove_membership(id)
            })
            .await?;

        info!(membership = %membership.id, entity = %membership.entity, "Staff membership deleted");
        Ok(membership)
    }

    // === Entities ===

    /// Create a new institution. Platform level, no actor.
    #[tracing::instrument(skip(self))]
    pub async fn create_institution(&self) -> Result<EntityRef, StaffError> {
        let institution = self
            .transact(|tree| tree.insert_entity(EntityKind::Institution, None))
            .await?;
        info!(%institution, "Institution created");
        Ok(institution)
    }

    /// Give a teacher of an institution full permissions on it. Platform
    /// level: bypasses the escalation guard, used to seed the first admin.
    #[tracing::instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn add_institution_admin(
        &self,
        institution: EntityId,
        admin: &User,
    ) -> Result<StaffMembership, StaffError> {
        self.transact(|tree| {
            let target = tree
                .entity(institution)
                .filter(|e| e.kind == EntityKind::Institution)
                .ok_or(StaffError::NotFound)?;
            check_recipient(&*tree, admin, institution)?;
            tree.insert_membership(StaffMembership::new(admin.id, target, StaffPermissions::all()))
        })
        .await
    }

    /// Create a child entity. Requires `CREATE` on the parent.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn create_entity(
        &self,
        actor: &User,
        kind: EntityKind,
        parent: EntityId,
    ) -> Result<EntityRef, StaffError> {
        let entity = self
            .transact(|tree| {
                require_permissions(&*tree, actor, parent, StaffPermissions::CREATE)?;
                tree.insert_entity(kind, Some(parent))
            })
            .await?;
        info!(%entity, "Entity created");
        Ok(entity)
    }

    /// Re-save an entity after an edit. Requires `UPDATE`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn save_entity(&self, actor: &User, id: EntityId) -> Result<EntityRef, StaffError> {
        self.transact(|tree| {
            require_permissions(&*tree, actor, id, StaffPermissions::UPDATE)?;
            tree.save_entity(id)
        })
        .await
    }

    /// Move an entity below a new parent. Requires `UPDATE` on the entity
    /// and `CREATE` on the new parent.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn move_entity(
        &self,
        actor: &User,
        id: EntityId,
        new_parent: EntityId,
    ) -> Result<EntityRef, StaffError> {
        let entity = self
            .transact(|tree| {
                require_permissions(&*tree, actor, id, StaffPermissions::UPDATE)?;
                require_permissions(&*tree, actor, new_parent, StaffPermissions::CREATE)?;
                tree.move_entity(id, new_parent)
            })
            .await?;
        info!(%entity, %new_parent, "Entity moved");
        Ok(entity)
    }

    /// Delete an entity with its subtree. Requires `DELETE`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_entity(
        &self,
        actor: &User,
        id: EntityId,
    ) -> Result<DeletedBranch, StaffError> {
        let removed = self
            .transact(|tree| {
                require_permissions(&*tree, actor, id, StaffPermissions::DELETE)?;
                tree.delete_entity(id)
            })
            .await?;
        info!(
            entity = %id,
            entities = removed.entities.len(),
            memberships = removed.memberships.len(),
            "Entity deleted"
        );
        Ok(removed)
    }

    /// Record the awarded-credential count of an entity, as reported by the
    /// award workflows.
    pub async fn set_awarded_instances(&self, id: EntityId, count: u32) -> Result<(), StaffError> {
        self.transact(|tree| tree.set_awarded_instances(id, count))
            .await
    }
}

/// Resolve the entity of a membership reached through a per-kind endpoint.
fn membership_entity(
    tree: &Hierarchy,
    kind: EntityKind,
    id: MembershipId,
) -> Result<EntityRef, StaffError> {
    tree.membership(id)
        .map(|membership| membership.entity)
        .filter(|entity| entity.kind == kind)
        .ok_or(StaffError::NotFound)
}
