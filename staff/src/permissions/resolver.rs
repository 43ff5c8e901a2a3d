//! Permission resolution logic.
//!
//! Computes a user's effective permissions on an entity by combining the
//! local staff membership with everything granted on the ancestors.

use eb_common::{EntityId, EntityKind, User, UserId};

use super::flags::StaffPermissions;
use super::models::{EntityTree, StaffMembership};

/// The user's staff membership directly on this entity, if any.
pub fn staff_member<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    user: UserId,
) -> Option<&StaffMembership> {
    tree.staff_memberships(entity)
        .iter()
        .find(|membership| membership.user_id == user)
}

/// Permissions granted on this entity only, ignoring ancestors.
///
/// Empty when the user holds no membership here.
pub fn local_permissions<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    user: UserId,
) -> StaffPermissions {
    staff_member(tree, entity, user)
        .map(|membership| membership.permissions)
        .unwrap_or_default()
}

/// Check the local membership alone for all `required` permissions.
pub fn check_local_permissions<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    user: UserId,
    required: StaffPermissions,
) -> bool {
    staff_member(tree, entity, user).is_some_and(|membership| membership.has(required))
}

/// Memberships on this entity that hold every permission in `required`.
///
/// An empty `required` returns all local memberships.
pub fn local_staff_members<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    required: StaffPermissions,
) -> Vec<&StaffMembership> {
    tree.staff_memberships(entity)
        .iter()
        .filter(|membership| membership.has(required))
        .collect()
}

/// Compute effective permissions for a user on an entity.
///
/// Resolution order:
/// 1. Take the local membership's permissions (empty if none)
/// 2. OR them with the parent's effective permissions, recursively
/// 3. At the institution, grant `READ` to teachers of that institution
///
/// A flag held on an ancestor is therefore never lost on a descendant. The
/// recursion is bounded by the four levels of the hierarchy.
pub fn effective_permissions<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    user: &User,
) -> StaffPermissions {
    let local = local_permissions(tree, entity, user.id);

    match tree.parent(entity) {
        Some(parent) => local | effective_permissions(tree, parent.id, user),
        None => {
            let is_home_institution = tree
                .entity(entity)
                .is_some_and(|e| e.kind == EntityKind::Institution && user.belongs_to(e.id));

            if is_home_institution {
                local | StaffPermissions::READ
            } else {
                local
            }
        }
    }
}

/// Check if a user holds all `required` permissions on an entity.
///
/// Unknown entities have no resolvable permission set and always answer
/// `false`, even for an empty requirement.
pub fn has_permissions<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    user: &User,
    required: StaffPermissions,
) -> bool {
    if tree.entity(entity).is_none() {
        return false;
    }

    let permissions = effective_permissions(tree, entity, user);
    tracing::trace!(%entity, user = %user.id, ?permissions, ?required, "Resolved permissions");
    permissions.has(required)
}
