//! Branch walking.
//!
//! A branch is an entity together with its ancestor chain and its whole
//! subtree. Branches scope conflict detection, administration listings and
//! cascading deletes.

use std::collections::HashSet;

use eb_common::{EntityId, EntityKind, UserId};

use super::flags::StaffPermissions;
use super::models::{EntityRef, EntityTree, StaffMembership};

/// Which directions to walk from the starting entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchScope {
    pub ancestors: bool,
    pub descendants: bool,
}

impl BranchScope {
    /// Ancestors and descendants.
    pub const FULL: Self = Self {
        ancestors: true,
        descendants: true,
    };

    /// The entity and its ancestor chain up to the institution.
    pub const ANCESTORS: Self = Self {
        ancestors: true,
        descendants: false,
    };

    /// The entity and its whole subtree.
    pub const DESCENDANTS: Self = Self {
        ancestors: false,
        descendants: true,
    };
}

impl Default for BranchScope {
    fn default() -> Self {
        Self::FULL
    }
}

/// Collect the branch of an entity.
///
/// The entity itself comes first, then its ancestors (walked with
/// descendants disabled so siblings are never entered), then its subtree
/// (walked with ancestors disabled). Every entity appears once. Unknown ids
/// yield an empty branch.
pub fn branch_of<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    scope: BranchScope,
) -> Vec<EntityRef> {
    let mut branch = Vec::new();
    if let Some(start) = tree.entity(entity) {
        walk(tree, start, scope, &mut branch);
    }
    branch
}

fn walk<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityRef,
    scope: BranchScope,
    branch: &mut Vec<EntityRef>,
) {
    branch.push(entity);

    if scope.ancestors {
        if let Some(parent) = tree.parent(entity.id) {
            walk(tree, parent, BranchScope::ANCESTORS, branch);
        }
    }

    if scope.descendants {
        for &child in tree.children(entity.id) {
            walk(tree, child, BranchScope::DESCENDANTS, branch);
        }
    }
}

/// The institution at the root of an entity's branch.
pub fn institution_of<T: EntityTree + ?Sized>(tree: &T, entity: EntityId) -> Option<EntityRef> {
    branch_of(tree, entity, BranchScope::ANCESTORS)
        .pop()
        .filter(|root| root.kind == EntityKind::Institution)
}

/// Every membership of `user` anywhere in the branch of `entity`.
pub fn staff_memberships_in_branch<T: EntityTree + ?Sized>(
    tree: &T,
    entity: EntityId,
    user: UserId,
) -> Vec<&StaffMembership> {
    branch_of(tree, entity, BranchScope::FULL)
        .into_iter()
        .flat_map(|e| tree.staff_memberships(e.id))
        .filter(|membership| membership.user_id == user)
        .collect()
}

/// Entities whose staff the actor may administrate.
///
/// The union of the subtrees below every entity where the actor holds a
/// local `ADMINISTRATE_USERS` grant. Membership in this set is equivalent to
/// holding `ADMINISTRATE_USERS` in the effective permissions.
pub fn administrable_scope<T: EntityTree + ?Sized>(tree: &T, actor: UserId) -> HashSet<EntityRef> {
    tree.memberships_of_user(actor)
        .into_iter()
        .filter(|membership| membership.has(StaffPermissions::ADMINISTRATE_USERS))
        .flat_map(|membership| branch_of(tree, membership.entity.id, BranchScope::DESCENDANTS))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::permissions::resolver::effective_permissions;
    use crate::test_support::Fixture;

    fn as_set(entities: Vec<EntityRef>) -> HashSet<EntityRef> {
        entities.into_iter().collect()
    }

    #[test]
    fn test_branch_from_issuer_viewpoint() {
        let mut fixture = Fixture::new();
        let sibling_issuer = fixture.add(EntityKind::Issuer, fixture.faculty);
        let second_badgeclass = fixture.add(EntityKind::BadgeClass, fixture.issuer);

        let branch = branch_of(&fixture.hierarchy, fixture.issuer.id, BranchScope::FULL);

        assert_eq!(branch.len(), 5);
        assert_eq!(branch[0], fixture.issuer);
        assert_eq!(
            as_set(branch),
            HashSet::from([
                fixture.institution,
                fixture.faculty,
                fixture.issuer,
                fixture.badgeclass,
                second_badgeclass,
            ])
        );
        assert_eq!(fixture.hierarchy.children(fixture.faculty.id).len(), 2);
        assert!(!branch_of(&fixture.hierarchy, fixture.issuer.id, BranchScope::FULL)
            .contains(&sibling_issuer));
    }

    #[test]
    fn test_branch_never_enters_siblings() {
        let mut fixture = Fixture::new();
        let sibling_issuer = fixture.add(EntityKind::Issuer, fixture.faculty);
        let sibling_badgeclass = fixture.add(EntityKind::BadgeClass, sibling_issuer);

        let branch = as_set(branch_of(
            &fixture.hierarchy,
            fixture.badgeclass.id,
            BranchScope::FULL,
        ));

        assert!(!branch.contains(&sibling_issuer));
        assert!(!branch.contains(&sibling_badgeclass));
        assert_eq!(branch.len(), 4);
    }

    #[test]
    fn test_single_direction_scopes() {
        let fixture = Fixture::new();
        let tree = &fixture.hierarchy;

        assert_eq!(
            branch_of(tree, fixture.faculty.id, BranchScope::ANCESTORS),
            vec![fixture.faculty, fixture.institution]
        );
        assert_eq!(
            branch_of(tree, fixture.faculty.id, BranchScope::DESCENDANTS),
            vec![fixture.faculty, fixture.issuer, fixture.badgeclass]
        );
    }

    #[test]
    fn test_branch_of_unknown_entity_is_empty() {
        let fixture = Fixture::new();
        assert!(branch_of(&fixture.hierarchy, EntityId::new(), BranchScope::FULL).is_empty());
    }

    #[test]
    fn test_institution_of() {
        let fixture = Fixture::new();
        let tree = &fixture.hierarchy;

        assert_eq!(
            institution_of(tree, fixture.badgeclass.id),
            Some(fixture.institution)
        );
        assert_eq!(
            institution_of(tree, fixture.institution.id),
            Some(fixture.institution)
        );
        assert_eq!(institution_of(tree, EntityId::new()), None);
    }

    #[test]
    fn test_staff_memberships_in_branch_filters_by_user() {
        let mut fixture = Fixture::new();
        let teacher = fixture.teacher();
        let colleague = fixture.teacher();
        fixture.grant(&teacher, fixture.institution, StaffPermissions::READ);
        fixture.grant(&colleague, fixture.issuer, StaffPermissions::SIGN);

        let tree = &fixture.hierarchy;
        let found = staff_memberships_in_branch(tree, fixture.badgeclass.id, teacher.id);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity, fixture.institution);

        let found = staff_memberships_in_branch(tree, fixture.faculty.id, colleague.id);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity, fixture.issuer);
    }

    #[test]
    fn test_administrable_scope_walks_down_only() {
        let mut fixture = Fixture::new();
        let other_faculty = fixture.add(EntityKind::Faculty, fixture.institution);
        let admin = fixture.teacher();
        fixture.grant(
            &admin,
            fixture.faculty,
            StaffPermissions::READ | StaffPermissions::ADMINISTRATE_USERS,
        );

        let scope = administrable_scope(&fixture.hierarchy, admin.id);
        assert_eq!(
            scope,
            HashSet::from([fixture.faculty, fixture.issuer, fixture.badgeclass])
        );
        assert!(!scope.contains(&fixture.institution));
        assert!(!scope.contains(&other_faculty));
    }

    #[test]
    fn test_administrable_scope_matches_effective_permissions() {
        let mut fixture = Fixture::new();
        fixture.add(EntityKind::Faculty, fixture.institution);
        let admin = fixture.teacher();
        let reader = fixture.teacher();
        fixture.grant(&admin, fixture.issuer, StaffPermissions::ADMINISTRATE_USERS);
        fixture.grant(&reader, fixture.institution, StaffPermissions::READ);

        let tree = &fixture.hierarchy;
        for user in [&admin, &reader] {
            let scope = administrable_scope(tree, user.id);
            for node in tree.nodes() {
                let holds = effective_permissions(tree, node.entity.id, user)
                    .has(StaffPermissions::ADMINISTRATE_USERS);
                assert_eq!(scope.contains(&node.entity), holds, "{}", node.entity);
            }
        }
    }
}
