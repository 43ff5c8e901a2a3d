//! Escalation guard.
//!
//! Decides whether an actor may create or edit a staff membership. Rejections
//! for missing scope are reported as `NotFound` so that callers never learn
//! about entities outside their reach.

use eb_common::{EntityId, User};

use super::branch::institution_of;
use super::flags::StaffPermissions;
use super::models::{EntityRef, EntityTree};
use super::resolver::effective_permissions;
use crate::error::StaffError;

/// Require `required` on `target`, masking failure as `NotFound`.
///
/// Returns the resolved entity on success.
pub fn require_permissions<T: EntityTree + ?Sized>(
    tree: &T,
    actor: &User,
    target: EntityId,
    required: StaffPermissions,
) -> Result<EntityRef, StaffError> {
    let entity = tree.entity(target).ok_or(StaffError::NotFound)?;
    let permissions = effective_permissions(tree, target, actor);

    if !permissions.has(required) {
        tracing::warn!(
            actor = %actor.id,
            %entity,
            ?required,
            "Permission check failed"
        );
        return Err(StaffError::NotFound);
    }

    Ok(entity)
}

/// Check if an actor may assign `requested` on `target`.
///
/// Rules:
/// 1. The target must exist and the actor must hold `ADMINISTRATE_USERS`
///    on it (`NotFound` otherwise)
/// 2. `requested` must be a subset of the actor's effective permissions
///    there (`SelfEscalation` otherwise)
///
/// The empty set is always assignable once the scope check passes.
pub fn can_assign<T: EntityTree + ?Sized>(
    tree: &T,
    actor: &User,
    target: EntityId,
    requested: StaffPermissions,
) -> Result<(), StaffError> {
    require_permissions(tree, actor, target, StaffPermissions::ADMINISTRATE_USERS)?;

    let actor_permissions = effective_permissions(tree, target, actor);
    let missing = requested & !actor_permissions;
    if !missing.is_empty() {
        tracing::warn!(
            actor = %actor.id,
            %target,
            ?missing,
            "Rejected permission escalation"
        );
        return Err(StaffError::SelfEscalation { missing });
    }

    Ok(())
}

/// Check that the recipient of a membership teaches at the target's
/// institution.
pub fn check_recipient<T: EntityTree + ?Sized>(
    tree: &T,
    recipient: &User,
    target: EntityId,
) -> Result<(), StaffError> {
    let institution = institution_of(tree, target).ok_or(StaffError::NotFound)?;

    if recipient.belongs_to(institution.id) {
        Ok(())
    } else {
        tracing::warn!(user = %recipient.id, %institution, "Recipient outside institution");
        Err(StaffError::UserOutsideInstitution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn test_admin_may_assign_subset() {
        let mut fixture = Fixture::new();
        let admin = fixture.teacher();
        fixture.grant(
            &admin,
            fixture.faculty,
            StaffPermissions::ADMINISTRATE_USERS | StaffPermissions::SIGN,
        );

        let requested = StaffPermissions::READ | StaffPermissions::SIGN;
        assert!(can_assign(&fixture.hierarchy, &admin, fixture.issuer.id, requested).is_ok());
        assert!(can_assign(
            &fixture.hierarchy,
            &admin,
            fixture.faculty.id,
            StaffPermissions::empty()
        )
        .is_ok());
    }

    #[test]
    fn test_escalation_is_rejected_with_missing_flags() {
        let mut fixture = Fixture::new();
        let admin = fixture.teacher();
        fixture.grant(&admin, fixture.faculty, StaffPermissions::ADMINISTRATE_USERS);

        let result = can_assign(
            &fixture.hierarchy,
            &admin,
            fixture.issuer.id,
            StaffPermissions::READ | StaffPermissions::AWARD,
        );
        assert_eq!(
            result,
            Err(StaffError::SelfEscalation {
                missing: StaffPermissions::AWARD
            })
        );
    }

    #[test]
    fn test_scope_is_checked_before_escalation() {
        let mut fixture = Fixture::new();
        let signer = fixture.teacher();
        fixture.grant(&signer, fixture.faculty, StaffPermissions::SIGN);

        // Would also be an escalation, but scope wins
        let result = can_assign(
            &fixture.hierarchy,
            &signer,
            fixture.issuer.id,
            StaffPermissions::AWARD,
        );
        assert_eq!(result, Err(StaffError::NotFound));
    }

    #[test]
    fn test_admin_above_is_out_of_scope_above() {
        let mut fixture = Fixture::new();
        let admin = fixture.teacher();
        fixture.grant(&admin, fixture.issuer, StaffPermissions::ADMINISTRATE_USERS);

        assert_eq!(
            can_assign(
                &fixture.hierarchy,
                &admin,
                fixture.faculty.id,
                StaffPermissions::empty()
            ),
            Err(StaffError::NotFound)
        );
    }

    #[test]
    fn test_unknown_target_is_not_found() {
        let fixture = Fixture::new();
        let admin = fixture.teacher();

        assert_eq!(
            require_permissions(
                &fixture.hierarchy,
                &admin,
                EntityId::new(),
                StaffPermissions::empty()
            ),
            Err(StaffError::NotFound)
        );
    }

    #[test]
    fn test_require_permissions_returns_entity() {
        let fixture = Fixture::new();
        let teacher = fixture.teacher();

        assert_eq!(
            require_permissions(
                &fixture.hierarchy,
                &teacher,
                fixture.badgeclass.id,
                StaffPermissions::READ
            ),
            Ok(fixture.badgeclass)
        );
        assert_eq!(
            require_permissions(
                &fixture.hierarchy,
                &teacher,
                fixture.badgeclass.id,
                StaffPermissions::UPDATE
            ),
            Err(StaffError::NotFound)
        );
    }

    #[test]
    fn test_check_recipient() {
        let fixture = Fixture::new();
        let colleague = fixture.teacher();
        let outsider = User::teacher(EntityId::new());
        let student = User::student();

        assert!(check_recipient(&fixture.hierarchy, &colleague, fixture.issuer.id).is_ok());
        for user in [outsider, student] {
            assert_eq!(
                check_recipient(&fixture.hierarchy, &user, fixture.issuer.id),
                Err(StaffError::UserOutsideInstitution)
            );
        }
    }
}
