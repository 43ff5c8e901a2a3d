//! End-to-end permission scenarios through the service.

mod helpers;

use eb_common::EntityKind;
use eb_staff::events::CacheEvent;
use eb_staff::permissions::{BranchScope, StaffPermissions};
use eb_staff::StaffError;
use helpers::World;

#[tokio::test]
async fn test_faculty_grant_flows_to_children() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let issuer = world.create(EntityKind::Issuer, faculty).await;
    let teacher = world.teacher();

    world.grant(&teacher, faculty, StaffPermissions::SIGN).await;

    let expected = StaffPermissions::SIGN | StaffPermissions::READ;
    assert_eq!(
        world.service.effective_permissions(&teacher, faculty.id).await,
        expected
    );
    assert_eq!(
        world.service.effective_permissions(&teacher, issuer.id).await,
        expected
    );
    assert_eq!(
        world
            .service
            .effective_permissions(&teacher, world.institution.id)
            .await,
        StaffPermissions::READ
    );
}

#[tokio::test]
async fn test_reader_cannot_grant_administration() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let reader = world.teacher();
    let colleague = world.teacher();
    world.grant(&reader, faculty, StaffPermissions::READ).await;

    for requested in [
        StaffPermissions::ADMINISTRATE_USERS,
        StaffPermissions::READ,
        StaffPermissions::empty(),
    ] {
        let result = world
            .service
            .create_membership(&reader, &colleague, faculty.id, requested)
            .await;
        assert_eq!(result, Err(StaffError::NotFound), "{requested:?}");
    }
    assert!(world.service.memberships_of(colleague.id).await.is_empty());
}

#[tokio::test]
async fn test_issuer_delete_cascades_with_single_invalidation() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let issuer = world.create(EntityKind::Issuer, faculty).await;
    let first = world.create(EntityKind::BadgeClass, issuer).await;
    let second = world.create(EntityKind::BadgeClass, issuer).await;

    let (a, b, c) = (world.teacher(), world.teacher(), world.teacher());
    world.grant(&a, first, StaffPermissions::AWARD).await;
    world.grant(&b, second, StaffPermissions::AWARD).await;
    world.grant(&c, issuer, StaffPermissions::SIGN).await;
    world.events();

    let removed = world
        .service
        .delete_entity(&world.admin, issuer.id)
        .await
        .unwrap();

    assert_eq!(world.events(), vec![CacheEvent::Invalidate(faculty)]);
    assert_eq!(removed.entities.len(), 3);
    assert_eq!(removed.memberships.len(), 3);
    assert_eq!(
        world.service.branch_of(faculty.id, BranchScope::FULL).await,
        vec![faculty, world.institution]
    );
    for user in [&a, &b, &c] {
        assert!(world.service.memberships_of(user.id).await.is_empty());
    }
}

#[tokio::test]
async fn test_ancestor_flags_are_never_lost() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let issuer = world.create(EntityKind::Issuer, faculty).await;
    let badgeclass = world.create(EntityKind::BadgeClass, issuer).await;

    for (_, flag) in StaffPermissions::FIELDS {
        let teacher = world.teacher();
        world.grant(&teacher, faculty, flag).await;

        for entity in [faculty, issuer, badgeclass] {
            assert!(
                world
                    .service
                    .has_permissions(&teacher, entity.id, flag)
                    .await,
                "{flag:?} lost on {entity}"
            );
        }
    }
}

#[tokio::test]
async fn test_granting_is_never_an_escalation_path() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let issuer = world.create(EntityKind::Issuer, faculty).await;
    let delegate = world.teacher();
    let held = StaffPermissions::ADMINISTRATE_USERS | StaffPermissions::SIGN;
    world.grant(&delegate, faculty, held).await;

    // READ comes from the home institution
    let effective = held | StaffPermissions::READ;
    for bits in 0..=StaffPermissions::all().bits() {
        let requested = StaffPermissions::from_bits_truncate(bits);
        let result = world
            .service
            .create_membership(&delegate, &world.teacher(), issuer.id, requested)
            .await;

        if effective.contains(requested) {
            assert!(result.is_ok(), "{requested:?} should be assignable");
        } else {
            assert!(
                matches!(result, Err(StaffError::SelfEscalation { .. })),
                "{requested:?} should be rejected"
            );
        }
    }
}

#[tokio::test]
async fn test_second_membership_in_branch_always_conflicts() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let issuer = world.create(EntityKind::Issuer, faculty).await;
    let badgeclass = world.create(EntityKind::BadgeClass, issuer).await;
    let other_issuer = world.create(EntityKind::Issuer, faculty).await;
    let teacher = world.teacher();
    world.grant(&teacher, issuer, StaffPermissions::READ).await;

    for entity in [world.institution, faculty, issuer, badgeclass] {
        let result = world
            .service
            .create_membership(&world.admin, &teacher, entity.id, StaffPermissions::READ)
            .await;
        assert_eq!(result, Err(StaffError::ConflictingMembership), "{entity}");
    }

    // A sibling branch is fine
    world.grant(&teacher, other_issuer, StaffPermissions::READ).await;
}

#[tokio::test]
async fn test_last_institution_membership_survives() {
    let world = World::new().await;
    let seeded = world.service.memberships_of(world.admin.id).await;
    assert_eq!(seeded.len(), 1);

    let result = world
        .service
        .delete_membership(&world.admin, EntityKind::Institution, seeded[0].id)
        .await;
    assert_eq!(result, Err(StaffError::LastAdminRemoval));

    let deputy = world.teacher();
    world
        .grant(&deputy, world.institution, StaffPermissions::all())
        .await;
    assert!(world
        .service
        .delete_membership(&deputy, EntityKind::Institution, seeded[0].id)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_awarded_instances_block_delete_for_everyone() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let issuer = world.create(EntityKind::Issuer, faculty).await;
    let badgeclass = world.create(EntityKind::BadgeClass, issuer).await;
    world
        .service
        .set_awarded_instances(badgeclass.id, 1)
        .await
        .unwrap();

    for entity in [badgeclass, issuer, faculty, world.institution] {
        let result = world.service.delete_entity(&world.admin, entity.id).await;
        assert_eq!(
            result,
            Err(StaffError::ProtectedDelete { kind: entity.kind })
        );
    }
    assert_eq!(
        world
            .service
            .branch_of(world.institution.id, BranchScope::DESCENDANTS)
            .await
            .len(),
        4
    );
}

#[tokio::test]
async fn test_administrable_scope_follows_grants() {
    let world = World::new().await;
    let faculty = world.create(EntityKind::Faculty, world.institution).await;
    let issuer = world.create(EntityKind::Issuer, faculty).await;
    let other_faculty = world.create(EntityKind::Faculty, world.institution).await;
    let manager = world.teacher();
    world
        .grant(&manager, faculty, StaffPermissions::ADMINISTRATE_USERS)
        .await;

    let scope = world.service.administrable_scope(manager.id).await;
    assert!(scope.contains(&faculty));
    assert!(scope.contains(&issuer));
    assert!(!scope.contains(&other_faculty));
    assert!(!scope.contains(&world.institution));

    assert_eq!(
        world.service.administrable_scope(world.admin.id).await.len(),
        4
    );
}
