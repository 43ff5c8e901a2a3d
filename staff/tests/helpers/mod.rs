//! Reusable helpers for staff integration tests.
//!
//! [`World`] builds a service holding one institution with an admin and a
//! recording invalidation sink, plus shortcuts for growing the tree.
#![allow(dead_code)]

use std::sync::Arc;

use eb_common::{EntityKind, User};
use eb_staff::config::StaffConfig;
use eb_staff::events::{CacheEvent, RecordingSink};
use eb_staff::permissions::{EntityRef, StaffMembership, StaffPermissions};
use eb_staff::{Hierarchy, StaffService};

pub struct World {
    pub service: StaffService,
    pub sink: Arc<RecordingSink>,
    pub institution: EntityRef,
    /// Holds every permission on the institution.
    pub admin: User,
}

impl World {
    pub async fn new() -> Self {
        let sink = Arc::new(RecordingSink::new());
        let service = StaffService::new(Hierarchy::new(), &StaffConfig::default(), sink.clone());

        let institution = service
            .create_institution()
            .await
            .expect("Failed to create institution");
        let admin = User::teacher(institution.id);
        service
            .add_institution_admin(institution.id, &admin)
            .await
            .expect("Failed to seed institution admin");
        sink.drain();

        Self {
            service,
            sink,
            institution,
            admin,
        }
    }

    /// A teacher of this world's institution.
    pub fn teacher(&self) -> User {
        User::teacher(self.institution.id)
    }

    /// Create an entity as the institution admin.
    pub async fn create(&self, kind: EntityKind, parent: EntityRef) -> EntityRef {
        self.service
            .create_entity(&self.admin, kind, parent.id)
            .await
            .expect("Failed to create entity")
    }

    /// Grant as the institution admin.
    pub async fn grant(
        &self,
        user: &User,
        entity: EntityRef,
        permissions: StaffPermissions,
    ) -> StaffMembership {
        self.service
            .create_membership(&self.admin, user, entity.id, permissions)
            .await
            .expect("Failed to grant membership")
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        self.sink.drain()
    }
}
