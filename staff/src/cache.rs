//! Effective Permission Cache
//!
//! Memoises resolved permission sets using `DashMap` for lock-free
//! concurrent reads. The key carries the user's home institution and
//! teacher flag, since the implicit institution READ depends on both.
//! Entries for a user are dropped when that user's memberships change;
//! structural changes clear everything.
//!
//! The service invalidates while it still holds the hierarchy write lock,
//! so a reader can never cache a value computed from the old tree after
//! the new one is visible.

use dashmap::DashMap;
use eb_common::{EntityId, User, UserId};

use crate::permissions::StaffPermissions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    entity: EntityId,
    user: UserId,
    institution: Option<EntityId>,
    is_teacher: bool,
}

impl CacheKey {
    const fn new(entity: EntityId, user: &User) -> Self {
        Self {
            entity,
            user: user.id,
            institution: user.institution_id,
            is_teacher: user.is_teacher,
        }
    }
}

/// Thread-safe cache of effective permissions.
#[derive(Debug)]
pub struct PermissionCache {
    enabled: bool,
    entries: DashMap<CacheKey, StaffPermissions>,
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PermissionCache {
    /// Create an empty cache. A disabled cache stores nothing.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn get(&self, entity: EntityId, user: &User) -> Option<StaffPermissions> {
        self.entries
            .get(&CacheKey::new(entity, user))
            .map(|entry| *entry)
    }

    pub fn insert(&self, entity: EntityId, user: &User, permissions: StaffPermissions) {
        if self.enabled {
            self.entries.insert(CacheKey::new(entity, user), permissions);
        }
    }

    /// Drop every entry of one user.
    pub fn invalidate_user(&self, user: UserId) {
        self.entries.retain(|key, _| key.user != user);
        tracing::debug!(%user, "Invalidated permission cache for user");
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("Cleared permission cache");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
