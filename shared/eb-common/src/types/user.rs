//! User Types

use serde::{Deserialize, Serialize};

use super::ids::{EntityId, UserId};

/// The parts of a user the permission core needs.
///
/// Teachers are attached to exactly one home institution. Students carry no
/// institution for permission purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Home institution of a teacher.
    #[serde(default)]
    pub institution_id: Option<EntityId>,
    /// Whether the user is a teacher.
    #[serde(default)]
    pub is_teacher: bool,
}

impl User {
    /// A teacher belonging to `institution_id`.
    #[must_use]
    pub fn teacher(institution_id: EntityId) -> Self {
        Self {
            id: UserId::new(),
            institution_id: Some(institution_id),
            is_teacher: true,
        }
    }

    /// A student, who never belongs to an institution's staff.
    #[must_use]
    pub fn student() -> Self {
        Self {
            id: UserId::new(),
            institution_id: None,
            is_teacher: false,
        }
    }

    /// Whether this user is a teacher of the given institution.
    #[must_use]
    pub fn belongs_to(&self, institution: EntityId) -> bool {
        self.is_teacher && self.institution_id == Some(institution)
    }
}
