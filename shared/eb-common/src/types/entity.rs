//! Entity Kinds
//!
//! The four levels of the institutional hierarchy:
//! Institution -> Faculty -> Issuer -> `BadgeClass`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a permissioned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Root of the tree.
    Institution,
    /// Child of an institution.
    Faculty,
    /// Child of a faculty.
    Issuer,
    /// Leaf, child of an issuer.
    BadgeClass,
}

impl EntityKind {
    /// All kinds from root to leaf.
    pub const ALL: [Self; 4] = [Self::Institution, Self::Faculty, Self::Issuer, Self::BadgeClass];

    /// The only kind an entity of this kind may be attached to.
    #[must_use]
    pub const fn parent_kind(self) -> Option<Self> {
        match self {
            Self::Institution => None,
            Self::Faculty => Some(Self::Institution),
            Self::Issuer => Some(Self::Faculty),
            Self::BadgeClass => Some(Self::Issuer),
        }
    }

    /// The only kind that may be attached below an entity of this kind.
    #[must_use]
    pub const fn child_kind(self) -> Option<Self> {
        match self {
            Self::Institution => Some(Self::Faculty),
            Self::Faculty => Some(Self::Issuer),
            Self::Issuer => Some(Self::BadgeClass),
            Self::BadgeClass => None,
        }
    }

    /// Number of parent links between this kind and the institution.
    #[must_use]
    pub const fn depth(self) -> usize {
        match self {
            Self::Institution => 0,
            Self::Faculty => 1,
            Self::Issuer => 2,
            Self::BadgeClass => 3,
        }
    }

    /// Display name, as used in user-facing messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Institution => "Institution",
            Self::Faculty => "Faculty",
            Self::Issuer => "Issuer",
            Self::BadgeClass => "BadgeClass",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
