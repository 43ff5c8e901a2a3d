//! Staff permissions using bitflags.
//!
//! Seven independent flags granted through a staff membership. The wire form
//! used by the API layer is [`PermissionRecord`], one `may_*` field per flag.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Staff permissions represented as a 7-bit bitfield.
    ///
    /// Stored as SMALLINT by the persistence layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct StaffPermissions: u8 {
        /// Permission to create child entities
        const CREATE             = 1 << 0;
        /// Permission to view the entity
        const READ               = 1 << 1;
        /// Permission to edit the entity
        const UPDATE             = 1 << 2;
        /// Permission to delete the entity
        const DELETE             = 1 << 3;
        /// Permission to sign awarded badges
        const SIGN               = 1 << 4;
        /// Permission to award badges
        const AWARD              = 1 << 5;
        /// Permission to grant, edit and revoke staff memberships
        const ADMINISTRATE_USERS = 1 << 6;
    }
}

impl StaffPermissions {
    /// Wire names of every flag, in bit order.
    pub const FIELDS: [(&'static str, Self); 7] = [
        ("may_create", Self::CREATE),
        ("may_read", Self::READ),
        ("may_update", Self::UPDATE),
        ("may_delete", Self::DELETE),
        ("may_sign", Self::SIGN),
        ("may_award", Self::AWARD),
        ("may_administrate_users", Self::ADMINISTRATE_USERS),
    ];

    // === Database Conversion ===

    /// Create permissions from a database SMALLINT value.
    ///
    /// Unknown bits are dropped.
    #[must_use]
    pub const fn from_db(value: i16) -> Self {
        Self::from_bits_truncate(value as u8)
    }

    /// Convert permissions to a database SMALLINT value.
    #[must_use]
    pub const fn to_db(self) -> i16 {
        self.bits() as i16
    }

    // === Wire Names ===

    /// Look up a single flag by its wire name (e.g. `"may_sign"`).
    #[must_use]
    pub fn from_field(name: &str) -> Option<Self> {
        Self::FIELDS
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, flag)| *flag)
    }

    /// Combine several wire names into one set.
    ///
    /// Returns `None` if any name is unknown.
    pub fn from_fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        names
            .into_iter()
            .try_fold(Self::empty(), |acc, name| Self::from_field(name).map(|f| acc | f))
    }

    // === Permission Checking ===

    /// Check if this permission set includes all of the specified permission(s).
    ///
    /// # Examples
    ///
    /// ```
    /// use eb_staff::permissions::StaffPermissions;
    ///
    /// let perms = StaffPermissions::READ | StaffPermissions::SIGN;
    /// assert!(perms.has(StaffPermissions::SIGN));
    /// assert!(!perms.has(StaffPermissions::SIGN | StaffPermissions::AWARD));
    /// ```
    #[must_use]
    pub const fn has(self, permission: Self) -> bool {
        self.contains(permission)
    }
}

impl Default for StaffPermissions {
    fn default() -> Self {
        Self::empty()
    }
}

/// Wire representation of a permission set.
///
/// Serialised as `0`/`1` integers; deserialisation also accepts booleans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    #[serde(default, with = "flag")]
    pub may_create: bool,
    #[serde(default, with = "flag")]
    pub may_read: bool,
    #[serde(default, with = "flag")]
    pub may_update: bool,
    #[serde(default, with = "flag")]
    pub may_delete: bool,
    #[serde(default, with = "flag")]
    pub may_sign: bool,
    #[serde(default, with = "flag")]
    pub may_award: bool,
    #[serde(default, with = "flag")]
    pub may_administrate_users: bool,
}

impl From<PermissionRecord> for StaffPermissions {
    fn from(record: PermissionRecord) -> Self {
        let mut perms = Self::empty();
        perms.set(Self::CREATE, record.may_create);
        perms.set(Self::READ, record.may_read);
        perms.set(Self::UPDATE, record.may_update);
        perms.set(Self::DELETE, record.may_delete);
        perms.set(Self::SIGN, record.may_sign);
        perms.set(Self::AWARD, record.may_award);
        perms.set(Self::ADMINISTRATE_USERS, record.may_administrate_users);
        perms
    }
}

impl From<StaffPermissions> for PermissionRecord {
    fn from(perms: StaffPermissions) -> Self {
        Self {
            may_create: perms.has(StaffPermissions::CREATE),
            may_read: perms.has(StaffPermissions::READ),
            may_update: perms.has(StaffPermissions::UPDATE),
            may_delete: perms.has(StaffPermissions::DELETE),
            may_sign: perms.has(StaffPermissions::SIGN),
            may_award: perms.has(StaffPermissions::AWARD),
            may_administrate_users: perms.has(StaffPermissions::ADMINISTRATE_USERS),
        }
    }
}

mod flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawFlag {
        Bool(bool),
        Int(i64),
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match RawFlag::deserialize(deserializer)? {
            RawFlag::Bool(value) => Ok(value),
            RawFlag::Int(0) => Ok(false),
            RawFlag::Int(1) => Ok(true),
            RawFlag::Int(other) => Err(D::Error::custom(format!(
                "permission flag must be 0 or 1, got {other}"
            ))),
        }
    }
}
