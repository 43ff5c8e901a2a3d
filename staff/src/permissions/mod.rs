//! Staff permission types and algorithms.
//!
//! Permissions are granted per entity through staff memberships and flow
//! down the hierarchy:
//! - Resolution: local grants OR-ed with every ancestor's grants
//! - Guarding: nobody assigns a flag they do not hold themselves
//! - Consistency: one membership per user per branch, protected deletes

pub mod branch;
pub mod consistency;
pub mod flags;
pub mod guard;
pub mod models;
pub mod resolver;

pub use branch::{
    administrable_scope, branch_of, institution_of, staff_memberships_in_branch, BranchScope,
};
pub use consistency::{Affected, DeletedBranch, Outcome};
pub use flags::{PermissionRecord, StaffPermissions};
pub use guard::{can_assign, check_recipient, require_permissions};
pub use models::*;
pub use resolver::{
    check_local_permissions, effective_permissions, has_permissions, local_permissions,
    local_staff_members, staff_member,
};
