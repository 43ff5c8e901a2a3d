//! Staff Permissions
//!
//! Hierarchical staff permissions for Institution -> Faculty -> Issuer ->
//! `BadgeClass` trees: resolution of effective permissions, the escalation
//! guard, branch-scoped consistency rules and a transactional service that
//! publishes cache invalidations after commit.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod permissions;
pub mod service;
pub mod snapshot;

pub use error::StaffError;
pub use hierarchy::Hierarchy;
pub use service::StaffService;
