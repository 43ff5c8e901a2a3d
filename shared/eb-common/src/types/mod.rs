//! Shared Types

pub mod entity;
pub mod ids;
pub mod user;

pub use entity::EntityKind;
pub use ids::{EntityId, MembershipId, UserId};
pub use user::User;
