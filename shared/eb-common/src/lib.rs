//! Edubadges Common Library
//!
//! Identity types shared by the staff permission core and its collaborators.

pub mod types;

pub use types::*;
