//! Staff Permission Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eb_common::EntityKind;
use serde_json::json;

use crate::permissions::StaffPermissions;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaffError {
    /// The target does not exist, or the actor may not see it.
    #[error("Not found")]
    NotFound,

    #[error("May not assign permissions that you don't have yourself")]
    SelfEscalation { missing: StaffPermissions },

    #[error("Cannot save staff membership, there is a conflicting staff membership.")]
    ConflictingMembership,

    #[error("Cannot remove the last staff membership of this institution.")]
    LastAdminRemoval,

    #[error("{kind} may only be deleted if there are no awarded Assertions.")]
    ProtectedDelete { kind: EntityKind },

    #[error("User is not a member of this institution.")]
    UserOutsideInstitution,

    #[error("{child} cannot be placed below {parent}.")]
    InvalidParent {
        child: EntityKind,
        parent: EntityKind,
    },

    #[error("{kind} requires a parent.")]
    MissingParent { kind: EntityKind },

    #[error("Entity already exists.")]
    DuplicateEntity,
}

impl StaffError {
    /// Errors caused by the submitted data rather than by scope or state.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SelfEscalation { .. }
                | Self::ConflictingMembership
                | Self::LastAdminRemoval
                | Self::UserOutsideInstitution
                | Self::InvalidParent { .. }
                | Self::MissingParent { .. }
                | Self::DuplicateEntity
        )
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ProtectedDelete { .. } => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for StaffError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if self.is_validation() {
            json!({ "fields": { "error_message": self.to_string() } })
        } else {
            json!({ "error": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}
