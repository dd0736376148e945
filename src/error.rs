use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;

/// A validation problem tied to one field, reported back with the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Resource not registered: {0}")]
    NotRegistered(String),

    #[error("Unsupported field kind `{kind}` for {resource}.{field}; declare a meta for it")]
    UnsupportedFieldKind {
        resource: String,
        field: String,
        kind: String,
    },

    #[error("Unknown attribute `{attribute}` in {resource} ({context})")]
    UnknownAttribute {
        resource: String,
        attribute: String,
        context: String,
    },

    #[error("Resource parameter `{0}` is used by more than one resource")]
    DuplicateResource(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied: {verb} on {target}")]
    Forbidden { verb: String, target: String },

    #[error("Action `{action}` not available on {resource}")]
    ActionNotFound { resource: String, action: String },

    #[error("Invalid argument for action `{action}`")]
    InvalidArgument {
        action: String,
        errors: Vec<FieldError>,
    },

    #[error("Action `{action}` failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Validation failed")]
    ValidationFailed(Vec<FieldError>),

    #[error("{resource} record {id} not found")]
    RecordNotFound { resource: String, id: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    pub fn forbidden(verb: impl ToString, target: impl Into<String>) -> Self {
        AdminError::Forbidden {
            verb: verb.to_string(),
            target: target.into(),
        }
    }

    pub fn unknown_attribute(
        resource: &str,
        attribute: &str,
        context: impl Into<String>,
    ) -> Self {
        AdminError::UnknownAttribute {
            resource: resource.to_string(),
            attribute: attribute.to_string(),
            context: context.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AdminError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AdminError::UnknownResource(_)
            | AdminError::NotRegistered(_)
            | AdminError::ActionNotFound { .. }
            | AdminError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            AdminError::InvalidArgument { .. } | AdminError::ValidationFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AdminError::ActionFailed { .. } => StatusCode::BAD_REQUEST,
            AdminError::UnsupportedFieldKind { .. }
            | AdminError::UnknownAttribute { .. }
            | AdminError::DuplicateResource(_)
            | AdminError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Per-field errors carried by validation failures, empty otherwise.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AdminError::InvalidArgument { errors, .. } => errors,
            AdminError::ValidationFailed(errors) => errors,
            _ => &[],
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let error = match &self {
            // Backend detail stays in the logs.
            AdminError::Backend(e) => {
                tracing::error!("❌ Backend error: {}", e);
                "Backend error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            success: false,
            error,
            fields: self.field_errors().to_vec(),
        };
        (self.status(), Json(body)).into_response()
    }
}
