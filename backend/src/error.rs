//! Error handling for the Stockroom inventory platform
//!
//! Every workflow returns either a typed success or exactly one of these
//! variants. Storage and internal failures are rendered with a generic
//! message; the cause is logged server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::RuleViolation;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Insufficient stock for {resource}: available {available}, requested {requested}")]
    InsufficientStock {
        resource: String,
        available: i64,
        requested: i64,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Database errors
    #[error("Transaction failed: {0}")]
    Transaction(sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Attach the resource name to a rule violation raised by the shared crate
    pub fn from_rule(resource: impl Into<String>, violation: RuleViolation) -> Self {
        match violation {
            RuleViolation::Invalid { field, message } => AppError::Validation { field, message },
            RuleViolation::InsufficientStock {
                available,
                requested,
            } => AppError::InsufficientStock {
                resource: resource.into(),
                available,
                requested,
            },
        }
    }

    /// Machine readable code used in the response envelope
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::Transaction(_) | AppError::Migration(_) => "TRANSACTION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. }
            | AppError::InsufficientStock { .. }
            | AppError::InvalidStateTransition(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Transaction(_) | AppError::Migration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the caller
    pub fn public_message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) | AppError::Forbidden(msg) => msg.clone(),
            AppError::Validation { message, .. } | AppError::Conflict { message, .. } => {
                message.clone()
            }
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::InsufficientStock { .. } | AppError::InvalidStateTransition(_) => {
                self.to_string()
            }
            AppError::Transaction(_) | AppError::Migration(_) => {
                "The operation could not be completed and was rolled back".to_string()
            }
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl From<RuleViolation> for AppError {
    fn from(violation: RuleViolation) -> Self {
        AppError::from_rule("request", violation)
    }
}

/// Conflict for a unique constraint that fired inside the database, e.g.
/// when two writers pass the pre-insert lookup at the same time
fn unique_conflict(constraint: Option<&str>) -> AppError {
    match constraint {
        Some("grns_grn_number_key") => AppError::conflict("GRN", "GRN number already exists"),
        Some("returns_return_number_key") => {
            AppError::conflict("Return", "Return number already exists")
        }
        Some("idx_products_sku_live") => AppError::conflict("Product", "SKU already exists"),
        Some("idx_product_variations_barcode_live") => {
            AppError::conflict("Product variation", "Barcode already exists")
        }
        _ => AppError::conflict("Record", "Record already exists"),
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => unique_conflict(db.constraint()),
            _ => AppError::Transaction(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
        fields.sort_unstable();
        AppError::Validation {
            field: fields.first().map(|f| f.to_string()).unwrap_or_default(),
            message: errors.to_string(),
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Internal(format!("CSV error: {}", err))
    }
}

/// Response envelope shared by success and error responses
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub status: &'static str,
    pub code: u16,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body: ApiEnvelope<()> = ApiEnvelope {
            status: "error",
            code: status.as_u16(),
            message: self.public_message(),
            timestamp: Utc::now(),
            data: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violation_mapping() {
        let err = AppError::from_rule(
            "variation 7",
            RuleViolation::InsufficientStock {
                available: 10,
                requested: 15,
            },
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let err = AppError::from_rule("grn", RuleViolation::invalid("grn_number", "required"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "required");
    }

    #[test]
    fn test_unique_constraints_map_to_conflict() {
        let err = unique_conflict(Some("grns_grn_number_key"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(err.public_message(), "GRN number already exists");

        assert_eq!(
            unique_conflict(Some("returns_return_number_key")).public_message(),
            "Return number already exists"
        );
        assert_eq!(
            unique_conflict(Some("idx_products_sku_live")).public_message(),
            "SKU already exists"
        );
        assert_eq!(
            unique_conflict(Some("idx_product_variations_barcode_live")).public_message(),
            "Barcode already exists"
        );
        assert_eq!(unique_conflict(None).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_other_database_errors_stay_opaque() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Transaction(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "TRANSACTION_ERROR");
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let err = AppError::Internal("disk on fire at /var/lib/postgres".to_string());
        assert!(!err.public_message().contains("disk"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
