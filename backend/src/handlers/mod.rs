//! HTTP handlers
//!
//! Handlers only translate between HTTP and the services: they pick the
//! acting employee off the request, call one service operation and wrap the
//! result in the response envelope.

use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::error::{ApiEnvelope, AppResult};

pub mod bin_card;
pub mod catalog;
pub mod grn;
pub mod health;
pub mod returns;
pub mod stock;

pub use bin_card::*;
pub use catalog::*;
pub use grn::*;
pub use health::*;
pub use returns::*;
pub use stock::*;

/// Enveloped JSON response
pub type ApiResponse<T> = AppResult<(StatusCode, Json<ApiEnvelope<T>>)>;

fn envelope<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiEnvelope<T>>) {
    (
        status,
        Json(ApiEnvelope {
            status: "success",
            code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now(),
            data: Some(data),
        }),
    )
}

/// 200 with data
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> ApiResponse<T> {
    Ok(envelope(StatusCode::OK, message, data))
}

/// 201 with the created resource
pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> ApiResponse<T> {
    Ok(envelope(StatusCode::CREATED, message, data))
}
