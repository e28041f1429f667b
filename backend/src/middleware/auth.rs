//! Authentication middleware
//!
//! Verifies HS256 bearer tokens issued by the session provider and exposes
//! the employee they name to handlers. Whether that employee may act is
//! decided by the workflows, which re-resolve the id on every call.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use shared::EmployeeRole;

use crate::error::AppError;
use crate::AppState;

/// Employee named by a verified token
#[derive(Clone, Debug)]
pub struct AuthEmployee {
    pub employee_id: i64,
    pub role: EmployeeRole,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Employee id
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Middleware that validates the bearer token on every protected route
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized(&msg),
    };

    let employee_id = match claims.sub.parse::<i64>() {
        Ok(id) => id,
        Err(_) => return unauthorized("Invalid employee ID in token"),
    };

    let role = match claims.role.parse::<EmployeeRole>() {
        Ok(role) => role,
        Err(_) => return unauthorized("Invalid role in token"),
    };

    request
        .extensions_mut()
        .insert(AuthEmployee { employee_id, role });

    next.run(request).await
}

/// Decode and validate a JWT token
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

/// Extractor for the authenticated employee
#[derive(Clone, Debug)]
pub struct CurrentEmployee(pub AuthEmployee);

impl CurrentEmployee {
    pub fn id(&self) -> i64 {
        self.0.employee_id
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentEmployee
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthEmployee>()
            .cloned()
            .map(CurrentEmployee)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            role: "STOCK_KEEPER".to_string(),
            exp: now + exp_offset,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_valid_token() {
        let claims = decode_jwt(&token("s3cret", "42", 3600), "s3cret").unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, "STOCK_KEEPER");
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        assert!(decode_jwt(&token("s3cret", "42", 3600), "other").is_err());
    }

    #[test]
    fn test_decode_rejects_expired_token() {
        assert!(decode_jwt(&token("s3cret", "42", -3600), "s3cret").is_err());
    }
}
