use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::AppState;

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Proof that the request carried the configured admin key.
pub struct AdminKey;

#[derive(Debug)]
pub struct AdminKeyRejection(String);

impl IntoResponse for AdminKeyRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.0 });
        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AdminKey {
    type Rejection = AdminKeyRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_api_key
            .as_deref()
            .ok_or_else(|| AdminKeyRejection("admin routes are disabled".to_string()))?;

        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .ok_or_else(|| AdminKeyRejection(format!("missing {ADMIN_KEY_HEADER} header")))?
            .to_str()
            .map_err(|_| AdminKeyRejection(format!("invalid {ADMIN_KEY_HEADER} header value")))?;

        if !key_matches(provided, expected) {
            return Err(AdminKeyRejection("invalid admin key".to_string()));
        }

        Ok(AdminKey)
    }
}

/// Compares in time independent of where the keys first differ.
fn key_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
