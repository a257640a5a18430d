//! Bearer-token extractor guarding the host callback endpoint.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use vidforge_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Proof that the caller presented the shared host callback token.
///
/// Use this as an extractor parameter on the callback handler; the
/// request is rejected before any job logic runs:
///
/// - missing or malformed `Authorization` header → 401
/// - well-formed bearer token that does not match → 403
#[derive(Debug, Clone, Copy)]
pub struct CallbackAuth;

impl FromRequestParts<AppState> for CallbackAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        if token != state.config.host_callback_token {
            return Err(AppError::Core(CoreError::Forbidden(
                "Invalid callback token".into(),
            )));
        }

        Ok(CallbackAuth)
    }
}
