//! Identity extraction for gateway-authenticated requests.
//!
//! Authentication lives in the identity provider fronting this service; it
//! injects the verified caller id in `x-user-id` (and the username in
//! `x-user-name`). The first authenticated request provisions the local
//! profile row from those headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::schema::users;
use crate::models::user::{NewUser, User};
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Authenticated user loaded from the `x-user-id` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Optional identity for routes that are also anonymous-accessible.
/// Anonymous viewers get UTC timestamps.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Rejection returned when the identity headers are missing or unusable.
pub struct AuthError {
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.message
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError {
                message: "Missing x-user-id header",
            })?
            .to_string();

        let mut conn = state.db.get().await.map_err(|e| {
            tracing::error!(?e, "pool error during identity lookup");
            AuthError {
                message: "Identity lookup failed",
            }
        })?;

        let existing: Option<User> = users::table
            .find(&user_id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| {
                tracing::error!(?e, "identity lookup failed");
                AuthError {
                    message: "Identity lookup failed",
                }
            })?;

        if let Some(user) = existing {
            return Ok(CurrentUser(user));
        }

        // First contact: provision the profile from the gateway headers.
        let username = parts
            .headers
            .get(USER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError {
                message: "Unknown user",
            })?;

        let now = Utc::now();
        let user: User = diesel::insert_into(users::table)
            .values((
                NewUser {
                    id: &user_id,
                    username,
                    username_lower: &username.to_lowercase(),
                    display_name: username,
                    timezone_offset_minutes: 0,
                },
                users::created_at.eq(now),
                users::updated_at.eq(now),
            ))
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(?e, "user provisioning failed");
                AuthError {
                    message: "Identity lookup failed",
                }
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, "user provisioned");

        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.get(USER_ID_HEADER).is_none() {
            return Ok(MaybeUser(None));
        }
        let user = CurrentUser::from_request_parts(parts, state)
            .await
            .ok()
            .map(|c| c.0);
        Ok(MaybeUser(user))
    }
}
