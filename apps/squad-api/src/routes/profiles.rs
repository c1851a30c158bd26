//! Profile, friend and user-search endpoints.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::CurrentUser;
use crate::db::schema::{friends, kudos, sessions, users};
use crate::error::{ApiError, FieldError};
use crate::models::user::{User, UserChangeset, UserResponse, UserSummary};
use crate::scheduling;
use crate::AppState;

const MAX_DISPLAY_NAME_LEN: usize = 64;
const MAX_BIO_LEN: usize = 400;
const SEARCH_LIMIT: i64 = 10;
const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profiles/@me", patch(update_profile))
        .route("/profiles/@me/summary", get(menu_summary))
        .route("/profiles/@me/friends", post(add_friend))
        // Sized above the avatar cap so the handler reports oversized
        // uploads itself instead of the default 2 MB body limit.
        .route(
            "/profiles/@me/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 16 * 1024)),
        )
        .route("/profiles/{username}", get(get_profile))
        .route("/users/search", get(search_users))
}

// ---------------------------------------------------------------------------
// GET /api/v1/profiles/:username - public profile
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub bio: Option<String>,
    pub kudos_points: i32,
    pub sessions_created: i64,
    pub friends: Vec<UserSummary>,
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/{username}",
    tag = "Profiles",
    params(("username" = String, Path, description = "Username (case-insensitive)")),
    responses(
        (status = 200, body = ProfileResponse),
        (status = 404, body = crate::error::ApiErrorBody)
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let user: User = users::table
        .filter(users::username_lower.eq(username.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let kudos_points: Option<i32> = kudos::table
        .find(&user.id)
        .select(kudos::points)
        .first(&mut conn)
        .await
        .optional()?;

    let sessions_created: i64 = sessions::table
        .filter(sessions::creator_id.eq(&user.id))
        .count()
        .get_result(&mut conn)
        .await?;

    let friend_ids: Vec<String> = friends::table
        .filter(friends::user_id.eq(&user.id))
        .select(friends::friend_id)
        .load(&mut conn)
        .await?;

    let friend_users: Vec<User> = users::table
        .filter(users::id.eq_any(&friend_ids))
        .order(users::username_lower.asc())
        .select(User::as_select())
        .load(&mut conn)
        .await?;

    let bio = user.bio.clone();

    Ok(Json(ProfileResponse {
        user: UserSummary::from(user),
        bio,
        kudos_points: kudos_points.unwrap_or(0),
        sessions_created,
        friends: friend_users.into_iter().map(UserSummary::from).collect(),
    }))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/profiles/@me
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub timezone_offset_minutes: Option<i32>,
}

#[utoipa::path(
    patch,
    path = "/api/v1/profiles/@me",
    tag = "Profiles",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, body = UserResponse),
        (status = 400, body = crate::error::ApiErrorBody)
    )
)]
pub async fn update_profile(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    // --- Validation ---
    let mut errors: Vec<FieldError> = Vec::new();

    let display_name = body.display_name.as_ref().map(|n| n.trim().to_string());
    if let Some(ref name) = display_name {
        if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN {
            errors.push(FieldError {
                field: "display_name".to_string(),
                message: "Display name must be 1 to 64 characters".to_string(),
            });
        }
    }

    let bio = body
        .bio
        .as_ref()
        .map(|b| b.trim().to_string())
        .map(|b| if b.is_empty() { None } else { Some(b) });
    if let Some(Some(ref b)) = bio {
        if b.chars().count() > MAX_BIO_LEN {
            errors.push(FieldError {
                field: "bio".to_string(),
                message: format!("Bio must be {MAX_BIO_LEN} characters or fewer"),
            });
        }
    }

    if let Some(offset) = body.timezone_offset_minutes {
        if !scheduling::valid_offset_minutes(offset) {
            errors.push(FieldError {
                field: "timezone_offset_minutes".to_string(),
                message: "Timezone offset must be a multiple of 15 between -720 and 840"
                    .to_string(),
            });
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    if display_name.is_none() && bio.is_none() && body.timezone_offset_minutes.is_none() {
        return Ok(Json(UserResponse::from(user)));
    }

    let mut conn = state.db.get().await?;

    let updated: User = diesel::update(users::table.find(&user.id))
        .set(&UserChangeset {
            display_name,
            bio,
            timezone_offset_minutes: body.timezone_offset_minutes,
            updated_at: Utc::now(),
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await?;

    tracing::info!(user_id = %updated.id, "profile updated");

    Ok(Json(UserResponse::from(updated)))
}

// ---------------------------------------------------------------------------
// POST /api/v1/profiles/@me/friends
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddFriendRequest {
    pub username: String,
}

/// Legacy envelope kept for the published add-friend contract.
#[derive(Debug, Serialize, ToSchema)]
pub struct AddFriendResponse {
    pub success: bool,
    #[serde(rename = "responseText")]
    pub response_text: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/profiles/@me/friends",
    tag = "Profiles",
    request_body = AddFriendRequest,
    responses((status = 200, body = AddFriendResponse))
)]
pub async fn add_friend(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<AddFriendRequest>,
) -> Result<Json<AddFriendResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let target: Option<User> = users::table
        .filter(users::username_lower.eq(body.username.trim().to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()?;

    let Some(target) = target else {
        return Ok(Json(AddFriendResponse {
            success: false,
            response_text: "No user with that name was found".to_string(),
        }));
    };

    if target.id == user.id {
        return Ok(Json(AddFriendResponse {
            success: false,
            response_text: "You cannot add yourself as a friend".to_string(),
        }));
    }

    let existing: Option<String> = friends::table
        .filter(friends::user_id.eq(&user.id))
        .filter(friends::friend_id.eq(&target.id))
        .select(friends::friend_id)
        .first(&mut conn)
        .await
        .optional()?;
    if existing.is_some() {
        return Ok(Json(AddFriendResponse {
            success: false,
            response_text: format!("You are already friends with {}", target.username),
        }));
    }

    diesel::insert_into(friends::table)
        .values((
            friends::user_id.eq(&user.id),
            friends::friend_id.eq(&target.id),
            friends::created_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

    tracing::info!(user_id = %user.id, friend_id = %target.id, "friend added");

    Ok(Json(AddFriendResponse {
        success: true,
        response_text: format!("{} was added to your friends", target.username),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/search?term=
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    pub term: Option<String>,
}

/// Username autocomplete. A blank term matches nothing.
#[utoipa::path(
    get,
    path = "/api/v1/users/search",
    tag = "Profiles",
    params(SearchParams),
    responses((status = 200, body = [UserSummary]))
)]
pub async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let term = params.term.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let mut conn = state.db.get().await?;

    // `%` and `_` are LIKE wildcards; escape them so the term matches
    // literally.
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{escaped}%");
    let matches: Vec<User> = users::table
        .filter(users::username_lower.like(pattern))
        .order(users::username_lower.asc())
        .limit(SEARCH_LIMIT)
        .select(User::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(matches.into_iter().map(UserSummary::from).collect()))
}

// ---------------------------------------------------------------------------
// GET /api/v1/profiles/@me/summary - user menu widget
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuSummaryResponse {
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub kudos_points: i32,
    pub friend_count: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/@me/summary",
    tag = "Profiles",
    responses((status = 200, body = MenuSummaryResponse))
)]
pub async fn menu_summary(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<MenuSummaryResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let kudos_points: Option<i32> = kudos::table
        .find(&user.id)
        .select(kudos::points)
        .first(&mut conn)
        .await
        .optional()?;

    let friend_count: i64 = friends::table
        .filter(friends::user_id.eq(&user.id))
        .count()
        .get_result(&mut conn)
        .await?;

    Ok(Json(MenuSummaryResponse {
        username: user.username,
        display_name: user.display_name,
        avatar_url: user.avatar_url,
        kudos_points: kudos_points.unwrap_or(0),
        friend_count,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/profiles/@me/avatar - multipart upload
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/profiles/@me/avatar",
    tag = "Profiles",
    responses(
        (status = 200, body = UserResponse),
        (status = 400, body = crate::error::ApiErrorBody)
    )
)]
pub async fn upload_avatar(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart body"))?
    {
        let ext = match field.content_type() {
            Some("image/png") => "png",
            Some("image/jpeg") => "jpg",
            Some("image/webp") => "webp",
            _ => continue,
        };
        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("Malformed multipart body"))?;
        image = Some((ext.to_string(), data.to_vec()));
        break;
    }

    let Some((ext, data)) = image else {
        return Err(ApiError::validation(vec![FieldError {
            field: "image".to_string(),
            message: "An image file (png, jpeg or webp) is required".to_string(),
        }]));
    };

    if data.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::validation(vec![FieldError {
            field: "image".to_string(),
            message: "Image must be 2 MiB or smaller".to_string(),
        }]));
    }

    // Deterministic filename per user; re-uploads overwrite in place.
    let filename = format!("{}.{}", user.id, ext);
    let path = std::path::Path::new(&state.config.media_dir).join(&filename);
    tokio::fs::write(&path, &data).await.map_err(|e| {
        tracing::error!(?e, "avatar write failed");
        ApiError::internal("Failed to store image")
    })?;

    // A re-upload with a different extension leaves the old file behind;
    // drop it once the new one is on disk.
    if let Some(previous) = user
        .avatar_url
        .as_deref()
        .and_then(|url| url.strip_prefix("/media/"))
    {
        if previous != filename {
            let stale = std::path::Path::new(&state.config.media_dir).join(previous);
            if let Err(e) = tokio::fs::remove_file(&stale).await {
                tracing::warn!(?e, %previous, "stale avatar removal failed");
            }
        }
    }

    let avatar_url = format!("/media/{filename}");

    let mut conn = state.db.get().await?;
    let updated: User = diesel::update(users::table.find(&user.id))
        .set((
            users::avatar_url.eq(Some(avatar_url)),
            users::updated_at.eq(Utc::now()),
        ))
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await?;

    tracing::info!(user_id = %updated.id, "avatar updated");

    Ok(Json(UserResponse::from(updated)))
}
