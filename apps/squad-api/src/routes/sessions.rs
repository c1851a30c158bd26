//! Session CRUD, comments, sign-ups and form-support data.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use serde::Deserialize;
use serde::Serialize;
use squadup_common::PrefixedId;
use utoipa::ToSchema;

use crate::auth::middleware::{CurrentUser, MaybeUser};
use crate::db::schema::{
    platforms, session_durations, session_gamers, session_messages, session_settings,
    session_types, sessions, users,
};
use crate::error::{ApiError, FieldError};
use crate::kudos;
use crate::models::lookup::{Platform, SessionDuration, SessionType};
use crate::models::message::{self, MessageResponse, NewSessionMessage, SessionMessage};
use crate::models::session::{
    status, NewSession, NewSessionSettings, Session, SessionChangeset, SessionResponse,
    SessionSettings,
};
use crate::models::user::{User, UserSummary};
use crate::scheduling::{self, GamersRequiredOption};
use crate::AppState;

const MAX_INFO_LEN: usize = 2000;
const MAX_COMMENT_LEN: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/options", get(session_options))
        .route(
            "/sessions/{id}",
            get(get_session)
                .patch(update_session)
                .delete(cancel_session),
        )
        .route("/sessions/{id}/comments", post(add_comment))
        .route(
            "/sessions/{id}/join",
            post(join_session).delete(leave_session),
        )
}

// ---------------------------------------------------------------------------
// POST /api/v1/sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Calendar day in the creator's local time.
    pub scheduled_date: NaiveDate,
    /// Time of day as `H:MM`, e.g. `"19:30"`.
    pub scheduled_time: String,
    pub platform_id: i32,
    pub session_type_id: i32,
    pub duration_id: i32,
    pub info: Option<String>,
    /// Player cap, or -1 for unlimited.
    pub gamers_required: i32,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub approval_required: bool,
}

fn default_true() -> bool {
    true
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, body = SessionResponse),
        (status = 400, body = crate::error::ApiErrorBody)
    )
)]
pub async fn create_session(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let mut conn = state.db.get().await?;

    // --- Validation ---
    let mut errors: Vec<FieldError> = Vec::new();

    let time = scheduling::parse_time_of_day(&body.scheduled_time);
    if time.is_none() {
        errors.push(FieldError {
            field: "scheduled_time".to_string(),
            message: "Time must be H:MM, e.g. 19:30".to_string(),
        });
    }

    if !scheduling::valid_gamers_required(body.gamers_required) {
        errors.push(FieldError {
            field: "gamers_required".to_string(),
            message: "Gamers required must be at least 2, or -1 for unlimited".to_string(),
        });
    }

    let info = body.info.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if info.is_some_and(|s| s.chars().count() > MAX_INFO_LEN) {
        errors.push(FieldError {
            field: "info".to_string(),
            message: format!("Info must be {MAX_INFO_LEN} characters or fewer"),
        });
    }

    check_lookup_ids(
        &mut conn,
        body.platform_id,
        body.session_type_id,
        body.duration_id,
        &mut errors,
    )
    .await?;

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    // Combine the separately supplied date and time in the creator's local
    // time, then normalize to UTC before anything is persisted.
    let local = scheduling::combine_date_and_time(body.scheduled_date, time.unwrap_or_default());
    let scheduled_at = scheduling::local_to_utc(local, user.timezone_offset_minutes);
    let now = Utc::now();

    let session_id = Session::generate();
    let message_id = SessionMessage::generate();
    let system_body = format!("{} created the session", user.username);
    let creator_id = user.id.clone();
    let info = info.map(str::to_string);
    let is_public = body.is_public;
    let approval_required = body.approval_required;
    let new_session = body;

    let session: Session = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let session: Session = diesel::insert_into(sessions::table)
                    .values(NewSession {
                        id: &session_id,
                        creator_id: &creator_id,
                        scheduled_at,
                        status: status::OPEN,
                        platform_id: new_session.platform_id,
                        session_type_id: new_session.session_type_id,
                        duration_id: new_session.duration_id,
                        info: info.as_deref(),
                        gamers_required: new_session.gamers_required,
                        created_at: now,
                        updated_at: now,
                    })
                    .returning(Session::as_returning())
                    .get_result(conn)
                    .await?;

                diesel::insert_into(session_settings::table)
                    .values(NewSessionSettings {
                        session_id: &session_id,
                        is_public: new_session.is_public,
                        approval_required: new_session.approval_required,
                    })
                    .execute(conn)
                    .await?;

                // The feed opens with a system message and the creator is
                // the first signed-up gamer.
                diesel::insert_into(session_messages::table)
                    .values(NewSessionMessage {
                        id: &message_id,
                        session_id: &session_id,
                        author_id: None,
                        kind: message::kind::SYSTEM,
                        body: &system_body,
                        created_at: now,
                    })
                    .execute(conn)
                    .await?;

                diesel::insert_into(session_gamers::table)
                    .values((
                        session_gamers::session_id.eq(&session_id),
                        session_gamers::user_id.eq(&creator_id),
                        session_gamers::joined_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;

                kudos::award_points(conn, &creator_id, kudos::SESSION_CREATED).await?;

                Ok(session)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(session_id = %session.id, creator_id = %session.creator_id, "session created");

    let settings = SessionSettings {
        session_id: session.id.clone(),
        is_public,
        approval_required,
    };

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::from_parts(
            session,
            &settings,
            user.timezone_offset_minutes,
        )),
    ))
}

/// Validate the lookup-table references on a create/edit request.
async fn check_lookup_ids(
    conn: &mut diesel_async::AsyncPgConnection,
    platform_id: i32,
    session_type_id: i32,
    duration_id: i32,
    errors: &mut Vec<FieldError>,
) -> Result<(), ApiError> {
    let platform: Option<i32> = platforms::table
        .find(platform_id)
        .select(platforms::id)
        .first(conn)
        .await
        .optional()?;
    if platform.is_none() {
        errors.push(FieldError {
            field: "platform_id".to_string(),
            message: "Unknown platform".to_string(),
        });
    }

    let session_type: Option<i32> = session_types::table
        .find(session_type_id)
        .select(session_types::id)
        .first(conn)
        .await
        .optional()?;
    if session_type.is_none() {
        errors.push(FieldError {
            field: "session_type_id".to_string(),
            message: "Unknown session type".to_string(),
        });
    }

    let duration: Option<i32> = session_durations::table
        .find(duration_id)
        .select(session_durations::id)
        .first(conn)
        .await
        .optional()?;
    if duration.is_none() {
        errors.push(FieldError {
            field: "duration_id".to_string(),
            message: "Unknown duration".to_string(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// GET /api/v1/sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListItem {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub creator_username: String,
    pub gamers_joined: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListSessionsResponse {
    pub data: Vec<SessionListItem>,
}

/// Public sessions, newest scheduled first, localized to the viewer.
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Sessions",
    responses((status = 200, body = ListSessionsResponse))
)]
pub async fn list_sessions(
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let offset = viewer.map(|u| u.timezone_offset_minutes).unwrap_or(0);
    let mut conn = state.db.get().await?;

    let rows: Vec<(Session, SessionSettings)> = sessions::table
        .inner_join(session_settings::table)
        .filter(session_settings::is_public.eq(true))
        .order(sessions::scheduled_at.desc())
        .select((Session::as_select(), SessionSettings::as_select()))
        .load(&mut conn)
        .await?;

    let session_ids: Vec<String> = rows.iter().map(|(s, _)| s.id.clone()).collect();
    let creator_ids: Vec<String> = rows.iter().map(|(s, _)| s.creator_id.clone()).collect();

    let counts: HashMap<String, i64> = session_gamers::table
        .filter(session_gamers::session_id.eq_any(&session_ids))
        .group_by(session_gamers::session_id)
        .select((session_gamers::session_id, count_star()))
        .load::<(String, i64)>(&mut conn)
        .await?
        .into_iter()
        .collect();

    let creators: HashMap<String, String> = users::table
        .filter(users::id.eq_any(&creator_ids))
        .select((users::id, users::username))
        .load::<(String, String)>(&mut conn)
        .await?
        .into_iter()
        .collect();

    let data = rows
        .into_iter()
        .map(|(session, settings)| {
            let creator_username = creators
                .get(&session.creator_id)
                .cloned()
                .unwrap_or_default();
            let gamers_joined = counts.get(&session.id).copied().unwrap_or(0);
            SessionListItem {
                session: SessionResponse::from_parts(session, &settings, offset),
                creator_username,
                gamers_joined,
            }
        })
        .collect();

    Ok(Json(ListSessionsResponse { data }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/sessions/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionGamer {
    #[serde(flatten)]
    pub user: UserSummary,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewSessionResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub creator: UserSummary,
    pub platform: String,
    pub session_type: String,
    pub duration: String,
    pub gamers: Vec<SessionGamer>,
    pub messages: Vec<MessageResponse>,
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, body = ViewSessionResponse),
        (status = 404, body = crate::error::ApiErrorBody)
    )
)]
pub async fn get_session(
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ViewSessionResponse>, ApiError> {
    let offset = viewer.map(|u| u.timezone_offset_minutes).unwrap_or(0);
    let mut conn = state.db.get().await?;

    let (session, settings): (Session, SessionSettings) = sessions::table
        .inner_join(session_settings::table)
        .filter(sessions::id.eq(&id))
        .select((Session::as_select(), SessionSettings::as_select()))
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let creator: User = users::table
        .find(&session.creator_id)
        .select(User::as_select())
        .first(&mut conn)
        .await?;

    let platform: String = platforms::table
        .find(session.platform_id)
        .select(platforms::name)
        .first(&mut conn)
        .await?;
    let session_type: String = session_types::table
        .find(session.session_type_id)
        .select(session_types::name)
        .first(&mut conn)
        .await?;
    let duration: String = session_durations::table
        .find(session.duration_id)
        .select(session_durations::name)
        .first(&mut conn)
        .await?;

    let gamers: Vec<(User, DateTime<Utc>)> = session_gamers::table
        .inner_join(users::table)
        .filter(session_gamers::session_id.eq(&id))
        .order(session_gamers::joined_at.asc())
        .select((User::as_select(), session_gamers::joined_at))
        .load(&mut conn)
        .await?;

    let messages: Vec<SessionMessage> = session_messages::table
        .filter(session_messages::session_id.eq(&id))
        .order(session_messages::created_at.asc())
        .select(SessionMessage::as_select())
        .load(&mut conn)
        .await?;

    let author_ids: Vec<String> = messages
        .iter()
        .filter_map(|m| m.author_id.clone())
        .collect();
    let authors: HashMap<String, String> = users::table
        .filter(users::id.eq_any(&author_ids))
        .select((users::id, users::username))
        .load::<(String, String)>(&mut conn)
        .await?
        .into_iter()
        .collect();

    let messages = messages
        .into_iter()
        .map(|m| {
            let author_username = m.author_id.as_ref().and_then(|a| authors.get(a).cloned());
            MessageResponse::from_parts(m, author_username, offset)
        })
        .collect();

    Ok(Json(ViewSessionResponse {
        session: SessionResponse::from_parts(session, &settings, offset),
        creator: UserSummary::from(creator),
        platform,
        session_type,
        duration,
        gamers: gamers
            .into_iter()
            .map(|(user, joined_at)| SessionGamer {
                user: UserSummary::from(user),
                joined_at,
            })
            .collect(),
        messages,
    }))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/sessions/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
    pub platform_id: Option<i32>,
    pub session_type_id: Option<i32>,
    pub duration_id: Option<i32>,
    pub info: Option<String>,
    pub gamers_required: Option<i32>,
    pub is_public: Option<bool>,
    pub approval_required: Option<bool>,
}

/// Overlay the provided fields on the stored session. Concurrent edits are
/// last-write-wins.
#[utoipa::path(
    patch,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, body = SessionResponse),
        (status = 403, body = crate::error::ApiErrorBody),
        (status = 404, body = crate::error::ApiErrorBody)
    )
)]
pub async fn update_session(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let session: Session = sessions::table
        .find(&id)
        .select(Session::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if session.creator_id != user.id {
        return Err(ApiError::forbidden("Only the creator can edit a session"));
    }

    // --- Validation ---
    let mut errors: Vec<FieldError> = Vec::new();

    let scheduled_at = match (&body.scheduled_date, &body.scheduled_time) {
        (None, None) => None,
        (Some(date), Some(time_str)) => match scheduling::parse_time_of_day(time_str) {
            Some(time) => {
                let local = scheduling::combine_date_and_time(*date, time);
                Some(scheduling::local_to_utc(local, user.timezone_offset_minutes))
            }
            None => {
                errors.push(FieldError {
                    field: "scheduled_time".to_string(),
                    message: "Time must be H:MM, e.g. 19:30".to_string(),
                });
                None
            }
        },
        _ => {
            errors.push(FieldError {
                field: "scheduled_date".to_string(),
                message: "Date and time must be supplied together".to_string(),
            });
            None
        }
    };

    if body
        .gamers_required
        .is_some_and(|g| !scheduling::valid_gamers_required(g))
    {
        errors.push(FieldError {
            field: "gamers_required".to_string(),
            message: "Gamers required must be at least 2, or -1 for unlimited".to_string(),
        });
    }

    let info = body
        .info
        .as_deref()
        .map(|s| s.trim().to_string())
        .map(|s| if s.is_empty() { None } else { Some(s) });
    if let Some(Some(ref s)) = info {
        if s.chars().count() > MAX_INFO_LEN {
            errors.push(FieldError {
                field: "info".to_string(),
                message: format!("Info must be {MAX_INFO_LEN} characters or fewer"),
            });
        }
    }

    check_lookup_ids(
        &mut conn,
        body.platform_id.unwrap_or(session.platform_id),
        body.session_type_id.unwrap_or(session.session_type_id),
        body.duration_id.unwrap_or(session.duration_id),
        &mut errors,
    )
    .await?;

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let updated: Session = diesel::update(sessions::table.find(&id))
        .set(&SessionChangeset {
            scheduled_at,
            status: None,
            platform_id: body.platform_id,
            session_type_id: body.session_type_id,
            duration_id: body.duration_id,
            info,
            gamers_required: body.gamers_required,
            updated_at: Utc::now(),
        })
        .returning(Session::as_returning())
        .get_result(&mut conn)
        .await?;

    if body.is_public.is_some() || body.approval_required.is_some() {
        diesel::update(session_settings::table.find(&id))
            .set((
                body.is_public.map(|v| session_settings::is_public.eq(v)),
                body.approval_required
                    .map(|v| session_settings::approval_required.eq(v)),
            ))
            .execute(&mut conn)
            .await?;
    }

    let settings: SessionSettings = session_settings::table
        .find(&id)
        .select(SessionSettings::as_select())
        .first(&mut conn)
        .await?;

    tracing::info!(session_id = %id, "session updated");

    Ok(Json(SessionResponse::from_parts(
        updated,
        &settings,
        user.timezone_offset_minutes,
    )))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/sessions/:id - cancel (soft)
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 204),
        (status = 403, body = crate::error::ApiErrorBody),
        (status = 404, body = crate::error::ApiErrorBody)
    )
)]
pub async fn cancel_session(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;

    let session: Session = sessions::table
        .find(&id)
        .select(Session::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if session.creator_id != user.id {
        return Err(ApiError::forbidden("Only the creator can cancel a session"));
    }

    if session.status == status::CANCELLED {
        return Err(ApiError::conflict("Session is already cancelled"));
    }

    let message_id = SessionMessage::generate();
    let system_body = format!("{} cancelled the session", user.username);
    let now = Utc::now();
    let session_id = id.clone();

    conn.transaction::<_, ApiError, _>(|conn| {
        async move {
            diesel::update(sessions::table.find(&session_id))
                .set((
                    sessions::status.eq(status::CANCELLED),
                    sessions::updated_at.eq(now),
                ))
                .execute(conn)
                .await?;

            diesel::insert_into(session_messages::table)
                .values(NewSessionMessage {
                    id: &message_id,
                    session_id: &session_id,
                    author_id: None,
                    kind: message::kind::SYSTEM,
                    body: &system_body,
                    created_at: now,
                })
                .execute(conn)
                .await?;

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!(session_id = %id, "session cancelled");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /api/v1/sessions/:id/comments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCommentRequest {
    pub body: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/comments",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    request_body = AddCommentRequest,
    responses(
        (status = 201, body = MessageResponse),
        (status = 404, body = crate::error::ApiErrorBody)
    )
)]
pub async fn add_comment(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let mut conn = state.db.get().await?;

    let comment = body.body.trim().to_string();
    if comment.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "body".to_string(),
            message: "Comment body is required".to_string(),
        }]));
    }
    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::validation(vec![FieldError {
            field: "body".to_string(),
            message: format!("Comment must be {MAX_COMMENT_LEN} characters or fewer"),
        }]));
    }

    // Session must exist; comments stay allowed on full and cancelled
    // sessions.
    sessions::table
        .find(&id)
        .select(sessions::id)
        .first::<String>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let message_id = SessionMessage::generate();
    let now = Utc::now();
    let session_id = id.clone();
    let user_id = user.id.clone();
    let comment_body = comment.clone();

    let message: SessionMessage = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let message: SessionMessage = diesel::insert_into(session_messages::table)
                    .values(NewSessionMessage {
                        id: &message_id,
                        session_id: &session_id,
                        author_id: Some(&user_id),
                        kind: message::kind::COMMENT,
                        body: &comment_body,
                        created_at: now,
                    })
                    .returning(SessionMessage::as_returning())
                    .get_result(conn)
                    .await?;

                kudos::award_points(conn, &user_id, kudos::COMMENT_POSTED).await?;

                Ok(message)
            }
            .scope_boxed()
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::from_parts(
            message,
            Some(user.username),
            user.timezone_offset_minutes,
        )),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/v1/sessions/:id/join - sign up
// DELETE /api/v1/sessions/:id/join - leave
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/join",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, body = SessionResponse),
        (status = 404, body = crate::error::ApiErrorBody),
        (status = 409, body = crate::error::ApiErrorBody)
    )
)]
pub async fn join_session(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let settings: SessionSettings = session_settings::table
        .find(&id)
        .select(SessionSettings::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let message_id = SessionMessage::generate();
    let system_body = format!("{} joined the session", user.username);
    let now = Utc::now();
    let session_id = id.clone();
    let user_id = user.id.clone();

    // The session row is locked for the whole transaction so concurrent
    // joins serialize and cannot race the capacity check.
    let updated: Session = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let session: Session = sessions::table
                    .find(&session_id)
                    .for_update()
                    .select(Session::as_select())
                    .first(conn)
                    .await?;

                if session.status == status::CANCELLED {
                    return Err(ApiError::conflict("Session has been cancelled"));
                }
                if session.status == status::FULL {
                    return Err(ApiError::conflict("Session is full"));
                }

                let already: Option<String> = session_gamers::table
                    .filter(session_gamers::session_id.eq(&session_id))
                    .filter(session_gamers::user_id.eq(&user_id))
                    .select(session_gamers::user_id)
                    .first(conn)
                    .await
                    .optional()?;
                if already.is_some() {
                    return Err(ApiError::conflict("You are already signed up"));
                }

                diesel::insert_into(session_gamers::table)
                    .values((
                        session_gamers::session_id.eq(&session_id),
                        session_gamers::user_id.eq(&user_id),
                        session_gamers::joined_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;

                diesel::insert_into(session_messages::table)
                    .values(NewSessionMessage {
                        id: &message_id,
                        session_id: &session_id,
                        author_id: None,
                        kind: message::kind::SYSTEM,
                        body: &system_body,
                        created_at: now,
                    })
                    .execute(conn)
                    .await?;

                kudos::award_points(conn, &user_id, kudos::SESSION_JOINED).await?;

                let joined: i64 = session_gamers::table
                    .filter(session_gamers::session_id.eq(&session_id))
                    .count()
                    .get_result(conn)
                    .await?;

                let capacity = session.gamers_required;
                if capacity != scheduling::UNLIMITED_GAMERS {
                    // Over capacity means a writer slipped past the status
                    // check; roll the whole sign-up back.
                    if joined > capacity as i64 {
                        return Err(ApiError::conflict("Session is full"));
                    }
                    // Filling the last slot flips the session to full.
                    if joined == capacity as i64 {
                        let updated: Session = diesel::update(sessions::table.find(&session_id))
                            .set((
                                sessions::status.eq(status::FULL),
                                sessions::updated_at.eq(now),
                            ))
                            .returning(Session::as_returning())
                            .get_result(conn)
                            .await?;
                        return Ok(updated);
                    }
                }

                Ok(session)
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(SessionResponse::from_parts(
        updated,
        &settings,
        user.timezone_offset_minutes,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}/join",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, body = SessionResponse),
        (status = 404, body = crate::error::ApiErrorBody),
        (status = 409, body = crate::error::ApiErrorBody)
    )
)]
pub async fn leave_session(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let (session, settings): (Session, SessionSettings) = sessions::table
        .inner_join(session_settings::table)
        .filter(sessions::id.eq(&id))
        .select((Session::as_select(), SessionSettings::as_select()))
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if session.creator_id == user.id {
        return Err(ApiError::conflict(
            "The creator cannot leave their own session",
        ));
    }

    let message_id = SessionMessage::generate();
    let system_body = format!("{} left the session", user.username);
    let now = Utc::now();
    let session_id = id.clone();
    let user_id = user.id.clone();
    let was_full = session.status == status::FULL;

    let updated: Session = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let removed = diesel::delete(
                    session_gamers::table
                        .filter(session_gamers::session_id.eq(&session_id))
                        .filter(session_gamers::user_id.eq(&user_id)),
                )
                .execute(conn)
                .await?;

                if removed == 0 {
                    return Err(ApiError::conflict(
                        "You are not signed up for this session",
                    ));
                }

                diesel::insert_into(session_messages::table)
                    .values(NewSessionMessage {
                        id: &message_id,
                        session_id: &session_id,
                        author_id: None,
                        kind: message::kind::SYSTEM,
                        body: &system_body,
                        created_at: now,
                    })
                    .execute(conn)
                    .await?;

                let updated: Session = if was_full {
                    diesel::update(sessions::table.find(&session_id))
                        .set((
                            sessions::status.eq(status::OPEN),
                            sessions::updated_at.eq(now),
                        ))
                        .returning(Session::as_returning())
                        .get_result(conn)
                        .await?
                } else {
                    sessions::table
                        .find(&session_id)
                        .select(Session::as_select())
                        .first(conn)
                        .await?
                };

                Ok(updated)
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(SessionResponse::from_parts(
        updated,
        &settings,
        user.timezone_offset_minutes,
    )))
}

// ---------------------------------------------------------------------------
// GET /api/v1/sessions/options - form-support data
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionOptionsResponse {
    pub platforms: Vec<Platform>,
    pub session_types: Vec<SessionType>,
    pub durations: Vec<SessionDuration>,
    /// 96 quarter-hour marks, `0:00` through `23:45`.
    pub time_slots: Vec<String>,
    pub gamers_required: Vec<GamersRequiredOption>,
    pub default_scheduled_date: NaiveDate,
    /// `H:MM` in the viewer's local time.
    pub default_scheduled_time: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/options",
    tag = "Sessions",
    responses((status = 200, body = SessionOptionsResponse))
)]
pub async fn session_options(
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<SessionOptionsResponse>, ApiError> {
    let offset = viewer.map(|u| u.timezone_offset_minutes).unwrap_or(0);
    let mut conn = state.db.get().await?;

    let platform_list: Vec<Platform> = platforms::table
        .order(platforms::id.asc())
        .select(Platform::as_select())
        .load(&mut conn)
        .await?;
    let type_list: Vec<SessionType> = session_types::table
        .order(session_types::id.asc())
        .select(SessionType::as_select())
        .load(&mut conn)
        .await?;
    let duration_list: Vec<SessionDuration> = session_durations::table
        .order(session_durations::minutes.asc())
        .select(SessionDuration::as_select())
        .load(&mut conn)
        .await?;

    let suggested = scheduling::default_scheduled_time(Utc::now(), offset);

    Ok(Json(SessionOptionsResponse {
        platforms: platform_list,
        session_types: type_list,
        durations: duration_list,
        time_slots: scheduling::time_slots(),
        gamers_required: scheduling::gamers_required_options(),
        default_scheduled_date: suggested.date(),
        default_scheduled_time: scheduling::format_time_of_day(suggested.time()),
    }))
}
