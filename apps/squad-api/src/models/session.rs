use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use squadup_common::id::{prefix, PrefixedId};
use utoipa::ToSchema;

use crate::db::schema::{session_settings, sessions};
use crate::scheduling;

/// Session lifecycle states. Sessions are never hard-deleted; cancellation
/// is a status change.
pub mod status {
    pub const OPEN: &str = "open";
    pub const FULL: &str = "full";
    pub const CANCELLED: &str = "cancelled";
}

/// Full session row from the database.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: String,
    pub creator_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub platform_id: i32,
    pub session_type_id: i32,
    pub duration_id: i32,
    pub info: Option<String>,
    pub gamers_required: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrefixedId for Session {
    const PREFIX: &'static str = prefix::SESSION;
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub id: &'a str,
    pub creator_id: &'a str,
    pub scheduled_at: DateTime<Utc>,
    pub status: &'a str,
    pub platform_id: i32,
    pub session_type_id: i32,
    pub duration_id: i32,
    pub info: Option<&'a str>,
    pub gamers_required: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset for session edits. Absent fields keep their stored value;
/// concurrent edits are last-write-wins.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = sessions)]
pub struct SessionChangeset {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub platform_id: Option<i32>,
    pub session_type_id: Option<i32>,
    pub duration_id: Option<i32>,
    pub info: Option<Option<String>>,
    pub gamers_required: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

/// Per-session settings, one-to-one with the session row.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = session_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionSettings {
    pub session_id: String,
    pub is_public: bool,
    pub approval_required: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = session_settings)]
pub struct NewSessionSettings<'a> {
    pub session_id: &'a str,
    pub is_public: bool,
    pub approval_required: bool,
}

/// Session shape returned to clients. Timestamps are carried both in UTC
/// and localized to the viewing user's offset.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub creator_id: String,
    pub status: String,
    pub platform_id: i32,
    pub session_type_id: i32,
    pub duration_id: i32,
    pub info: Option<String>,
    pub gamers_required: i32,
    pub scheduled_at: DateTime<Utc>,
    pub scheduled_at_local: NaiveDateTime,
    pub created_at: DateTime<Utc>,
    pub created_at_local: NaiveDateTime,
    pub is_public: bool,
    pub approval_required: bool,
}

impl SessionResponse {
    pub fn from_parts(session: Session, settings: &SessionSettings, offset_minutes: i32) -> Self {
        Self {
            id: session.id,
            creator_id: session.creator_id,
            status: session.status,
            platform_id: session.platform_id,
            session_type_id: session.session_type_id,
            duration_id: session.duration_id,
            info: session.info,
            gamers_required: session.gamers_required,
            scheduled_at: session.scheduled_at,
            scheduled_at_local: scheduling::utc_to_local(session.scheduled_at, offset_minutes),
            created_at: session.created_at,
            created_at_local: scheduling::utc_to_local(session.created_at, offset_minutes),
            is_public: settings.is_public,
            approval_required: settings.approval_required,
        }
    }
}
