use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use squadup_common::id::{prefix, PrefixedId};
use utoipa::ToSchema;

use crate::db::schema::session_messages;
use crate::scheduling;

/// Message kinds: system-generated feed entries vs. user comments.
pub mod kind {
    pub const SYSTEM: &str = "system";
    pub const COMMENT: &str = "comment";
}

/// One entry in a session's message feed.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = session_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionMessage {
    pub id: String,
    pub session_id: String,
    pub author_id: Option<String>,
    pub kind: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl PrefixedId for SessionMessage {
    const PREFIX: &'static str = prefix::MESSAGE;
}

#[derive(Debug, Insertable)]
#[diesel(table_name = session_messages)]
pub struct NewSessionMessage<'a> {
    pub id: &'a str,
    pub session_id: &'a str,
    pub author_id: Option<&'a str>,
    pub kind: &'a str,
    pub body: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub author_id: Option<String>,
    pub author_username: Option<String>,
    pub kind: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub created_at_local: NaiveDateTime,
}

impl MessageResponse {
    pub fn from_parts(
        message: SessionMessage,
        author_username: Option<String>,
        offset_minutes: i32,
    ) -> Self {
        Self {
            id: message.id,
            author_id: message.author_id,
            author_username,
            kind: message.kind,
            body: message.body,
            created_at: message.created_at,
            created_at_local: scheduling::utc_to_local(message.created_at, offset_minutes),
        }
    }
}
