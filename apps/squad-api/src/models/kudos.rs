use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use squadup_common::id::{prefix, PrefixedId};

use crate::db::schema::{kudos, kudos_history};

/// A user's kudos balance. Invariant: `points` equals the sum of the
/// deltas in `kudos_history` for the same user.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = kudos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Kudos {
    pub user_id: String,
    pub points: i32,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of a single point change (the delta, not the
/// running total).
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = kudos_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KudosEvent {
    pub id: String,
    pub user_id: String,
    pub delta: i32,
    pub created_at: DateTime<Utc>,
}

impl PrefixedId for KudosEvent {
    const PREFIX: &'static str = prefix::KUDOS_EVENT;
}
