//! Kudos balance and history updates.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use squadup_common::PrefixedId;

use crate::db::schema::{kudos, kudos_history};
use crate::error::ApiError;
use crate::models::kudos::KudosEvent;

/// Points awarded per action.
pub const SESSION_CREATED: i32 = 10;
pub const SESSION_JOINED: i32 = 5;
pub const COMMENT_POSTED: i32 = 2;

/// Apply a point delta to a user's balance and append the matching history
/// record (the delta, not the running total).
///
/// The balance update is a single `points = points + delta` expression, so
/// concurrent awards cannot lose increments. Run inside the surrounding
/// transaction when the award belongs to a larger write.
pub async fn award_points(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    delta: i32,
) -> Result<(), ApiError> {
    let now = Utc::now();

    diesel::insert_into(kudos::table)
        .values((
            kudos::user_id.eq(user_id),
            kudos::points.eq(delta),
            kudos::updated_at.eq(now),
        ))
        .on_conflict(kudos::user_id)
        .do_update()
        .set((
            kudos::points.eq(kudos::points + delta),
            kudos::updated_at.eq(now),
        ))
        .execute(conn)
        .await?;

    diesel::insert_into(kudos_history::table)
        .values((
            kudos_history::id
                .eq(KudosEvent::generate()),
            kudos_history::user_id.eq(user_id),
            kudos_history::delta.eq(delta),
            kudos_history::created_at.eq(now),
        ))
        .execute(conn)
        .await?;

    Ok(())
}
