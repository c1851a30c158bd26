//! Kudos leaderboard endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::{kudos, users};
use crate::error::ApiError;
use crate::models::kudos::Kudos;
use crate::models::user::User;
use crate::AppState;

const LEADERBOARD_SIZE: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new().route("/kudos/leaderboard", get(leaderboard))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub points: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub data: Vec<LeaderboardEntry>,
}

/// Top 20 balances, points descending. An empty board is an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/kudos/leaderboard",
    tag = "Kudos",
    responses((status = 200, body = LeaderboardResponse))
)]
pub async fn leaderboard(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    let rows: Vec<(Kudos, User)> = kudos::table
        .inner_join(users::table)
        .order(kudos::points.desc())
        .limit(LEADERBOARD_SIZE)
        .select((Kudos::as_select(), User::as_select()))
        .load(&mut conn)
        .await?;

    let data = rows
        .into_iter()
        .map(|(k, u)| LeaderboardEntry {
            username: u.username,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
            points: k.points,
        })
        .collect();

    Ok(Json(LeaderboardResponse { data }))
}
