#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use squad_api::config::Config;
use squad_api::db::pool::DbPool;
use squad_api::db::schema::users;
use squad_api::models::user::{NewUser, User};
use squad_api::AppState;
use squadup_common::id::{prefix, prefixed_ulid};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// A user row inserted directly for a test, plus the id to authenticate as.
pub struct TestUser {
    pub id: String,
    pub username: String,
}

/// Build a test AppState against the `_test` database. Returns None when
/// DATABASE_URL is not configured, so suites can skip instead of failing
/// on machines without Postgres.
pub async fn try_test_state() -> Option<AppState> {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping database-backed test");
        return None;
    }

    let mut config = Config::from_env();
    config.database_url = with_test_db_suffix(&config.database_url);
    config.media_dir = std::env::temp_dir()
        .join("squad-api-test-media")
        .to_string_lossy()
        .into_owned();
    tokio::fs::create_dir_all(&config.media_dir).await.ok();

    let db = squad_api::db::pool::connect(&config.database_url).await;

    Some(AppState {
        db,
        config: Arc::new(config),
    })
}

/// Build the full application router wired to the test state.
pub async fn try_test_app() -> Option<(Router, AppState)> {
    let state = try_test_state().await?;
    let app = squad_api::routes::router().with_state(state.clone());
    Some((app, state))
}

fn with_test_db_suffix(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };

    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    match query {
        Some(query) => format!("{prefix}/{db_name}_test?{query}"),
        None => format!("{prefix}/{db_name}_test"),
    }
}

/// Insert a user row directly, bypassing the provisioning path.
pub async fn create_test_user(db: &DbPool, timezone_offset_minutes: i32) -> TestUser {
    let id = prefixed_ulid(prefix::USER);
    let username = format!("tester_{}", rand::random::<u32>());
    let username_lower = username.to_lowercase();

    let mut conn = db.get().await.expect("pool");
    let user: User = diesel::insert_into(users::table)
        .values((
            NewUser {
                id: &id,
                username: &username,
                username_lower: &username_lower,
                display_name: &username,
                timezone_offset_minutes,
            },
            users::created_at.eq(diesel::dsl::now),
            users::updated_at.eq(diesel::dsl::now),
        ))
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .expect("insert test user");

    TestUser {
        id: user.id,
        username: user.username,
    }
}

/// Delete a test user. Foreign keys cascade to sessions, kudos, messages
/// and friend edges, so a single delete cleans up everything a test made.
pub async fn cleanup_test_user(db: &DbPool, user_id: &str) {
    let mut conn = db.get().await.expect("pool");
    diesel::delete(users::table.filter(users::id.eq(user_id)))
        .execute(&mut conn)
        .await
        .ok();
}
