mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use common::{USER_ID_HEADER, USER_NAME_HEADER};

fn create_body() -> serde_json::Value {
    json!({
        "scheduled_date": "2030-05-01",
        "scheduled_time": "19:30",
        "platform_id": 1,
        "session_type_id": 1,
        "duration_id": 2,
        "info": "Bring a mic",
        "gamers_required": 4
    })
}

// ---------------------------------------------------------------------------
// POST /api/v1/sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_session_stores_utc_and_localizes_response() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    // UTC+2: 19:30 local is 17:30 UTC.
    let user = common::create_test_user(&state.db, 120).await;

    let resp = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await;

    resp.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["scheduled_at"], "2030-05-01T17:30:00Z");
    assert_eq!(body["scheduled_at_local"], "2030-05-01T19:30:00");
    assert_eq!(body["status"], "open");
    assert_eq!(body["creator_id"], user.id);
    assert_eq!(body["gamers_required"], 4);
    assert_eq!(body["is_public"], true);

    common::cleanup_test_user(&state.db, &user.id).await;
}

#[tokio::test]
async fn create_session_opens_feed_and_signs_up_creator() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let resp = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await;
    resp.assert_status(StatusCode::CREATED);
    let session_id = resp.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let view = server
        .get(&format!("/api/v1/sessions/{session_id}"))
        .await
        .json::<serde_json::Value>();

    let messages = view["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["kind"], "system");
    assert!(messages[0]["author_id"].is_null());

    let gamers = view["gamers"].as_array().unwrap();
    assert_eq!(gamers.len(), 1);
    assert_eq!(gamers[0]["id"], user.id);

    common::cleanup_test_user(&state.db, &user.id).await;
}

#[tokio::test]
async fn create_session_rejects_bad_time() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let mut body = create_body();
    body["scheduled_time"] = json!("quarter past eight");

    let resp = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&body)
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["field"], "scheduled_time");

    common::cleanup_test_user(&state.db, &user.id).await;
}

#[tokio::test]
async fn create_session_rejects_unknown_lookup_ids() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let mut body = create_body();
    body["platform_id"] = json!(999_999);

    let resp = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&body)
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    common::cleanup_test_user(&state.db, &user.id).await;
}

#[tokio::test]
async fn create_session_requires_identity() {
    let Some((app, _state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let resp = server.post("/api/v1/sessions").json(&create_body()).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_contact_provisions_a_user() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user_id = squadup_common::id::prefixed_ulid(squadup_common::id::prefix::USER);
    let username = format!("newcomer_{}", rand::random::<u32>());

    let resp = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user_id)
        .add_header(USER_NAME_HEADER, &username)
        .json(&create_body())
        .await;
    resp.assert_status(StatusCode::CREATED);

    let profile = server
        .get(&format!("/api/v1/profiles/{username}"))
        .await
        .json::<serde_json::Value>();
    assert_eq!(profile["id"], user_id);
    assert_eq!(profile["username"], username);

    common::cleanup_test_user(&state.db, &user_id).await;
}

// ---------------------------------------------------------------------------
// GET /api/v1/sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_sessions_excludes_private() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let public_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut private_body = create_body();
    private_body["is_public"] = json!(false);
    let private_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&private_body)
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let list = server.get("/api/v1/sessions").await.json::<serde_json::Value>();
    let ids: Vec<&str> = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();

    assert!(ids.contains(&public_id.as_str()));
    assert!(!ids.contains(&private_id.as_str()));

    common::cleanup_test_user(&state.db, &user.id).await;
}

#[tokio::test]
async fn list_sessions_reports_creator_and_count() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let list = server.get("/api/v1/sessions").await.json::<serde_json::Value>();
    let item = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == session_id.as_str())
        .expect("created session is listed");

    assert_eq!(item["creator_username"], user.username);
    assert_eq!(item["gamers_joined"], 1);

    common::cleanup_test_user(&state.db, &user.id).await;
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/sessions/:id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_session_overlays_only_supplied_fields() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 120).await;

    let created = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>();
    let session_id = created["id"].as_str().unwrap().to_string();

    let resp = server
        .patch(&format!("/api/v1/sessions/{session_id}"))
        .add_header(USER_ID_HEADER, &user.id)
        .json(&json!({ "info": "Updated plan" }))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["info"], "Updated plan");
    // Untouched fields keep their stored values.
    assert_eq!(body["scheduled_at"], created["scheduled_at"]);
    assert_eq!(body["gamers_required"], created["gamers_required"]);

    common::cleanup_test_user(&state.db, &user.id).await;
}

#[tokio::test]
async fn update_session_rejects_non_creator() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let creator = common::create_test_user(&state.db, 0).await;
    let other = common::create_test_user(&state.db, 0).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &creator.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .patch(&format!("/api/v1/sessions/{session_id}"))
        .add_header(USER_ID_HEADER, &other.id)
        .json(&json!({ "info": "hijack" }))
        .await;

    resp.assert_status(StatusCode::FORBIDDEN);

    common::cleanup_test_user(&state.db, &other.id).await;
    common::cleanup_test_user(&state.db, &creator.id).await;
}

#[tokio::test]
async fn update_session_requires_date_and_time_together() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .patch(&format!("/api/v1/sessions/{session_id}"))
        .add_header(USER_ID_HEADER, &user.id)
        .json(&json!({ "scheduled_date": "2030-06-01" }))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    common::cleanup_test_user(&state.db, &user.id).await;
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/sessions/:id - cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_session_is_a_status_change() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .delete(&format!("/api/v1/sessions/{session_id}"))
        .add_header(USER_ID_HEADER, &user.id)
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    // The session is still visible, with a cancellation notice in the feed.
    let view = server
        .get(&format!("/api/v1/sessions/{session_id}"))
        .await
        .json::<serde_json::Value>();
    assert_eq!(view["status"], "cancelled");
    let messages = view["messages"].as_array().unwrap();
    assert_eq!(messages.last().unwrap()["kind"], "system");

    // A second cancel conflicts.
    let resp = server
        .delete(&format!("/api/v1/sessions/{session_id}"))
        .add_header(USER_ID_HEADER, &user.id)
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    common::cleanup_test_user(&state.db, &user.id).await;
}

// ---------------------------------------------------------------------------
// POST /api/v1/sessions/:id/comments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_comment_returns_author_and_localized_time() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let creator = common::create_test_user(&state.db, 0).await;
    let commenter = common::create_test_user(&state.db, -300).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &creator.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .post(&format!("/api/v1/sessions/{session_id}/comments"))
        .add_header(USER_ID_HEADER, &commenter.id)
        .json(&json!({ "body": "Count me in!" }))
        .await;

    resp.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["kind"], "comment");
    assert_eq!(body["body"], "Count me in!");
    assert_eq!(body["author_username"], commenter.username);
    assert!(body["created_at_local"].is_string());

    common::cleanup_test_user(&state.db, &commenter.id).await;
    common::cleanup_test_user(&state.db, &creator.id).await;
}

#[tokio::test]
async fn add_comment_rejects_blank_body() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let user = common::create_test_user(&state.db, 0).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &user.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .post(&format!("/api/v1/sessions/{session_id}/comments"))
        .add_header(USER_ID_HEADER, &user.id)
        .json(&json!({ "body": "   " }))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);

    common::cleanup_test_user(&state.db, &user.id).await;
}

// ---------------------------------------------------------------------------
// POST/DELETE /api/v1/sessions/:id/join
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_flips_to_full_when_last_slot_fills() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let creator = common::create_test_user(&state.db, 0).await;
    let joiner = common::create_test_user(&state.db, 0).await;
    let late = common::create_test_user(&state.db, 0).await;

    // Two slots; the creator takes the first on creation.
    let mut body = create_body();
    body["gamers_required"] = json!(2);
    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &creator.id)
        .json(&body)
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .post(&format!("/api/v1/sessions/{session_id}/join"))
        .add_header(USER_ID_HEADER, &joiner.id)
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["status"], "full");

    // A full session admits nobody else.
    let resp = server
        .post(&format!("/api/v1/sessions/{session_id}/join"))
        .add_header(USER_ID_HEADER, &late.id)
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    // Leaving reopens it.
    let resp = server
        .delete(&format!("/api/v1/sessions/{session_id}/join"))
        .add_header(USER_ID_HEADER, &joiner.id)
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["status"], "open");

    common::cleanup_test_user(&state.db, &late.id).await;
    common::cleanup_test_user(&state.db, &joiner.id).await;
    common::cleanup_test_user(&state.db, &creator.id).await;
}

#[tokio::test]
async fn join_never_admits_past_capacity() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let creator = common::create_test_user(&state.db, 0).await;
    let racer = common::create_test_user(&state.db, 0).await;
    let late = common::create_test_user(&state.db, 0).await;

    let mut body = create_body();
    body["gamers_required"] = json!(2);
    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &creator.id)
        .json(&body)
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    // A concurrent writer that took the last slot but has not flipped
    // the status yet.
    {
        use diesel::prelude::*;
        use diesel_async::RunQueryDsl;
        use squad_api::db::schema::session_gamers;

        let mut conn = state.db.get().await.expect("pool");
        diesel::insert_into(session_gamers::table)
            .values((
                session_gamers::session_id.eq(&session_id),
                session_gamers::user_id.eq(&racer.id),
                session_gamers::joined_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .expect("insert racing gamer");
    }

    // The capacity check inside the transaction catches the overflow
    // even though the session still reads "open".
    let resp = server
        .post(&format!("/api/v1/sessions/{session_id}/join"))
        .add_header(USER_ID_HEADER, &late.id)
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    let view = server
        .get(&format!("/api/v1/sessions/{session_id}"))
        .await
        .json::<serde_json::Value>();
    assert_eq!(view["gamers"].as_array().unwrap().len(), 2);

    common::cleanup_test_user(&state.db, &late.id).await;
    common::cleanup_test_user(&state.db, &racer.id).await;
    common::cleanup_test_user(&state.db, &creator.id).await;
}

#[tokio::test]
async fn join_rejects_duplicates_and_cancelled() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let creator = common::create_test_user(&state.db, 0).await;
    let joiner = common::create_test_user(&state.db, 0).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &creator.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    // The creator is already signed up.
    let resp = server
        .post(&format!("/api/v1/sessions/{session_id}/join"))
        .add_header(USER_ID_HEADER, &creator.id)
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    server
        .delete(&format!("/api/v1/sessions/{session_id}"))
        .add_header(USER_ID_HEADER, &creator.id)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let resp = server
        .post(&format!("/api/v1/sessions/{session_id}/join"))
        .add_header(USER_ID_HEADER, &joiner.id)
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    common::cleanup_test_user(&state.db, &joiner.id).await;
    common::cleanup_test_user(&state.db, &creator.id).await;
}

#[tokio::test]
async fn creator_cannot_leave_own_session() {
    let Some((app, state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let creator = common::create_test_user(&state.db, 0).await;

    let session_id = server
        .post("/api/v1/sessions")
        .add_header(USER_ID_HEADER, &creator.id)
        .json(&create_body())
        .await
        .json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .delete(&format!("/api/v1/sessions/{session_id}/join"))
        .add_header(USER_ID_HEADER, &creator.id)
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    common::cleanup_test_user(&state.db, &creator.id).await;
}

// ---------------------------------------------------------------------------
// GET /api/v1/sessions/options
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_options_returns_form_support_data() {
    let Some((app, _state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/api/v1/sessions/options").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();

    assert_eq!(body["time_slots"].as_array().unwrap().len(), 96);
    assert_eq!(body["time_slots"][0], "0:00");
    assert_eq!(body["time_slots"][95], "23:45");
    assert_eq!(body["gamers_required"].as_array().unwrap().len(), 26);
    assert!(!body["platforms"].as_array().unwrap().is_empty());
    assert!(!body["session_types"].as_array().unwrap().is_empty());
    assert!(!body["durations"].as_array().unwrap().is_empty());
    assert!(body["default_scheduled_time"].is_string());
}

#[tokio::test]
async fn get_session_returns_not_found_for_unknown_id() {
    let Some((app, _state)) = common::try_test_app().await else {
        return;
    };
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/api/v1/sessions/ses_doesnotexist").await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
