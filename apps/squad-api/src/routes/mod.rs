pub mod health;
pub mod kudos;
pub mod profiles;
pub mod sessions;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).nest(
        "/api/v1",
        sessions::router()
            .merge(kudos::router())
            .merge(profiles::router()),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Sessions
        sessions::create_session,
        sessions::list_sessions,
        sessions::get_session,
        sessions::update_session,
        sessions::cancel_session,
        sessions::add_comment,
        sessions::join_session,
        sessions::leave_session,
        sessions::session_options,
        // Kudos
        kudos::leaderboard,
        // Profiles
        profiles::get_profile,
        profiles::update_profile,
        profiles::add_friend,
        profiles::search_users,
        profiles::menu_summary,
        profiles::upload_avatar,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::session::SessionResponse,
            crate::models::message::MessageResponse,
            crate::models::user::UserResponse,
            crate::models::user::UserSummary,
            crate::models::lookup::Platform,
            crate::models::lookup::SessionType,
            crate::models::lookup::SessionDuration,
            crate::scheduling::GamersRequiredOption,
            // Route request/response types
            health::HealthResponse,
            sessions::CreateSessionRequest,
            sessions::UpdateSessionRequest,
            sessions::AddCommentRequest,
            sessions::SessionListItem,
            sessions::ListSessionsResponse,
            sessions::SessionGamer,
            sessions::ViewSessionResponse,
            sessions::SessionOptionsResponse,
            kudos::LeaderboardEntry,
            kudos::LeaderboardResponse,
            profiles::ProfileResponse,
            profiles::UpdateProfileRequest,
            profiles::AddFriendRequest,
            profiles::AddFriendResponse,
            profiles::MenuSummaryResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Sessions", description = "Gaming session management"),
        (name = "Kudos", description = "Reputation points"),
        (name = "Profiles", description = "User profiles and friends"),
    )
)]
pub struct ApiDoc;
