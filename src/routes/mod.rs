use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{error::AppError, gate, services::documents::MAX_UPLOAD_BYTES, state::AppState};

pub mod account;
pub mod auth;
pub mod documents;
pub mod forum;
pub mod health;
pub mod maintenance;

/// Multipart framing on top of the largest accepted file.
const BODY_LIMIT_BYTES: usize = MAX_UPLOAD_BYTES + 2 * 1024 * 1024;

fn cors_layer(state: &AppState) -> CorsLayer {
    let allow_origin = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(origin = value, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(headers)
    } else {
        AllowOrigin::mirror_request()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn not_found() -> AppError {
    AppError::not_found()
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/password-reset", post(auth::request_password_reset))
        .route("/password", put(auth::update_password))
        .route("/me", get(auth::me));

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route("/:id", delete(documents::delete_document));

    let forum_routes = Router::new()
        .route("/", get(forum::list_topics).post(forum::create_topic))
        .route("/:id", get(forum::get_topic))
        .route("/:id/replies", post(forum::create_reply));

    let router = Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/forum/topics", forum_routes)
        .route("/api/students", get(documents::list_students))
        .route("/api/delete-account", post(account::delete_account))
        .route("/api/refresh-urls", get(maintenance::refresh_urls))
        .route("/api/test-file-access", post(maintenance::test_file_access))
        .route("/api/health", get(health::health_check));

    let router = match state.config.static_dir.as_ref() {
        Some(dir) => {
            router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
        }
        None => router.fallback(not_found),
    };

    let gate_state = state.clone();
    router
        .layer(middleware::from_fn_with_state(gate_state, gate::access_gate))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
}
