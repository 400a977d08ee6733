use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{
    AppState, admin, auth, catalog_api, contribute, landing, quiz_api, quiz_ui, storage,
};

const ROBOTS_TXT_BODY: &str = include_str!("../../robots.txt");

/// Largest accepted request body: a 20 MB track plus a 5 MB cover and form fields.
const MAX_BODY_BYTES: usize = 26 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing::landing_page))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(auth::register_page).post(auth::process_register),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/contribute",
            get(contribute::contribute_page).post(contribute::submit_contribution),
        )
        .route("/quiz", get(quiz_ui::quiz_page))
        .route("/healthz", get(healthz))
        .route("/robots.txt", get(robots_txt))
        .route("/media/*path", get(storage::serve_media))
        .merge(api_routes())
        .merge(dashboard_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/regions", get(catalog_api::regions))
        .route("/api/cultures", get(catalog_api::cultures))
        .route("/api/cultures/:id", get(catalog_api::culture))
        .route("/api/articles", get(catalog_api::articles))
        .route("/api/articles/:slug", get(catalog_api::article))
        .route("/api/gallery", get(catalog_api::gallery))
        .route("/api/music", get(catalog_api::music))
        .route("/api/quiz/sessions", post(quiz_api::create_session))
        .route(
            "/api/quiz/sessions/:id",
            get(quiz_api::get_session).delete(quiz_api::delete_session),
        )
        .route("/api/quiz/sessions/:id/start", post(quiz_api::start_session))
        .route("/api/quiz/sessions/:id/select", post(quiz_api::select_option))
        .route("/api/quiz/sessions/:id/submit", post(quiz_api::submit_answer))
        .route("/api/quiz/sessions/:id/next", post(quiz_api::next_question))
        .route(
            "/api/quiz/sessions/:id/restart",
            post(quiz_api::restart_session),
        )
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/dashboard/users", post(admin::create_user))
        .route(
            "/dashboard/users/password",
            post(admin::update_user_password),
        )
        .route("/dashboard/users/delete", post(admin::delete_user))
        .route("/dashboard/moderation", get(admin::moderation_queue))
        .route(
            "/dashboard/moderation/approve",
            post(admin::approve_contribution),
        )
        .route(
            "/dashboard/moderation/reject",
            post(admin::reject_contribution),
        )
        .route(
            "/dashboard/moderation/delete",
            post(admin::delete_contribution),
        )
        .route("/dashboard/catalog", get(admin::catalog_page))
        .route("/dashboard/catalog/cultures", post(admin::create_culture))
        .route(
            "/dashboard/catalog/cultures/delete",
            post(admin::delete_culture),
        )
        .route("/dashboard/catalog/articles", post(admin::create_article))
        .route(
            "/dashboard/catalog/articles/delete",
            post(admin::delete_article),
        )
        .route("/dashboard/quiz", get(admin::quiz_settings_page))
        .route("/dashboard/quiz/models", post(admin::update_models))
        .route("/dashboard/quiz/prompts", post(admin::update_prompts))
}

async fn robots_txt() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        ROBOTS_TXT_BODY,
    )
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
