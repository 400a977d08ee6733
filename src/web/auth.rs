use std::convert::Infallible;

use anyhow::{Context, Result};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    async_trait,
    extract::{Form, FromRequestParts, Query, State},
    http::request::Parts,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::web::{
    AppState,
    templates::{render_login_page, render_register_page},
};

#[derive(Clone, sqlx::FromRow)]
pub struct DbUserAuth {
    pub id: Uuid,
    pub password_hash: String,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

pub const SESSION_COOKIE: &str = "auth_token";
pub const SESSION_TTL_DAYS: i64 = 7;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

/// Resolves, opens and closes cookie-backed sessions.
#[derive(Clone)]
pub struct SessionProvider {
    pool: PgPool,
}

impl SessionProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The signed-in user for this cookie jar, if the session is live.
    pub async fn resolve(&self, jar: &CookieJar) -> Option<AuthUser> {
        let token = Uuid::parse_str(jar.get(SESSION_COOKIE)?.value()).ok()?;
        match fetch_user_by_session(&self.pool, token).await {
            Ok(user) => user,
            Err(err) => {
                error!(?err, "failed to resolve session");
                None
            }
        }
    }

    pub async fn open(&self, jar: CookieJar, user_id: Uuid) -> Result<CookieJar> {
        let session_token = Uuid::new_v4();
        let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);

        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .context("failed to create session")?;

        let mut cookie = Cookie::new(SESSION_COOKIE, session_token.to_string());
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));

        Ok(jar.add(cookie))
    }

    pub async fn close(&self, jar: CookieJar) -> CookieJar {
        if let Some(token) = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
        {
            if let Err(err) = sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(token)
                .execute(&self.pool)
                .await
            {
                error!(?err, "failed to remove session during logout");
            }
        }

        let mut removal = Cookie::new(SESSION_COOKIE, "");
        removal.set_path("/");
        removal.set_http_only(true);
        removal.set_same_site(SameSite::Lax);
        removal.set_max_age(CookieDuration::seconds(0));
        jar.remove(removal)
    }
}

/// Request-scoped view of who is signed in. Never rejects; anonymous
/// requests carry `None`.
pub struct CurrentUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(CurrentUser(state.sessions().resolve(&jar).await))
    }
}

#[derive(Default, Deserialize)]
pub struct AuthPageQuery {
    pub status: Option<String>,
    pub error: Option<String>,
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub password: String,
    #[serde(default)]
    pub accept_terms: Option<String>,
}

pub async fn login_page(
    CurrentUser(user): CurrentUser,
    Query(params): Query<AuthPageQuery>,
) -> Result<Html<String>, Redirect> {
    if user.is_some() {
        return Err(Redirect::to("/"));
    }

    Ok(Html(render_login_page(&params)))
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), Redirect> {
    let username = form.username.trim();
    let next = sanitize_next(form.next.as_deref());

    let user = match fetch_user_by_username(state.pool_ref(), username).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(Redirect::to("/login?error=invalid_credentials")),
        Err(err) => {
            error!(?err, "failed to fetch user during login");
            return Err(Redirect::to("/login?error=unknown"));
        }
    };

    if !verify_password(&form.password, &user.password_hash) {
        return Err(Redirect::to("/login?error=invalid_credentials"));
    }

    let jar = state.sessions().open(jar, user.id).await.map_err(|err| {
        error!(?err, "failed to open session");
        Redirect::to("/login?error=unknown")
    })?;

    Ok((jar, Redirect::to(next)))
}

pub async fn register_page(
    CurrentUser(user): CurrentUser,
    Query(params): Query<AuthPageQuery>,
) -> Result<Html<String>, Redirect> {
    if user.is_some() {
        return Err(Redirect::to("/"));
    }

    Ok(Html(render_register_page(&params)))
}

pub async fn process_register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<(CookieJar, Redirect), Redirect> {
    let username = form.username.trim();
    if let Err(code) = validate_registration(username, &form.password, form.accept_terms.is_some()) {
        return Err(Redirect::to(&format!("/register?error={code}")));
    }

    let password_hash = hash_password(&form.password).map_err(|err| {
        error!(?err, "failed to hash password during registration");
        Redirect::to("/register?error=unknown")
    })?;

    let display_name = form
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let user_id = Uuid::new_v4();
    let result = sqlx::query(
        "INSERT INTO users (id, username, display_name, password_hash, is_admin)
         VALUES ($1, $2, $3, $4, FALSE)",
    )
    .bind(user_id)
    .bind(username)
    .bind(display_name)
    .bind(password_hash)
    .execute(state.pool_ref())
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            return Err(Redirect::to("/register?error=duplicate"));
        }
        Err(err) => {
            error!(?err, "failed to register user");
            return Err(Redirect::to("/register?error=unknown"));
        }
    }
    info!(%user_id, username, "user registered");

    let jar = state.sessions().open(jar, user_id).await.map_err(|err| {
        error!(?err, "failed to open session after registration");
        Redirect::to("/login?status=registered")
    })?;

    Ok((jar, Redirect::to("/?status=registered")))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = state.sessions().close(jar).await;
    (jar, Redirect::to("/?status=logged_out"))
}

/// Registration gate. Returns the flash code of the first failing rule.
pub fn validate_registration(
    username: &str,
    password: &str,
    accepted_terms: bool,
) -> Result<(), &'static str> {
    if !accepted_terms {
        return Err("terms_required");
    }

    let length = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&length) {
        return Err("invalid_username");
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
    {
        return Err("invalid_username");
    }

    if password.chars().count() < PASSWORD_MIN {
        return Err("weak_password");
    }

    Ok(())
}

/// Only same-site absolute paths are followed after login.
pub fn sanitize_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.contains("://") =>
        {
            path
        }
        _ => "/",
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn fetch_user_by_username(
    pool: &PgPool,
    username: &str,
) -> sqlx::Result<Option<DbUserAuth>> {
    sqlx::query_as::<_, DbUserAuth>("SELECT id, password_hash FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user_by_session(pool: &PgPool, token: Uuid) -> sqlx::Result<Option<AuthUser>> {
    sqlx::query_as::<_, AuthUser>(
        "SELECT users.id, users.username, users.display_name, users.is_admin FROM sessions JOIN users ON users.id = sessions.user_id WHERE sessions.id = $1 AND sessions.expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_requires_terms_first() {
        assert_eq!(validate_registration("ayu", "password1", false), Err("terms_required"));
        assert_eq!(validate_registration("", "", false), Err("terms_required"));
    }

    #[test]
    fn registration_checks_username_shape_and_password_length() {
        assert_eq!(validate_registration("ayu.lestari_01", "sekar-jagad", true), Ok(()));
        assert_eq!(validate_registration("ab", "sekar-jagad", true), Err("invalid_username"));
        assert_eq!(validate_registration(&"a".repeat(33), "sekar-jagad", true), Err("invalid_username"));
        assert_eq!(validate_registration("ayu lestari", "sekar-jagad", true), Err("invalid_username"));
        assert_eq!(validate_registration("ayu", "short", true), Err("weak_password"));
    }

    #[test]
    fn next_parameter_stays_on_site() {
        assert_eq!(sanitize_next(Some("/contribute")), "/contribute");
        assert_eq!(sanitize_next(Some("//evil.example")), "/");
        assert_eq!(sanitize_next(Some("https://evil.example")), "/");
        assert_eq!(sanitize_next(Some("/\\evil.example")), "/");
        assert_eq!(sanitize_next(None), "/");
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("change-me").unwrap();
        assert!(verify_password("change-me", &hash));
        assert!(!verify_password("change-you", &hash));
        assert!(!verify_password("change-me", "not-a-hash"));
    }
}
