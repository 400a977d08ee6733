use axum::{
    extract::{Form, State},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::web::{AppState, auth};

use super::auth::require_admin_user;

#[derive(Deserialize)]
pub(crate) struct CreateUserForm {
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    password: String,
    #[serde(default)]
    is_admin: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct UpdatePasswordForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub(crate) struct DeleteUserForm {
    id: Uuid,
}

pub async fn create_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CreateUserForm>,
) -> Result<Redirect, Redirect> {
    let _admin = require_admin_user(&state, &jar).await?;

    let username = form.username.trim();
    if username.is_empty() {
        return Ok(Redirect::to("/dashboard?error=missing_username"));
    }

    let password = form.password.trim();
    if password.is_empty() {
        return Ok(Redirect::to("/dashboard?error=missing_password"));
    }

    if let Err(code) = auth::validate_registration(username, password, true) {
        return Ok(Redirect::to(&format!("/dashboard?error={code}")));
    }

    let display_name = form
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let is_admin = form.is_admin.is_some();

    let password_hash = match auth::hash_password(password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash password while creating user");
            return Ok(Redirect::to("/dashboard?error=unknown"));
        }
    };

    let result = sqlx::query(
        "INSERT INTO users (id, username, display_name, password_hash, is_admin)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(display_name)
    .bind(password_hash)
    .bind(is_admin)
    .execute(state.pool_ref())
    .await;

    match result {
        Ok(_) => Ok(Redirect::to("/dashboard?status=created")),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            Ok(Redirect::to("/dashboard?error=duplicate"))
        }
        Err(err) => {
            error!(?err, "failed to create user");
            Ok(Redirect::to("/dashboard?error=unknown"))
        }
    }
}

pub async fn update_user_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<UpdatePasswordForm>,
) -> Result<Redirect, Redirect> {
    let _admin = require_admin_user(&state, &jar).await?;

    let username = form.username.trim();
    if username.is_empty() {
        return Ok(Redirect::to("/dashboard?error=user_missing"));
    }

    let password = form.password.trim();
    if password.is_empty() {
        return Ok(Redirect::to("/dashboard?error=missing_password"));
    }

    let password_hash = match auth::hash_password(password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(
                ?err,
                "failed to hash password while resetting user password"
            );
            return Ok(Redirect::to("/dashboard?error=unknown"));
        }
    };

    let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE username = $1")
        .bind(username)
        .bind(password_hash)
        .execute(state.pool_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() > 0 => {
            Ok(Redirect::to("/dashboard?status=password_updated"))
        }
        Ok(_) => Ok(Redirect::to("/dashboard?error=user_missing")),
        Err(err) => {
            error!(?err, "failed to update user password");
            Ok(Redirect::to("/dashboard?error=unknown"))
        }
    }
}

/// Removes an account and its sessions. Content the user authored stays
/// published with no owner.
pub async fn delete_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<DeleteUserForm>,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    if admin.id == form.id {
        return Ok(Redirect::to("/dashboard?error=self_delete"));
    }

    let removed: Result<bool, sqlx::Error> = sqlx::query_scalar("SELECT delete_user($1)")
        .bind(form.id)
        .fetch_one(state.pool_ref())
        .await;

    match removed {
        Ok(true) => {
            info!(user_id = %form.id, admin = %admin.username, "user deleted");
            Ok(Redirect::to("/dashboard?status=user_deleted"))
        }
        Ok(false) => Ok(Redirect::to("/dashboard?error=user_missing")),
        Err(err) => {
            error!(?err, "failed to delete user");
            Ok(Redirect::to("/dashboard?error=unknown"))
        }
    }
}
