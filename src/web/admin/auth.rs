use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;

use crate::web::{AppState, AuthUser};

/// Resolves the session and insists on an administrator. Anonymous callers
/// go to the login page, signed-in non-admins back to the atlas.
pub async fn require_admin_user(state: &AppState, jar: &CookieJar) -> Result<AuthUser, Redirect> {
    let Some(auth_user) = state.sessions().resolve(jar).await else {
        return Err(Redirect::to("/login?next=/dashboard"));
    };

    if !auth_user.is_admin {
        return Err(Redirect::to("/?error=not_authorized"));
    }

    Ok(auth_user)
}
