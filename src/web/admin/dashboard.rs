use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::{
    contributions::{ContributionStatus, moderation},
    web::{
        AppState, AuthUser, escape_html,
        flash::compose_flash_message,
        templates::{PageLayout, render_page},
    },
};

use super::{auth::require_admin_user, types::DashboardQuery};

#[derive(sqlx::FromRow)]
struct DashboardUserRow {
    id: Uuid,
    username: String,
    display_name: Option<String>,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

/// Links shared by every dashboard page.
pub(crate) fn render_admin_nav(active: &str) -> String {
    let links = [
        ("/dashboard", "Users"),
        ("/dashboard/moderation", "Moderation"),
        ("/dashboard/catalog", "Catalog"),
        ("/dashboard/quiz", "Quiz settings"),
    ];
    let items = links
        .iter()
        .map(|(href, label)| {
            let class = if *href == active { " class=\"pill\"" } else { "" };
            format!(r#"<a href="{href}"{class}>{label}</a>"#)
        })
        .collect::<Vec<_>>()
        .join(" · ");
    format!(r#"<p class="note">{items}</p>"#)
}

pub async fn dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<DashboardQuery>,
) -> Result<Html<String>, Redirect> {
    let auth_user = require_admin_user(&state, &jar).await?;

    let users = fetch_dashboard_users(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to load dashboard users");
            Redirect::to("/?error=unknown")
        })?;

    let pending = moderation::list(state.contributions(), Some(ContributionStatus::Pending))
        .await
        .map(|items| items.len())
        .unwrap_or_else(|err| {
            error!(?err, "failed to count pending contributions");
            0
        });
    let live_quizzes = state.quizzes().len().await;

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let body = render_dashboard_body(&auth_user, &users, pending, live_quizzes);

    Ok(Html(render_page(
        PageLayout::new("Dashboard", Some(&auth_user), body).with_flash(flash),
    )))
}

fn render_dashboard_body(
    current: &AuthUser,
    users: &[DashboardUserRow],
    pending: usize,
    live_quizzes: usize,
) -> String {
    let mut table_rows = String::new();
    if users.is_empty() {
        table_rows.push_str("<tr><td colspan=\"5\">No users yet.</td></tr>");
    }
    for user in users {
        let role = if user.is_admin { "Administrator" } else { "Contributor" };
        let action = if user.id == current.id {
            "<span class=\"note\">you</span>".to_string()
        } else {
            format!(
                r#"<form method="post" action="/dashboard/users/delete" class="inline-form" onsubmit="return confirm('Delete {name}?');"><input type="hidden" name="id" value="{id}"><button type="submit" class="danger">Delete</button></form>"#,
                name = escape_html(&user.username),
                id = user.id,
            )
        };
        table_rows.push_str(&format!(
            "<tr><td>{username}</td><td>{display}</td><td>{role}</td><td>{joined}</td><td>{action}</td></tr>",
            username = escape_html(&user.username),
            display = escape_html(user.display_name.as_deref().unwrap_or("")),
            joined = user.created_at.format("%Y-%m-%d"),
        ));
    }

    format!(
        r#"{nav}
<section class="panel">
    <h2>Overview</h2>
    <p><a href="/dashboard/moderation">{pending} contribution(s) awaiting review</a> · {live_quizzes} quiz session(s) in progress</p>
</section>
<section>
    <h2>Users</h2>
    <table>
        <thead><tr><th>Username</th><th>Display name</th><th>Role</th><th>Joined</th><th></th></tr></thead>
        <tbody>{table_rows}</tbody>
    </table>
</section>
<section class="panel">
    <h2>Create user</h2>
    <form method="post" action="/dashboard/users">
        <label for="new-username">Username</label>
        <input id="new-username" name="username" required>
        <label for="new-display">Display name</label>
        <input id="new-display" name="display_name">
        <label for="new-password">Password</label>
        <input id="new-password" type="password" name="password" required>
        <label><input type="checkbox" name="is_admin" value="on"> Administrator</label>
        <p><button type="submit">Create user</button></p>
    </form>
</section>
<section class="panel">
    <h2>Reset password</h2>
    <form method="post" action="/dashboard/users/password">
        <label for="reset-username">Username</label>
        <input id="reset-username" name="username" required>
        <label for="reset-password">New password</label>
        <input id="reset-password" type="password" name="password" required>
        <p><button type="submit">Update password</button></p>
    </form>
</section>"#,
        nav = render_admin_nav("/dashboard"),
    )
}

async fn fetch_dashboard_users(pool: &PgPool) -> Result<Vec<DashboardUserRow>> {
    let rows = sqlx::query_as::<_, DashboardUserRow>(
        "SELECT id, username, display_name, is_admin, created_at FROM users ORDER BY username",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            username: "editor".into(),
            display_name: None,
            is_admin: true,
        }
    }

    #[test]
    fn current_admin_has_no_delete_button() {
        let current = admin();
        let users = vec![
            DashboardUserRow {
                id: current.id,
                username: "editor".into(),
                display_name: None,
                is_admin: true,
                created_at: Utc::now(),
            },
            DashboardUserRow {
                id: Uuid::new_v4(),
                username: "wayan".into(),
                display_name: Some("Wayan".into()),
                is_admin: false,
                created_at: Utc::now(),
            },
        ];
        let html = render_dashboard_body(&current, &users, 3, 1);
        assert_eq!(html.matches("/dashboard/users/delete").count(), 1);
        assert!(html.contains("Delete wayan?"));
        assert!(html.contains("3 contribution(s) awaiting review"));
    }

    #[test]
    fn admin_nav_marks_the_active_page() {
        let nav = render_admin_nav("/dashboard/quiz");
        assert!(nav.contains(r#"<a href="/dashboard/quiz" class="pill">"#));
        assert!(nav.contains(r#"<a href="/dashboard">Users</a>"#));
    }
}
