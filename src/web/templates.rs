use std::borrow::Cow;

use chrono::{Datelike, Utc};

use crate::web::{AuthUser, auth::AuthPageQuery, flash::compose_flash_message};

const SITE_NAME: &str = "Heritage Atlas";

const BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #fdf8f3; color: #1c1917; }
        header { background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e7e5e4; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; max-width: 1080px; margin: 0 auto; }
        .header-bar h1 { margin: 0; font-size: 1.6rem; }
        .header-bar h1 a { color: inherit; text-decoration: none; }
        nav { display: flex; gap: 0.75rem; align-items: center; flex-wrap: wrap; }
        nav a, .pill { color: #9a3412; text-decoration: none; font-weight: 600; background: #ffedd5; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #fed7aa; }
        nav a:hover { background: #fed7aa; }
        nav form { margin: 0; }
        nav button { padding: 0.45rem 0.9rem; border-radius: 999px; }
        main { padding: 2rem 1.5rem; max-width: 1080px; margin: 0 auto; box-sizing: border-box; }
        section { margin-bottom: 2.5rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e7e5e4; padding: 1.5rem; box-shadow: 0 18px 40px rgba(28, 25, 23, 0.06); }
        .panel h2 { margin-top: 0; }
        .grid { display: grid; gap: 1.25rem; grid-template-columns: repeat(auto-fit, minmax(240px, 1fr)); }
        .card { background: #ffffff; border-radius: 12px; border: 1px solid #e7e5e4; padding: 1.25rem; }
        .card h3 { margin-top: 0; }
        .card img { width: 100%; border-radius: 8px; }
        label { display: block; margin: 0.9rem 0 0.4rem; font-weight: 600; }
        input, select, textarea { width: 100%; padding: 0.7rem; border-radius: 8px; border: 1px solid #d6d3d1; background: #fafaf9; color: #1c1917; box-sizing: border-box; font: inherit; }
        input[type="checkbox"], input[type="radio"] { width: auto; margin-right: 0.5rem; }
        textarea { min-height: 6rem; }
        button { padding: 0.8rem 1.2rem; border: none; border-radius: 8px; background: #c2410c; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #9a3412; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        button.secondary { background: #e7e5e4; color: #1c1917; }
        button.danger { background: #b91c1c; }
        table { width: 100%; border-collapse: collapse; background: #ffffff; border: 1px solid #e7e5e4; border-radius: 12px; overflow: hidden; }
        th, td { padding: 0.7rem 0.9rem; border-bottom: 1px solid #e7e5e4; text-align: left; vertical-align: top; }
        th { background: #f5f5f4; }
        .inline-form { display: inline; margin: 0; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .note { color: #57534e; font-size: 0.95rem; line-height: 1.6; }
        .status-tag { display: inline-block; padding: 0.2rem 0.7rem; border-radius: 999px; font-size: 0.85rem; font-weight: 600; }
        .status-tag.pending { background: #fef3c7; color: #92400e; }
        .status-tag.approved { background: #dcfce7; color: #166534; }
        .status-tag.rejected { background: #fee2e2; color: #b91c1c; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #a8a29e; }
        @media (max-width: 768px) {
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
            th, td { padding: 0.5rem; }
        }
"#;

pub struct PageLayout<'a> {
    pub title: &'a str,
    pub user: Option<&'a AuthUser>,
    pub flash_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
    pub extra_styles: Option<&'a str>,
    pub body_scripts: Vec<Cow<'a, str>>,
}

impl<'a> PageLayout<'a> {
    pub fn new(title: &'a str, user: Option<&'a AuthUser>, body_html: impl Into<Cow<'a, str>>) -> Self {
        Self {
            title,
            user,
            flash_html: Cow::Borrowed(""),
            body_html: body_html.into(),
            extra_styles: None,
            body_scripts: Vec::new(),
        }
    }

    pub fn with_flash(mut self, flash_html: String) -> Self {
        self.flash_html = Cow::Owned(flash_html);
        self
    }

    pub fn with_styles(mut self, styles: &'a str) -> Self {
        self.extra_styles = Some(styles);
        self
    }

    pub fn with_script(mut self, script: impl Into<Cow<'a, str>>) -> Self {
        self.body_scripts.push(script.into());
        self
    }
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        user,
        flash_html,
        body_html,
        extra_styles,
        body_scripts,
    } = layout;

    let nav = render_nav(user);
    let scripts = body_scripts
        .into_iter()
        .map(|script| format!("<script>{script}</script>"))
        .collect::<Vec<_>>()
        .join("\n");
    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} · {site}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
{styles}
{extra_styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1><a href="/">{site}</a></h1>
            {nav}
        </div>
    </header>
    <main>
        {flash_html}
        {body_html}
        {footer}
    </main>
{scripts}
</body>
</html>"#,
        title = escape_html(title),
        site = SITE_NAME,
        styles = BASE_STYLES,
        extra_styles = extra_styles.unwrap_or_default(),
    )
}

fn render_nav(user: Option<&AuthUser>) -> String {
    let mut links = String::from(
        r#"<a href="/">Explore</a><a href="/quiz">Quiz</a><a href="/contribute">Contribute</a>"#,
    );
    match user {
        Some(user) => {
            if user.is_admin {
                links.push_str(r#"<a href="/dashboard">Dashboard</a>"#);
            }
            links.push_str(&format!(
                r#"<span class="pill">{name}</span><form method="post" action="/logout"><button type="submit" class="secondary">Sign out</button></form>"#,
                name = escape_html(user.label()),
            ));
        }
        None => {
            links.push_str(r#"<a href="/login">Sign in</a><a href="/register">Register</a>"#);
        }
    }
    format!("<nav>{links}</nav>")
}

pub fn render_login_page(params: &AuthPageQuery) -> String {
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let next = escape_html(params.next.as_deref().unwrap_or("/"));
    let body = format!(
        r#"<section class="panel" style="max-width:460px;margin:0 auto;">
    <h2>Sign in</h2>
    <form method="post" action="/login">
        <input type="hidden" name="next" value="{next}">
        <label for="username">Username</label>
        <input id="username" name="username" autocomplete="username" required>
        <label for="password">Password</label>
        <input id="password" type="password" name="password" autocomplete="current-password" required>
        <p><button type="submit">Sign in</button></p>
    </form>
    <p class="note">New here? <a href="/register">Create an account</a> to contribute.</p>
</section>"#
    );

    render_page(PageLayout::new("Sign in", None, body).with_flash(flash))
}

pub fn render_register_page(params: &AuthPageQuery) -> String {
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let body = r#"<section class="panel" style="max-width:520px;margin:0 auto;">
    <h2>Create an account</h2>
    <form method="post" action="/register">
        <label for="username">Username</label>
        <input id="username" name="username" minlength="3" maxlength="32" pattern="[A-Za-z0-9_.\-]+" required>
        <label for="display_name">Display name (optional)</label>
        <input id="display_name" name="display_name">
        <label for="password">Password</label>
        <input id="password" type="password" name="password" minlength="8" required>
        <label><input type="checkbox" name="accept_terms" value="on" required>I agree that my contributions may be reviewed, edited and published with attribution.</label>
        <p><button type="submit">Register</button></p>
    </form>
</section>"#;

    render_page(PageLayout::new("Register", None, body).with_flash(flash))
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© 2024-{year} {site}. Community-sourced cultural heritage of the archipelago.</footer>"#,
        year = current_year,
        site = SITE_NAME,
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn escape_html_covers_attribute_breakers() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn navigation_reflects_the_signed_in_user() {
        let admin = AuthUser {
            id: Uuid::new_v4(),
            username: "demo-admin".into(),
            display_name: Some("Dewi <Admin>".into()),
            is_admin: true,
        };
        let html = render_page(PageLayout::new("Home", Some(&admin), "<p>hi</p>"));
        assert!(html.contains(r#"href="/dashboard""#));
        assert!(html.contains("Dewi &lt;Admin&gt;"));
        assert!(!html.contains(r#"href="/login""#));

        let anonymous = render_page(PageLayout::new("Home", None, "<p>hi</p>"));
        assert!(anonymous.contains(r#"href="/login""#));
        assert!(!anonymous.contains(r#"href="/dashboard""#));
    }

    #[test]
    fn login_page_carries_the_flash_and_next_target() {
        let params = AuthPageQuery {
            status: Some("login_required".into()),
            error: None,
            next: Some("/contribute".into()),
        };
        let html = render_login_page(&params);
        assert!(html.contains("Please sign in to continue."));
        assert!(html.contains(r#"name="next" value="/contribute""#));
    }
}
