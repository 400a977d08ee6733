use axum::{
    extract::{Form, Multipart, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    catalog::{self, ArticleSummary, Culture, CultureFilter, NewArticle, NewCulture, Region},
    contributions::UploadPolicy,
    web::{
        AppState, escape_html,
        flash::compose_flash_message,
        templates::{PageLayout, render_page},
        uploads::process_upload_form,
    },
};

use super::{auth::require_admin_user, dashboard::render_admin_nav, types::DashboardQuery};

const CATALOG_PATH: &str = "/dashboard/catalog";

#[derive(Deserialize)]
pub(crate) struct DeleteForm {
    id: Uuid,
}

#[derive(Deserialize)]
pub(crate) struct ArticleForm {
    title: String,
    #[serde(default)]
    summary: Option<String>,
    body: String,
    #[serde(default)]
    cover_url: Option<String>,
    #[serde(default)]
    published: Option<String>,
}

pub async fn catalog_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<DashboardQuery>,
) -> Result<Html<String>, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;
    let pool = state.pool_ref();

    let regions = catalog::list_regions(pool).await.unwrap_or_else(|err| {
        error!(?err, "failed to load regions for catalog admin");
        Vec::new()
    });
    let cultures = catalog::list_cultures(pool, &CultureFilter::default())
        .await
        .unwrap_or_else(|err| {
            error!(?err, "failed to load cultures for catalog admin");
            Vec::new()
        });
    let articles = catalog::list_articles(pool, true).await.unwrap_or_else(|err| {
        error!(?err, "failed to load articles for catalog admin");
        Vec::new()
    });

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let body = render_catalog_body(&regions, &cultures, &articles);
    Ok(Html(render_page(
        PageLayout::new("Catalog", Some(&admin), body).with_flash(flash),
    )))
}

/// Multipart create so the optional image streams straight to media storage.
pub async fn create_culture(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    let policies = [UploadPolicy::CULTURE_IMAGE];
    let form = match process_upload_form(multipart, state.media(), admin.id, &policies).await {
        Ok(form) => form,
        Err(err) => {
            warn!(%err, "culture image refused");
            return Ok(catalog_redirect("error", &err.flash_code()));
        }
    };

    let required = [
        ("name", form.text("name")),
        ("category", form.text("category")),
        ("description", form.text("description")),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        form.discard(state.media()).await;
        return Ok(catalog_redirect("error", &format!("missing_{field}")));
    }
    let [(_, name), (_, category), (_, description)] = required;

    let culture = NewCulture {
        region_slug: form
            .first_text("region")
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_string),
        name: name.trim().to_string(),
        category: category.trim().to_string(),
        description: description.trim().to_string(),
        image_url: form.object_for("image").map(|object| object.url),
    };

    match catalog::create_culture(state.pool_ref(), &culture).await {
        Ok(id) => {
            info!(%id, name = %culture.name, "culture entry created");
            Ok(catalog_redirect("status", "culture_created"))
        }
        Err(err) => {
            error!(?err, "failed to create culture entry");
            form.discard(state.media()).await;
            Ok(catalog_redirect("error", "unknown"))
        }
    }
}

pub async fn delete_culture(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, Redirect> {
    let _admin = require_admin_user(&state, &jar).await?;

    match catalog::delete_culture(state.pool_ref(), form.id).await {
        Ok(Some(image_url)) => {
            if let Some(url) = image_url {
                state.media().remove_url(&url).await;
            }
            Ok(catalog_redirect("status", "culture_deleted"))
        }
        Ok(None) => Ok(catalog_redirect("error", "culture_missing")),
        Err(err) => {
            error!(?err, "failed to delete culture entry");
            Ok(catalog_redirect("error", "unknown"))
        }
    }
}

pub async fn create_article(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ArticleForm>,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    let title = form.title.trim();
    if title.is_empty() {
        return Ok(catalog_redirect("error", "missing_title"));
    }
    let body = form.body.trim();
    if body.is_empty() {
        return Ok(catalog_redirect("error", "missing_body"));
    }

    let optional = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let article = NewArticle {
        title: title.to_string(),
        summary: optional(form.summary),
        body: body.to_string(),
        cover_url: optional(form.cover_url),
        published: form.published.is_some(),
    };

    match catalog::create_article(state.pool_ref(), &article, admin.id).await {
        Ok((id, slug)) => {
            info!(%id, %slug, "article created");
            Ok(catalog_redirect("status", "article_created"))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            Ok(catalog_redirect("error", "article_duplicate"))
        }
        Err(err) => {
            error!(?err, "failed to create article");
            Ok(catalog_redirect("error", "unknown"))
        }
    }
}

pub async fn delete_article(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, Redirect> {
    let _admin = require_admin_user(&state, &jar).await?;

    match catalog::delete_article(state.pool_ref(), form.id).await {
        Ok(true) => Ok(catalog_redirect("status", "article_deleted")),
        Ok(false) => Ok(catalog_redirect("error", "article_missing")),
        Err(err) => {
            error!(?err, "failed to delete article");
            Ok(catalog_redirect("error", "unknown"))
        }
    }
}

fn catalog_redirect(key: &str, code: &str) -> Redirect {
    Redirect::to(&format!("{CATALOG_PATH}?{key}={code}"))
}

fn delete_button(action: &str, id: Uuid) -> String {
    format!(
        r#"<form method="post" action="{CATALOG_PATH}/{action}" class="inline-form" onsubmit="return confirm('Delete this entry?');"><input type="hidden" name="id" value="{id}"><button type="submit" class="danger">Delete</button></form>"#
    )
}

fn render_catalog_body(regions: &[Region], cultures: &[Culture], articles: &[ArticleSummary]) -> String {
    let region_options = regions
        .iter()
        .map(|region| {
            format!(
                r#"<option value="{}">{}</option>"#,
                escape_html(&region.slug),
                escape_html(&region.name)
            )
        })
        .collect::<String>();

    let culture_rows = if cultures.is_empty() {
        "<tr><td colspan=\"4\">No culture entries yet.</td></tr>".to_string()
    } else {
        cultures
            .iter()
            .map(|culture| {
                format!(
                    "<tr><td>{name}</td><td>{category}</td><td>{region}</td><td>{action}</td></tr>",
                    name = escape_html(&culture.name),
                    category = escape_html(&culture.category),
                    region = escape_html(culture.region_name.as_deref().unwrap_or("-")),
                    action = delete_button("cultures/delete", culture.id),
                )
            })
            .collect()
    };

    let article_rows = if articles.is_empty() {
        "<tr><td colspan=\"4\">No articles yet.</td></tr>".to_string()
    } else {
        articles
            .iter()
            .map(|article| {
                format!(
                    "<tr><td>{title}</td><td>{slug}</td><td>{state}</td><td>{action}</td></tr>",
                    title = escape_html(&article.title),
                    slug = escape_html(&article.slug),
                    state = if article.published { "published" } else { "draft" },
                    action = delete_button("articles/delete", article.id),
                )
            })
            .collect()
    };

    format!(
        r#"{nav}
<section>
    <h2>Culture entries</h2>
    <table>
        <thead><tr><th>Name</th><th>Category</th><th>Region</th><th></th></tr></thead>
        <tbody>{culture_rows}</tbody>
    </table>
</section>
<section class="panel">
    <h2>Add culture entry</h2>
    <form method="post" action="{CATALOG_PATH}/cultures" enctype="multipart/form-data">
        <label for="culture-name">Name</label>
        <input id="culture-name" name="name" required>
        <label for="culture-category">Category</label>
        <input id="culture-category" name="category" required>
        <label for="culture-region">Region</label>
        <select id="culture-region" name="region"><option value="">Nationwide</option>{region_options}</select>
        <label for="culture-description">Description</label>
        <textarea id="culture-description" name="description" required></textarea>
        <label for="culture-image">Image (up to 10 MB)</label>
        <input id="culture-image" type="file" name="image" accept="image/*">
        <p><button type="submit">Add entry</button></p>
    </form>
</section>
<section>
    <h2>Articles</h2>
    <table>
        <thead><tr><th>Title</th><th>Slug</th><th>State</th><th></th></tr></thead>
        <tbody>{article_rows}</tbody>
    </table>
</section>
<section class="panel">
    <h2>Write article</h2>
    <form method="post" action="{CATALOG_PATH}/articles">
        <label for="article-title">Title</label>
        <input id="article-title" name="title" required>
        <label for="article-summary">Summary</label>
        <input id="article-summary" name="summary">
        <label for="article-cover">Cover image URL</label>
        <input id="article-cover" name="cover_url">
        <label for="article-body">Body</label>
        <textarea id="article-body" name="body" required></textarea>
        <label><input type="checkbox" name="published" value="on" checked> Publish now</label>
        <p><button type="submit">Save article</button></p>
    </form>
</section>"#,
        nav = render_admin_nav(CATALOG_PATH),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn drafts_are_labelled_and_deletable() {
        let articles = vec![ArticleSummary {
            id: Uuid::new_v4(),
            title: "Weaving songket".into(),
            slug: "weaving-songket".into(),
            summary: None,
            cover_url: None,
            published: false,
            created_at: Utc::now(),
        }];
        let html = render_catalog_body(&[], &[], &articles);
        assert!(html.contains("<td>draft</td>"));
        assert!(html.contains("/dashboard/catalog/articles/delete"));
        assert!(html.contains("No culture entries yet."));
    }
}
