use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;
use tracing::error;

use crate::{
    catalog::{self, ArticleSummary, Culture, CultureFilter, GalleryItem, MusicTrack, Region, RegionFilter},
    web::{
        AppState, CurrentUser, escape_html,
        flash::compose_flash_message,
        templates::{PageLayout, render_page},
    },
};

const HOME_LIMIT: usize = 6;

#[derive(Default, Deserialize)]
pub struct LandingQuery {
    pub status: Option<String>,
    pub error: Option<String>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

pub async fn landing_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<LandingQuery>,
) -> Html<String> {
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let pool = state.pool_ref();

    let filter = CultureFilter {
        region: params.region.clone(),
        category: params.category.clone(),
        q: params.q.clone(),
    };
    let region_filter = RegionFilter {
        region: params.region.clone(),
    };

    let regions = catalog::list_regions(pool).await.unwrap_or_else(|err| {
        error!(?err, "failed to load regions for landing page");
        Vec::new()
    });
    let cultures = catalog::list_cultures(pool, &filter).await.unwrap_or_else(|err| {
        error!(?err, "failed to load cultures for landing page");
        Vec::new()
    });
    let articles = catalog::list_articles(pool, false).await.unwrap_or_else(|err| {
        error!(?err, "failed to load articles for landing page");
        Vec::new()
    });
    let gallery = catalog::list_gallery(pool, &region_filter)
        .await
        .unwrap_or_else(|err| {
            error!(?err, "failed to load gallery for landing page");
            Vec::new()
        });
    let music = catalog::list_music(pool, &region_filter)
        .await
        .unwrap_or_else(|err| {
            error!(?err, "failed to load music for landing page");
            Vec::new()
        });

    let body = format!(
        "{search}{cultures}{articles}{gallery}{music}",
        search = render_search(&regions, &params),
        cultures = render_cultures(&cultures),
        articles = render_articles(&articles),
        gallery = render_gallery(&gallery),
        music = render_music(&music),
    );

    Html(render_page(
        PageLayout::new("Explore", user.as_ref(), body).with_flash(flash),
    ))
}

fn render_search(regions: &[Region], params: &LandingQuery) -> String {
    let selected = params.region.as_deref().unwrap_or_default();
    let options = regions
        .iter()
        .map(|region| {
            format!(
                r#"<option value="{slug}"{selected}>{name}</option>"#,
                slug = escape_html(&region.slug),
                name = escape_html(&region.name),
                selected = if region.slug == selected { " selected" } else { "" },
            )
        })
        .collect::<String>();

    format!(
        r#"<section class="panel">
    <h2>Explore Indonesian heritage</h2>
    <p class="note">Dances, music, crafts and traditions from across the archipelago, shared by the community and curated by our editors.</p>
    <form method="get" action="/">
        <label for="region">Region</label>
        <select id="region" name="region">
            <option value="">All regions</option>
            {options}
        </select>
        <label for="category">Category</label>
        <input id="category" name="category" value="{category}" placeholder="dance, music, craft…">
        <label for="q">Search</label>
        <input id="q" name="q" value="{q}">
        <p><button type="submit">Search</button></p>
    </form>
</section>"#,
        category = escape_html(params.category.as_deref().unwrap_or_default()),
        q = escape_html(params.q.as_deref().unwrap_or_default()),
    )
}

fn render_cultures(cultures: &[Culture]) -> String {
    if cultures.is_empty() {
        return r#"<section><h2>Cultural elements</h2><p class="note">Nothing matches this search yet.</p></section>"#.to_string();
    }

    let cards = cultures
        .iter()
        .map(|culture| {
            let image = culture
                .image_url
                .as_deref()
                .map(|url| format!(r#"<img src="{}" alt="">"#, escape_html(url)))
                .unwrap_or_default();
            format!(
                r#"<article class="card">{image}<h3>{name}</h3><p class="note">{category} · {region}</p><p>{description}</p></article>"#,
                name = escape_html(&culture.name),
                category = escape_html(&culture.category),
                region = escape_html(culture.region_name.as_deref().unwrap_or("Nationwide")),
                description = escape_html(&culture.description),
            )
        })
        .collect::<String>();

    format!(r#"<section><h2>Cultural elements</h2><div class="grid">{cards}</div></section>"#)
}

fn render_articles(articles: &[ArticleSummary]) -> String {
    if articles.is_empty() {
        return String::new();
    }

    let items = articles
        .iter()
        .take(HOME_LIMIT)
        .map(|article| {
            format!(
                r#"<article class="card"><h3>{title}</h3><p>{summary}</p><p class="note">{date}</p></article>"#,
                title = escape_html(&article.title),
                summary = escape_html(article.summary.as_deref().unwrap_or_default()),
                date = article.created_at.format("%Y-%m-%d"),
            )
        })
        .collect::<String>();

    format!(r#"<section><h2>Latest articles</h2><div class="grid">{items}</div></section>"#)
}

fn render_gallery(items: &[GalleryItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let cards = items
        .iter()
        .take(HOME_LIMIT)
        .map(|item| {
            format!(
                r#"<figure class="card"><img src="{url}" alt="{title}"><figcaption><strong>{title}</strong><br>{description}</figcaption></figure>"#,
                url = escape_html(&item.image_url),
                title = escape_html(&item.title),
                description = escape_html(&item.description),
            )
        })
        .collect::<String>();

    format!(r#"<section><h2>Gallery</h2><div class="grid">{cards}</div></section>"#)
}

fn render_music(tracks: &[MusicTrack]) -> String {
    if tracks.is_empty() {
        return String::new();
    }

    let rows = tracks
        .iter()
        .take(HOME_LIMIT)
        .map(|track| {
            format!(
                r#"<div class="card"><h3>{title}</h3><p class="note">{performer}</p><audio controls preload="none" src="{url}"></audio></div>"#,
                title = escape_html(&track.title),
                performer = escape_html(&track.performer),
                url = escape_html(&track.audio_url),
            )
        })
        .collect::<String>();

    format!(r#"<section><h2>Music</h2><div class="grid">{rows}</div></section>"#)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn search_form_keeps_the_selected_region() {
        let regions = vec![Region {
            id: Uuid::new_v4(),
            name: "Bali".into(),
            slug: "bali".into(),
            description: None,
            image_url: None,
        }];
        let params = LandingQuery {
            region: Some("bali".into()),
            q: Some("<kecak>".into()),
            ..Default::default()
        };
        let html = render_search(&regions, &params);
        assert!(html.contains(r#"<option value="bali" selected>Bali</option>"#));
        assert!(html.contains("&lt;kecak&gt;"));
    }

    #[test]
    fn empty_culture_list_shows_a_note() {
        assert!(render_cultures(&[]).contains("Nothing matches"));

        let culture = Culture {
            id: Uuid::new_v4(),
            region_id: None,
            region_slug: None,
            region_name: None,
            name: "Angklung".into(),
            category: "music".into(),
            description: "Bamboo rattles tuned in octaves.".into(),
            image_url: None,
            created_at: Utc::now(),
        };
        let html = render_cultures(&[culture]);
        assert!(html.contains("Angklung"));
        assert!(html.contains("Nationwide"));
    }
}
