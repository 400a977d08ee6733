//! Published catalog: regions, cultural elements, articles and the media
//! tables fed by approved contributions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Region {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Culture {
    pub id: Uuid,
    pub region_id: Option<Uuid>,
    pub region_slug: Option<String>,
    pub region_name: Option<String>,
    pub name: String,
    pub category: String,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ArticleSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub body: String,
    pub cover_url: Option<String>,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GalleryItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub region_slug: Option<String>,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MusicTrack {
    pub id: Uuid,
    pub title: String,
    pub performer: String,
    pub region_slug: Option<String>,
    pub audio_url: String,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CultureFilter {
    pub region: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegionFilter {
    pub region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCulture {
    pub region_slug: Option<String>,
    pub name: String,
    pub category: String,
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub summary: Option<String>,
    pub body: String,
    pub cover_url: Option<String>,
    pub published: bool,
}

pub async fn list_regions(pool: &PgPool) -> Result<Vec<Region>> {
    sqlx::query_as::<_, Region>(
        "SELECT id, name, slug, description, image_url FROM regions ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .context("failed to list regions")
}

const CULTURE_SELECT: &str = "SELECT c.id, c.region_id, r.slug AS region_slug, r.name AS region_name, \
     c.name, c.category, c.description, c.image_url, c.created_at \
     FROM cultures c LEFT JOIN regions r ON r.id = c.region_id";

pub async fn list_cultures(pool: &PgPool, filter: &CultureFilter) -> Result<Vec<Culture>> {
    let region = non_blank(filter.region.as_deref()).map(str::to_ascii_lowercase);
    let category = non_blank(filter.category.as_deref()).map(str::to_ascii_lowercase);
    let pattern = non_blank(filter.q.as_deref()).map(like_pattern);

    sqlx::query_as::<_, Culture>(&format!(
        "{CULTURE_SELECT}
         WHERE ($1::TEXT IS NULL OR r.slug = $1)
           AND ($2::TEXT IS NULL OR LOWER(c.category) = $2)
           AND ($3::TEXT IS NULL OR c.name ILIKE $3 ESCAPE '\\')
         ORDER BY c.name"
    ))
    .bind(region)
    .bind(category)
    .bind(pattern)
    .fetch_all(pool)
    .await
    .context("failed to list cultures")
}

pub async fn fetch_culture(pool: &PgPool, id: Uuid) -> Result<Option<Culture>> {
    sqlx::query_as::<_, Culture>(&format!("{CULTURE_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch culture")
}

pub async fn list_articles(pool: &PgPool, include_drafts: bool) -> Result<Vec<ArticleSummary>> {
    sqlx::query_as::<_, ArticleSummary>(
        "SELECT id, title, slug, summary, cover_url, published, created_at
         FROM articles WHERE published OR $1 ORDER BY created_at DESC",
    )
    .bind(include_drafts)
    .fetch_all(pool)
    .await
    .context("failed to list articles")
}

pub async fn fetch_article(pool: &PgPool, slug: &str) -> Result<Option<Article>> {
    sqlx::query_as::<_, Article>(
        "SELECT a.id, a.title, a.slug, a.summary, a.body, a.cover_url,
                COALESCE(u.display_name, u.username) AS author_name, a.created_at
         FROM articles a LEFT JOIN users u ON u.id = a.author_id
         WHERE a.slug = $1 AND a.published",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("failed to fetch article")
}

pub async fn list_gallery(pool: &PgPool, filter: &RegionFilter) -> Result<Vec<GalleryItem>> {
    let region = non_blank(filter.region.as_deref()).map(str::to_ascii_lowercase);
    sqlx::query_as::<_, GalleryItem>(
        "SELECT g.id, g.title, g.description, r.slug AS region_slug, g.image_url, g.created_at
         FROM galleries g LEFT JOIN regions r ON r.id = g.region_id
         WHERE ($1::TEXT IS NULL OR r.slug = $1)
         ORDER BY g.created_at DESC",
    )
    .bind(region)
    .fetch_all(pool)
    .await
    .context("failed to list gallery")
}

pub async fn list_music(pool: &PgPool, filter: &RegionFilter) -> Result<Vec<MusicTrack>> {
    let region = non_blank(filter.region.as_deref()).map(str::to_ascii_lowercase);
    sqlx::query_as::<_, MusicTrack>(
        "SELECT m.id, m.title, m.performer, r.slug AS region_slug, m.audio_url, m.cover_url, m.created_at
         FROM music m LEFT JOIN regions r ON r.id = m.region_id
         WHERE ($1::TEXT IS NULL OR r.slug = $1)
         ORDER BY m.created_at DESC",
    )
    .bind(region)
    .fetch_all(pool)
    .await
    .context("failed to list music")
}

/// Inserts a culture entry. An unknown region slug leaves the region unset.
pub async fn create_culture(pool: &PgPool, culture: &NewCulture) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO cultures (id, region_id, name, category, description, image_url)
         VALUES ($1, (SELECT id FROM regions WHERE slug = $2), $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(culture.region_slug.as_deref())
    .bind(&culture.name)
    .bind(culture.category.to_ascii_lowercase())
    .bind(&culture.description)
    .bind(culture.image_url.as_deref())
    .execute(pool)
    .await
    .context("failed to insert culture")?;
    Ok(id)
}

/// Deletes a culture entry, returning its image URL when a row was removed.
pub async fn delete_culture(pool: &PgPool, id: Uuid) -> Result<Option<Option<String>>> {
    sqlx::query_scalar::<_, Option<String>>("DELETE FROM cultures WHERE id = $1 RETURNING image_url")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to delete culture")
}

/// Inserts an article under a slug derived from its title. Duplicate slugs
/// surface as the database's unique violation.
pub async fn create_article(
    pool: &PgPool,
    article: &NewArticle,
    author_id: Uuid,
) -> sqlx::Result<(Uuid, String)> {
    let id = Uuid::new_v4();
    let slug = slugify(&article.title);
    sqlx::query(
        "INSERT INTO articles (id, title, slug, summary, body, cover_url, author_id, published)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(id)
    .bind(&article.title)
    .bind(&slug)
    .bind(article.summary.as_deref())
    .bind(&article.body)
    .bind(article.cover_url.as_deref())
    .bind(author_id)
    .bind(article.published)
    .execute(pool)
    .await?;
    Ok((id, slug))
}

pub async fn delete_article(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM articles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete article")?;
    Ok(result.rows_affected() > 0)
}

/// Lowercase ASCII slug with single dashes between words.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug = format!("article-{}", &Uuid::new_v4().simple().to_string()[..8]);
    }
    slug
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("Wayang Kulit: Shadows & Stories"), "wayang-kulit-shadows-stories");
        assert_eq!(slugify("  Batik -- 101  "), "batik-101");
        assert_eq!(slugify("Tari Pendet (Bali)"), "tari-pendet-bali");
    }

    #[test]
    fn slugify_drops_non_ascii_and_never_returns_empty() {
        assert_eq!(slugify("Rendang Minang 美食"), "rendang-minang");
        assert!(slugify("美食").starts_with("article-"));
    }

    #[test]
    fn search_patterns_escape_wildcards() {
        assert_eq!(like_pattern("gamelan"), "%gamelan%");
        assert_eq!(like_pattern("100%_pure"), "%100\\%\\_pure%");
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(Some(" bali ")), Some("bali"));
    }
}
