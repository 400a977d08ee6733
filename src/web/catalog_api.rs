use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    catalog::{
        self, Article, ArticleSummary, Culture, CultureFilter, GalleryItem, MusicTrack, Region,
        RegionFilter,
    },
    web::{
        AppState,
        responses::{ApiError, internal_error, json_error},
    },
};

pub async fn regions(State(state): State<AppState>) -> Result<Json<Vec<Region>>, ApiError> {
    catalog::list_regions(state.pool_ref())
        .await
        .map(Json)
        .map_err(internal_error)
}

pub async fn cultures(
    State(state): State<AppState>,
    Query(filter): Query<CultureFilter>,
) -> Result<Json<Vec<Culture>>, ApiError> {
    catalog::list_cultures(state.pool_ref(), &filter)
        .await
        .map(Json)
        .map_err(internal_error)
}

pub async fn culture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Culture>, ApiError> {
    catalog::fetch_culture(state.pool_ref(), id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Culture entry not found."))
}

pub async fn articles(State(state): State<AppState>) -> Result<Json<Vec<ArticleSummary>>, ApiError> {
    catalog::list_articles(state.pool_ref(), false)
        .await
        .map(Json)
        .map_err(internal_error)
}

pub async fn article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Article>, ApiError> {
    catalog::fetch_article(state.pool_ref(), &slug)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Article not found."))
}

pub async fn gallery(
    State(state): State<AppState>,
    Query(filter): Query<RegionFilter>,
) -> Result<Json<Vec<GalleryItem>>, ApiError> {
    catalog::list_gallery(state.pool_ref(), &filter)
        .await
        .map(Json)
        .map_err(internal_error)
}

pub async fn music(
    State(state): State<AppState>,
    Query(filter): Query<RegionFilter>,
) -> Result<Json<Vec<MusicTrack>>, ApiError> {
    catalog::list_music(state.pool_ref(), &filter)
        .await
        .map(Json)
        .map_err(internal_error)
}
