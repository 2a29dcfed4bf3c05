/**
 * Content Routes
 * Public listing/detail and admin CRUD for blog posts and projects.
 * The content kind is bound per router through an `Extension`.
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::prepare_item;
use crate::db::models::{ContentItem, ContentKind, ItemInput};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::ItemQuery;

/// Query parameters for list endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

impl ListQuery {
    fn apply(self, query: ItemQuery) -> ItemQuery {
        let query = query.search(self.search).category(self.category);
        match self.limit {
            Some(limit) => query.limit(limit),
            None => query,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PublishRequest {
    pub published: bool,
}

fn segment(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Blog => "blog",
        ContentKind::Project => "projects",
    }
}

/// `GET /api/{blog|projects}` and `GET /api/{blog|projects}/{slug}`
pub fn public_routes(kind: ContentKind) -> Router<AppState> {
    let base = format!("/api/{}", segment(kind));
    Router::new()
        .route(&base, get(list_public))
        .route(&format!("{}/{{slug}}", base), get(get_public))
        .layer(Extension(kind))
}

/// CRUD under `/api/admin/{blog|projects}`. Callers add the admin gate.
pub fn admin_routes(kind: ContentKind) -> Router<AppState> {
    let base = format!("/api/admin/{}", segment(kind));
    Router::new()
        .route(&base, get(list_admin).post(create_item))
        .route(
            &format!("{}/{{id}}", base),
            get(get_admin).put(update_item).delete(delete_item),
        )
        .route(&format!("{}/{{id}}/publish", base), post(set_published))
        .layer(Extension(kind))
}

/// Published items only. An empty listing is `200 []`.
pub async fn list_public(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let query = params.apply(ItemQuery::published(kind));
    let items = state.store.query_items(kind, &query).await?;
    Ok(Json(items))
}

/// Lookup by slug, or by id, among published items.
pub async fn get_public(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Path(slug): Path<String>,
) -> Result<Json<ContentItem>, ApiError> {
    if let Some(item) = state.store.find_published_by_slug(kind, &slug).await? {
        return Ok(Json(item));
    }

    let Ok(id) = Uuid::parse_str(&slug) else {
        return Err(ApiError::NotFound);
    };
    match state.store.find_item(kind, id).await? {
        Some(item) if item.published => Ok(Json(item)),
        _ => Err(ApiError::NotFound),
    }
}

pub async fn list_admin(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let query = params.apply(ItemQuery::all(kind));
    let items = state.store.query_items(kind, &query).await?;
    Ok(Json(items))
}

pub async fn get_admin(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, ApiError> {
    state
        .store
        .find_item(kind, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn create_item(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Json(input): Json<ItemInput>,
) -> Result<(StatusCode, Json<ContentItem>), ApiError> {
    let draft = prepare_item(kind, input)?;
    let item = state.store.insert_item(kind, &draft).await?;

    tracing::info!(kind = %kind, id = %item.id, slug = %item.slug, "item created");
    Ok((StatusCode::CREATED, Json(item)))
}

/// Full-field update
pub async fn update_item(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Path(id): Path<Uuid>,
    Json(input): Json<ItemInput>,
) -> Result<Json<ContentItem>, ApiError> {
    let draft = prepare_item(kind, input)?;
    let item = state.store.replace_item(kind, id, &draft).await?;

    tracing::info!(kind = %kind, id = %item.id, "item updated");
    Ok(Json(item))
}

pub async fn set_published(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<ContentItem>, ApiError> {
    let item = state
        .store
        .set_published(kind, id, request.published)
        .await?;

    tracing::info!(kind = %kind, id = %item.id, published = item.published, "publication changed");
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_item(kind, id).await?;

    tracing::info!(kind = %kind, id = %id, "item deleted");
    Ok(StatusCode::NO_CONTENT)
}
