/**
 * Carousel Routes
 * The homepage carousel: one mounted carousel per client view, with its own
 * slide index and timer. The view id travels in the `x-carousel-view` header.
 */
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::carousel::{Carousel, CarouselRender};
use crate::error::ApiError;
use crate::state::AppState;

/// Response header naming the view a render belongs to.
pub const VIEW_HEADER: &str = "x-carousel-view";

/// Nothing to show is `204`; loading and slides are JSON.
fn respond(view: Uuid, render: CarouselRender) -> Response {
    let mut response = match render {
        CarouselRender::Empty => StatusCode::NO_CONTENT.into_response(),
        other => Json(other).into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(&view.to_string()) {
        response.headers_mut().insert(VIEW_HEADER, value);
    }
    response
}

async fn view(state: &AppState, id: Uuid) -> Result<Arc<Carousel>, ApiError> {
    state.carousels.get(id).await.ok_or(ApiError::NotFound)
}

/// GET /api/carousel
/// Mounts a new view over the currently published posts.
pub async fn mount(State(state): State<AppState>) -> Response {
    let (id, carousel) = state.carousels.mount().await;
    carousel.loaded().await;
    tracing::debug!(view = %id, "carousel view mounted");
    respond(id, carousel.render())
}

/// GET /api/carousel/{view}
pub async fn current(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let carousel = view(&state, id).await?;
    Ok(respond(id, carousel.render()))
}

/// POST /api/carousel/{view}/next
pub async fn next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let carousel = view(&state, id).await?;
    carousel.next().await?;
    Ok(respond(id, carousel.render()))
}

/// POST /api/carousel/{view}/previous
pub async fn previous(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let carousel = view(&state, id).await?;
    carousel.previous().await?;
    Ok(respond(id, carousel.render()))
}

/// POST /api/carousel/{view}/goto/{index}
pub async fn go_to(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, ApiError> {
    let carousel = view(&state, id).await?;
    carousel.go_to(index).await?;
    Ok(respond(id, carousel.render()))
}

/// DELETE /api/carousel/{view}
pub async fn unmount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.carousels.unmount(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ContentKind, ItemInput};
    use crate::routes::testing;
    use crate::store::{ContentStore, MemoryStore};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/api/carousel", get(mount))
            .route("/api/carousel/{view}", get(current).delete(unmount))
            .route("/api/carousel/{view}/next", post(next))
            .route("/api/carousel/{view}/previous", post(previous))
            .route("/api/carousel/{view}/goto/{index}", post(go_to))
            .with_state(state)
    }

    async fn publish(store: &dyn ContentStore, title: &str) {
        let draft = crate::content::prepare_item(
            ContentKind::Blog,
            ItemInput {
                title: title.to_string(),
                body: "body".to_string(),
                published: true,
                ..ItemInput::default()
            },
        )
        .unwrap();
        store.insert_item(ContentKind::Blog, &draft).await.unwrap();
    }

    async fn state_with_posts(titles: &[&str]) -> AppState {
        let store = Arc::new(MemoryStore::new());
        for title in titles {
            publish(store.as_ref(), title).await;
        }
        AppState::new(crate::config::Config::default(), store)
    }

    /// Status, view id header and JSON body (`Null` for an empty body).
    async fn call(
        state: &AppState,
        method: &str,
        uri: &str,
    ) -> (StatusCode, String, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let res = router(state.clone()).oneshot(request).await.unwrap();
        let status = res.status();
        let view = res
            .headers()
            .get(VIEW_HEADER)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, view, body)
    }

    #[tokio::test]
    async fn test_empty_carousel_is_no_content() {
        let state = state_with_posts(&[]).await;
        let (status, bytes) = testing::send(
            router(state),
            testing::empty_request("GET", "/api/carousel", None),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_post_published_after_startup_is_shown() {
        let state = state_with_posts(&[]).await;

        let (status, stale_view, _) = call(&state, "GET", "/api/carousel").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!stale_view.is_empty());

        publish(state.store.as_ref(), "Fresh post").await;

        let (status, view, body) = call(&state, "GET", "/api/carousel").await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(view, stale_view);
        assert_eq!(body["status"], "slide");
        assert_eq!(body["total"], 1);
        assert_eq!(body["slide"]["title"], "Fresh post");
    }

    #[tokio::test]
    async fn test_navigation_over_http() {
        let state = state_with_posts(&["First", "Second", "Third"]).await;

        let (status, view, body) = call(&state, "GET", "/api/carousel").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "slide");
        assert_eq!(body["total"], 3);
        assert_eq!(body["indicators"].as_array().unwrap().len(), 3);

        let (status, echoed, body) =
            call(&state, "POST", &format!("/api/carousel/{}/goto/2", view)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(echoed, view);
        assert_eq!(body["index"], 2);

        let (_, _, body) = call(&state, "POST", &format!("/api/carousel/{}/next", view)).await;
        assert_eq!(body["index"], 0);

        let (_, _, body) = call(&state, "POST", &format!("/api/carousel/{}/previous", view)).await;
        assert_eq!(body["index"], 2);

        let (_, _, body) = call(&state, "GET", &format!("/api/carousel/{}", view)).await;
        assert_eq!(body["index"], 2);

        let (status, _, _) = call(&state, "POST", &format!("/api/carousel/{}/goto/3", view)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_views_navigate_independently() {
        let state = state_with_posts(&["First", "Second", "Third"]).await;
        let (_, first, _) = call(&state, "GET", "/api/carousel").await;
        let (_, second, _) = call(&state, "GET", "/api/carousel").await;
        assert_ne!(first, second);

        let (_, _, body) = call(&state, "POST", &format!("/api/carousel/{}/next", first)).await;
        assert_eq!(body["index"], 1);

        let (_, _, body) = call(&state, "GET", &format!("/api/carousel/{}", second)).await;
        assert_eq!(body["index"], 0);
        assert_eq!(state.carousels.count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_and_unmounted_views_are_not_found() {
        let state = state_with_posts(&["First"]).await;

        let (status, _, _) =
            call(&state, "GET", &format!("/api/carousel/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, view, _) = call(&state, "GET", "/api/carousel").await;
        let (status, _, _) = call(&state, "DELETE", &format!("/api/carousel/{}", view)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _, _) = call(&state, "POST", &format!("/api/carousel/{}/next", view)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = call(&state, "DELETE", &format!("/api/carousel/{}", view)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
