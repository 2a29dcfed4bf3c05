/**
 * Routes Module
 * API route handlers and the admin gate middleware
 */
pub mod auth;
pub mod carousel;
pub mod contacts;
pub mod content;
pub mod health;
pub mod stats;
pub mod upload;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::session::gate::{self, GateRender};
use crate::state::AppState;

/// Runs the session gate for every admin request: a bearer identity that is
/// also an admin passes, anything else gets `401` with the login redirect.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = state.session_for(request.headers());
    let directory = state.admin_directory();
    let phase = gate::resolve(&session, &directory, state.config.backend_timeout).await;

    match phase.render(|| ()) {
        GateRender::Content(()) => Ok(next.run(request).await),
        GateRender::Redirect { to, .. } => Err(ApiError::Unauthorized { redirect: to }),
        GateRender::Loading => Err(ApiError::Unauthorized {
            redirect: gate::LOGIN_PATH,
        }),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::{
        body::{Body, Bytes},
        http::{Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::models::NewAdminUser;
    use crate::state::AppState;
    use crate::store::{ContentStore, MemoryStore};

    pub const ADMIN_EMAIL: &str = "admin@eqostack.test";
    pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

    /// State over an empty in-memory store with one admin and no login
    /// rate limit.
    pub async fn state() -> AppState {
        let store = Arc::new(MemoryStore::new());
        store
            .ensure_admin(&NewAdminUser {
                email: ADMIN_EMAIL.to_string(),
                password_hash: bcrypt::hash(ADMIN_PASSWORD, 4).unwrap(),
                full_name: Some("Test Admin".to_string()),
                role: "admin".to_string(),
            })
            .await
            .unwrap();

        let config = Config {
            jwt_secret: "router-test-secret".to_string(),
            upload_dir: std::env::temp_dir().join(format!("eqostack-{}", uuid::Uuid::new_v4())),
            login_rate_limit: Duration::ZERO,
            ..Config::default()
        };
        AppState::new(config, store)
    }

    /// A valid access token for the seeded admin.
    pub async fn admin_token(state: &AppState) -> String {
        let admin = state
            .store
            .find_admin_by_email(ADMIN_EMAIL)
            .await
            .unwrap()
            .unwrap();
        state
            .signer
            .issue(&admin.id.to_string(), &admin.email, &admin.role)
            .unwrap()
    }

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let res = app.oneshot(request).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }

    pub fn json_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        json: &impl serde::Serialize,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder
            .body(Body::from(serde_json::to_vec(json).unwrap()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }
}
