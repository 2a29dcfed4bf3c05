//! EqoStack backend - library for app logic and testing

pub mod carousel;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::Config;
use crate::db::models::{ContentKind, NewAdminUser};
use crate::state::AppState;
use crate::store::{ContentStore, MemoryStore, PgStore};

/// Request body cap for everything except image uploads.
const BODY_LIMIT: usize = 2 * 1024 * 1024;
/// Room for one 5 MB image plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = media::MAX_FILE_SIZE + 1024 * 1024;

/// Development-only admin password used when none is configured.
const FALLBACK_ADMIN_PASSWORD: &str = "admin123";

/// CORS for the configured frontend origins.
pub fn configure_cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .expose_headers([HeaderName::from_static(routes::carousel::VIEW_HEADER)])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config);
    tracing::info!("CORS configured");

    let admin = Router::new()
        .merge(routes::content::admin_routes(ContentKind::Blog))
        .merge(routes::content::admin_routes(ContentKind::Project))
        .route("/api/admin/contacts", get(routes::contacts::list_contacts))
        .route(
            "/api/admin/contacts/{id}",
            patch(routes::contacts::update_status),
        )
        .route("/api/admin/stats", get(routes::stats::dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::require_admin,
        ));

    let api = Router::new()
        .merge(routes::content::public_routes(ContentKind::Blog))
        .merge(routes::content::public_routes(ContentKind::Project))
        .route("/api/contact", post(routes::contacts::submit))
        .route("/api/carousel", get(routes::carousel::mount))
        .route(
            "/api/carousel/{view}",
            get(routes::carousel::current).delete(routes::carousel::unmount),
        )
        .route("/api/carousel/{view}/next", post(routes::carousel::next))
        .route(
            "/api/carousel/{view}/previous",
            post(routes::carousel::previous),
        )
        .route(
            "/api/carousel/{view}/goto/{index}",
            post(routes::carousel::go_to),
        )
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", post(routes::auth::verify_token))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/session", get(routes::auth::session_status))
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .merge(admin)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));

    // Uploads carry their own, larger cap.
    let uploads = Router::new()
        .route(
            "/api/admin/uploads/{bucket}",
            get(routes::upload::list_images).post(routes::upload::upload_image),
        )
        .route(
            "/api/admin/uploads/{bucket}/{filename}",
            delete(routes::upload::delete_image),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::require_admin,
        ));

    let upload_dir = state.images.root().to_path_buf();

    api.merge(uploads)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Postgres when `DATABASE_URL` is set and reachable, otherwise in-memory.
async fn connect_store(config: &Config) -> Arc<dyn ContentStore> {
    let Some(url) = &config.database_url else {
        tracing::info!("DATABASE_URL not set. Using in-memory content store.");
        return Arc::new(MemoryStore::new());
    };

    match db::init_pool(&db::DbConfig::from_env(url.clone())).await {
        Ok(pool) => {
            if let Err(e) = db::run_migrations(&pool).await {
                tracing::error!("Failed to run database migrations: {}", e);
            }
            Arc::new(PgStore::new(pool))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Falling back to in-memory store.",
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

/// Make sure the configured admin account exists.
async fn seed_admin(config: &Config, store: &dyn ContentStore) {
    if config.admin_email == config::DEFAULT_ADMIN_EMAIL {
        tracing::warn!(
            "SECURITY: ADMIN_EMAIL is using an insecure default. \
             Set ADMIN_EMAIL to a real address."
        );
    }

    let plain = match (&config.admin_password_hash, &config.admin_password) {
        (Some(_), _) => None,
        (None, Some(plain)) => Some(plain.clone()),
        (None, None) if config.is_production() => {
            tracing::warn!(
                "SECURITY: Neither ADMIN_HASH_PASSWORD nor ADMIN_PASSWORD is set. \
                 No admin account is seeded."
            );
            return;
        }
        (None, None) => {
            tracing::warn!(
                "SECURITY: Neither ADMIN_HASH_PASSWORD nor ADMIN_PASSWORD is set. \
                 Using the insecure development password '{}'.",
                FALLBACK_ADMIN_PASSWORD
            );
            Some(FALLBACK_ADMIN_PASSWORD.to_string())
        }
    };

    let password_hash = match (plain, &config.admin_password_hash) {
        (Some(plain), _) => match session::tokens::hash_password(plain).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!("Failed to hash admin password: {}", e);
                return;
            }
        },
        (None, Some(hash)) => hash.clone(),
        (None, None) => return,
    };

    let admin = NewAdminUser {
        email: config.admin_email.clone(),
        password_hash,
        full_name: None,
        role: "admin".to_string(),
    };
    match store.ensure_admin(&admin).await {
        Ok(admin) => tracing::info!(email = %admin.email, "admin account ready"),
        Err(e) => tracing::error!("Failed to seed admin account: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Held for the life of the process so buffered log lines are flushed.
    let _log_guards = logging::init(&logging::LogSettings::from_env());

    let config = Config::from_env();
    config.validate()?;

    let store = connect_store(&config).await;
    tracing::info!(backend = store.name(), "content store ready");
    seed_admin(&config, store.as_ref()).await;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = create_app(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting server on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_admin_routes_are_gated() {
        let state = testing::state().await;
        let token = testing::admin_token(&state).await;

        let (status, bytes) = testing::send(
            create_app(state.clone()),
            testing::empty_request("GET", "/api/admin/stats", None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["redirect"], "/admin/login");

        let (status, _) = testing::send(
            create_app(state.clone()),
            testing::empty_request("GET", "/api/admin/uploads/blog-images", None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = testing::send(
            create_app(state),
            testing::empty_request("GET", "/api/admin/stats", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_public_routes_are_open() {
        let state = testing::state().await;

        let (status, _) = testing::send(
            create_app(state.clone()),
            testing::empty_request("GET", "/api/blog", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = testing::send(
            create_app(state),
            testing::empty_request("GET", "/health", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_carousel_mounts_a_view_per_request() {
        let state = testing::state().await;
        let app = create_app(state.clone());

        let (status, _) = testing::send(
            app.clone(),
            testing::empty_request("GET", "/api/carousel", None),
        )
        .await;
        assert!(status == StatusCode::OK || status == StatusCode::NO_CONTENT);

        let (status, _) = testing::send(
            app,
            testing::empty_request("GET", "/api/carousel", None),
        )
        .await;
        assert!(status == StatusCode::OK || status == StatusCode::NO_CONTENT);
        assert_eq!(state.carousels.count().await, 2);
    }

    #[tokio::test]
    async fn test_seed_admin_uses_plain_password() {
        let store = MemoryStore::new();
        let config = Config {
            admin_email: "owner@eqostack.test".to_string(),
            admin_password: Some("s3cret-pass".to_string()),
            ..Config::default()
        };
        seed_admin(&config, &store).await;

        let admin = store
            .find_admin_by_email("owner@eqostack.test")
            .await
            .unwrap()
            .unwrap();
        assert!(bcrypt::verify("s3cret-pass", &admin.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_seed_admin_skipped_in_production_without_password() {
        let store = MemoryStore::new();
        let config = Config {
            environment: "production".to_string(),
            admin_email: "owner@eqostack.test".to_string(),
            ..Config::default()
        };
        seed_admin(&config, &store).await;

        assert!(store
            .find_admin_by_email("owner@eqostack.test")
            .await
            .unwrap()
            .is_none());
    }
}
