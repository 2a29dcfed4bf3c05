//! Shared application state, built once at startup and handed to every
//! handler through axum's `State` extractor.

use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::Instant;

use crate::carousel::CarouselViews;
use crate::config::Config;
use crate::media::ImageStore;
use crate::routes::auth::LoginLimiter;
use crate::session::{
    tokens::{RefreshTokens, TokenSigner},
    AdminDirectory, BearerSession, SessionHub,
};
use crate::store::ContentStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ContentStore>,
    pub images: ImageStore,
    pub signer: TokenSigner,
    pub sessions: SessionHub,
    pub refresh_tokens: RefreshTokens,
    pub login_limiter: LoginLimiter,
    /// Homepage carousels, one per client view.
    pub carousels: CarouselViews,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ContentStore>) -> Self {
        Self {
            images: ImageStore::new(config.upload_dir.clone()),
            signer: TokenSigner::new(&config.jwt_secret),
            sessions: SessionHub::default(),
            refresh_tokens: RefreshTokens::new(),
            login_limiter: LoginLimiter::new(config.login_rate_limit),
            carousels: CarouselViews::new(store.clone(), config.carousel(), config.carousel_idle),
            started_at: Instant::now(),
            config: Arc::new(config),
            store,
        }
    }

    /// Session source for the bearer token of a request.
    pub fn session_for(&self, headers: &HeaderMap) -> BearerSession {
        BearerSession::from_headers(headers, self.signer.clone(), self.sessions.clone())
    }

    pub fn admin_directory(&self) -> AdminDirectory {
        AdminDirectory::new(self.store.clone())
    }
}
