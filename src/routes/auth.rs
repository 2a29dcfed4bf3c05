/**
 * Authentication Routes
 * JWT-based authentication with login, verify, refresh, logout and the
 * admin session gate status
 */
use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::IpAddr, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{sync::RwLock, time::Instant};

use crate::error::ApiError;
use crate::session::{
    bearer_token,
    gate::{GateRender, Phase, SessionGate},
    tokens::verify_password,
    Identity, SessionEvent,
};
use crate::state::AppState;

/// One login attempt per IP per window. A zero window disables the limit.
#[derive(Clone)]
pub struct LoginLimiter {
    window: Duration,
    last_attempt: Arc<RwLock<HashMap<IpAddr, Instant>>>,
}

impl LoginLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_attempt: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record an attempt from `ip`; `false` when it falls inside the window.
    pub async fn check(&self, ip: IpAddr) -> bool {
        if self.window.is_zero() {
            return true;
        }

        let now = Instant::now();
        let mut attempts = self.last_attempt.write().await;

        // Keep memory proportional to the number of active IPs
        attempts.retain(|_, last| now.duration_since(*last) < self.window);

        if attempts.contains_key(&ip) {
            return false;
        }
        attempts.insert(ip, now);
        true
    }
}

/// User info returned to frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserInfo,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Admin gate outcome for the caller's session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if !state.login_limiter.check(addr.ip()).await {
        return Err(ApiError::TooManyRequests);
    }

    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email format"));
    }

    let Some(admin) = state.store.find_admin_by_email(email).await? else {
        tracing::warn!(email = %email, "login attempt for unknown user");
        return Err(ApiError::InvalidCredentials("Invalid credentials".to_string()));
    };

    if !admin.is_active {
        return Err(ApiError::Forbidden);
    }

    if !verify_password(payload.password, admin.password_hash.clone()).await {
        tracing::warn!(email = %admin.email, "failed login attempt");
        return Err(ApiError::InvalidCredentials("Invalid credentials".to_string()));
    }

    let user_id = admin.id.to_string();
    let access_token = state
        .signer
        .issue(&user_id, &admin.email, &admin.role)
        .map_err(|e| ApiError::Internal(format!("failed to create access token: {}", e)))?;
    let refresh_token = state
        .refresh_tokens
        .issue(&user_id, &admin.email, &admin.role)
        .await;

    state.sessions.publish(SessionEvent::SignedIn(Identity {
        id: user_id.clone(),
        email: admin.email.clone(),
    }));
    tracing::info!(email = %admin.email, "successful login");

    Ok(Json(LoginResponse {
        success: true,
        user: UserInfo {
            user_id,
            email: admin.email,
            role: admin.role,
        },
        access_token,
        refresh_token,
    }))
}

/// POST /api/auth/verify
/// Always `200`; validity is reported in the body.
pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<VerifyResponse> {
    let Some(token) = bearer_token(&headers) else {
        return Json(VerifyResponse {
            success: false,
            is_valid: false,
            user: None,
            error: Some("No authorization token provided".to_string()),
        });
    };

    match state.signer.verify(&token) {
        Ok(claims) => Json(VerifyResponse {
            success: true,
            is_valid: true,
            user: Some(UserInfo {
                user_id: claims.sub,
                email: claims.email,
                role: claims.role,
            }),
            error: None,
        }),
        Err(e) => {
            tracing::debug!(error = %e, "token verification failed");
            Json(VerifyResponse {
                success: false,
                is_valid: false,
                user: None,
                error: Some("Invalid or expired token".to_string()),
            })
        }
    }
}

/// POST /api/auth/refresh
/// Exchanges a refresh token for a new access token and rotates it.
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    let Some((owner, refresh_token)) = state.refresh_tokens.rotate(&payload.refresh_token).await
    else {
        return Err(ApiError::InvalidCredentials(
            "Invalid or expired refresh token".to_string(),
        ));
    };

    let access_token = state
        .signer
        .issue(&owner.user_id, &owner.email, &owner.role)
        .map_err(|e| ApiError::Internal(format!("failed to create access token: {}", e)))?;

    Ok(Json(RefreshResponse {
        success: true,
        access_token,
        refresh_token,
    }))
}

/// POST /api/auth/logout
/// Idempotent. A valid access token revokes every refresh token of its
/// owner and signs them out of mounted gates.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LogoutRequest>,
) -> Json<LogoutResponse> {
    if let Some(refresh_token) = payload.refresh_token {
        state.refresh_tokens.revoke(&refresh_token).await;
    }

    if let Some(access_token) = payload.access_token.or_else(|| bearer_token(&headers)) {
        if let Ok(claims) = state.signer.verify(&access_token) {
            state.refresh_tokens.revoke_all(&claims.sub).await;
            state.sessions.publish(SessionEvent::SignedOut {
                principal_id: claims.sub,
            });
        }
    }

    Json(LogoutResponse { success: true })
}

/// GET /api/auth/session
/// Mounts a gate for the caller and reports where it settles.
pub async fn session_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<SessionStatus> {
    let gate = SessionGate::mount(
        Arc::new(state.session_for(&headers)),
        Arc::new(state.admin_directory()),
        state.config.backend_timeout,
    );
    let phase = gate.settled().await;
    gate.unmount();

    let redirect = match phase.render(|| ()) {
        GateRender::Redirect { to, .. } => Some(to),
        _ => None,
    };
    Json(SessionStatus { phase, redirect })
}
