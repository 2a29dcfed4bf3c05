//! Sessions
//!
//! Who is signed in (`SessionSource`), whether they may use the admin area
//! (`Authorizer`), and the process-wide `SessionHub` that broadcasts
//! sign-in / sign-out notifications to every mounted gate.

pub mod gate;
pub mod tokens;

use async_trait::async_trait;
use axum::http::HeaderMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::AuthError;
use crate::store::ContentStore;
use tokens::TokenSigner;

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut { principal_id: String },
}

impl SessionEvent {
    fn principal_id(&self) -> &str {
        match self {
            Self::SignedIn(identity) => &identity.id,
            Self::SignedOut { principal_id } => principal_id,
        }
    }
}

/// Broadcasts session changes to subscribers.
#[derive(Debug, Clone)]
pub struct SessionHub {
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SessionHub {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn publish(&self, event: SessionEvent) {
        tracing::debug!(principal = %event.principal_id(), ?event, "session change");
        // No receivers simply means no gate is mounted
        let _ = self.events.send(event);
    }

    /// Subscribe to changes of one principal, or of every principal when
    /// `principal` is `None`.
    pub fn subscribe(&self, principal: Option<&str>) -> SessionSubscription {
        SessionSubscription {
            events: self.events.subscribe(),
            principal: principal.map(str::to_string),
        }
    }
}

/// Receiving half of a hub subscription. Dropping it releases the
/// subscription.
pub struct SessionSubscription {
    events: broadcast::Receiver<SessionEvent>,
    principal: Option<String>,
}

impl SessionSubscription {
    /// A subscription that never delivers anything.
    pub fn closed() -> Self {
        let (_, events) = broadcast::channel(1);
        Self {
            events,
            principal: None,
        }
    }

    /// Wait for the next relevant change: `Some(Some(identity))` for a
    /// sign-in, `Some(None)` for a sign-out, `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if let Some(principal) = &self.principal {
                        if event.principal_id() != principal {
                            continue;
                        }
                    }
                    return Some(match event {
                        SessionEvent::SignedIn(identity) => Some(identity),
                        SessionEvent::SignedOut { .. } => None,
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Current identity, `None` for an anonymous visitor.
    async fn get_session(&self) -> Result<Option<Identity>, AuthError>;

    fn on_session_change(&self) -> SessionSubscription;
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn check_authorization(&self, identity: &Identity) -> Result<bool, AuthError>;
}

/// Session carried by an `Authorization: Bearer` header.
pub struct BearerSession {
    token: Option<String>,
    signer: TokenSigner,
    hub: SessionHub,
}

impl BearerSession {
    pub fn new(token: Option<String>, signer: TokenSigner, hub: SessionHub) -> Self {
        Self { token, signer, hub }
    }

    pub fn from_headers(headers: &HeaderMap, signer: TokenSigner, hub: SessionHub) -> Self {
        Self::new(bearer_token(headers), signer, hub)
    }
}

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl SessionSource for BearerSession {
    async fn get_session(&self) -> Result<Option<Identity>, AuthError> {
        let Some(token) = &self.token else {
            return Ok(None);
        };
        let claims = self.signer.verify(token)?;
        Ok(Some(Identity {
            id: claims.sub,
            email: claims.email,
        }))
    }

    fn on_session_change(&self) -> SessionSubscription {
        match self.token.as_deref().map(|t| self.signer.verify(t)) {
            Some(Ok(claims)) => self.hub.subscribe(Some(&claims.sub)),
            // Anonymous gates never flip; the next request mounts a fresh gate.
            _ => SessionSubscription::closed(),
        }
    }
}

/// Admin membership backed by the content store.
pub struct AdminDirectory {
    store: Arc<dyn ContentStore>,
}

impl AdminDirectory {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authorizer for AdminDirectory {
    async fn check_authorization(&self, identity: &Identity) -> Result<bool, AuthError> {
        Ok(self.store.is_admin(&identity.id).await?)
    }
}
