//! Session gate: guards admin content behind identity + admin membership.
//!
//! A gate starts `Pending`, settles on `Authorized` or `Unauthorized` once the
//! first resolution completes, and then follows session-change notifications
//! until it is unmounted. Every failure resolves to `Unauthorized`.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};

use super::{Authorizer, SessionSource};
use crate::error::AuthError;

/// Where unauthorized visitors are sent.
pub const LOGIN_PATH: &str = "/admin/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Authorized,
    Unauthorized,
}

/// What a gate shows for its current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRender<T> {
    /// Neutral placeholder: neither content nor redirect.
    Loading,
    /// Navigate to `to`, replacing the current history entry when `replace`.
    Redirect { to: &'static str, replace: bool },
    Content(T),
}

impl Phase {
    /// `content` is only evaluated for an authorized phase.
    pub fn render<T>(self, content: impl FnOnce() -> T) -> GateRender<T> {
        match self {
            Self::Pending => GateRender::Loading,
            Self::Unauthorized => GateRender::Redirect {
                to: LOGIN_PATH,
                replace: true,
            },
            Self::Authorized => GateRender::Content(content()),
        }
    }
}

async fn resolve_once(
    source: &dyn SessionSource,
    authorizer: &dyn Authorizer,
) -> Result<Phase, AuthError> {
    let Some(identity) = source.get_session().await? else {
        return Ok(Phase::Unauthorized);
    };

    if authorizer.check_authorization(&identity).await? {
        Ok(Phase::Authorized)
    } else {
        Ok(Phase::Unauthorized)
    }
}

/// Resolve identity then admin membership. Never returns `Pending`.
pub async fn resolve(
    source: &dyn SessionSource,
    authorizer: &dyn Authorizer,
    limit: Option<Duration>,
) -> Phase {
    let outcome = match limit {
        Some(limit) => tokio::time::timeout(limit, resolve_once(source, authorizer))
            .await
            .unwrap_or(Err(AuthError::Timeout)),
        None => resolve_once(source, authorizer).await,
    };

    match outcome {
        Ok(phase) => phase,
        Err(e) => {
            tracing::warn!(error = %e, "session resolution failed, treating as unauthorized");
            Phase::Unauthorized
        }
    }
}

/// A mounted gate. Dropping it (or calling `unmount`) stops the resolution
/// task and releases its session subscription.
pub struct SessionGate {
    phase: watch::Receiver<Phase>,
    task: JoinHandle<()>,
}

impl SessionGate {
    pub fn mount(
        source: Arc<dyn SessionSource>,
        authorizer: Arc<dyn Authorizer>,
        limit: Option<Duration>,
    ) -> Self {
        let (phase_tx, phase) = watch::channel(Phase::Pending);

        let task = tokio::spawn(async move {
            // Subscribe before resolving so no change slips in between.
            let mut changes = source.on_session_change();

            let resolved = resolve(source.as_ref(), authorizer.as_ref(), limit).await;
            phase_tx.send_replace(resolved);

            while let Some(identity) = changes.next().await {
                // Only identity presence is re-derived here; admin membership
                // is checked once per mount.
                let next = match identity {
                    Some(_) => Phase::Authorized,
                    None => Phase::Unauthorized,
                };
                tracing::debug!(phase = ?next, "session gate updated");
                phase_tx.send_replace(next);
            }
        });

        Self { phase, task }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Wait for the first resolution to complete.
    pub async fn settled(&self) -> Phase {
        let mut phase = self.phase.clone();
        if let Ok(p) = phase.wait_for(|p| *p != Phase::Pending).await {
            return *p;
        }
        Phase::Unauthorized
    }

    /// Receiver that observes every phase change.
    pub fn watch(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    pub fn render<T>(&self, content: impl FnOnce() -> T) -> GateRender<T> {
        self.phase().render(content)
    }

    pub fn unmount(self) {}
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.task.abort();
    }
}
