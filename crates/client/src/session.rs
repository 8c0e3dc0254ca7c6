//! Session establishment and tracking with local persistence.

use std::sync::Arc;

use campusnet_shared::{ApiError, Session};
use tokio::sync::watch;

use crate::api_client::PlatformClient;
use crate::storage::{Storage, SESSION_KEY};

/// Establishes and tracks the platform session.
///
/// The current session is published through a watch channel: subscribers see
/// `Some(session)` after sign-in or a successful restore and `None` after
/// sign-out. The session itself is persisted to local storage so a restart
/// picks up where the last run left off.
#[derive(Clone)]
pub struct SessionManager {
    platform: PlatformClient,
    storage: Storage,
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionManager {
    pub fn new(platform: PlatformClient, storage: Storage) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            platform,
            storage,
            tx: Arc::new(tx),
        }
    }

    /// Observe session changes. The receiver yields the current value first.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    /// The current session, if any.
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// A platform client carrying the current session's bearer token.
    pub fn authed(&self) -> PlatformClient {
        self.platform
            .clone()
            .with_access_token(self.current().map(|s| s.access_token))
    }

    /// Restore the persisted session and revalidate it against the platform.
    ///
    /// A stale token clears the session; an unreachable platform keeps the
    /// persisted session as-is (local-first).
    pub async fn bootstrap(&self) -> Result<Option<Session>, ApiError> {
        let Some(mut session) = self.storage.load::<Session>(SESSION_KEY) else {
            self.publish(None);
            return Ok(None);
        };

        let client = self
            .platform
            .clone()
            .with_access_token(Some(session.access_token.clone()));
        match client.get_user().await {
            Ok(user) => {
                session.user = user;
                self.publish(Some(session.clone()));
                Ok(Some(session))
            }
            Err(e) if e.is_unavailable() => {
                tracing::warn!("platform unreachable during session check, keeping local session: {e}");
                self.publish(Some(session.clone()));
                Ok(Some(session))
            }
            Err(e) => {
                tracing::info!("persisted session rejected, signing out: {e}");
                self.publish(None);
                Err(e)
            }
        }
    }

    /// Exchange credentials for a session and publish it.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let session = self.platform.sign_in(email, password).await?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Revoke the session remotely (best-effort) and clear it locally.
    pub async fn sign_out(&self) {
        if self.current().is_some() {
            if let Err(e) = self.authed().sign_out().await {
                tracing::warn!("remote sign-out failed: {e}");
            }
        }
        self.publish(None);
    }

    fn publish(&self, session: Option<Session>) {
        match &session {
            Some(s) => {
                self.storage.save(SESSION_KEY, s);
            }
            None => self.storage.remove(SESSION_KEY),
        }
        let _ = self.tx.send(session);
    }
}
