//! Authenticated, self-healing session to the note-storage backend.
//!
//! Every write runs `sync (pre) -> create -> sync (post)` under one lock,
//! so concurrent captures queue instead of interleaving their syncs.
//!
//! ## Failure semantics
//! - Pre-sync failure: the session re-runs `login()` once. If that fails
//!   the write is abandoned with [`StoreError::SessionExpired`].
//! - Post-sync failure: [`StoreError::PersistFailed`]. The item exists
//!   locally and may or may not be visible remotely.

use tokio::sync::Mutex;

use super::traits::{BackendError, ItemRef, ListItem, NoteBackend};
use crate::config::Credentials;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Neither a session token nor a username/password pair is configured.
    #[error("no storage credentials configured (set NOTES_SESSION_TOKEN or NOTES_USER + NOTES_APP_PASSWORD)")]
    NoCredentials,
    #[error("storage login rejected: {0}")]
    Rejected(BackendError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The lazy first login failed; nothing was written.
    #[error("not logged in to storage: {0}")]
    NotAuthenticated(AuthError),
    /// Pre-sync failed and the one re-login attempt failed too.
    #[error("storage session expired and could not be re-established: {0}")]
    SessionExpired(BackendError),
    /// Created locally, but the final sync failed. Outcome unknown.
    #[error("created locally but the final sync failed ({source}); it may or may not have been saved")]
    PersistFailed { item: ItemRef, source: BackendError },
    #[error("storage backend error: {0}")]
    Backend(BackendError),
}

impl StoreError {
    /// Whether the item might still have reached the backend.
    pub fn is_uncertain(&self) -> bool {
        matches!(self, Self::PersistFailed { .. })
    }
}

struct SessionState {
    backend: Box<dyn NoteBackend>,
    authenticated: bool,
    minted_token: Option<String>,
}

/// Process-wide handle to the note store. Construct once, share via `Arc`.
pub struct StorageSession {
    credentials: Option<Credentials>,
    state: Mutex<SessionState>,
}

impl StorageSession {
    /// Create an unauthenticated session. Nothing touches the network
    /// until [`login`](Self::login) or the first write.
    pub fn new(backend: Box<dyn NoteBackend>, credentials: Option<Credentials>) -> Self {
        Self {
            credentials,
            state: Mutex::new(SessionState {
                backend,
                authenticated: false,
                minted_token: None,
            }),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.authenticated
    }

    /// Session token minted by the last password login, if any.
    pub async fn minted_token(&self) -> Option<String> {
        self.state.lock().await.minted_token.clone()
    }

    /// Establish (or re-establish) the session and run an initial sync.
    pub async fn login(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        self.login_locked(&mut state).await
    }

    pub async fn create_note(&self, title: &str, content: &str) -> Result<ItemRef, StoreError> {
        let mut state = self.state.lock().await;
        self.pre_sync(&mut state).await?;
        let item = state
            .backend
            .create_note(title, content)
            .await
            .map_err(StoreError::Backend)?;
        self.post_sync(&mut state, item).await
    }

    /// Create a checklist with every entry unchecked, in input order.
    pub async fn create_list(&self, title: &str, items: &[String]) -> Result<ItemRef, StoreError> {
        let entries: Vec<ListItem> = items.iter().map(ListItem::unchecked).collect();

        let mut state = self.state.lock().await;
        self.pre_sync(&mut state).await?;
        let item = state
            .backend
            .create_list(title, &entries)
            .await
            .map_err(StoreError::Backend)?;
        self.post_sync(&mut state, item).await
    }

    async fn login_locked(&self, state: &mut SessionState) -> Result<(), AuthError> {
        state.authenticated = false;
        tracing::info!(backend = state.backend.name(), "Storage: attempting login");

        let credentials = self.credentials.as_ref().ok_or(AuthError::NoCredentials)?;

        match credentials {
            Credentials::Token { token, fallback } => {
                if let Err(e) = state.backend.resume(token).await {
                    let Some((username, app_password)) = fallback else {
                        tracing::error!("Storage: session token rejected: {e}");
                        return Err(AuthError::Rejected(e));
                    };
                    tracing::warn!("Storage: session token rejected ({e}), falling back to password login");
                    Self::password_login(state, username, app_password).await?;
                }
            }
            Credentials::Password {
                username,
                app_password,
            } => Self::password_login(state, username, app_password).await?,
        }

        state.backend.sync().await.map_err(|e| {
            tracing::error!("Storage: initial sync after login failed: {e}");
            AuthError::Rejected(e)
        })?;

        state.authenticated = true;
        tracing::info!("Storage: login successful");
        Ok(())
    }

    async fn password_login(
        state: &mut SessionState,
        username: &str,
        app_password: &str,
    ) -> Result<(), AuthError> {
        let token = state
            .backend
            .authenticate(username, app_password)
            .await
            .map_err(|e| {
                tracing::error!("Storage: password login failed: {e}");
                AuthError::Rejected(e)
            })?;
        tracing::info!(
            session_token = %token,
            "Storage: minted a new session token; set NOTES_SESSION_TOKEN to reuse it"
        );
        state.minted_token = Some(token);
        Ok(())
    }

    async fn pre_sync(&self, state: &mut SessionState) -> Result<(), StoreError> {
        if !state.authenticated {
            // First write, or a previous failure dropped the session. Login
            // already ends with a sync.
            return self
                .login_locked(state)
                .await
                .map_err(StoreError::NotAuthenticated);
        }

        let Err(sync_err) = state.backend.sync().await else {
            return Ok(());
        };

        tracing::error!("Storage: sync error (pre): {sync_err}");
        state.authenticated = false;
        tracing::info!("Storage: retrying login");
        if let Err(login_err) = self.login_locked(state).await {
            tracing::error!("Storage: re-login failed: {login_err}");
            return Err(StoreError::SessionExpired(sync_err));
        }
        Ok(())
    }

    async fn post_sync(
        &self,
        state: &mut SessionState,
        item: ItemRef,
    ) -> Result<ItemRef, StoreError> {
        match state.backend.sync().await {
            Ok(()) => Ok(item),
            Err(e) => {
                tracing::error!(item_id = %item.id, "Storage: sync error (post): {e}");
                if e == BackendError::SessionExpired {
                    state.authenticated = false;
                }
                Err(StoreError::PersistFailed { item, source: e })
            }
        }
    }
}
