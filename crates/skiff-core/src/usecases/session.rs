//! Authentication session management
//!
//! Owns the authenticated client handle and the queue of callers waiting
//! for authentication to finish. A session moves through
//!
//! ```text
//! Unauthenticated -> Authorizing -> DirectoryBootstrapping -> SchemaNegotiating -> Ready
//! ```
//!
//! and falls back to `Unauthenticated` on any failure. The client handle is
//! only published once the working directory exists and the metadata schema
//! has been negotiated, so callers never observe a half-initialised session.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    config::RemoteConfig,
    domain::{
        translate::{process, translate},
        Account, MetadataKey, RouteReason, SyncError,
    },
    ports::{AccountStore, AuthorizationOutcome, Authorizer, RemoteStore},
    usecases::negotiate_schema::SchemaNegotiator,
};

/// Lifecycle state of a [`SessionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authorizing,
    DirectoryBootstrapping,
    SchemaNegotiating,
    Ready,
}

type AuthResult = Result<Account, SyncError>;

/// Resolves once the authentication attempt it joined has finished
#[derive(Debug)]
pub struct PendingAuthentication {
    receiver: oneshot::Receiver<AuthResult>,
}

impl PendingAuthentication {
    fn failed(error: SyncError) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(Err(error));
        Self { receiver }
    }
}

impl Future for PendingAuthentication {
    type Output = AuthResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The session was dropped before finishing
            Poll::Ready(Err(_)) => Poll::Ready(Err(SyncError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct SessionInner {
    state: SessionState,
    client: Option<Arc<dyn RemoteStore>>,
    pending: Vec<oneshot::Sender<AuthResult>>,
    /// Bumped by deauthentication; completions of older attempts are dropped
    generation: u64,
}

/// Owns the authenticated client and drives session bootstrap
pub struct SessionManager {
    authorizer: Arc<dyn Authorizer>,
    account_store: Arc<dyn AccountStore>,
    negotiator: Arc<SchemaNegotiator>,
    remote: RemoteConfig,
    inner: Mutex<SessionInner>,
}

impl SessionManager {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        account_store: Arc<dyn AccountStore>,
        negotiator: Arc<SchemaNegotiator>,
        remote: RemoteConfig,
    ) -> Self {
        Self {
            authorizer,
            account_store,
            negotiator,
            remote,
            inner: Mutex::new(SessionInner {
                state: SessionState::Unauthenticated,
                client: None,
                pending: Vec::new(),
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Returns the authenticated client
    ///
    /// # Errors
    /// [`SyncError::NotAuthenticated`] unless the session is ready.
    pub fn client(&self) -> Result<Arc<dyn RemoteStore>, SyncError> {
        let inner = self.lock();
        match (&inner.state, &inner.client) {
            (SessionState::Ready, Some(client)) => Ok(Arc::clone(client)),
            _ => Err(SyncError::NotAuthenticated),
        }
    }

    /// Identifier of the persisted account, if any
    pub fn persisted_account_id(&self) -> Option<String> {
        match self.account_store.load(&self.remote.account_key()) {
            Ok(account_id) => account_id,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted account id");
                None
            }
        }
    }

    /// Enqueues the caller and starts the interactive authorization flow
    ///
    /// If an attempt is already in flight the caller joins it instead of
    /// starting a second flow.
    pub fn begin_interactive_auth(self: &Arc<Self>) -> PendingAuthentication {
        let (pending, attempt) = self.enqueue();
        if let Some(attempt) = attempt {
            info!("Starting interactive authorization");
            let session = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = session.authorizer.authorize().await;
                session.complete_authorization(attempt, outcome).await;
            });
        } else {
            debug!("Joining authorization already in progress");
        }
        pending
    }

    /// Re-authorizes with the persisted account id without user interaction
    ///
    /// Fails immediately with [`SyncError::NoSavedCredentials`] when no
    /// account id has been persisted.
    pub fn resume_from_persisted_session(self: &Arc<Self>) -> PendingAuthentication {
        let Some(account_id) = self.persisted_account_id() else {
            debug!("No persisted account to resume");
            return PendingAuthentication::failed(SyncError::NoSavedCredentials);
        };

        let (pending, attempt) = self.enqueue();
        if let Some(attempt) = attempt {
            info!(%account_id, "Resuming persisted session");
            let session = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = session.authorizer.reauthorize(&account_id).await;
                session.complete_authorization(attempt, outcome).await;
            });
        }
        pending
    }

    /// Adds a waiter; returns the generation of the attempt the caller must
    /// start, or `None` when one is already in flight
    fn enqueue(&self) -> (PendingAuthentication, Option<u64>) {
        let (sender, receiver) = oneshot::channel();
        let mut inner = self.lock();
        inner.pending.push(sender);

        let start = matches!(
            inner.state,
            SessionState::Unauthenticated | SessionState::Ready
        );
        if start {
            inner.state = SessionState::Authorizing;
        }
        let attempt = start.then_some(inner.generation);
        (PendingAuthentication { receiver }, attempt)
    }

    /// Handles the provider's answer to an authorization request
    ///
    /// On success the session is bootstrapped; every waiter then receives
    /// the same outcome exactly once.
    async fn complete_authorization(&self, attempt: u64, outcome: AuthorizationOutcome) {
        let result = match outcome {
            AuthorizationOutcome::Authorized => match self.authorizer.authorized_client() {
                Some(client) => self.finish_authentication(attempt, client).await,
                None => Err(SyncError::NotAuthenticated),
            },
            AuthorizationOutcome::Cancelled => {
                info!("Authorization cancelled");
                Err(SyncError::Cancelled)
            }
            AuthorizationOutcome::Failed { error, description } => {
                warn!(%error, %description, "Authorization failed");
                Err(SyncError::Authorization(description))
            }
        };

        self.settle(attempt, result);
    }

    async fn finish_authentication(
        &self,
        attempt: u64,
        client: Arc<dyn RemoteStore>,
    ) -> Result<(Account, Arc<dyn RemoteStore>), SyncError> {
        let directory = self.remote.remote_path(None)?;

        self.transition(attempt, SessionState::DirectoryBootstrapping);
        let profile = process(client.current_account().await)?;
        ensure_directory(client.as_ref(), &directory).await?;

        self.transition(attempt, SessionState::SchemaNegotiating);
        self.negotiator.reset().await;
        self.negotiator
            .ensure_schema(client.as_ref(), &MetadataKey::all())
            .await?;

        if self.lock().generation != attempt {
            return Err(SyncError::Cancelled);
        }
        self.account_store
            .save(&self.remote.account_key(), Some(&profile.account_id))
            .map_err(|e| {
                warn!(error = %e, "Failed to persist account id");
                SyncError::Authorization(format!("failed to persist account id: {e}"))
            })?;

        info!(account_id = %profile.account_id, "Session ready");
        Ok((Account::new(profile.display_name, profile.email), client))
    }

    fn transition(&self, attempt: u64, state: SessionState) {
        let mut inner = self.lock();
        if inner.generation == attempt {
            debug!(?state, "Session state transition");
            inner.state = state;
        }
    }

    /// Publishes the final state and flushes every waiter
    ///
    /// The queue is emptied before any waiter is notified, so a waiter that
    /// immediately re-authenticates starts a fresh attempt. A completion for
    /// an attempt that was superseded by deauthentication is discarded.
    fn settle(&self, attempt: u64, result: Result<(Account, Arc<dyn RemoteStore>), SyncError>) {
        let (waiters, result) = {
            let mut inner = self.lock();
            if inner.generation != attempt {
                debug!(attempt, current = inner.generation, "Discarding stale authorization result");
                return;
            }
            let result = match result {
                Ok((account, client)) => {
                    inner.state = SessionState::Ready;
                    inner.client = Some(client);
                    Ok(account)
                }
                Err(error) => {
                    inner.state = SessionState::Unauthenticated;
                    inner.client = None;
                    Err(error)
                }
            };
            (std::mem::take(&mut inner.pending), result)
        };

        debug!(waiters = waiters.len(), ok = result.is_ok(), "Flushing authentication waiters");
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    /// Revokes the session and forgets the persisted account
    ///
    /// Always succeeds locally; revocation failures are only logged. An
    /// authorization still in flight is abandoned and its waiters receive
    /// [`SyncError::Cancelled`].
    pub async fn deauthenticate(&self) {
        let waiters = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.client = None;
            inner.state = SessionState::Unauthenticated;
            std::mem::take(&mut inner.pending)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(SyncError::Cancelled));
        }

        if let Err(e) = self.authorizer.revoke().await {
            warn!(error = %e, "Failed to revoke provider session");
        }
        if let Err(e) = self.account_store.save(&self.remote.account_key(), None) {
            warn!(error = %e, "Failed to clear persisted account id");
        }
        self.negotiator.reset().await;
        info!("Session deauthenticated");
    }
}

/// Creates the working directory unless it already exists
async fn ensure_directory(client: &dyn RemoteStore, path: &str) -> Result<(), SyncError> {
    match client.get_metadata(path).await {
        Ok(_) => {
            debug!(path, "Working directory exists");
            Ok(())
        }
        Err(error) if error.has_reason(&RouteReason::NotFound) => {
            info!(path, "Creating working directory");
            process(client.create_folder(path).await)
        }
        Err(error) => Err(translate(error)),
    }
}
