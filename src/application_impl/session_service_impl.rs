use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use crate::session_cache::SessionCache;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

pub type AuthSessionCache = SessionCache<UserIdentity, ProviderSession>;

pub struct CachedSessionService {
    cache: Arc<AuthSessionCache>,
    provider: Arc<dyn IdentityProvider>,
}

impl CachedSessionService {
    pub fn new(cache: Arc<AuthSessionCache>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { cache, provider }
    }

    fn remember(&self, snapshot: &AuthSnapshot) {
        self.cache
            .set(snapshot.identity.clone(), snapshot.session.clone());
    }

    /// Missed events may include a sign-out, so the cached pair can no longer be trusted.
    fn on_lagged(&self, missed: u64) {
        warn!(missed, "auth listener lagged, dropping cached session");
        self.cache.clear();
    }

    /// Keep the cache in step with the provider's auth-state-change stream
    /// until cancelled or the provider goes away.
    pub async fn run_listener(
        &self,
        mut events: broadcast::Receiver<AuthEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("auth listener shutting down...");
                    break;
                }
                received = events.recv() => {
                    match received {
                        Ok(event) => self.handle_event(&event),
                        Err(RecvError::Lagged(missed)) => self.on_lagged(missed),
                        Err(RecvError::Closed) => {
                            info!("auth event stream closed");
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionService for CachedSessionService {
    async fn initialize(&self) -> Result<Option<AuthSnapshot>, SessionError> {
        if let Some(entry) = self.cache.get() {
            debug!(user_id = %entry.identity.id, "session served from cache");
            return Ok(Some(AuthSnapshot {
                identity: entry.identity,
                session: entry.session,
            }));
        }

        match self.provider.current_session().await {
            Ok(Some(snapshot)) => {
                self.remember(&snapshot);
                Ok(Some(snapshot))
            }
            Ok(None) => {
                self.cache.clear();
                Ok(None)
            }
            Err(e) => {
                warn!("session lookup failed: {}", e);
                self.cache.clear();
                Err(e.into())
            }
        }
    }

    async fn require_session(&self) -> Result<AuthSnapshot, SessionError> {
        self.initialize().await?.ok_or(SessionError::NotAuthenticated)
    }

    async fn sign_in(&self, input: SignInInput) -> Result<AuthSnapshot, SessionError> {
        match self.provider.sign_in(input).await {
            Ok(snapshot) => {
                self.remember(&snapshot);
                Ok(snapshot)
            }
            Err(e) => {
                self.cache.clear();
                Err(e.into())
            }
        }
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        self.cache.clear();
        self.provider.sign_out().await?;
        Ok(())
    }

    fn handle_event(&self, event: &AuthEvent) {
        trace!(event = event.name(), "auth state changed");
        match event {
            AuthEvent::SignedIn(snapshot)
            | AuthEvent::TokenRefreshed(snapshot)
            | AuthEvent::UserUpdated(snapshot) => self.remember(snapshot),
            AuthEvent::SignedOut => self.cache.clear(),
        }
    }

    fn current(&self) -> Option<AuthSnapshot> {
        self.cache.get().map(|entry| AuthSnapshot {
            identity: entry.identity,
            session: entry.session,
        })
    }
}
