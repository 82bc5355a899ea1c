use crate::domain_model::*;
use tokio::sync::broadcast;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session expired")]
    SessionExpired,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// External identity provider the session cache sits in front of.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the signed-in user, if any. This is the round-trip the cache avoids.
    async fn current_session(&self) -> Result<Option<AuthSnapshot>, ProviderError>;
    async fn sign_in(&self, input: SignInInput) -> Result<AuthSnapshot, ProviderError>;
    async fn sign_out(&self) -> Result<(), ProviderError>;
    /// Auth-state-change events. Every successful sign-in and sign-out is announced here.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
