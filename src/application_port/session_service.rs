use crate::domain_model::*;
use crate::domain_port::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredentials => SessionError::InvalidCredentials,
            ProviderError::SessionExpired => SessionError::NotAuthenticated,
            ProviderError::Unavailable(e) => SessionError::Provider(e),
            ProviderError::UnexpectedResponse(e) => SessionError::Provider(e),
            ProviderError::InternalError(e) => SessionError::InternalError(e),
        }
    }
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Startup lookup: served from the session cache when fresh, otherwise
    /// from the identity provider.
    async fn initialize(&self) -> Result<Option<AuthSnapshot>, SessionError>;
    /// Like `initialize`, but a missing session is an error. Guards operator-only flows.
    async fn require_session(&self) -> Result<AuthSnapshot, SessionError>;
    async fn sign_in(&self, input: SignInInput) -> Result<AuthSnapshot, SessionError>;
    async fn sign_out(&self) -> Result<(), SessionError>;
    /// Apply an auth-state-change event to the session cache.
    fn handle_event(&self, event: &AuthEvent);
    /// Cached snapshot only; never calls the provider.
    fn current(&self) -> Option<AuthSnapshot>;
}
