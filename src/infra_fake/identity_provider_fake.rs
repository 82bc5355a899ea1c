use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// In-memory identity provider with canned users. Backs the `fake` backend
/// and lets tests observe how often the provider is actually consulted.
pub struct FakeIdentityProvider {
    users: HashMap<String, String>,
    current: Mutex<Option<AuthSnapshot>>,
    events: broadcast::Sender<AuthEvent>,
    lookups: AtomicUsize,
    fail_next_lookup: AtomicBool,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            users: HashMap::new(),
            current: Mutex::new(None),
            events,
            lookups: AtomicUsize::new(0),
            fail_next_lookup: AtomicBool::new(false),
        }
    }

    pub fn with_user(mut self, email: &str, password: &str) -> Self {
        self.users.insert(email.to_owned(), password.to_owned());
        self
    }

    /// Number of `current_session` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail_next_lookup(&self) {
        self.fail_next_lookup.store(true, Ordering::SeqCst);
    }

    /// Broadcast an arbitrary event, as the real provider does on token refresh.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    fn set_current(&self, snapshot: Option<AuthSnapshot>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }
}

impl Default for FakeIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn current_session(&self) -> Result<Option<AuthSnapshot>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_lookup.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("simulated outage".to_string()));
        }
        Ok(self.current.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn sign_in(&self, input: SignInInput) -> Result<AuthSnapshot, ProviderError> {
        match self.users.get(&input.email) {
            Some(password) if *password == input.password => {}
            _ => return Err(ProviderError::InvalidCredentials),
        }

        let snapshot = fake_snapshot(&input.email);
        self.set_current(Some(snapshot.clone()));
        debug!(email = %input.email, "fake sign-in");
        self.emit(AuthEvent::SignedIn(snapshot.clone()));
        Ok(snapshot)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.set_current(None);
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

pub fn fake_user_id(email: &str) -> UserId {
    UserId(uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, email.as_bytes()))
}

pub fn fake_snapshot(email: &str) -> AuthSnapshot {
    AuthSnapshot {
        identity: UserIdentity {
            id: fake_user_id(email),
            email: Some(email.to_owned()),
        },
        session: ProviderSession {
            access_token: AccessToken(format!("fake-access-token:{}", email)),
            refresh_token: RefreshToken(format!("fake-refresh-token:{}", email)),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(email: &str, password: &str) -> SignInInput {
        SignInInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let provider = FakeIdentityProvider::new().with_user("bar@torneira.app", "chopp");

        let err = provider
            .sign_in(credentials("bar@torneira.app", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredentials));

        let err = provider
            .sign_in(credentials("nobody@torneira.app", "chopp"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredentials));

        let snapshot = provider
            .sign_in(credentials("bar@torneira.app", "chopp"))
            .await
            .unwrap();
        assert_eq!(snapshot.identity.id, fake_user_id("bar@torneira.app"));
        assert_eq!(snapshot.identity.email.as_deref(), Some("bar@torneira.app"));
    }

    #[tokio::test]
    async fn sign_in_and_out_are_announced() {
        let provider = FakeIdentityProvider::new().with_user("bar@torneira.app", "chopp");
        let mut events = provider.subscribe();

        provider
            .sign_in(credentials("bar@torneira.app", "chopp"))
            .await
            .unwrap();
        provider.sign_out().await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert!(provider.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn simulated_outage_affects_one_lookup() {
        let provider = FakeIdentityProvider::new();
        provider.fail_next_lookup();

        assert!(matches!(
            provider.current_session().await,
            Err(ProviderError::Unavailable(_))
        ));
        assert!(provider.current_session().await.unwrap().is_none());
        assert_eq!(provider.lookup_count(), 2);
    }

    #[test]
    fn ids_are_stable_per_email() {
        assert_eq!(fake_user_id("a@b.c"), fake_user_id("a@b.c"));
        assert_ne!(fake_user_id("a@b.c"), fake_user_id("d@e.f"));
    }
}
