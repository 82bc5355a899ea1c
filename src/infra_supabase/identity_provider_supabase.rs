use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://<project>.supabase.co`.
    pub url: String,
    pub anon_key: String,
}

/// Identity provider backed by the Supabase Auth (GoTrue) REST API.
///
/// Tokens obtained by `sign_in` are held in memory; `current_session` turns
/// them back into a user record, refreshing the access token once it has
/// passed its provider-side expiry.
pub struct SupabaseIdentityProvider {
    http_client: reqwest::Client,
    config: SupabaseConfig,
    current: Mutex<Option<ProviderSession>>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    refresh_token: String,
    user: UserIdentity,
}

impl TokenResponse {
    fn into_snapshot(self, now: DateTime<Utc>) -> AuthSnapshot {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));
        AuthSnapshot {
            identity: self.user,
            session: ProviderSession {
                access_token: AccessToken(self.access_token),
                refresh_token: RefreshToken(self.refresh_token),
                token_type: self.token_type,
                expires_at,
            },
        }
    }
}

impl SupabaseIdentityProvider {
    pub fn new(http_client: reqwest::Client, config: SupabaseConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http_client,
            config,
            current: Mutex::new(None),
            events,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn held_session(&self) -> Option<ProviderSession> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn hold(&self, session: Option<ProviderSession>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = session;
    }

    fn drop_session(&self) {
        self.hold(None);
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    async fn request_token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthSnapshot, ProviderError> {
        let resp = self
            .http_client
            .post(self.endpoint("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            warn!(%status, grant_type, "identity provider rejected token request");
            return Err(match grant_type {
                "refresh_token" => ProviderError::SessionExpired,
                _ => ProviderError::InvalidCredentials,
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;
        Ok(token.into_snapshot(Utc::now()))
    }

    async fn refresh(&self, session: &ProviderSession) -> Result<AuthSnapshot, ProviderError> {
        let snapshot = self
            .request_token(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token.0 }),
            )
            .await?;
        self.hold(Some(snapshot.session.clone()));
        let _ = self.events.send(AuthEvent::TokenRefreshed(snapshot.clone()));
        Ok(snapshot)
    }

    async fn fetch_user(
        &self,
        session: &ProviderSession,
    ) -> Result<Option<UserIdentity>, ProviderError> {
        let resp = self
            .http_client
            .get(self.endpoint("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token.0)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "user endpoint returned {status}"
            )));
        }

        let user: UserIdentity = resp
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;
        Ok(Some(user))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn current_session(&self) -> Result<Option<AuthSnapshot>, ProviderError> {
        let Some(session) = self.held_session() else {
            return Ok(None);
        };

        if session.expires_at <= Utc::now() {
            debug!("access token past expiry, refreshing");
            return match self.refresh(&session).await {
                Ok(snapshot) => Ok(Some(snapshot)),
                Err(ProviderError::SessionExpired) => {
                    self.drop_session();
                    Ok(None)
                }
                Err(e) => Err(e),
            };
        }

        match self.fetch_user(&session).await? {
            Some(identity) => Ok(Some(AuthSnapshot { identity, session })),
            None => {
                warn!("identity provider no longer accepts the held session");
                self.drop_session();
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, input: SignInInput) -> Result<AuthSnapshot, ProviderError> {
        let snapshot = self
            .request_token(
                "password",
                json!({ "email": input.email, "password": input.password }),
            )
            .await?;
        self.hold(Some(snapshot.session.clone()));
        info!(user_id = %snapshot.identity.id, "signed in");
        let _ = self.events.send(AuthEvent::SignedIn(snapshot.clone()));
        Ok(snapshot)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let Some(session) = self.held_session() else {
            let _ = self.events.send(AuthEvent::SignedOut);
            return Ok(());
        };
        self.drop_session();

        let resp = self
            .http_client
            .post(self.endpoint("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token.0)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = resp.status();
        // 401 means the token was already revoked, which is what we wanted.
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Unavailable(format!(
                "logout endpoint returned {status}"
            )));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
