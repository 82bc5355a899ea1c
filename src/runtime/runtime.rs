use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_fake::*;
use crate::infra_supabase::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::{Context, anyhow};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Runtime {
    pub session_service: Arc<dyn SessionService>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Runtime {
    pub fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let provider: Arc<dyn IdentityProvider> = match settings.identity.backend.as_str() {
            "fake" => Arc::new(
                settings
                    .identity
                    .fake_users
                    .iter()
                    .fold(FakeIdentityProvider::new(), |provider, user| {
                        provider.with_user(&user.email, &user.password)
                    }),
            ),
            "supabase" => {
                let url = settings
                    .identity
                    .url
                    .clone()
                    .context("identity.url is required for the supabase backend")?;
                let anon_key = settings
                    .identity
                    .anon_key
                    .clone()
                    .context("identity.anon_key is required for the supabase backend")?;
                let http_client = reqwest::Client::builder()
                    .build()
                    .context("failed to build reqwest client")?;
                Arc::new(SupabaseIdentityProvider::new(
                    http_client,
                    SupabaseConfig { url, anon_key },
                ))
            }
            other => return Err(anyhow!("Unknown identity backend: {}", other)),
        };

        let cache_config = settings.session.cache_config();
        let cache = Arc::new(AuthSessionCache::new(cache_config, Arc::new(SystemClock)));
        info!(validity_window = ?cache_config.validity_window, "session cache ready");

        let service = Arc::new(CachedSessionService::new(cache, provider.clone()));

        let cancel = CancellationToken::new();
        let events = provider.subscribe();
        let listener = service.clone();
        let listener_cancel = cancel.clone();
        let listener_handle = tokio::spawn(async move {
            listener.run_listener(events, listener_cancel).await;
        });

        info!(backend = %settings.identity.backend, "runtime started");

        Ok(Self {
            session_service: service,
            listener_handle: Mutex::new(Some(listener_handle)),
            cancel,
        })
    }

    pub async fn shutdown(&self) {
        info!("runtime shutting down...");

        self.cancel.cancel();

        let handle = match self.listener_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("listener handle dropped: {:?}", r);
        }
    }
}
