use crate::session_cache::SessionCacheConfig;
use anyhow::{Result, anyhow};
use config::{Config, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub identity: Identity,
    #[serde(default)]
    pub session: Session,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Identity {
    pub backend: String, // "fake" or "supabase"
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
    /// Accounts accepted by the "fake" backend.
    #[serde(default)]
    pub fake_users: Vec<FakeUser>,
}

#[derive(Debug, Deserialize)]
pub struct FakeUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    #[serde(default = "default_validity_window_ms")]
    pub validity_window_ms: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            validity_window_ms: default_validity_window_ms(),
        }
    }
}

impl Session {
    pub fn cache_config(&self) -> SessionCacheConfig {
        SessionCacheConfig::from_millis(self.validity_window_ms)
    }
}

fn default_validity_window_ms() -> u64 {
    SessionCacheConfig::default().validity_window.as_millis() as u64
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    let settings: Settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
