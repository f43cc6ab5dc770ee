//! API key storage and the key-selection boundary

use async_trait::async_trait;
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Shared, swappable API key read by the gateway on every call
#[derive(Clone, Default)]
pub struct ApiKey {
    inner: Arc<RwLock<String>>,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(key.into())),
        }
    }

    pub fn get(&self) -> String {
        self.inner
            .read()
            .map(|key| key.clone())
            .unwrap_or_default()
    }

    pub fn set(&self, key: impl Into<String>) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = key.into();
        }
    }

    pub fn is_configured(&self) -> bool {
        let key = self.get();
        let key = key.trim();
        !key.is_empty() && key != "your_gemini_api_key_here"
    }
}

/// Host capability for checking and choosing a usable credential
#[async_trait]
pub trait KeySelector: Send + Sync {
    async fn has_selected_key(&self) -> bool;

    /// Prompt for a key. Completion does not imply a key was chosen.
    async fn open_select_key(&self);
}

const KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Selects keys from `.env` in the working directory, then the process
/// environment. The file is re-read on every selection so a rotated key is
/// picked up without a restart.
pub struct EnvKeySelector {
    key: ApiKey,
    env_file: PathBuf,
}

impl EnvKeySelector {
    pub fn new(key: ApiKey) -> Self {
        Self {
            key,
            env_file: PathBuf::from(".env"),
        }
    }

    fn key_from_file(&self) -> Option<String> {
        let entries: Vec<(String, String)> = dotenv::from_path_iter(&self.env_file)
            .ok()?
            .filter_map(|entry| entry.ok())
            .collect();

        KEY_VARS.iter().find_map(|name| {
            entries
                .iter()
                .find(|(k, v)| k == name && !v.trim().is_empty())
                .map(|(_, v)| v.trim().to_string())
        })
    }

    fn key_from_process() -> Option<String> {
        KEY_VARS.iter().find_map(|name| {
            env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    }
}

#[async_trait]
impl KeySelector for EnvKeySelector {
    async fn has_selected_key(&self) -> bool {
        self.key.is_configured()
    }

    async fn open_select_key(&self) {
        match self.key_from_file().or_else(Self::key_from_process) {
            Some(value) => {
                info!("API key reloaded");
                self.key.set(value);
            }
            None => warn!("No GEMINI_API_KEY found while selecting a key"),
        }
    }
}
