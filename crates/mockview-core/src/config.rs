//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the credential storage backend and the
//! last used email address.
//!
//! Configuration is stored at `~/.config/mockview/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_URL;
use crate::auth::{CredentialStore, FileBackend, KeyringBackend, MemoryBackend};

/// Application name used for config/data directory paths and the keychain service
const APP_NAME: &str = "mockview";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session file name in the data directory (file backend only)
const SESSION_FILE: &str = "session.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "MOCKVIEW_API_URL";

/// Where session credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    /// Nothing survives the process
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API base URL: environment, then config file, then the local default.
    pub fn api_base_url(&self) -> String {
        self.resolve_api_url(std::env::var(API_URL_ENV).ok())
    }

    fn resolve_api_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Open the credential store selected by `storage`.
    pub fn open_store(&self) -> Result<CredentialStore> {
        Ok(match self.storage {
            StorageKind::File => {
                CredentialStore::new(FileBackend::new(self.data_dir()?.join(SESSION_FILE)))
            }
            StorageKind::Keyring => CredentialStore::new(KeyringBackend::new(APP_NAME)),
            StorageKind::Memory => CredentialStore::new(MemoryBackend::new()),
        })
    }
}
