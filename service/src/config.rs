//! Service wiring configuration (TOML).
//!
//! Looked up from `--config`, then `QUICKTYPE_CONFIG`, then
//! `<config_dir>/quicktype/service.toml`. A missing file means defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ipc::client::RetryPolicy;
use crate::ipc::transport::default_endpoint;

pub const CONFIG_ENV: &str = "QUICKTYPE_CONFIG";
const APP_DIR: &str = "quicktype";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl ServiceConfig {
    /// Load from `explicit` or the usual lookup chain.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => resolve_config_path(),
        };
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config file {}", config_path.display()))?;
            return Self::from_toml_str(&raw)
                .with_context(|| format!("failed to parse TOML from {}", config_path.display()));
        }
        if explicit.is_some() {
            anyhow::bail!("config file {} does not exist", config_path.display());
        }
        Ok(ServiceConfig::default())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

fn resolve_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Path::new(&path).to_path_buf();
    }

    if let Some(base) = dirs::config_dir() {
        return base.join(APP_DIR).join("service.toml");
    }

    env::temp_dir().join("quicktype-service.toml")
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpcConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Directory holding the per-language stores.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Location of the user settings document.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(env::temp_dir)
                .join(APP_DIR)
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_path.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(env::temp_dir)
                .join(APP_DIR)
                .join("settings.json")
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackendKind {
    /// The OS-level keyboard hook.
    Native,
    /// Lines read from standard input.
    Console,
}

fn default_backend() -> CaptureBackendKind {
    if cfg!(windows) {
        CaptureBackendKind::Native
    } else {
        CaptureBackendKind::Console
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_backend")]
    pub backend: CaptureBackendKind,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}
