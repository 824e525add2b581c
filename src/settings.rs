use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LeaseDeskError, Result};
use crate::rpc::{HttpTransport, LeaseApi};

pub const ENV_RPC_URL: &str = "LEASEDESK_RPC_URL";
pub const ENV_API_KEY: &str = "LEASEDESK_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub manager_name: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            api_key: String::new(),
            manager_name: String::new(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Environment wins over the file for the endpoint and key.
    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_RPC_URL) {
            if !url.trim().is_empty() {
                self.rpc_url = url;
            }
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.trim().is_empty() {
                self.api_key = key;
            }
        }
        self
    }

    pub fn api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }

    /// Client for the configured endpoint. Fails with a setup hint when no
    /// endpoint has been configured yet.
    pub fn api(&self) -> Result<LeaseApi<HttpTransport>> {
        let transport = HttpTransport::new(&self.rpc_url, self.api_key(), self.request_timeout())?;
        Ok(LeaseApi::new(transport))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("leasedesk")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn parse_settings(content: &str) -> Settings {
    serde_json::from_str(content).unwrap_or_default()
}

/// Settings as stored on disk, without environment overrides.
pub fn load_file_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        parse_settings(&content)
    } else {
        Settings::default()
    }
}

pub fn load_settings() -> Settings {
    load_file_settings().apply_env()
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| LeaseDeskError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}
