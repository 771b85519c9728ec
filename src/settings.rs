use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub location: LocationSettings,
    #[serde(default)]
    pub ui: UiSettings,
}

#[derive(Debug, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the vibe backend API.
    #[serde(default = "default_backend_url")]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationSettings {
    /// Disable to skip geolocation entirely (status becomes "unavailable").
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// IP-geolocation endpoint returning {latitude, longitude, accuracy?}.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UiSettings {
    /// Terminals narrower than this behave like the mobile layout
    /// (detail pages instead of popups, deeper centering offset).
    #[serde(default = "default_narrow_columns")]
    pub narrow_columns: u16,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:4943/api/v1".to_string()
}

fn default_provider_url() -> String {
    "https://ipapi.co/json/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_narrow_columns() -> u16 {
    100
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self { url: default_backend_url() }
    }
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_url: default_provider_url(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self { narrow_columns: default_narrow_columns() }
    }
}

impl Settings {
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vibemap")
            .join("config.toml")
    }
}
