//! Configuration management with file persistence
//!
//! The last-chosen backend deployment and HTTP settings persist as TOML
//! under the user config directory, so switching deployments survives
//! restarts.

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Labeled backend deployments the client ships with
pub const KNOWN_BACKENDS: &[(&str, &str)] = &[
    ("Apt", "https://api.atoms.trade"),
    ("SMC", "https://smc.api.atoms.trade"),
    ("Tradesmart", "https://tradesmart.api.atoms.trade"),
    ("Tradebulls", "https://tradebulls.api.atoms.trade"),
];

/// Default backend when no deployment was chosen yet
pub const DEFAULT_BASE_URL: &str = KNOWN_BACKENDS[0].1;

/// Opsdeck configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Last-chosen deployment base URL; survives restarts
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            http: HttpConfig { timeout_secs: 30 },
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("OPSDECK_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("opsdeck")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path of the persisted session subset ({user, access token})
    pub fn session_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("session.json"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating the file
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend.base_url.trim().is_empty() {
            bail!("backend.base_url must not be empty");
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "backend.base_url" => Ok(self.backend.base_url.clone()),
            "http.timeout_secs" => Ok(self.http.timeout_secs.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `opsdeck config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "backend.base_url" => {
                self.backend.base_url = value.trim_end_matches('/').to_string();
            }
            "http.timeout_secs" => {
                self.http.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout value: {value}"))?;
            }
            _ => bail!(
                "Unknown configuration key: {}. Use `opsdeck config list` to see available keys.",
                key
            ),
        }
        self.validate()
    }

    /// List all configuration values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("backend.base_url".to_string(), self.backend.base_url.clone()),
            ("http.timeout_secs".to_string(), self.http.timeout_secs.to_string()),
        ]
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        Config::default().save()
    }

    /// Label of a known deployment, if the URL is one of them
    pub fn backend_label(url: &str) -> Option<&'static str> {
        KNOWN_BACKENDS
            .iter()
            .find(|(_, known)| *known == url)
            .map(|(label, _)| *label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "https://api.atoms.trade");
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_known_backends_are_labeled() {
        assert_eq!(KNOWN_BACKENDS.len(), 4);
        assert_eq!(Config::backend_label("https://smc.api.atoms.trade"), Some("SMC"));
        assert_eq!(Config::backend_label("https://example.com"), None);
    }

    #[test]
    fn test_get_and_set_round_trip() {
        let mut config = Config::default();
        config.set("backend.base_url", "https://tradebulls.api.atoms.trade/").unwrap();
        // Trailing slash is normalized away
        assert_eq!(
            config.get("backend.base_url").unwrap(),
            "https://tradebulls.api.atoms.trade"
        );

        config.set("http.timeout_secs", "45").unwrap();
        assert_eq!(config.get("http.timeout_secs").unwrap(), "45");

        assert!(config.get("nope").is_err());
        assert!(config.set("nope", "x").is_err());
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("http.timeout_secs", "abc").is_err());
        assert!(config.set("http.timeout_secs", "0").is_err());
        assert!(config.set("backend.base_url", "  ").is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.set("backend.base_url", "https://smc.api.atoms.trade").unwrap();
        config.set("http.timeout_secs", "10").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.backend.base_url, "https://smc.api.atoms.trade");
        assert_eq!(loaded.http.timeout_secs, 10);
    }

    #[test]
    fn test_load_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_list_covers_every_key() {
        let config = Config::default();
        let listed = config.list();
        for (key, value) in listed {
            assert_eq!(config.get(&key).unwrap(), value);
        }
    }
}
