use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the clinical trials service.
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Identifier sent with chat turns.
    pub user_id: String,

    /// Seconds between background connectivity checks.
    pub health_poll_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is not set.
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 15,
            user_id: "anonymous".to_string(),
            health_poll_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, writing a default file on
    /// first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit path. Missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Directory holding config and credentials: `~/.trials-cli`.
    pub fn get_app_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(home.join(".trials-cli"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_app_dir()?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.service.base_url, "http://localhost:5000");
        assert_eq!(config.service.timeout_secs, 15);
        assert_eq!(config.service.user_id, "anonymous");
        assert_eq!(config.service.health_poll_secs, 300);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.service.base_url = "http://trials.example.org:8080".to_string();
        config.service.user_id = "clinician-7".to_string();
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.service.base_url, "http://trials.example.org:8080");
        assert_eq!(reloaded.service.user_id, "clinician-7");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[service]\nbase_url = \"http://10.0.0.2:5000\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.service.base_url, "http://10.0.0.2:5000");
        assert_eq!(config.service.timeout_secs, 15);
        assert_eq!(config.logging.level, "info");
    }
}
