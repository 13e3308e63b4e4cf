use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_RETURN_URL: &str = "http://localhost:3000";
pub const DEFAULT_AD_SLOT: &str = "1234567890";
const APP_DIR: &str = "todo-tui";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// Where the billing provider sends the browser after checkout.
    pub return_url: String,
    pub ads: AdConfig,
    /// Keep the token in this file instead of the system keyring.
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdConfig {
    pub client: Option<String>,
    pub slot: String,
}

impl Default for AdConfig {
    fn default() -> Self {
        AdConfig {
            client: None,
            slot: DEFAULT_AD_SLOT.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            return_url: DEFAULT_RETURN_URL.to_string(),
            ads: AdConfig::default(),
            token_file: None,
        }
    }
}

// Shape of config.toml; every key is optional
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_url: Option<String>,
    return_url: Option<String>,
    token_file: Option<PathBuf>,
    #[serde(default)]
    ads: FileAds,
}

#[derive(Debug, Default, Deserialize)]
struct FileAds {
    client: Option<String>,
    slot: Option<String>,
}

impl Config {
    /// Defaults, then `config.toml`, then `.env` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = Config::default();
        let path = config_dir().join("config.toml");
        if path.exists() {
            config.apply_file(&path)?;
        }
        config.apply_env(|key| env::var(key).ok());
        config.api_url = normalize_base_url(&config.api_url);
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if let Some(url) = file.api_url {
            self.api_url = url;
        }
        if let Some(url) = file.return_url {
            self.return_url = url;
        }
        if let Some(token) = file.token_file {
            self.token_file = Some(token);
        }
        if file.ads.client.is_some() {
            self.ads.client = file.ads.client;
        }
        if let Some(slot) = file.ads.slot {
            self.ads.slot = slot;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("TODO_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = get("TODO_RETURN_URL") {
            self.return_url = url;
        }
        if let Some(path) = get("TODO_TOKEN_FILE") {
            self.token_file = Some(PathBuf::from(path));
        }
        if let Some(client) = get("TODO_AD_CLIENT") {
            self.ads.client = Some(client);
        }
        if let Some(slot) = get("TODO_AD_SLOT") {
            self.ads.slot = slot;
        }
    }

    /// Log file used with `--debug`.
    pub fn log_path(&self) -> PathBuf {
        data_dir().join("todo-tui.log")
    }
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.example.com/api/v1/"),
            "https://api.example.com/api/v1"
        );
        assert_eq!(normalize_base_url("http://localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("TODO_API_URL", "https://todo.example.com/api/v1/"),
            ("TODO_AD_CLIENT", "ca-pub-123"),
            ("TODO_AD_SLOT", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "https://todo.example.com/api/v1/");
        assert_eq!(config.ads.client.as_deref(), Some("ca-pub-123"));
        // blank values are ignored
        assert_eq!(config.ads.slot, DEFAULT_AD_SLOT);
    }

    #[test]
    fn test_missing_ad_client_stays_none() {
        let mut config = Config::default();
        config.apply_env(|_| None);
        assert_eq!(config.ads.client, None);
    }

    #[test]
    fn test_file_values_are_applied() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_url = "https://file.example.com/api/v1"
token_file = "/tmp/todo-token"

[ads]
client = "ca-pub-file"
"#
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_file(file.path()).unwrap();

        assert_eq!(config.api_url, "https://file.example.com/api/v1");
        assert_eq!(config.token_file, Some(PathBuf::from("/tmp/todo-token")));
        assert_eq!(config.ads.client.as_deref(), Some("ca-pub-file"));
        assert_eq!(config.return_url, DEFAULT_RETURN_URL);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_url = [").unwrap();

        let mut config = Config::default();
        let err = config.apply_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
