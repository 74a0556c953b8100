//! CLI configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use gatehouse_http::HttpBoundaryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// How to reach the authentication service.
    pub boundary: HttpBoundaryConfig,

    /// Directory for the saved session and per-identity data.
    pub data_dir: PathBuf,

    /// Logging level used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".gatehouse"));

        Self {
            boundary: HttpBoundaryConfig::default(),
            data_dir,
            log_level: "warn".to_string(),
            config_path: PathBuf::new(),
        }
    }
}

impl CliConfig {
    /// File holding the saved session cookies.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    /// Root of the per-identity storage.
    pub fn identities_dir(&self) -> PathBuf {
        self.data_dir.join("identities")
    }
}

/// Default location of `gatehouse.toml`.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("gatehouse.toml"))
        .unwrap_or_else(|| PathBuf::from("gatehouse.toml"))
}

/// Load configuration from `path` (or the default location), falling back to
/// defaults when the file does not exist.
///
/// `base_url` overrides the configured service URL.
pub fn load_config(path: Option<&Path>, base_url: Option<&str>) -> Result<CliConfig> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else if path.is_some() {
        anyhow::bail!("Config file {:?} does not exist", config_path);
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;
    if let Some(base_url) = base_url {
        config.boundary.base_url = base_url.to_string();
    }

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;

    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "gatehouse")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("data");
        let path = temp.path().join("gatehouse.toml");
        std::fs::write(
            &path,
            format!(
                "data_dir = {:?}\nlog_level = \"debug\"\n\n[boundary]\nbase_url = \"https://bank.example.com\"\ntimeout_ms = 3000\n",
                data_dir
            ),
        )
        .unwrap();

        let config = load_config(Some(&path), None).unwrap();

        assert_eq!(config.boundary.base_url, "https://bank.example.com");
        assert_eq!(config.boundary.timeout_ms, 3000);
        assert_eq!(config.boundary.paths.login, "auth/token");
        assert_eq!(config.log_level, "debug");
        assert!(data_dir.is_dir());
        assert_eq!(config.session_path(), data_dir.join("session.json"));
    }

    #[test]
    fn test_base_url_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gatehouse.toml");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", temp.path().join("data")),
        )
        .unwrap();

        let config = load_config(Some(&path), Some("http://127.0.0.1:9000")).unwrap();

        assert_eq!(config.boundary.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = load_config(Some(&temp.path().join("absent.toml")), None);

        assert!(result.is_err());
    }
}
