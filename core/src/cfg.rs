use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Identifier used to compute per-app configuration directories.
#[derive(Clone, Copy)]
pub struct AppId {
    /// Reverse-DNS style qualifier, e.g. `"com"`.
    pub qualifier: &'static str,
    /// Organization or vendor name, e.g. `"local"`.
    pub organization: &'static str,
    /// Application name, e.g. `"nhlstats"`.
    pub application: &'static str,
}

/// Application configuration persisted to `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tracing level to use if `RUST_LOG` is not set (e.g. `"info"`).
    pub log_level: String,
    /// Directory holding cached page bodies.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Base URL of the statistics API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Season as two concatenated YYYY values, e.g. `"20252026"`. Unset = current.
    #[serde(default)]
    pub season: Option<String>,
    /// One of `"preseason"`, `"regular"`, `"postseason"`.
    #[serde(default = "default_season_type")]
    pub season_type: String,
    /// Per-request HTTP timeout (seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_cache_dir() -> String { "cache".to_string() }
fn default_base_url() -> String { "https://statsapi.web.nhl.com/api/v1".to_string() }
fn default_season_type() -> String { "regular".to_string() }
fn default_request_timeout_secs() -> u64 { 30 }

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_dir: default_cache_dir(),
            base_url: default_base_url(),
            season: None,
            season_type: default_season_type(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Return the configuration directory for this app, creating it if needed.
pub fn config_dir(app: &AppId) -> Result<PathBuf> {
    let pd = ProjectDirs::from(app.qualifier, app.organization, app.application)
        .ok_or_else(|| anyhow::anyhow!("failed to resolve ProjectDirs"))?;
    let dir = pd.config_dir().to_path_buf();
    fs::create_dir_all(&dir).with_context(|| format!("create config dir {}", dir.display()))?;
    Ok(dir)
}

/// Load `config.toml` from the app config dir or create a default one.
pub fn load_or_init(app: &AppId) -> Result<Config> {
    let dir = config_dir(app)?;
    let path = dir.join("config.toml");
    if path.exists() {
        let txt = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&txt)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    } else {
        let cfg = Config::default();
        save_config(&path, &cfg)?;
        Ok(cfg)
    }
}

fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg)?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
