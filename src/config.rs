use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the heroes server
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Connect and request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Database file (defaults to the per-user data directory)
  pub path: Option<PathBuf>,
  /// How long a cached list stays current before an initial load refetches it
  #[serde(default = "default_cache_timeout_minutes")]
  pub timeout_minutes: i64,
  /// Heroes read from the cache per page
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      path: None,
      timeout_minutes: default_cache_timeout_minutes(),
      page_size: default_page_size(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Filter used when RUST_LOG is unset
  #[serde(default = "default_log_filter")]
  pub filter: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
    }
  }
}

fn default_api_url() -> String {
  "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
  15
}

fn default_cache_timeout_minutes() -> i64 {
  24 * 60
}

fn default_page_size() -> usize {
  3
}

fn default_log_filter() -> String {
  "heroes=info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./heroes.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/heroes/config.yaml
  ///
  /// Falls back to defaults when no file is found. `HEROES_API_URL`
  /// overrides the API url either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var("HEROES_API_URL") {
      config.api.url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("heroes.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("heroes").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.page_size == 0 {
      return Err(eyre!("cache.page_size must be at least 1"));
    }
    if self.cache.timeout_minutes < 0 {
      return Err(eyre!("cache.timeout_minutes must not be negative"));
    }
    Ok(())
  }

  pub fn cache_timeout(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.cache.timeout_minutes)
  }
}
