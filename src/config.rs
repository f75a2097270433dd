use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.nytimes.com/svc/topstories/v2/";

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
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Section to read instead of the home page (e.g. "world", "arts")
  pub section: Option<String>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      section: None,
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false, reads always go to the remote source
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database file (default: $XDG_DATA_HOME/newsfeed/news.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
  /// Filter directive used when RUST_LOG is not set (e.g. "debug")
  pub level: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./newsfeed.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/newsfeed/config.yaml
  ///
  /// Without any file the defaults are used.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("newsfeed.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("newsfeed").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-default configuration
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the API key from environment variables.
  ///
  /// Checks NEWSFEED_API_KEY first, then NYT_API_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("NEWSFEED_API_KEY")
      .or_else(|_| std::env::var("NYT_API_KEY"))
      .map_err(|_| {
        eyre!("API key not found. Set NEWSFEED_API_KEY or NYT_API_KEY environment variable.")
      })
  }
}
