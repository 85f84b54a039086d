//! Runtime configuration, deserialised from `vreg.toml` and `VREG_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vreg_store_sqlite::StoreConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store_path:       PathBuf,
  pub busy_timeout_ms:  u64,
  pub max_retries:      u32,
  pub retry_backoff_ms: u64,
  /// Recorded on every row this process writes, unless `--by` overrides it.
  pub modified_by:      String,
}

impl Default for Settings {
  fn default() -> Self {
    let store = StoreConfig::default();
    Self {
      store_path:       PathBuf::from("vreg.sqlite3"),
      busy_timeout_ms:  store.busy_timeout_ms,
      max_retries:      store.max_retries,
      retry_backoff_ms: store.retry_backoff_ms,
      modified_by:      "SYSTEM".to_owned(),
    }
  }
}

impl Settings {
  /// Layer the config file (optional) under `VREG_*` environment variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("VREG"))
      .build()?
      .try_deserialize()?;
    Ok(settings)
  }

  pub fn store_config(&self) -> StoreConfig {
    StoreConfig {
      busy_timeout_ms:  self.busy_timeout_ms,
      max_retries:      self.max_retries,
      retry_backoff_ms: self.retry_backoff_ms,
    }
  }

  /// `store_path` with a leading `~` expanded to the user's home directory.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
