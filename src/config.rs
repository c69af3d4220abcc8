// src/config.rs

//! Configuration loading utilities.
//!
//! Settings come from a TOML file. A few can be overridden from the
//! environment, which is how deployments inject the API key and endpoints.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Config;

pub const ENV_API_KEY: &str = "FEEDPIPE_API_KEY";
pub const ENV_API_BASE_URL: &str = "FEEDPIPE_API_BASE_URL";
pub const ENV_REDIS_URL: &str = "FEEDPIPE_REDIS_URL";
pub const ENV_STORE_DIR: &str = "FEEDPIPE_STORE_DIR";
pub const ENV_MAX_CONCURRENT: &str = "FEEDPIPE_MAX_CONCURRENT";

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file cannot be loaded.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    apply_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Load configuration and reject it unless it validates.
pub fn load_validated(path: &Path) -> Result<Config> {
    let config = load_config(path)?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration in {path:?}: {e}")))?;
    Ok(config)
}

/// Apply overrides from `lookup`, which maps variable names to values.
pub fn apply_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = get(ENV_API_KEY) {
        config.api.api_key = key;
    }
    if let Some(url) = get(ENV_API_BASE_URL) {
        config.api.base_url = url;
    }
    if let Some(url) = get(ENV_REDIS_URL) {
        config.queue.redis_url = url;
    }
    if let Some(dir) = get(ENV_STORE_DIR) {
        config.store.dir = PathBuf::from(dir);
    }
    if let Some(raw) = get(ENV_MAX_CONCURRENT) {
        config.fetch.max_concurrent = raw.trim().parse().map_err(|e| {
            AppError::config(format!("{ENV_MAX_CONCURRENT}={raw:?} is not a number: {e}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            env(&[
                (ENV_API_KEY, "secret"),
                (ENV_REDIS_URL, "redis://queue:6379"),
                (ENV_STORE_DIR, "/var/lib/feedpipe"),
                (ENV_MAX_CONCURRENT, "25"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api.api_key, "secret");
        assert_eq!(config.queue.redis_url, "redis://queue:6379");
        assert_eq!(config.store.dir, PathBuf::from("/var/lib/feedpipe"));
        assert_eq!(config.fetch.max_concurrent, 25);
        assert_eq!(config.api.base_url, Config::default().api.base_url);
    }

    #[test]
    fn test_blank_override_ignored() {
        let mut config = Config::default();
        config.api.api_key = "from-file".into();
        apply_overrides(&mut config, env(&[(ENV_API_KEY, "  ")])).unwrap();
        assert_eq!(config.api.api_key, "from-file");
    }

    #[test]
    fn test_bad_number_rejected() {
        let mut config = Config::default();
        let err = apply_overrides(&mut config, env(&[(ENV_MAX_CONCURRENT, "many")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("feedpipe.toml");
        std::fs::write(
            &path,
            "[api]\napi_key = \"file-key\"\n\n[fetch]\nbatch_size = 50\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.api_key, "file-key");
        assert_eq!(config.fetch.batch_size, 50);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_or_default(tmp.path().join("absent.toml"));
        assert_eq!(config.fetch.max_concurrent, 100);
    }
}
