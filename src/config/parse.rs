use super::types::*;
use crate::config::{expand_env_vars_with, expand_tilde, unexpanded_env_vars};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_SESSIONS_ROOT: &str = "LOGSHIP_SESSIONS_ROOT";
pub const ENV_CURSOR_FILE: &str = "LOGSHIP_CURSOR_FILE";
pub const ENV_POLL_INTERVAL: &str = "LOGSHIP_POLL_INTERVAL";
pub const ENV_ENDPOINT: &str = "LOGSHIP_ENDPOINT";
pub const ENV_AUTH_TOKEN: &str = "LOGSHIP_AUTH_TOKEN";
pub const ENV_TENANT_ID: &str = "LOGSHIP_TENANT_ID";
pub const ENV_TIMEOUT: &str = "LOGSHIP_TIMEOUT";

// Platform variables honoured only when nothing else set the value.
pub const ENV_LEGACY_AUTH_TOKEN: &str = "OPENCLAW_LOG_SECRET";
pub const ENV_APP_NAME: &str = "FLY_APP_NAME";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Load configuration from an optional YAML file, then the process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let yaml = std::fs::read_to_string(path).map_err(|e| {
                ConfigError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to read config file '{}': {}", path.display(), e),
                ))
            })?;
            parse_config_str_with_env(&yaml, &lookup)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, &lookup)?;
    expand_paths(&mut config);
    resolve_tenant_id(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Parse a YAML document after `$env{VAR}` expansion. Missing sections take
/// their defaults.
pub fn parse_config_str(yaml: &str) -> Result<Config, ConfigError> {
    parse_config_str_with_env(yaml, &|name: &str| std::env::var(name).ok())
}

/// Same as [`parse_config_str`], expanding `$env{VAR}` through `lookup`.
pub fn parse_config_str_with_env<F>(yaml: &str, lookup: &F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let yaml = expand_env_vars_with(yaml, lookup);
    check_unexpanded_vars(&yaml)?;
    Ok(serde_yaml::from_str(&yaml)?)
}

fn check_unexpanded_vars(yaml: &str) -> Result<(), ConfigError> {
    let names = unexpanded_env_vars(yaml);
    if names.is_empty() {
        return Ok(());
    }

    Err(ConfigError::Validation(format!(
        "environment variables referenced by the config file are not set: {}",
        names.join(", ")
    )))
}

fn apply_env_overrides<F>(config: &mut Config, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(root) = var(ENV_SESSIONS_ROOT) {
        config.watch.root = PathBuf::from(root);
    }
    if let Some(cursor) = var(ENV_CURSOR_FILE) {
        config.cursor.path = PathBuf::from(cursor);
    }
    if let Some(interval) = var(ENV_POLL_INTERVAL) {
        config.watch.poll_interval = parse_duration_var(ENV_POLL_INTERVAL, &interval)?;
    }
    if let Some(timeout) = var(ENV_TIMEOUT) {
        config.delivery.timeout = parse_duration_var(ENV_TIMEOUT, &timeout)?;
    }
    if let Some(endpoint) = var(ENV_ENDPOINT) {
        config.delivery.endpoint = endpoint;
    }

    if let Some(token) = var(ENV_AUTH_TOKEN) {
        config.delivery.auth_token = Some(token);
    } else if config.delivery.auth_token.is_none() {
        config.delivery.auth_token = var(ENV_LEGACY_AUTH_TOKEN);
    }

    if let Some(tenant) = var(ENV_TENANT_ID) {
        config.delivery.tenant_id = Some(tenant);
    } else if config.delivery.tenant_id.is_none() {
        config.delivery.tenant_id = var(ENV_APP_NAME);
    }

    Ok(())
}

fn parse_duration_var(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| ConfigError::Env {
        var,
        message: e.to_string(),
    })
}

/// Cursor keys are absolute paths, so a relative root is anchored at the
/// working directory.
fn expand_paths(config: &mut Config) {
    config.watch.root = expand_tilde(&config.watch.root);
    if config.watch.root.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            config.watch.root = cwd.join(&config.watch.root);
        }
    }
    config.cursor.path = expand_tilde(&config.cursor.path);
}

/// Falls back to the machine hostname, then to [`UNKNOWN_TENANT`].
fn resolve_tenant_id(config: &mut Config) {
    if config.delivery.tenant_id.is_some() {
        return;
    }

    let tenant = hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_TENANT.to_string());

    config.delivery.tenant_id = Some(tenant);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.watch.poll_interval.is_zero() {
        errors.push("watch.poll_interval must be greater than zero".to_string());
    }
    if config.watch.max_concurrent_reads == 0 {
        errors.push("watch.max_concurrent_reads must be at least 1".to_string());
    }
    if config.watch.sessions_dir.trim().is_empty() {
        errors.push("watch.sessions_dir cannot be empty".to_string());
    }
    if config.watch.extension.trim_start_matches('.').is_empty() {
        errors.push("watch.extension cannot be empty".to_string());
    }
    if config.cursor.path.as_os_str().is_empty() {
        errors.push("cursor.path cannot be empty".to_string());
    }
    if config.delivery.timeout.is_zero() {
        errors.push("delivery.timeout must be greater than zero".to_string());
    }

    let endpoint = config.delivery.endpoint.trim();
    if endpoint.is_empty() {
        errors.push(format!(
            "delivery.endpoint must be set (config file or {})",
            ENV_ENDPOINT
        ));
    } else {
        match reqwest::Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(format!(
                "delivery.endpoint must use http or https, got '{}'",
                url.scheme()
            )),
            Err(e) => errors.push(format!("delivery.endpoint '{}' is invalid: {}", endpoint, e)),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
