use super::parse::ConfigError;
use super::types::Config;

const HEADER: &str = "\
# logship configuration
#
# Values may reference environment variables with the $env{} syntax.
# LOGSHIP_* environment variables override anything set here. Supply the
# collector credential through LOGSHIP_AUTH_TOKEN, or set delivery.auth_token.
";

/// Render the default configuration as a commented YAML document.
pub fn default_config_yaml() -> Result<String, ConfigError> {
    let mut config = Config::default();
    config.delivery.endpoint = "https://collector.example.com/api/logs".to_string();

    let body = serde_yaml::to_string(&config)?;
    Ok(format!("{HEADER}\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::{
        load_config_with_env, parse_config_str_with_env, ENV_LEGACY_AUTH_TOKEN,
    };
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_yaml_mentions_every_section() {
        let yaml = default_config_yaml().unwrap();
        assert!(yaml.starts_with("# logship configuration"));
        assert!(yaml.contains("watch:"));
        assert!(yaml.contains("cursor:"));
        assert!(yaml.contains("delivery:"));
        assert!(yaml.contains("poll_interval: 3s"));
    }

    #[test]
    fn test_default_yaml_parses_back() {
        let yaml = default_config_yaml().unwrap();
        let config = parse_config_str_with_env(&yaml, &|_: &str| None::<String>).unwrap();

        assert_eq!(config.watch.poll_interval, Duration::from_secs(3));
        assert_eq!(config.delivery.timeout, Duration::from_secs(10));
        assert!(config.delivery.auth_token.is_none());
    }

    #[test]
    fn test_default_yaml_loads_without_credential() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(default_config_yaml().unwrap().as_bytes()).unwrap();

        let config = load_config_with_env(Some(file.path()), |_| None).unwrap();
        assert!(!config.has_auth_token());

        let config = load_config_with_env(Some(file.path()), |name| {
            (name == ENV_LEGACY_AUTH_TOKEN).then(|| "legacy".to_string())
        })
        .unwrap();
        assert_eq!(config.delivery.auth_token.as_deref(), Some("legacy"));
    }
}
