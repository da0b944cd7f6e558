use crate::config::generate::default_config_yaml;
use crate::config::{load_config, user_config_path, SYSTEM_CONFIG_PATH};
use std::fs;
use std::path::{Path, PathBuf};

/// Print the default config, or write it to the user config location
/// (falling back to `/etc/logship/config.yml`). Never overwrites a file.
pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = default_config_yaml()?;

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = user_config_path()
        .filter(|path| {
            path.parent()
                .map(|parent| fs::create_dir_all(parent).is_ok())
                .unwrap_or(false)
        })
        .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_PATH));

    write_new_file(&config_path, &config_content)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

fn write_new_file(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Load the effective configuration (file plus environment) and print it.
pub fn check(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: none (defaults and environment only)"),
    }

    let mut config = load_config(config_path)?;
    if config.delivery.auth_token.is_some() {
        config.delivery.auth_token = Some("<redacted>".to_string());
    }

    println!("Config is valid:\n");
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_new_file_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        write_new_file(&path, "a: 1\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");

        assert!(write_new_file(&path, "a: 2\n").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");
    }
}
