//! `vicagent config` — Configuration management commands.

use std::path::{Path, PathBuf};
use vicagent_config::AppConfig;

fn config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if write_default(&path)? {
        println!("Created {}", path.display());
    } else {
        println!("Config already exists: {}", path.display());
    }
    Ok(())
}

/// Write the default config to `path` unless a file is already there.
fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let has_key = config.api_key.take().is_some();
    let mut toml_str = toml::to_string_pretty(&config)?;
    if has_key {
        toml_str.push_str("\n# api_key is set (hidden)\n");
    }
    println!("{toml_str}");
    Ok(())
}

pub fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        assert!(config_path().ends_with(".vicagent/config.toml"));
    }

    #[test]
    fn init_writes_loadable_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path).unwrap());
        assert!(!write_default(&path).unwrap());

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.model, "Sonnet 3.7:1.0");
        assert_eq!(loaded.gateway.port, 8501);
    }
}
