use std::fs;
use std::path::Path;
use std::path::PathBuf;

use miri_core::config::Config;
use miri_core::config::ConfigError;

pub const APP_DIR: &str = "miri";
pub const CONFIG_FILE: &str = "config.toml";
pub const LOG_FILE: &str = "miri.log";

/// `<config dir>/miri/config.toml`, when the platform has a config dir.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Defaults, then the config file, then `.env` and process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();
    let mut config = match config_path() {
        Some(path) if path.exists() => read_config_file(&path)?,
        _ => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|err| ConfigError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    toml::from_str(&text).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use miri_core::config::ResponseMode;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[api]\nbase_url = \"https://miri.example\"\nresponse_mode = \"buffered\"\n\n[ui]\ntheme = \"forest-zen\"\n",
        )
        .expect("write config");

        let config = read_config_file(&path).expect("parse");
        assert_eq!(config.api.base_url, "https://miri.example");
        assert_eq!(config.api.response_mode, ResponseMode::Buffered);
        assert_eq!(config.api.timeout_secs, Config::default().api.timeout_secs);
        assert_eq!(config.ui.theme.as_deref(), Some("forest-zen"));
        assert_eq!(config.export.output_dir, None);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[api\nbase_url = ").expect("write config");

        assert!(matches!(
            read_config_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            read_config_file(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
