//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "ARDUINO_MCP";

/// Config file name
const CONFIG_FILE_NAME: &str = "arduino-mcp.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "ARDUINO_MCP_CONFIG";

/// Application name used for the platform config directory
const APP_NAME: &str = "arduino-serial-mcp";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `ARDUINO_MCP_CONFIG` environment variable (explicit path)
    /// 2. `./arduino-mcp.toml` (current directory)
    /// 3. the platform config directory (`~/.config/arduino-serial-mcp/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override any file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config, env_lookup)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    ///
    /// Unlike [`ConfigLoader::load`], a missing file is an error.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config, env_lookup)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file, no overrides).
    pub fn with_defaults() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_env<T: FromStr>(var: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}")))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `ARDUINO_MCP_<SECTION>_<KEY>`
/// and cover runtime settings only:
/// - `ARDUINO_MCP_SERIAL_READ_TIMEOUT_MS=50`
/// - `ARDUINO_MCP_LOGGING_LEVEL=debug`
/// - `ARDUINO_MCP_LOGGING_FORMAT=pretty`
fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| format!("{ENV_PREFIX}_{key}");

    let name = var("SERIAL_READ_TIMEOUT_MS");
    if let Some(val) = lookup(&name) {
        config.serial.read_timeout_ms = parse_env(&name, &val, "timeout")?;
    }

    if let Some(val) = lookup(&var("LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    let name = var("LOGGING_FORMAT");
    if let Some(val) = lookup(&name) {
        config.logging.format = val
            .parse()
            .map_err(|message: String| ConfigError::env_parse(&name, message))?;
    }

    Ok(())
}
