//! # PMO Tracker Configuration Module
//!
//! This module provides configuration management for the track logger, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::Config;
//!
//! let config = Config::load_config("")?;
//!
//! let refresh_rate = config.get_refresh_rate()?;
//! let batch_size = config.get_max_batch_size()?;
//! println!("polling every {refresh_rate}s, flushing at {batch_size} songs");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Environment overrides
//!
//! Any variable named `PMOTRACKER_CONFIG__SECTION__KEY` overrides the value at
//! `section.key`. The variables `REFRESH_RATE` and `ROOT_PATH` are honoured too,
//! and map to `tracker.refresh_rate` and `tracker.root_path`.

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("tracker.yaml");

const ENV_CONFIG_DIR: &str = "PMOTRACKER_CONFIG";
const ENV_PREFIX: &str = "PMOTRACKER_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmotracker";

/// Legacy variables and the configuration path they override
const LEGACY_ENV_VARS: &[(&str, &[&str])] = &[
    ("REFRESH_RATE", &["tracker", "refresh_rate"]),
    ("ROOT_PATH", &["tracker", "root_path"]),
];

// Default values for configuration
pub const DEFAULT_REFRESH_RATE_SECS: u64 = 90;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_STATIONS_FILE: &str = "relevant_stations.txt";
pub const DEFAULT_OUTPUT_DIR: &str = "gathered_data";
pub const DEFAULT_SOURCE_URL: &str = "https://www.antenne.de/api/metadata/now";
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SOURCE_MAX_RETRIES: u32 = 3;
pub const DEFAULT_SOURCE_BACKOFF_MS: u64 = 500;
pub const DEFAULT_LOG_MIN_LEVEL: &str = "DEBUG";
pub const DEFAULT_LOG_FILE: &str = "app.log";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path)? {
                Value::Number(n) if n.is_u64() => Ok(n.as_u64().unwrap_or($default)),
                Value::String(s) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path)? {
                Value::Bool(b) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path)? {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: impl Into<String>) -> Result<()> {
            self.set_value($path, Value::String(value.into()))
        }
    };
}

/// Configuration manager for the track logger
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock_data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!(
                "Config path {} is not a directory",
                path.display()
            ));
        }

        fs::read_dir(path)?;
        Ok(())
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory (argument, `PMOTRACKER_CONFIG`,
    ///    `./.pmotracker`, `~/.pmotracker`)
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    ///
    /// When no config.yaml exists yet, the embedded defaults are written there
    /// as a starting template. Environment overrides are never persisted.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&config_dir))?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external_value = Self::parse_external(&String::from_utf8_lossy(&data))?;
                merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, writing embedded defaults");
                fs::write(&path, DEFAULT_CONFIG)?;
            }
        }

        Self::apply_env_overrides(&mut config_value, env::vars());

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        })
    }

    /// Builds a configuration from YAML text layered over the embedded defaults
    ///
    /// No file is read or written and the environment is ignored.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external_value = Self::parse_external(yaml)?;
        merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));

        Ok(Config {
            config_dir: String::new(),
            path: String::new(),
            data: Mutex::new(config_value),
        })
    }

    // An empty document means no overrides
    fn parse_external(yaml: &str) -> Result<Value> {
        if yaml.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The directory the configuration was loaded from
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(anyhow!("Configuration was not loaded from a directory"));
        }
        let yaml = serde_yaml::to_string(&*self.lock_data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path
    ///
    /// The change is kept in memory; call [`Config::save`] to persist it.
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["tracker", "refresh_rate"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.lock_data();
        Self::set_value_internal(&mut data, path, value)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock_data();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides<I>(config: &mut Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        for (name, path) in LEGACY_ENV_VARS {
            if let Some((_, value)) = vars.iter().find(|(key, _)| key == name) {
                let _ = Self::set_value_internal(config, path, Self::convert_env_value(value));
            }
        }

        for (key, value) in &vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let _ =
                    Self::set_value_internal(config, &key_path, Self::convert_env_value(value));
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    // ========================================================================
    // Tracker
    // ========================================================================

    impl_u64_config!(
        get_refresh_rate,
        set_refresh_rate,
        &["tracker", "refresh_rate"],
        DEFAULT_REFRESH_RATE_SECS
    );

    /// Number of buffered songs above which a flush is forced
    pub fn get_max_batch_size(&self) -> Result<usize> {
        match self.get_value(&["tracker", "max_batch_size"])? {
            Value::Number(n) => Ok(n
                .as_u64()
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(DEFAULT_MAX_BATCH_SIZE)),
            _ => Ok(DEFAULT_MAX_BATCH_SIZE),
        }
    }

    pub fn set_max_batch_size(&self, size: usize) -> Result<()> {
        self.set_value(
            &["tracker", "max_batch_size"],
            Value::Number(Number::from(size)),
        )
    }

    /// Root directory for the log file, the allow-list and gathered data
    ///
    /// An empty (or null) value resolves to the current directory.
    pub fn get_root_path(&self) -> Result<PathBuf> {
        match self.get_value(&["tracker", "root_path"])? {
            Value::String(s) if !s.trim().is_empty() => Ok(PathBuf::from(s.trim())),
            _ => Ok(PathBuf::from(".")),
        }
    }

    pub fn set_root_path(&self, root: impl Into<String>) -> Result<()> {
        self.set_value(&["tracker", "root_path"], Value::String(root.into()))
    }

    impl_string_config!(
        get_stations_file,
        set_stations_file,
        &["tracker", "stations_file"],
        DEFAULT_STATIONS_FILE
    );

    impl_string_config!(
        get_output_dir,
        set_output_dir,
        &["tracker", "output_dir"],
        DEFAULT_OUTPUT_DIR
    );

    // ========================================================================
    // Metadata source
    // ========================================================================

    impl_string_config!(
        get_source_url,
        set_source_url,
        &["source", "url"],
        DEFAULT_SOURCE_URL
    );

    impl_u64_config!(
        get_source_timeout_secs,
        set_source_timeout_secs,
        &["source", "timeout_secs"],
        DEFAULT_SOURCE_TIMEOUT_SECS
    );

    /// Connection-level retries after the first attempt
    pub fn get_source_max_retries(&self) -> Result<u32> {
        match self.get_value(&["source", "max_retries"])? {
            Value::Number(n) => Ok(n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(DEFAULT_SOURCE_MAX_RETRIES)),
            _ => Ok(DEFAULT_SOURCE_MAX_RETRIES),
        }
    }

    pub fn set_source_max_retries(&self, retries: u32) -> Result<()> {
        self.set_value(
            &["source", "max_retries"],
            Value::Number(Number::from(retries)),
        )
    }

    impl_u64_config!(
        get_source_backoff_ms,
        set_source_backoff_ms,
        &["source", "backoff_ms"],
        DEFAULT_SOURCE_BACKOFF_MS
    );

    // ========================================================================
    // Logger
    // ========================================================================

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_string_config!(
        get_log_file,
        set_log_file,
        &["logger", "file"],
        DEFAULT_LOG_FILE
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default values.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // a null document (empty config.yaml) keeps the defaults
        (_, Value::Null) => {}
        (d, e) => *d = e.clone(),
    }
}
