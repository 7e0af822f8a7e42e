//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CIP_ROOT";

/// Name of the settings file inside the root folder
pub const SETTINGS_FILE_NAME: &str = "config.toml";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        debug!(source = "cli", path, "Resolved root folder");
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            debug!(source = "env", path = %path, "Resolved root folder");
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    debug!(source = "toml", path = root_folder, "Resolved root folder");
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the user or system configuration file for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("cip").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/cip/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cip"))
        .unwrap_or_else(|| PathBuf::from("./cip_data"))
}

/// Prepares the on-disk layout under a resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!(path = %self.root.display(), "Created root folder");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.root.join("pipeline.db")
    }

    /// Directory holding per-pipeline artifact files
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Settings file path
    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }
}

/// Load a TOML settings file, falling back to `T::default()` when the file is absent.
///
/// A file that exists but fails to parse is a configuration error rather than a
/// silent fallback.
pub fn load_toml_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        debug!(path = %path.display(), "Settings file absent, using defaults");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str::<T>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}
