//! Configuration loading and root folder resolution
//!
//! Two tiers:
//! 1. **TOML bootstrap**: listen address, root folder, token lifetimes,
//!    logging. Read once at startup.
//! 2. **Database runtime**: the `settings` table (see [`crate::db::settings`]).
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `STAGEHAND_ROOT_FOLDER`, then `STAGEHAND_ROOT` environment variables
//! 3. TOML `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "stagehand.db";

/// Attachment directory name inside the root folder
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Primary root folder environment variable
pub const ENV_ROOT_FOLDER: &str = "STAGEHAND_ROOT_FOLDER";

/// Alternative root folder environment variable
pub const ENV_ROOT: &str = "STAGEHAND_ROOT";

/// Config file path environment variable
pub const ENV_CONFIG: &str = "STAGEHAND_CONFIG";

/// JWT secret override environment variable
pub const ENV_JWT_SECRET: &str = "STAGEHAND_JWT_SECRET";

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a default; an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database and attachments
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for request bodies (attachment uploads)
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Token issuing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. When absent the secret stored in the database
    /// `settings` table is used (generated on first start).
    pub jwt_secret: Option<String>,
    pub issuer: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: "stagehand".to_string(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 14,
        }
    }
}

/// Attachment storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `<root_folder>/attachments`
    pub attachments_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse TOML text
    pub fn parse(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Locate and load the config file; a missing file yields defaults
    ///
    /// A file that exists but cannot be parsed is an error.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        match locate_config_file(cli_path) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let mut config = Self::load(&path)?;
                config.apply_env_overrides();
                Ok(config)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    /// Environment overrides for values that should not live in files
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(ENV_JWT_SECRET) {
            if !secret.trim().is_empty() {
                self.auth.jwt_secret = Some(secret);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.auth.access_ttl_minutes <= 0 {
            return Err(Error::Config(
                "auth.access_ttl_minutes must be positive".to_string(),
            ));
        }
        if self.auth.refresh_ttl_days <= 0 {
            return Err(Error::Config(
                "auth.refresh_ttl_days must be positive".to_string(),
            ));
        }
        if let Some(secret) = &self.auth.jwt_secret {
            if secret.len() < 16 {
                return Err(Error::Config(
                    "auth.jwt_secret must be at least 16 characters".to_string(),
                ));
            }
        }
        if self.server.max_body_bytes == 0 {
            return Err(Error::Config(
                "server.max_body_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Find the configuration file to use, if any
///
/// Order: explicit path, `STAGEHAND_CONFIG`, user config dir, `/etc/stagehand`.
/// An explicit path is returned even when missing so the caller reports it.
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("stagehand").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/stagehand/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/stagehand (or /var/lib/stagehand for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("stagehand"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/stagehand"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("stagehand"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/stagehand"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("stagehand"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\stagehand"))
    } else {
        PathBuf::from("./stagehand_data")
    }
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        default_root_folder()
    }
}

/// Prepares the root folder layout
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Attachment directory, honoring the TOML override
    pub fn attachments_path(&self, storage: &StorageConfig) -> PathBuf {
        storage
            .attachments_dir
            .clone()
            .unwrap_or_else(|| self.root.join(ATTACHMENTS_DIR))
    }
}
