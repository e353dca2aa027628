//! Configuration management
//!
//! This module handles loading and parsing configuration for the forum.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Template override configuration
    #[serde(default)]
    pub theme: ThemeConfig,
    /// Picture upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Login session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Site identity shown in page headers
    #[serde(default)]
    pub site: SiteConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/forum.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Template configuration
///
/// Templates are compiled into the binary; any `.html` file found under
/// `path` replaces the embedded template with the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Directory searched for template overrides
    #[serde(default = "default_theme_path")]
    pub path: PathBuf,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            path: default_theme_path(),
        }
    }
}

fn default_theme_path() -> PathBuf {
    PathBuf::from("templates")
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Static root; pictures go to `profile_pics/` and `item_pics/` below it
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted picture extensions, lower-case
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Bounding box for profile pictures, in pixels
    #[serde(default = "default_profile_picture_size")]
    pub profile_picture_size: u32,
    /// Bounding box for sale item pictures, in pixels
    #[serde(default = "default_item_picture_size")]
    pub item_picture_size: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
            profile_picture_size: default_profile_picture_size(),
            item_picture_size: default_item_picture_size(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("static")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_profile_picture_size() -> u32 {
    125
}

fn default_item_picture_size() -> u32 {
    400
}

/// Lower-cased extension of a file name, if any
pub fn file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Login session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a normal login, in hours
    #[serde(default = "default_lifetime_hours")]
    pub lifetime_hours: i64,
    /// Lifetime of a "remember me" login, in days
    #[serde(default = "default_remember_days")]
    pub remember_days: i64,
    /// Add the `Secure` attribute to cookies (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookie: bool,
    /// Interval between expired session/token purges, in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_hours: default_lifetime_hours(),
            remember_days: default_remember_days(),
            secure_cookie: false,
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_lifetime_hours() -> i64 {
    24
}

fn default_remember_days() -> i64 {
    30
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

/// Site identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_name")]
    pub name: String,
    #[serde(default = "default_site_description")]
    pub description: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            description: default_site_description(),
        }
    }
}

fn default_site_name() -> String {
    "Board Game Forum".to_string()
}

fn default_site_description() -> String {
    "Talk about board games, and buy and sell them.".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Handle empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - BGF_SERVER_HOST
    /// - BGF_SERVER_PORT
    /// - BGF_DATABASE_DRIVER
    /// - BGF_DATABASE_URL
    /// - BGF_THEME_PATH
    /// - BGF_UPLOAD_PATH
    /// - BGF_SESSION_SECURE_COOKIE
    /// - BGF_SITE_NAME
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the server misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.profile_picture_size == 0 || self.upload.item_picture_size == 0 {
            return Err(ConfigError::ValidationError(
                "picture sizes must be greater than zero".to_string(),
            ));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.allowed_extensions must not be empty".to_string(),
            ));
        }
        if self.session.lifetime_hours <= 0 || self.session.remember_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BGF_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BGF_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("BGF_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("BGF_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(path) = std::env::var("BGF_THEME_PATH") {
            self.theme.path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("BGF_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Ok(secure) = std::env::var("BGF_SESSION_SECURE_COOKIE") {
            match secure.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.session.secure_cookie = true,
                "0" | "false" | "no" => self.session.secure_cookie = false,
                _ => {}
            }
        }

        if let Ok(name) = std::env::var("BGF_SITE_NAME") {
            self.site.name = name;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "BGF_SERVER_HOST",
    "BGF_SERVER_PORT",
    "BGF_DATABASE_DRIVER",
    "BGF_DATABASE_URL",
    "BGF_THEME_PATH",
    "BGF_UPLOAD_PATH",
    "BGF_SESSION_SECURE_COOKIE",
    "BGF_SITE_NAME",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}
