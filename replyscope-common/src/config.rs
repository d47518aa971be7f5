//! Configuration loading and config file resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every field has a
//! built-in default, so a missing file (or a missing section) never prevents
//! startup. Command-line flags are applied on top by the binary.
//!
//! # Config file priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`REPLYSCOPE_CONFIG`)
//! 3. Per-user config directory (`~/.config/replyscope/replyscope.toml` on Linux)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REPLYSCOPE_CONFIG";

const CONFIG_DIR_NAME: &str = "replyscope";
const CONFIG_FILE_NAME: &str = "replyscope.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Remote reply endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Word cloud rendering settings
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Default destination directory for artifacts
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Paginated reply search endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Records requested per page (`ps` parameter)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Fixed pause between consecutive page requests
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Per-request timeout of the HTTP client
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// PNG encoder effort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    #[default]
    Default,
    Best,
}

/// Word cloud configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudConfig {
    /// Canvas width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Canvas height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Background colour as `#RRGGBB`
    #[serde(default = "default_background")]
    pub background: String,

    /// TTF/OTF/TTC font used for terms. Built-in bitmap glyphs when unset.
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// Number of top-ranked terms that receive a non-zero weight
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    #[serde(default = "default_min_font_size")]
    pub min_font_size: u32,

    /// Largest font size; 0 derives it from the canvas height
    #[serde(default)]
    pub max_font_size: u32,

    /// Share of the font size driven by term weight (0.0 - 1.0)
    #[serde(default = "default_relative_scaling")]
    pub relative_scaling: f32,

    #[serde(default)]
    pub compression: PngCompression,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            background: default_background(),
            font_path: None,
            max_words: default_max_words(),
            min_font_size: default_min_font_size(),
            max_font_size: 0,
            relative_scaling: default_relative_scaling(),
            compression: PngCompression::default(),
        }
    }
}

impl CloudConfig {
    /// Largest font size actually used for the top-ranked term
    pub fn effective_max_font_size(&self) -> u32 {
        let max = if self.max_font_size == 0 {
            // Leave room for a handful of lines of the biggest term
            self.height / 5
        } else {
            self.max_font_size
        };
        max.max(self.min_font_size)
    }

    /// Background colour as RGB components
    pub fn background_rgb(&self) -> Result<[u8; 3]> {
        parse_hex_color(&self.background)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.aicu.cc/api/v3/search/getreply".to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_page_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("replyscope/{}", env!("CARGO_PKG_VERSION"))
}

fn default_width() -> u32 {
    8000
}

fn default_height() -> u32 {
    4000
}

fn default_background() -> String {
    "#FFFFFF".to_string()
}

fn default_max_words() -> usize {
    200
}

fn default_min_font_size() -> u32 {
    16
}

fn default_relative_scaling() -> f32 {
    0.5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url must not be empty".to_string()));
        }
        if self.api.page_size == 0 {
            return Err(Error::Config("api.page_size must be positive".to_string()));
        }
        if self.cloud.width == 0 || self.cloud.height == 0 {
            return Err(Error::Config(format!(
                "cloud canvas must be non-empty, got {}x{}",
                self.cloud.width, self.cloud.height
            )));
        }
        if self.cloud.min_font_size == 0 {
            return Err(Error::Config("cloud.min_font_size must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.cloud.relative_scaling) {
            return Err(Error::Config(format!(
                "cloud.relative_scaling must be within 0.0..=1.0, got {}",
                self.cloud.relative_scaling
            )));
        }
        self.cloud.background_rgb()?;
        Ok(())
    }
}

/// Parse `#RRGGBB` (leading `#` optional)
pub fn parse_hex_color(value: &str) -> Result<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidInput(format!("not a #RRGGBB colour: {value}")));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|e| Error::InvalidInput(format!("bad colour channel in {value}: {e}")))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Locates the config file following the documented priority order
#[derive(Debug, Clone, Default)]
pub struct ConfigFileResolver {
    cli_arg: Option<PathBuf>,
}

impl ConfigFileResolver {
    pub fn new(cli_arg: Option<PathBuf>) -> Self {
        Self { cli_arg }
    }

    /// Resolve the config file path
    ///
    /// Returns `None` only when no explicit path was given and the platform
    /// has no per-user config directory.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_arg {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

/// Load configuration from a TOML file
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// cannot be read or parsed is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        warn!("Read {} failed: {}", path.display(), e);
        Error::Io(e)
    })?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve and load configuration without validating it
///
/// For callers that apply overrides first and validate the result.
pub fn read_config(cli_arg: Option<PathBuf>) -> Result<TomlConfig> {
    match ConfigFileResolver::new(cli_arg).resolve() {
        Some(path) => load_toml_config(&path),
        None => {
            warn!("No config directory available, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve, load and validate configuration in one step
pub fn load_config(cli_arg: Option<PathBuf>) -> Result<TomlConfig> {
    let config = read_config(cli_arg)?;
    config.validate()?;
    Ok(config)
}
