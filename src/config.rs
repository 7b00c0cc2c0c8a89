use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::battery::PercentParser;
use crate::types::Rgba;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid color for '{field}': {value:?}")]
    InvalidColor { field: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u32,
    #[serde(default = "default_embed_timeout")]
    pub embed_timeout_secs: u64,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub icon: IconConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub colors: ColorConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CommandConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub percent_parser: PercentParser,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            timeout_secs: default_command_timeout(),
            percent_parser: PercentParser::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IconConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_border")]
    pub border: u32,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            border: default_border(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ThresholdConfig {
    #[serde(default = "default_low")]
    pub low: f64,
    #[serde(default = "default_critical")]
    pub critical: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low: default_low(),
            critical: default_critical(),
        }
    }
}

/// Hex colors, `#RRGGBBAA` or `#RRGGBB`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ColorConfig {
    #[serde(default = "default_border_color")]
    pub border: String,
    #[serde(default = "default_background_color")]
    pub background: String,
    #[serde(default = "default_normal_color")]
    pub normal: String,
    #[serde(default = "default_low_color")]
    pub low: String,
    #[serde(default = "default_critical_color")]
    pub critical: String,
    #[serde(default = "default_disabled_color")]
    pub disabled: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            border: default_border_color(),
            background: default_background_color(),
            normal: default_normal_color(),
            low: default_low_color(),
            critical: default_critical_color(),
            disabled: default_disabled_color(),
        }
    }
}

impl ColorConfig {
    pub fn parse(field: &'static str, value: &str) -> Result<Rgba, ConfigError> {
        Rgba::from_hex(value).ok_or_else(|| ConfigError::InvalidColor {
            field,
            value: value.to_string(),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("border", &self.border),
            ("background", &self.background),
            ("normal", &self.normal),
            ("low", &self.low),
            ("critical", &self.critical),
            ("disabled", &self.disabled),
        ] {
            Self::parse(field, value)?;
        }
        Ok(())
    }
}

fn default_poll_interval() -> u32 { 5 }
fn default_embed_timeout() -> u64 { 10 }
fn default_program() -> String { "acpi".to_string() }
fn default_args() -> Vec<String> { vec!["-b".to_string()] }
fn default_command_timeout() -> u64 { 2 }
fn default_width() -> u32 { 12 }
fn default_height() -> u32 { 18 }
fn default_border() -> u32 { 1 }
fn default_low() -> f64 { 0.30 }
fn default_critical() -> f64 { 0.10 }
fn default_border_color() -> String { "#000000ff".to_string() }
fn default_background_color() -> String { "#333333ff".to_string() }
fn default_normal_color() -> String { "#33ff00ff".to_string() }
fn default_low_color() -> String { "#ffbf00ff".to_string() }
fn default_critical_color() -> String { "#ff0000ff".to_string() }
fn default_disabled_color() -> String { "#aaaaaaff".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            embed_timeout_secs: default_embed_timeout(),
            command: CommandConfig::default(),
            icon: IconConfig::default(),
            thresholds: ThresholdConfig::default(),
            colors: ColorConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be at least 1".into()));
        }
        if self.command.timeout_secs == 0 {
            return Err(ConfigError::Invalid("command.timeout_secs must be at least 1".into()));
        }
        if self.command.program.trim().is_empty() {
            return Err(ConfigError::Invalid("command.program is empty".into()));
        }

        let icon = &self.icon;
        let frame = icon.border.saturating_mul(2);
        if icon.width <= frame || icon.height <= frame {
            return Err(ConfigError::Invalid(format!(
                "icon {}x{} leaves no room inside a {}px border",
                icon.width, icon.height, icon.border
            )));
        }

        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.critical) || !(0.0..=1.0).contains(&t.low) {
            return Err(ConfigError::Invalid("thresholds must lie in [0, 1]".into()));
        }
        if t.critical > t.low {
            return Err(ConfigError::Invalid(format!(
                "critical threshold {} is above low threshold {}",
                t.critical, t.low
            )));
        }

        self.colors.validate()
    }
}

/// `$XDG_CONFIG_HOME/battery-tray/config.toml`, falling back to `~/.config`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("battery-tray").join("config.toml")
}

/// Read and validate a config file. A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        debug!("No config at '{}', using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> Config {
    let path = default_path();
    match load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config from '{}': {}. Using defaults.", path.display(), e);
            Config::default()
        }
    }
}
