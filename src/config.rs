//! Configuration and color scheme management for dockterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.dockterm/config.toml`
//! - Built-in color schemes (default, solarized-dark, monokai)
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.dockterm/config.toml`:
//!
//! ```toml
//! # Display user for the prompt (optional, default "root")
//! user = "root"
//!
//! # Shell used inside the container (default "bash")
//! shell = "bash"
//!
//! # Per-command timeout in seconds (default 30)
//! command_timeout = 30
//!
//! # Color scheme: default, solarized-dark, monokai
//! color_scheme = "default"
//!
//! [status_bar]
//! visible = true
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::pane::OutputClass;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display user for the prompt
    pub user: String,
    /// Working directory display string
    pub start_path: String,
    /// Shell invoked inside the container
    pub shell: String,
    /// Per-command timeout in seconds
    pub command_timeout: u64,
    /// Color scheme name
    pub color_scheme: String,
    /// Status bar settings
    pub status_bar: StatusBarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            start_path: "~".to_string(),
            shell: "bash".to_string(),
            command_timeout: 30,
            color_scheme: "default".to_string(),
            status_bar: StatusBarConfig::default(),
        }
    }
}

/// Status bar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    pub visible: bool,
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self { visible: true }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let dockterm_dir = home.join(".dockterm");
            if !dockterm_dir.exists() {
                let _ = fs::create_dir_all(&dockterm_dir);
            }
            return Some(dockterm_dir.join("config.toml"));
        }
        None
    }

    /// Get the color scheme
    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Color scheme definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,

    // Pane fragment colors
    pub output: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub prompt: Color,
    pub info: Color,

    // Status bar colors
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub status_ok: Color,
    pub status_warn: Color,
    pub status_bad: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Default scheme, after the classic dark web-console palette
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),

            output: Color::new(212, 212, 212),
            error: Color::new(244, 71, 71),
            warning: Color::new(255, 171, 112),
            success: Color::new(78, 201, 176),
            prompt: Color::new(86, 156, 214),
            info: Color::new(170, 170, 170),

            status_bar_bg: Color::new(40, 40, 40),
            status_bar_fg: Color::new(180, 180, 180),
            status_ok: Color::new(78, 201, 176),
            status_warn: Color::new(255, 171, 112),
            status_bad: Color::new(244, 71, 71),
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),

            output: Color::new(147, 161, 161),
            error: Color::new(220, 50, 47),
            warning: Color::new(181, 137, 0),
            success: Color::new(133, 153, 0),
            prompt: Color::new(38, 139, 210),
            info: Color::new(101, 123, 131),

            status_bar_bg: Color::new(7, 54, 66),
            status_bar_fg: Color::new(147, 161, 161),
            status_ok: Color::new(133, 153, 0),
            status_warn: Color::new(181, 137, 0),
            status_bad: Color::new(220, 50, 47),
        }
    }

    /// Monokai scheme
    pub fn monokai() -> Self {
        Self {
            name: "monokai".to_string(),

            output: Color::new(248, 248, 242),
            error: Color::new(249, 38, 114),
            warning: Color::new(253, 151, 31),
            success: Color::new(166, 226, 46),
            prompt: Color::new(102, 217, 239),
            info: Color::new(150, 150, 140),

            status_bar_bg: Color::new(39, 40, 34),
            status_bar_fg: Color::new(248, 248, 242),
            status_ok: Color::new(166, 226, 46),
            status_warn: Color::new(253, 151, 31),
            status_bad: Color::new(249, 38, 114),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "monokai" => Self::monokai(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec!["default", "solarized-dark", "monokai"]
    }

    /// Color used for an output fragment class
    pub fn class_color(&self, class: OutputClass) -> Color {
        match class {
            OutputClass::Output => self.output,
            OutputClass::Error => self.error,
            OutputClass::Warning => self.warning,
            OutputClass::Success => self.success,
            OutputClass::Prompt => self.prompt,
            OutputClass::Info => self.info,
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.user, "root");
        assert_eq!(config.start_path, "~");
        assert_eq!(config.command_timeout, 30);
        assert!(config.status_bar.visible);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("user = \"admin\"").unwrap();
        assert_eq!(config.user, "admin");
        assert_eq!(config.shell, "bash");
    }

    #[test]
    fn test_scheme_by_name_falls_back() {
        assert_eq!(ColorScheme::by_name("monokai").name, "monokai");
        assert_eq!(ColorScheme::by_name("no-such-scheme").name, "default");
    }
}
