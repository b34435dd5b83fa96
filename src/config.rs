// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every field has a default, so a missing or partial config.toml is fine.
// A config.toml that fails to parse is reported and replaced by defaults.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::pattern::DEFAULT_GRID_SPACING;
use crate::presenter::PresenterSettings;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub vulkan: VulkanConfig,
    pub presenter: PresenterConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "gridblit".to_string(),
            width: 1920,
            height: 1080,
            fullscreen: false,
        }
    }
}

/// Vulkan library and layer settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VulkanConfig {
    /// Load this library instead of the system loader
    pub library_path: Option<PathBuf>,
    pub validation_layers: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            validation_layers: true,
        }
    }
}

/// Present cycle settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PresenterConfig {
    /// "first", "immediate", "mailbox", "fifo" or "fifo_relaxed"
    pub present_mode: String,
    /// Give up after this many frames in a row fail
    pub max_consecutive_frame_errors: u32,
    pub grid_spacing: u32,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            present_mode: "first".to_string(),
            max_consecutive_frame_errors: 3,
            grid_spacing: DEFAULT_GRID_SPACING,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_to_file: false,
            log_file: "gridblit.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get present mode as Vulkan enum, `None` meaning "first reported"
    pub fn get_present_mode(&self) -> Option<vk::PresentModeKHR> {
        match self.presenter.present_mode.to_lowercase().as_str() {
            "first" | "" => None,
            "immediate" => Some(vk::PresentModeKHR::IMMEDIATE),
            "mailbox" => Some(vk::PresentModeKHR::MAILBOX),
            "fifo" => Some(vk::PresentModeKHR::FIFO),
            "fifo_relaxed" => Some(vk::PresentModeKHR::FIFO_RELAXED),
            _ => {
                log::warn!(
                    "Unknown present mode '{}', using the surface's first mode",
                    self.presenter.present_mode
                );
                None
            }
        }
    }

    pub fn presenter_settings(&self) -> PresenterSettings {
        let grid_spacing = if self.presenter.grid_spacing == 0 {
            log::warn!("grid_spacing = 0 is invalid, using {}", DEFAULT_GRID_SPACING);
            DEFAULT_GRID_SPACING
        } else {
            self.presenter.grid_spacing
        };

        PresenterSettings {
            app_name: self.window.title.clone(),
            // Validation is a debug-build feature only
            enable_validation: cfg!(debug_assertions) && self.vulkan.validation_layers,
            present_mode: self.get_present_mode(),
            grid_spacing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(dir.path().join("config.toml")).unwrap();
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.presenter.grid_spacing, 100);
        assert_eq!(config.presenter.max_consecutive_frame_errors, 3);
        assert!(config.vulkan.library_path.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
            [window]
            title = "grid"

            [vulkan]
            library_path = "/opt/vulkan/libvulkan.so.1"

            [presenter]
            present_mode = "FIFO"
            "#,
        );
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.window.title, "grid");
        assert_eq!(config.window.height, 1080);
        assert_eq!(
            config.vulkan.library_path.as_deref(),
            Some(Path::new("/opt/vulkan/libvulkan.so.1"))
        );
        assert_eq!(config.get_present_mode(), Some(vk::PresentModeKHR::FIFO));
        assert_eq!(config.presenter.grid_spacing, 100);
    }

    #[test]
    fn broken_file_is_an_error() {
        let file = write_config("[window\nwidth = ");
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn present_mode_names() {
        let mut config = Config::default();
        assert_eq!(config.get_present_mode(), None);

        config.presenter.present_mode = "mailbox".into();
        assert_eq!(config.get_present_mode(), Some(vk::PresentModeKHR::MAILBOX));

        config.presenter.present_mode = "fifo_relaxed".into();
        assert_eq!(config.get_present_mode(), Some(vk::PresentModeKHR::FIFO_RELAXED));

        config.presenter.present_mode = "vsync-please".into();
        assert_eq!(config.get_present_mode(), None);
    }

    #[test]
    fn zero_grid_spacing_is_replaced() {
        let mut config = Config::default();
        config.presenter.grid_spacing = 0;
        assert_eq!(config.presenter_settings().grid_spacing, DEFAULT_GRID_SPACING);

        config.presenter.grid_spacing = 64;
        let settings = config.presenter_settings();
        assert_eq!(settings.grid_spacing, 64);
        assert_eq!(settings.app_name, "gridblit");
    }
}
