//! Configuration management for Keo Shortform Factory.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//! - Read-only presets for batch jobs
//!
//! # Example
//!
//! ```no_run
//! use ksf_core::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! // Read settings
//! println!("Clip length: {}", config.settings().slicing.clip_len);
//!
//! // Modify a setting
//! config.settings_mut().slicing.hook_detect = true;
//!
//! // Save just the slicing section atomically
//! config.update_section(ConfigSection::Slicing).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AlignmentSettings, BatchSettings, ConfigSection, ExportSettings, LoggingSettings,
    OverlaySettings, PathSettings, Settings, SlicingSettings,
};
