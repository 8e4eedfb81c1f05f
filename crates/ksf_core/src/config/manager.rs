//! Config manager for loading, saving, and atomic updates.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Section-level updates (only modified section is changed)
//! - Validation on load (unknown sections are dropped on rewrite)
//! - Preserves comments and formatting with toml_edit
//! - Presets: plain settings files loaded read-only

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::DocumentMut;

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages application configuration.
///
/// Handles loading, saving, and atomic section-level updates.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Current settings loaded in memory.
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` or `load_or_create()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to the current settings.
    ///
    /// Note: Changes made here are only in memory until `save()` or
    /// `update_section()` is called.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file.
    ///
    /// Returns error if file doesn't exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = parse_settings(&content)?;
        Ok(())
    }

    /// Load config from file, creating with defaults if it doesn't exist.
    ///
    /// Files with unknown sections or missing keys are rewritten in full.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = self.parse_validate_and_clean(&content)?;
            self.settings = settings;

            if was_modified {
                tracing::debug!("Rewriting {} with defaults", self.config_path.display());
                self.save()?;
            }
        } else {
            if let Some(parent) = self.config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Load a preset file without attaching a manager to it.
    pub fn load_preset(path: &Path) -> ConfigResult<Settings> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let settings = parse_settings(&content)?;
        tracing::debug!("Loaded preset {}", path.display());
        Ok(settings)
    }

    /// Names (file stems) of the `.toml` presets in `dir`, sorted.
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect();
        names.sort();
        names
    }

    /// Ensure all configured directories exist.
    ///
    /// Creates output, temp, and logs directories if they don't exist.
    /// Should be called after `load_or_create()`.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let dirs = [
            &self.settings.paths.output_folder,
            &self.settings.paths.temp_root,
            &self.settings.paths.logs_folder,
        ];

        for dir in dirs {
            let path = PathBuf::from(dir);
            if !path.exists() {
                fs::create_dir_all(&path)?;
            }
        }

        Ok(())
    }

    /// Get the logs folder path.
    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    /// Parse, validate, and clean up config content.
    ///
    /// Returns the settings and whether any modifications were made.
    fn parse_validate_and_clean(&self, content: &str) -> ConfigResult<(Settings, bool)> {
        let doc: DocumentMut = content.parse()?;
        let settings = parse_settings(content)?;

        let has_unknown = doc
            .iter()
            .any(|(key, _)| !ConfigSection::ALL.iter().any(|s| s.table_name() == key));

        // Any section or key missing from the file shows up as a difference
        // in the set of keys after a round trip through Settings.
        let full: DocumentMut = toml::to_string_pretty(&settings)?.parse()?;
        let missing_keys = ConfigSection::ALL.iter().any(|section| {
            let name = section.table_name();
            match (doc.get(name).and_then(|i| i.as_table()), full.get(name).and_then(|i| i.as_table())) {
                (Some(existing), Some(expected)) => {
                    expected.iter().any(|(key, _)| !existing.contains_key(key))
                }
                (None, Some(_)) => true,
                _ => false,
            }
        });

        Ok((settings, has_unknown || missing_keys))
    }

    /// Save the entire config atomically.
    ///
    /// Writes to a temp file first, then renames to ensure atomic write.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Update a specific section atomically.
    ///
    /// This re-reads the file from disk, updates only the specified section,
    /// and writes back atomically. This prevents in-memory corruption from
    /// affecting other sections. The section's leading comment survives.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let fresh: DocumentMut = toml::to_string_pretty(&self.settings)?.parse()?;
        let name = section.table_name();

        let mut item = fresh
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Invalid(format!("section '{}' did not serialize", name)))?;

        let old_decor = doc
            .get(name)
            .and_then(|i| i.as_table())
            .map(|t| t.decor().clone());
        if let (Some(decor), Some(table)) = (old_decor, item.as_table_mut()) {
            *table.decor_mut() = decor;
        }

        doc.insert(name, item);

        self.atomic_write(&doc.to_string())?;

        Ok(())
    }

    /// Generate config content with a comment above each section.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut doc: DocumentMut = toml::to_string_pretty(&self.settings)?.parse()?;

        for (i, section) in ConfigSection::ALL.iter().enumerate() {
            if let Some(table) = doc
                .get_mut(section.table_name())
                .and_then(|item| item.as_table_mut())
            {
                let lead = if i == 0 { "" } else { "\n" };
                table
                    .decor_mut()
                    .set_prefix(format!("{}# {}\n", lead, section.comment()));
            }
        }

        let mut output = String::new();
        output.push_str("# Keo Shortform Factory Configuration\n");
        output.push_str(
            "# This file is auto-generated. Comments may be preserved on section updates.\n\n",
        );
        output.push_str(&doc.to_string());

        Ok(output)
    }

    /// Write content to config file atomically.
    ///
    /// Writes to a temp file first, then renames.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn parse_settings(content: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    validate(&settings)?;
    Ok(settings)
}

/// Range checks serde cannot express.
fn validate(settings: &Settings) -> ConfigResult<()> {
    let slicing = &settings.slicing;
    if !(slicing.clip_len > 0.0) {
        return Err(ConfigError::Invalid(format!(
            "slicing.clip_len must be positive, got {}",
            slicing.clip_len
        )));
    }
    if !(slicing.stride > 0.0) {
        return Err(ConfigError::Invalid(format!(
            "slicing.stride must be positive, got {}",
            slicing.stride
        )));
    }
    if !(0.0..=1.0).contains(&settings.overlay.opacity) {
        return Err(ConfigError::Invalid(format!(
            "overlay.opacity must be within [0, 1], got {}",
            settings.overlay.opacity
        )));
    }
    if settings.alignment.sample_rate == 0 || settings.alignment.hop_length == 0 {
        return Err(ConfigError::Invalid(
            "alignment.sample_rate and alignment.hop_length must be non-zero".to_string(),
        ));
    }
    if settings.batch.max_workers == 0 {
        return Err(ConfigError::Invalid(
            "batch.max_workers must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("# Clip window selection"));
        assert!(content.contains("[[export.quality_ladder]]"));
    }

    #[test]
    fn generated_file_loads_back() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.settings_mut().slicing.num_hooks = 7;
        manager.save().unwrap();

        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings(), manager.settings());
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        fs::write(
            &config_path,
            "[paths]\noutput_folder = \"my_custom_folder\"\n",
        )
        .unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().paths.output_folder, "my_custom_folder");
        // Missing sections were filled in on disk
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[slicing]"));
        assert!(content.contains("my_custom_folder"));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("nope.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        // Change two sections in memory, persist only one
        manager.settings_mut().logging.compact = false;
        manager.settings_mut().slicing.clip_len = 45.0;
        manager.update_section(ConfigSection::Logging).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("compact = false"));
        assert!(content.contains("# Logging configuration"));
        assert!(content.contains("clip_len = 20.0"));
        assert!(!content.contains("clip_len = 45.0"));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(!temp_path.exists());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[slicing]\nstride = 0.0\n").unwrap();
        assert!(matches!(
            ConfigManager::load_preset(&path),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&path, "[overlay]\nopacity = 1.5\n").unwrap();
        assert!(ConfigManager::load_preset(&path).is_err());
    }

    #[test]
    fn presets_are_listed_and_loaded() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("tiktok.toml"),
            "[slicing]\nclip_len = 15.0\nstride = 15.0\n",
        )
        .unwrap();
        fs::write(dir.path().join("reels.toml"), "[export]\nratio = \"4:5\"\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(ConfigManager::list_presets(dir.path()), vec!["reels", "tiktok"]);

        let preset = ConfigManager::load_preset(&dir.path().join("tiktok.toml")).unwrap();
        assert_eq!(preset.slicing.clip_len, 15.0);
        assert_eq!(preset.export.ratio.to_string(), "9:16");
    }
}
