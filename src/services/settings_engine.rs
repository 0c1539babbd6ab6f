// Tabs Aside Settings Engine
// Manages the extension options: loading, saving, updating individual values, and resetting to defaults.
// Options are stored as a JSON file at the platform-specific config path.

use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::options::Options;

/// Read-only view of the options consumed by the session core.
pub trait OptionsProviderTrait: Send + Sync {
    /// Snapshot of the current options.
    fn options(&self) -> Options;
}

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&self) -> Result<Options, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists options as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    options: RwLock<Options>,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses the platform-specific config directory with `options.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = match path_override {
            Some(p) => p,
            None => platform::get_config_dir()
                .join("options.json")
                .to_string_lossy()
                .to_string(),
        };

        Self {
            config_path,
            options: RwLock::new(Options::default()),
        }
    }

    /// Engine that never touches disk until `save` is called, seeded with `options`.
    pub fn with_options(path: String, options: Options) -> Self {
        Self {
            config_path: path,
            options: RwLock::new(options),
        }
    }
}

impl OptionsProviderTrait for SettingsEngine {
    fn options(&self) -> Options {
        self.options.read().clone()
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads options from the JSON config file.
    ///
    /// If the file does not exist, returns default options.
    /// If the file exists but is malformed, returns a serialization error.
    fn load(&self) -> Result<Options, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            debug!(target: "tabs_aside.settings", path = %self.config_path, "no options file, using defaults");
            *self.options.write() = Options::default();
            return Ok(Options::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let options: Options = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        *self.options.write() = options.clone();
        Ok(options)
    }

    /// Saves the current options to the JSON config file.
    ///
    /// Creates parent directories if they don't exist.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&*self.options.read()).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize options: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Updates an individual option by dot-notation key path.
    ///
    /// Converts the current options to a `serde_json::Value`, navigates the
    /// key path, updates the target value, then deserializes back into
    /// `Options`. Saves to disk after a successful update.
    ///
    /// # Examples
    /// - `"windowed_sessions"` → updates `options.windowed_sessions`
    /// - `"tab_closing"` with `"keep-record"` → updates `options.tab_closing`
    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let parts: Vec<&str> = key.split('.').collect();
        let mut json_value = serde_json::to_value(&*self.options.read()).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize options: {}", e))
        })?;

        {
            let mut current = &mut json_value;
            for (i, part) in parts.iter().enumerate() {
                if i == parts.len() - 1 {
                    match current {
                        serde_json::Value::Object(map) => {
                            if !map.contains_key(*part) {
                                return Err(SettingsError::InvalidKey(format!(
                                    "Key '{}' not found in options",
                                    key
                                )));
                            }
                            map.insert(part.to_string(), value.clone());
                        }
                        _ => {
                            return Err(SettingsError::InvalidKey(format!(
                                "Cannot navigate to key '{}': intermediate value is not an object",
                                key
                            )));
                        }
                    }
                } else {
                    current = match current.get_mut(*part) {
                        Some(v) => v,
                        None => {
                            return Err(SettingsError::InvalidKey(format!(
                                "Key '{}' not found in options",
                                key
                            )));
                        }
                    };
                }
            }
        }

        // Deserialize back into Options to validate the new value
        let new_options: Options = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        *self.options.write() = new_options;
        info!(target: "tabs_aside.settings", key, "option updated");
        self.save()
    }

    /// Resets all options to factory defaults and saves to disk.
    fn reset(&self) -> Result<(), SettingsError> {
        *self.options.write() = Options::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
