use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Settings;

/// Configuration manager for Otodecks settings
/// Keeps the schema (defaults, ranges, choices) apart from the persisted values.
/// Configuration is stored in config.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub general: GeneralConfigSchema,
    pub deck: DeckConfigSchema,
    pub audio: AudioConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfigSchema {
    pub log_level: ConfigOption<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckConfigSchema {
    pub deck_count: ConfigOption<usize>,
    pub poll_rate_hz: ConfigOption<u32>,
    pub default_gain: ConfigOption<f64>,
    pub default_speed_ratio: ConfigOption<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfigSchema {
    pub audio_enabled: ConfigOption<bool>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'config.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Per-user configuration path (~/.otodecks/config.json).
    pub fn default_user_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".otodecks")
            .join("config.json")
    }

    /// Load settings from configuration file
    /// Creates the file with default settings if it doesn't exist
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        // Ensure config directory exists (if config is in a subdirectory)
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: now.clone(),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate, update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            general: GeneralConfigSchema {
                log_level: ConfigOption {
                    default: "info".to_string(),
                    valid_range: None,
                    valid_choices: Some(
                        ["error", "warn", "info", "debug", "trace"]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    ),
                    description: "Log verbosity when RUST_LOG is not set".to_string(),
                    requires_restart: true,
                },
            },
            deck: DeckConfigSchema {
                deck_count: ConfigOption {
                    default: 2,
                    valid_range: Some((1, 8)),
                    valid_choices: None,
                    description: "Number of independent decks".to_string(),
                    requires_restart: true,
                },
                poll_rate_hz: ConfigOption {
                    default: 30,
                    valid_range: Some((10, 120)),
                    valid_choices: None,
                    description: "Playhead polling rate in updates per second".to_string(),
                    requires_restart: true,
                },
                default_gain: ConfigOption {
                    default: 1.0,
                    valid_range: Some((0.0, 1.0)),
                    valid_choices: None,
                    description: "Gain applied to a deck when the session starts".to_string(),
                    requires_restart: false,
                },
                default_speed_ratio: ConfigOption {
                    default: 1.0,
                    // Lower bound is exclusive
                    valid_range: Some((0.0, 100.0)),
                    valid_choices: None,
                    description: "Playback speed ratio applied when the session starts"
                        .to_string(),
                    requires_restart: false,
                },
            },
            audio: AudioConfigSchema {
                audio_enabled: ConfigOption {
                    default: true,
                    valid_range: None,
                    valid_choices: None,
                    description: "Open the default audio output device".to_string(),
                    requires_restart: true,
                },
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if let Some(choices) = &schema.general.log_level.valid_choices {
            if !choices.contains(&settings.log_level.to_lowercase()) {
                errors.push(format!("log_level must be one of: {:?}", choices));
            }
        }

        if let Some((min, max)) = schema.deck.deck_count.valid_range {
            if settings.deck_count < min || settings.deck_count > max {
                errors.push(format!("deck_count must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.deck.poll_rate_hz.valid_range {
            if settings.poll_rate_hz < min || settings.poll_rate_hz > max {
                errors.push(format!("poll_rate_hz must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.deck.default_gain.valid_range {
            if !(min..=max).contains(&settings.default_gain) {
                errors.push(format!("default_gain must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.deck.default_speed_ratio.valid_range {
            let ratio = settings.default_speed_ratio;
            if !(ratio > min && ratio <= max) {
                errors.push(format!(
                    "default_speed_ratio must be greater than {} and at most {}",
                    min, max
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Config validation errors: {}", errors.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}
