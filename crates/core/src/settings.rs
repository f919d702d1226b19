use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Deck settings
    pub deck_count: usize,
    pub poll_rate_hz: u32,
    pub default_gain: f64,
    pub default_speed_ratio: f64,

    // Audio settings
    pub audio_enabled: bool,

    // Diagnostics
    pub log_level: String,

    /// Directory of the most recently loaded track.
    pub last_directory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deck_count: 2,
            poll_rate_hz: 30,
            default_gain: 1.0,
            default_speed_ratio: 1.0,

            audio_enabled: true,

            log_level: "info".to_string(),

            last_directory: None,
        }
    }
}

impl Settings {
    /// Interval between two position polls.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.poll_rate_hz.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval() {
        let settings = Settings::default();
        let interval = settings.poll_interval();
        assert!((interval.as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);

        let zero = Settings {
            poll_rate_hz: 0,
            ..Settings::default()
        };
        assert_eq!(zero.poll_interval(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "deck_count": 4 }"#).unwrap();
        assert_eq!(settings.deck_count, 4);
        assert_eq!(settings.poll_rate_hz, 30);
        assert_eq!(settings.log_level, "info");
    }
}
