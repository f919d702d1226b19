//! Otodecks core services: persisted configuration and the async module
//! lifecycle shared by the deck engine and the application.

pub use config::{ConfigError, ConfigFile, ConfigManager, ConfigOption, ConfigSchema};
pub use modules::{AsyncModule, ModuleError, ModuleEvent, ModuleHost, ModuleId, ModuleMessage};
pub use settings::Settings;

mod config;
mod modules;
mod settings;
