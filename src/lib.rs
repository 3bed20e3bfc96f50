//! Clinic portal core library
//!
//! Record store, check-in wizard and health assistant behind the patient and
//! manager portal.

pub mod ai;
pub mod checkin;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use checkin::{Branch, CheckInWizard, WizardState};
pub use db::{FileStorage, MemoryStorage, Storage, StorageBackend};
pub use error::{PortalError, Result};
pub use store::RecordStore;

/// Application configuration
pub mod config {
    use config::builder::{ConfigBuilder, DefaultState};
    use serde::Deserialize;
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Debug, Clone, Deserialize)]
    pub struct Config {
        pub storage: StorageConfig,
        pub assistant: AssistantConfig,
        pub check_in: CheckInConfig,
        pub logging: LoggingConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct StorageConfig {
        /// `memory` or `file`
        pub backend: String,
        pub path: PathBuf,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct AssistantConfig {
        #[serde(default)]
        pub api_key: Option<String>,
        pub model: String,
        pub base_url: String,
        pub temperature: f32,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct CheckInConfig {
        pub biometric_delay_ms: u64,
    }

    impl CheckInConfig {
        pub fn biometric_delay(&self) -> Duration {
            Duration::from_millis(self.biometric_delay_ms)
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LoggingConfig {
        pub json: bool,
    }

    /// Built-in settings, before any file or environment layer.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("storage.backend", "file")?
            .set_default("storage.path", "data")?
            .set_default("assistant.model", "gemini-3-flash-preview")?
            .set_default("assistant.base_url", "https://generativelanguage.googleapis.com/")?
            .set_default("assistant.temperature", 0.6)?
            .set_default("check_in.biometric_delay_ms", 2000_i64)?
            .set_default("logging.json", false)
    }

    /// Load configuration from defaults, config files and the environment
    pub fn load_config() -> Result<Config, config::ConfigError> {
        let env = std::env::var("PORTAL_ENV").unwrap_or_else(|_| "development".into());

        let settings = defaults()?
            .add_source(config::File::with_name("config/default").required(false))
            // Override with environment-specific settings
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables, e.g. PORTAL__STORAGE__PATH
            .add_source(config::Environment::with_prefix("PORTAL").separator("__"))
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.assistant.api_key.is_none() {
            config.assistant.api_key = std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok();
        }
        Ok(config)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn defaults_load_without_overrides() {
            let config: Config = defaults().unwrap().build().unwrap().try_deserialize().unwrap();
            assert!(config.assistant.api_key.is_none());
            assert_eq!(config.storage.backend, "file");
            assert_eq!(config.assistant.model, "gemini-3-flash-preview");
            assert_eq!(config.check_in.biometric_delay(), Duration::from_millis(2000));
            assert!(!config.logging.json);
        }

        #[test]
        fn default_file_matches_builtin_settings() {
            let config: Config = defaults()
                .unwrap()
                .add_source(config::File::with_name("config/default"))
                .build()
                .unwrap()
                .try_deserialize()
                .unwrap();
            assert_eq!(config.storage.path, PathBuf::from("data"));
            assert_eq!(config.check_in.biometric_delay_ms, 2000);
        }
    }
}
