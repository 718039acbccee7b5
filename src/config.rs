use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    pub encoder_path: PathBuf,
    pub model_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            encoder_path: PathBuf::from("encoder.json"),
            model_path: PathBuf::from("model.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives applied on top of the INFO default
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "bike_demand=debug,tower_http=info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bike-demand");

        let builder = Config::builder()
            // 1. Load default values
            // Server
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8501)?
            // Artifacts
            .set_default("artifacts.encoder_path", "encoder.json")?
            .set_default("artifacts.model_path", "model.json")?
            // Logging
            .set_default("logging.filter", "bike_demand=debug,tower_http=info")?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (BIKE_DEMAND__SERVER__PORT=...)
            .add_source(Environment::with_prefix("BIKE_DEMAND").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default Value Tests ====================

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8501);
        assert_eq!(config.bind_address(), "127.0.0.1:8501");
    }

    #[test]
    fn test_artifacts_config_defaults() {
        let config = ArtifactsConfig::default();
        assert_eq!(config.encoder_path, PathBuf::from("encoder.json"));
        assert_eq!(config.model_path, PathBuf::from("model.json"));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert!(config.filter.contains("bike_demand=debug"));
    }

    // ==================== Config Loading Tests ====================

    #[test]
    fn test_config_load_with_defaults() {
        // Should succeed even without a config file (uses defaults)
        let result = AppConfig::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_loaded_config_has_expected_structure() {
        let config = AppConfig::load().expect("Config should load");

        assert!(!config.server.host.is_empty());
        assert!(config.server.port > 0);
        assert!(!config.artifacts.encoder_path.as_os_str().is_empty());
        assert!(!config.artifacts.model_path.as_os_str().is_empty());
    }

    // ==================== Environment Variable Override Tests ====================

    /// Helper to safely set and remove environment variables in tests.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // SAFETY: Test environment, each test uses a distinct key
        unsafe {
            std::env::set_var(key, value);
        }
        let result = f();
        unsafe {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_env_var_overrides_model_path() {
        let config = with_env_var("BIKE_DEMAND__ARTIFACTS__MODEL_PATH", "/srv/models/rf.json", || {
            AppConfig::load().expect("Config should load")
        });

        assert_eq!(
            config.artifacts.model_path,
            PathBuf::from("/srv/models/rf.json"),
            "Environment variable should override artifacts.model_path"
        );
    }

    #[test]
    fn test_env_var_overrides_logging_filter() {
        let config = with_env_var("BIKE_DEMAND__LOGGING__FILTER", "bike_demand=trace", || {
            AppConfig::load().expect("Config should load")
        });

        assert_eq!(config.logging.filter, "bike_demand=trace");
    }
}
