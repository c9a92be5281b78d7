use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{WatchError, WatchResult};

const DEFAULT_CONFIG_FILE: &str = "watchguard.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001".to_string(),
            timeout_secs: 3,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct AdviceConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    pub timeout_secs: u64,
    /// Substitute a fallback message when the backend fails instead of
    /// failing the request.
    pub fail_open: bool,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.novita.ai/v3/openai".to_string(),
            model: "deepseek/deepseek-v3-0324".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            fail_open: true,
        }
    }
}

impl AdviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Hand-written so the API key never reaches a log line.
impl std::fmt::Debug for AdviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdviceConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("timeout_secs", &self.timeout_secs)
            .field("fail_open", &self.fail_open)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./sessions.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub advice: AdviceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WatchConfig {
    pub fn validate(&self) -> WatchResult<()> {
        if self.classifier.base_url.trim().is_empty() {
            return Err(WatchError::config("classifier.base_url must be set"));
        }
        if self.advice.base_url.trim().is_empty() {
            return Err(WatchError::config("advice.base_url must be set"));
        }
        if self.advice.model.trim().is_empty() {
            return Err(WatchError::config("advice.model must be set"));
        }
        for (name, secs) in [
            ("classifier.timeout_secs", self.classifier.timeout_secs),
            ("advice.timeout_secs", self.advice.timeout_secs),
        ] {
            if !(1..=120).contains(&secs) {
                return Err(WatchError::config(format!(
                    "{name} must be between 1 and 120 seconds, got {secs}"
                )));
            }
        }
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(WatchError::config("storage.database_path must be set"));
        }
        Ok(())
    }
}

/// Build the layered configuration: defaults, then the TOML file, then
/// `WATCHGUARD_` environment variables (`__` separates nested keys).
pub fn figment(config_path: Option<&str>) -> Figment {
    let path = config_path
        .map(str::to_string)
        .or_else(|| std::env::var("WATCHGUARD_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    Figment::from(Serialized::defaults(WatchConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WATCHGUARD_").split("__").ignore(&["config"]))
}

pub fn load_config(config_path: Option<&str>) -> WatchResult<WatchConfig> {
    let config: WatchConfig = figment(config_path)
        .extract()
        .map_err(|e| WatchError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_the_reference_deployment() {
        Jail::expect_with(|_jail| {
            let config = load_config(None).expect("defaults should load");
            assert_eq!(config.server.port, 8000);
            assert_eq!(config.classifier.base_url, "http://127.0.0.1:8001");
            assert_eq!(config.classifier.timeout(), Duration::from_secs(3));
            assert!(config.advice.fail_open);
            assert_eq!(config.storage.database_path, PathBuf::from("./sessions.db"));
            Ok(())
        });
    }

    #[test]
    fn toml_file_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "watchguard.toml",
                r#"
                [classifier]
                base_url = "http://classifier.internal:9000"

                [advice]
                model = "local/tiny"
                "#,
            )?;
            jail.set_env("WATCHGUARD_CLASSIFIER__TIMEOUT_SECS", "5");
            jail.set_env("WATCHGUARD_ADVICE__FAIL_OPEN", "false");

            let config = load_config(None).expect("layered config should load");
            assert_eq!(config.classifier.base_url, "http://classifier.internal:9000");
            assert_eq!(config.classifier.timeout_secs, 5);
            assert_eq!(config.advice.model, "local/tiny");
            assert!(!config.advice.fail_open);
            Ok(())
        });
    }

    #[test]
    fn unbounded_timeout_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("WATCHGUARD_CLASSIFIER__TIMEOUT_SECS", "0");
            let err = load_config(None).unwrap_err();
            assert!(err.to_string().contains("classifier.timeout_secs"));
            Ok(())
        });
    }

    #[test]
    fn api_key_is_redacted_in_debug_output() {
        let advice = AdviceConfig {
            api_key: "sk-secret".to_string(),
            ..AdviceConfig::default()
        };
        let rendered = format!("{advice:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
