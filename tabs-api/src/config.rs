use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use serde_with::serde_as;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use strum::{Display, EnumString};

use crate::domain::{
    enrichment::{providers::GEMINI_CHAT_MODEL, BatchConfig, PipelineConfig},
    search::{embedder::GEMINI_MODEL, SearchConfig},
};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    /// Without a database the service runs on the in-memory store.
    pub database: Option<DatabaseSettings>,
    pub search: SearchSettings,
    pub enrichment: EnrichmentSettings,
    #[serde(default)]
    pub providers: ProviderSettings,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct SearchSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub default_limit: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_limit: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub embedding_cache_capacity: usize,
    /// Zero disables expiry.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub embedding_cache_ttl_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub channel_timeout_secs: u64,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct EnrichmentSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub chunk_size: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub chunk_delay_ms: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_reported_errors: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub content_max_chars: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub fetch_timeout_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub provider_timeout_secs: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub worker_concurrency: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub queue_capacity: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ProviderSettings {
    pub screenshot_endpoint: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            screenshot_endpoint: None,
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
        }
    }
}

fn default_embedding_model() -> String {
    GEMINI_MODEL.to_string()
}

fn default_chat_model() -> String {
    GEMINI_CHAT_MODEL.to_string()
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

impl SearchSettings {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
            channel_timeout: Duration::from_secs(self.channel_timeout_secs),
            ..SearchConfig::default()
        }
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.embedding_cache_ttl_secs > 0).then(|| Duration::from_secs(self.embedding_cache_ttl_secs))
    }
}

impl EnrichmentSettings {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            ..PipelineConfig::default()
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            chunk_size: self.chunk_size,
            max_reported_errors: self.max_reported_errors,
            rate_limit_delay: Duration::from_millis(self.chunk_delay_ms),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[from] std::io::Error),
    #[error("invalid APP_ENVIRONMENT '{0}', expected local or production")]
    Environment(String),
}

pub fn read_config() -> Result<Settings, SettingsError> {
    let config_directory = config_directory()?;

    let environment_name = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".into());
    let environment = Environment::from_str(&environment_name)
        .map_err(|_| SettingsError::Environment(environment_name.clone()))?;
    let environment_filename = format!("{}.yaml", environment);

    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(config::File::from(config_directory.join(environment_filename)).required(false))
        .add_source(
            config::Environment::with_prefix("TABS")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<Settings>()?)
}

/// `config/` next to the crate when run from the workspace root, otherwise
/// under the current directory.
fn config_directory() -> Result<PathBuf, SettingsError> {
    let base_path = std::env::current_dir()?;
    let nested = base_path.join("tabs-api").join("config");
    if nested.is_dir() {
        Ok(nested)
    } else {
        Ok(base_path.join("config"))
    }
}

#[derive(Display, Debug, EnumString)]
pub enum Environment {
    #[strum(ascii_case_insensitive, serialize = "local")]
    Local,
    #[strum(ascii_case_insensitive, serialize = "production")]
    Production,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from(yaml: &str) -> Settings {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    const BASE: &str = include_str!("../config/base.yaml");

    #[test]
    fn base_config_deserializes_without_database() {
        let settings = settings_from(BASE);
        assert!(settings.database.is_none());
        assert_eq!(settings.search.search_config().default_limit, 20);
        assert_eq!(settings.enrichment.batch_config().chunk_size, 5);
        assert_eq!(settings.enrichment.content_max_chars, 20_000);
        assert_eq!(
            settings.enrichment.batch_config().rate_limit_delay,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn provider_models_fall_back_to_gemini_defaults() {
        let settings = settings_from(&BASE.replace("providers:", "unused:"));
        assert_eq!(settings.providers.embedding_model, GEMINI_MODEL);
        assert!(settings.providers.screenshot_endpoint.is_none());
    }

    #[test]
    fn zero_ttl_disables_cache_expiry() {
        let mut settings = settings_from(BASE).search;
        settings.embedding_cache_ttl_secs = 0;
        assert_eq!(settings.cache_ttl(), None);
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert!(matches!(
            Environment::from_str("Production"),
            Ok(Environment::Production)
        ));
        assert!(Environment::from_str("staging").is_err());
    }
}
