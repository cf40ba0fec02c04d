use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use wayfarer::agent::DEFAULT_MAX_STEPS;
use wayfarer::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use wayfarer::toolkits::geocoding::NOMINATIM_HOST;
use wayfarer::toolkits::local_guide::LocalGuideConfig;
use wayfarer::toolkits::places::PLACES_HOST;

/// `~/.config/wayfarer`, home of the config file and the logs
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".config").join("wayfarer"))
        .ok_or_else(|| anyhow!("Could not determine home directory"))
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct GeocoderSettings {
    pub host: String,
    pub user_agent: String,
}

#[derive(Debug, Deserialize)]
pub struct PlacesSettings {
    pub host: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    pub max_steps: usize,
}

#[derive(Debug, Deserialize)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub geocoder: GeocoderSettings,
    pub places: PlacesSettings,
    pub agent: AgentSettings,
    pub http: HttpSettings,
}

impl Settings {
    /// Load settings from defaults, then the config file, then `WAYFARER_*` environment
    /// variables. An explicitly named file must exist; the default one is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match config_file {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (
                config_dir().ok().map(|dir| dir.join("config.toml")),
                false,
            ),
        };

        let mut builder = Config::builder()
            .set_default("provider.host", OPENAI_HOST)?
            .set_default("provider.model", OPENAI_MODEL)?
            .set_default("geocoder.host", NOMINATIM_HOST)?
            .set_default("geocoder.user_agent", default_user_agent())?
            .set_default("places.host", PLACES_HOST)?
            .set_default("agent.max_steps", DEFAULT_MAX_STEPS as u64)?
            .set_default("http.timeout_secs", 60u64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(required));
        }

        let config = builder
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                match &err {
                    config::ConfigError::NotFound(field) => Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    }),
                    _ => Err(ConfigError::Other(err)),
                }
            }
        }
    }

    pub fn provider_config(&self) -> Result<OpenAiProviderConfig, ConfigError> {
        let provider = &self.provider;
        Ok(OpenAiProviderConfig {
            host: provider.host.clone(),
            api_key: required(&provider.api_key, "provider.api_key")?,
            model: provider.model.clone(),
            temperature: provider.temperature,
            max_tokens: provider.max_tokens,
            timeout_secs: self.http.timeout_secs,
        })
    }

    pub fn local_guide_config(&self) -> Result<LocalGuideConfig, ConfigError> {
        Ok(LocalGuideConfig {
            geocoder_host: self.geocoder.host.clone(),
            geocoder_user_agent: self.geocoder.user_agent.clone(),
            places_host: self.places.host.clone(),
            places_api_key: required(&self.places.api_key, "places.api_key")?,
            timeout_secs: self.http.timeout_secs,
        })
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String, ConfigError> {
    value
        .as_ref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar {
            env_var: to_env_var(field),
        })
}

fn default_user_agent() -> String {
    format!("wayfarer/{}", env!("CARGO_PKG_VERSION"))
}
