use thiserror::Error;

pub const ENV_PREFIX: &str = "WAYFARER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting. Set the {env_var} environment variable or add it to the config file")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Name of the environment variable that sets a dotted settings path,
/// e.g. `places.api_key` -> `WAYFARER_PLACES__API_KEY`
pub fn to_env_var(field_path: &str) -> String {
    let path = field_path
        .split('.')
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("__");
    format!("{}_{}", ENV_PREFIX, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.api_key"), "WAYFARER_PROVIDER__API_KEY");
        assert_eq!(to_env_var("model"), "WAYFARER_MODEL");
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = ConfigError::MissingEnvVar {
            env_var: to_env_var("places.api_key"),
        };
        assert!(err.to_string().contains("WAYFARER_PLACES__API_KEY"));
    }
}
