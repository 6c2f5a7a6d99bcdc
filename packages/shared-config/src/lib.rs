//! Shared configuration types for Marquee services
//!
//! This crate provides the environment-driven configuration used by the API
//! server and its collaborator clients.

mod database;
mod error;
mod ollama;
mod spotify;
mod tmdb;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ConfigResult};
pub use ollama::OllamaConfig;
pub use spotify::SpotifyConfig;
pub use tmdb::{TmdbConfig, DEFAULT_TMDB_BASE_URL, DEFAULT_TMDB_IMAGE_BASE_URL};

use std::env;

/// Common configuration shared between all services
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Ollama configuration (chat + embeddings)
    pub ollama: OllamaConfig,

    /// TMDB movie catalog configuration
    pub tmdb: TmdbConfig,

    /// Spotify integration configuration (optional)
    pub spotify: Option<SpotifyConfig>,

    /// Environment mode (development, staging, production)
    pub environment: Environment,

    /// Log level (from RUST_LOG or LOG_LEVEL)
    pub log_level: String,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    ///
    /// Missing credentials (`DATABASE_URL`, `TMDB_API_KEY`) fail here, before
    /// the server binds.
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            ollama: OllamaConfig::from_env()?,
            tmdb: TmdbConfig::from_env()?,
            spotify: SpotifyConfig::from_env()?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Check if the Spotify integration is configured
    pub fn has_spotify(&self) -> bool {
        self.spotify.is_some()
    }
}

/// Helper function to get a required environment variable
pub fn get_required_env(name: &str) -> ConfigResult<String> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "prod".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "staging".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "stage".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!(
            "dev".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!(
            "anything".parse::<Environment>().unwrap(),
            Environment::Development
        );
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(format!("{}", Environment::Production), "production");
        assert_eq!(format!("{}", Environment::Staging), "staging");
        assert_eq!(format!("{}", Environment::Development), "development");
    }

    #[test]
    fn test_parse_env_default_and_invalid() {
        temp_env::with_var("MARQUEE_TEST_PARSE", None::<&str>, || {
            assert_eq!(parse_env("MARQUEE_TEST_PARSE", 7u32).unwrap(), 7);
        });
        temp_env::with_var("MARQUEE_TEST_PARSE", Some("seven"), || {
            assert!(matches!(
                parse_env("MARQUEE_TEST_PARSE", 7u32),
                Err(ConfigError::InvalidValue(..))
            ));
        });
    }

    #[test]
    fn test_common_config_fails_fast_without_tmdb_key() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/marquee")),
                ("TMDB_API_KEY", None),
            ],
            || {
                assert!(matches!(
                    CommonConfig::from_env(),
                    Err(ConfigError::MissingEnvVar(name)) if name == "TMDB_API_KEY"
                ));
            },
        );
    }

    #[test]
    fn test_environment_checks() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Production.is_development());
        assert!(Environment::Development.is_development());
        assert!(!Environment::Development.is_production());
    }
}
