//! TMDB movie catalog configuration

use std::fmt;

use crate::{get_env_or_default, get_required_env, parse_env, ConfigError, ConfigResult};

/// Default TMDB v3 API base URL
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Default TMDB image base URL (poster size included)
pub const DEFAULT_TMDB_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// TMDB API configuration
#[derive(Clone)]
pub struct TmdbConfig {
    /// v3 API key
    pub api_key: String,

    /// API base URL (overridable for tests)
    pub base_url: String,

    /// Poster image base URL
    pub image_base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl fmt::Debug for TmdbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("image_base_url", &self.image_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl TmdbConfig {
    /// Load TMDB configuration from environment variables
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if `TMDB_API_KEY` is unset or empty.
    pub fn from_env() -> ConfigResult<Self> {
        let api_key = get_required_env("TMDB_API_KEY")?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("TMDB_API_KEY".to_string()));
        }

        let base_url = get_env_or_default("TMDB_BASE_URL", DEFAULT_TMDB_BASE_URL);
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl("TMDB_BASE_URL".to_string(), base_url));
        }

        Ok(Self {
            api_key,
            base_url,
            image_base_url: get_env_or_default("TMDB_IMAGE_BASE_URL", DEFAULT_TMDB_IMAGE_BASE_URL),
            timeout_secs: parse_env("TMDB_TIMEOUT_SECS", 8)?,
        })
    }

    /// Create a configuration pointing at a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: url.into(),
            image_base_url: DEFAULT_TMDB_IMAGE_BASE_URL.to_string(),
            timeout_secs: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_fatal() {
        temp_env::with_var_unset("TMDB_API_KEY", || {
            let result = TmdbConfig::from_env();
            assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "TMDB_API_KEY"));
        });
    }

    #[test]
    fn test_blank_api_key_is_fatal() {
        temp_env::with_var("TMDB_API_KEY", Some("   "), || {
            assert!(TmdbConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("TMDB_API_KEY", Some("abc123")),
                ("TMDB_BASE_URL", None),
                ("TMDB_TIMEOUT_SECS", None),
            ],
            || {
                let config = TmdbConfig::from_env().unwrap();
                assert_eq!(config.base_url, DEFAULT_TMDB_BASE_URL);
                assert_eq!(config.timeout_secs, 8);
            },
        );
    }

    #[test]
    fn test_invalid_base_url() {
        temp_env::with_vars(
            [
                ("TMDB_API_KEY", Some("abc123")),
                ("TMDB_BASE_URL", Some("api.themoviedb.org")),
            ],
            || {
                assert!(matches!(
                    TmdbConfig::from_env(),
                    Err(ConfigError::InvalidUrl(..))
                ));
            },
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = TmdbConfig::with_url("http://localhost", "secret_key");
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_key"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
