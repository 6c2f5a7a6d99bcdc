//! Spotify integration configuration (optional)

use std::env;
use std::fmt;

use crate::{get_env_or_default, ConfigError, ConfigResult};

/// Spotify client-credentials configuration
#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Accounts service base URL (token endpoint lives under it)
    pub accounts_url: String,
    /// Web API base URL
    pub api_url: String,
}

impl fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("accounts_url", &self.accounts_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl SpotifyConfig {
    /// Load Spotify configuration from environment variables
    ///
    /// Returns `Ok(None)` when neither credential is set. Setting only one
    /// of `SPOTIFY_CLIENT_ID` / `SPOTIFY_CLIENT_SECRET` is a validation error.
    pub fn from_env() -> ConfigResult<Option<Self>> {
        let client_id = env::var("SPOTIFY_CLIENT_ID").ok().filter(|v| !v.is_empty());
        let client_secret = env::var("SPOTIFY_CLIENT_SECRET")
            .ok()
            .filter(|v| !v.is_empty());

        match (client_id, client_secret) {
            (None, None) => Ok(None),
            (Some(client_id), Some(client_secret)) => Ok(Some(Self {
                client_id,
                client_secret,
                accounts_url: get_env_or_default(
                    "SPOTIFY_ACCOUNTS_URL",
                    "https://accounts.spotify.com",
                ),
                api_url: get_env_or_default("SPOTIFY_API_URL", "https://api.spotify.com/v1"),
            })),
            _ => Err(ConfigError::IncompleteCredentials(
                "SPOTIFY_CLIENT_ID",
                "SPOTIFY_CLIENT_SECRET",
            )),
        }
    }
}
