//! API server configuration

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use marquee_shared_config::{CommonConfig, DatabaseConfig, Environment, OllamaConfig, SpotifyConfig, TmdbConfig};

use crate::models::Genre;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STICKY_GENRES: &str = "Science Fiction";

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with the collaborator clients
    pub common: CommonConfig,

    /// Server port (default: 8080)
    pub port: u16,

    /// CORS allowed origins; `*` allows any origin outside production
    pub cors_allowed_origins: Vec<String>,

    /// Timeout around every tool dispatch (default: 10s)
    pub tool_timeout_secs: u64,

    /// Seed genres every recommendation must share (default: Science Fiction)
    pub sticky_genres: BTreeSet<Genre>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Fails when `DATABASE_URL` or `TMDB_API_KEY` is missing, when a sticky
    /// genre is unknown, or when `CORS_ALLOWED_ORIGINS=*` in production.
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env().context("Failed to load config")?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("Invalid PORT value")?;

        let cors_allowed_origins = parse_origins(
            &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string()),
        );
        if common.environment.is_production() && cors_allowed_origins.iter().any(|o| o == "*") {
            bail!("CORS_ALLOWED_ORIGINS=* is not allowed in production");
        }

        let tool_timeout_secs = match env::var("TOOL_TIMEOUT_SECS") {
            Ok(value) => value.parse().context("Invalid TOOL_TIMEOUT_SECS value")?,
            Err(_) => DEFAULT_TOOL_TIMEOUT_SECS,
        };
        if tool_timeout_secs == 0 {
            bail!("TOOL_TIMEOUT_SECS must be greater than 0");
        }

        let sticky_genres = parse_sticky_genres(
            &env::var("STICKY_GENRES").unwrap_or_else(|_| DEFAULT_STICKY_GENRES.to_string()),
        )?;

        Ok(Self {
            common,
            port,
            cors_allowed_origins,
            tool_timeout_secs,
            sticky_genres,
        })
    }

    // Convenience accessors for common config fields

    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }

    pub fn ollama(&self) -> &OllamaConfig {
        &self.common.ollama
    }

    pub fn tmdb(&self) -> &TmdbConfig {
        &self.common.tmdb
    }

    pub fn spotify(&self) -> Option<&SpotifyConfig> {
        self.common.spotify.as_ref()
    }

    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Comma-separated canonical genre names; an empty value disables the filter
fn parse_sticky_genres(value: &str) -> Result<BTreeSet<Genre>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| Genre::parse(name).with_context(|| format!("Unknown genre in STICKY_GENRES: {}", name)))
        .collect()
}
