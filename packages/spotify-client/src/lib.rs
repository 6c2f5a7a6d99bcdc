//! Spotify track search client for Marquee
//!
//! Uses the client-credentials flow, so only catalog endpoints are
//! reachable (no user library access).
//!
//! # Example
//!
//! ```rust,no_run
//! use marquee_shared_config::SpotifyConfig;
//! use marquee_spotify_client::{SpotifyClient, TokenCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! if let Some(config) = SpotifyConfig::from_env()? {
//!     let client = SpotifyClient::new(&config, TokenCache::new())?;
//!     for track in client.search_tracks("Hans Zimmer Time", 5).await? {
//!         println!("{} - {}", track.artists.join(", "), track.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;
mod token;

pub use client::SpotifyClient;
pub use error::{SpotifyError, SpotifyResult};
pub use models::Track;
pub use token::TokenCache;
