//! Spotify API response models

use serde::{Deserialize, Serialize};

/// A track search result, normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Spotify track id
    pub id: String,
    pub name: String,
    /// Artist names in billing order
    pub artists: Vec<String>,
    pub album: Option<String>,
    /// Largest album image
    pub image_url: Option<String>,
    /// Link to the track in Spotify
    pub url: Option<String>,
    /// 30-second preview, when Spotify provides one
    pub preview_url: Option<String>,
}

// Internal response types for deserialization

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackPage {
    #[serde(default)]
    pub items: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    pub album: Option<RawAlbum>,
    pub external_urls: Option<ExternalUrls>,
    pub preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawImage {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExternalUrls {
    pub spotify: Option<String>,
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        // Spotify orders album images largest first
        let (album, image_url) = match raw.album {
            Some(album) => (
                Some(album.name),
                album.images.into_iter().next().map(|i| i.url),
            ),
            None => (None, None),
        };

        Self {
            id: raw.id,
            name: raw.name,
            artists: raw.artists.into_iter().map(|a| a.name).collect(),
            album,
            image_url,
            url: raw.external_urls.and_then(|u| u.spotify),
            preview_url: raw.preview_url,
        }
    }
}
