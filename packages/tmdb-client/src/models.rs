//! TMDB API response models

use serde::{Deserialize, Serialize};

use crate::genres::genre_name;

/// A movie as returned by search and list endpoints, normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    /// TMDB movie id
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    /// Release year parsed from `release_date`
    pub release_year: Option<i32>,
    /// Full poster URL
    pub poster_url: Option<String>,
    /// Canonical genre names
    pub genres: Vec<String>,
}

/// Full movie details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub release_year: Option<i32>,
    pub poster_url: Option<String>,
    pub genres: Vec<String>,
    /// Runtime in minutes
    pub runtime: Option<i32>,
    pub tagline: Option<String>,
    pub vote_average: Option<f64>,
}

impl From<MovieDetails> for MovieSummary {
    fn from(details: MovieDetails) -> Self {
        Self {
            id: details.id,
            title: details.title,
            overview: details.overview,
            release_year: details.release_year,
            poster_url: details.poster_url,
            genres: details.genres,
        }
    }
}

// Internal response types for deserialization

#[derive(Debug, Deserialize)]
pub(crate) struct PagedResponse {
    #[serde(default)]
    pub results: Vec<RawMovie>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMovie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGenre {
    #[allow(dead_code)] // Required for serde deserialization
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMovieDetails {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<RawGenre>,
    pub runtime: Option<i32>,
    pub tagline: Option<String>,
    pub vote_average: Option<f64>,
}

/// TMDB error body (`{"status_code": 7, "status_message": "..."}`)
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub status_message: String,
}

/// Parse the year out of a TMDB `YYYY-MM-DD` date
///
/// TMDB sends `""` for unknown dates.
pub(crate) fn parse_release_year(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl RawMovie {
    pub(crate) fn normalize(self, image_base_url: &str) -> MovieSummary {
        MovieSummary {
            id: self.id,
            title: self.title,
            overview: non_empty(self.overview),
            release_year: parse_release_year(self.release_date.as_deref()),
            poster_url: poster_url(image_base_url, self.poster_path),
            genres: self
                .genre_ids
                .into_iter()
                .filter_map(genre_name)
                .map(str::to_string)
                .collect(),
        }
    }
}

impl RawMovieDetails {
    pub(crate) fn normalize(self, image_base_url: &str) -> MovieDetails {
        MovieDetails {
            id: self.id,
            title: self.title,
            overview: non_empty(self.overview),
            release_year: parse_release_year(self.release_date.as_deref()),
            poster_url: poster_url(image_base_url, self.poster_path),
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            runtime: self.runtime.filter(|r| *r > 0),
            tagline: non_empty(self.tagline),
            vote_average: self.vote_average,
        }
    }
}

fn poster_url(image_base_url: &str, path: Option<String>) -> Option<String> {
    non_empty(path).map(|p| format!("{}{}", image_base_url.trim_end_matches('/'), p))
}
