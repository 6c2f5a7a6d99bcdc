//! Movie catalog types shared by the recommenders, the merger and the
//! response contract

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Canonical movie genres (the TMDB genre list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Genre {
    Action,
    Adventure,
    Animation,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Family,
    Fantasy,
    History,
    Horror,
    Music,
    Mystery,
    Romance,
    ScienceFiction,
    TvMovie,
    Thriller,
    War,
    Western,
}

impl Genre {
    pub const ALL: [Genre; 19] = [
        Genre::Action,
        Genre::Adventure,
        Genre::Animation,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Family,
        Genre::Fantasy,
        Genre::History,
        Genre::Horror,
        Genre::Music,
        Genre::Mystery,
        Genre::Romance,
        Genre::ScienceFiction,
        Genre::TvMovie,
        Genre::Thriller,
        Genre::War,
        Genre::Western,
    ];

    /// Canonical display name, identical to TMDB's
    pub fn name(&self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Family => "Family",
            Genre::Fantasy => "Fantasy",
            Genre::History => "History",
            Genre::Horror => "Horror",
            Genre::Music => "Music",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::ScienceFiction => "Science Fiction",
            Genre::TvMovie => "TV Movie",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }

    /// Words users type for this genre, lowercase. Multi-word aliases use a
    /// single space.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Genre::Action => &["action"],
            Genre::Adventure => &["adventure", "adventures"],
            Genre::Animation => &["animation", "animated", "anime", "cartoon", "cartoons"],
            Genre::Comedy => &["comedy", "comedies"],
            Genre::Crime => &["crime", "gangster", "heist"],
            Genre::Documentary => &["documentary", "documentaries"],
            Genre::Drama => &["drama", "dramas"],
            Genre::Family => &["family", "kids"],
            Genre::Fantasy => &["fantasy"],
            Genre::History => &["history", "historical"],
            Genre::Horror => &["horror", "scary", "slasher"],
            Genre::Music => &["music", "musical", "musicals"],
            Genre::Mystery => &["mystery", "mysteries", "whodunit"],
            Genre::Romance => &["romance", "romantic", "rom-com", "romcom"],
            Genre::ScienceFiction => &["science fiction", "sci-fi", "scifi"],
            Genre::TvMovie => &["tv movie", "tv movies"],
            Genre::Thriller => &["thriller", "thrillers", "suspense"],
            Genre::War => &["war"],
            Genre::Western => &["western", "westerns"],
        }
    }

    /// Parse a canonical name or an alias, case-insensitively
    pub fn parse(value: &str) -> Option<Genre> {
        let normalized = value
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Genre::ALL.into_iter().find(|genre| {
            genre.name().eq_ignore_ascii_case(&normalized) || genre.aliases().contains(&normalized.as_str())
        })
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::parse(s).ok_or_else(|| format!("unknown genre: {}", s))
    }
}

impl Serialize for Genre {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Genre {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Coarse confidence band attached to a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Sort key, lower first
    pub fn rank(self) -> u8 {
        match self {
            Confidence::High => 0,
            Confidence::Medium => 1,
            Confidence::Low => 2,
        }
    }

    /// Band for a cosine similarity score
    pub fn from_similarity(score: f64) -> Self {
        if score >= 0.80 {
            Confidence::High
        } else if score >= 0.65 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// A transient recommendation candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMovie {
    #[serde(deserialize_with = "deserialize_movie_id")]
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, alias = "releaseYear", alias = "year")]
    pub release_year: Option<i32>,
    #[serde(default, alias = "posterUrl", skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl CandidateMovie {
    /// Canonical genres of this candidate; unknown names are ignored
    pub fn parsed_genres(&self) -> impl Iterator<Item = Genre> + '_ {
        self.genres.iter().filter_map(|g| Genre::parse(g))
    }

    pub fn has_genre(&self, genre: Genre) -> bool {
        self.parsed_genres().any(|g| g == genre)
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// LLMs write ids both as numbers and as strings
fn deserialize_movie_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl From<marquee_tmdb_client::MovieSummary> for CandidateMovie {
    fn from(movie: marquee_tmdb_client::MovieSummary) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            overview: movie.overview,
            release_year: movie.release_year,
            poster_url: movie.poster_url,
            genres: movie.genres,
            confidence: None,
        }
    }
}

/// Full details of a movie, used as a recommendation seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub release_year: Option<i32>,
    pub poster_url: Option<String>,
    pub genres: Vec<String>,
    pub runtime: Option<i32>,
    pub tagline: Option<String>,
    pub vote_average: Option<f64>,
}

impl MovieDetails {
    pub fn parsed_genres(&self) -> impl Iterator<Item = Genre> + '_ {
        self.genres.iter().filter_map(|g| Genre::parse(g))
    }

    /// Text embedded for semantic similarity
    pub fn embedding_text(&self) -> String {
        let mut text = self.title.clone();
        if !self.genres.is_empty() {
            text.push_str(". Genres: ");
            text.push_str(&self.genres.join(", "));
        }
        if let Some(tagline) = &self.tagline {
            text.push_str(". ");
            text.push_str(tagline);
        }
        if let Some(overview) = &self.overview {
            text.push_str(". ");
            text.push_str(overview);
        }
        text
    }
}

impl From<MovieDetails> for CandidateMovie {
    fn from(details: MovieDetails) -> Self {
        Self {
            id: details.id,
            title: details.title,
            overview: details.overview,
            release_year: details.release_year,
            poster_url: details.poster_url,
            genres: details.genres,
            confidence: None,
        }
    }
}

/// A catalog list entry carries no runtime, tagline or rating
impl From<CandidateMovie> for MovieDetails {
    fn from(movie: CandidateMovie) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            overview: movie.overview,
            release_year: movie.release_year,
            poster_url: movie.poster_url,
            genres: movie.genres,
            runtime: None,
            tagline: None,
            vote_average: None,
        }
    }
}

impl From<marquee_tmdb_client::MovieDetails> for MovieDetails {
    fn from(details: marquee_tmdb_client::MovieDetails) -> Self {
        Self {
            id: details.id,
            title: details.title,
            overview: details.overview,
            release_year: details.release_year,
            poster_url: details.poster_url,
            genres: details.genres,
            runtime: details.runtime,
            tagline: details.tagline,
            vote_average: details.vote_average,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_genre_parse_names_and_aliases() {
        assert_eq!(Genre::parse("Horror"), Some(Genre::Horror));
        assert_eq!(Genre::parse("sci-fi"), Some(Genre::ScienceFiction));
        assert_eq!(Genre::parse("Science   Fiction"), Some(Genre::ScienceFiction));
        assert_eq!(Genre::parse("TV Movie"), Some(Genre::TvMovie));
        assert_eq!(Genre::parse("ROM-COM"), Some(Genre::Romance));
        assert_eq!(Genre::parse("polka"), None);
    }

    #[test]
    fn test_genre_names_match_tmdb() {
        for genre in Genre::ALL {
            assert!(
                marquee_tmdb_client::genres::genre_id(genre.name()).is_some(),
                "{} missing from TMDB list",
                genre
            );
        }
    }

    #[test]
    fn test_genre_serde_uses_canonical_name() {
        assert_eq!(
            serde_json::to_string(&Genre::ScienceFiction).unwrap(),
            r#""Science Fiction""#
        );
        let genre: Genre = serde_json::from_str(r#""scifi""#).unwrap();
        assert_eq!(genre, Genre::ScienceFiction);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(Confidence::from_similarity(0.91), Confidence::High);
        assert_eq!(Confidence::from_similarity(0.80), Confidence::High);
        assert_eq!(Confidence::from_similarity(0.70), Confidence::Medium);
        assert_eq!(Confidence::from_similarity(0.20), Confidence::Low);
        assert!(Confidence::High.rank() < Confidence::Low.rank());
    }

    #[test]
    fn test_candidate_accepts_string_ids_and_camel_case() {
        let movie: CandidateMovie = serde_json::from_value(json!({
            "id": "27205",
            "title": "Inception",
            "releaseYear": 2010,
            "posterUrl": "https://image.tmdb.org/t/p/w500/x.jpg"
        }))
        .unwrap();
        assert_eq!(movie.id, 27205);
        assert_eq!(movie.release_year, Some(2010));
        assert!(movie.genres.is_empty());
        assert!(movie.confidence.is_none());
    }

    #[test]
    fn test_candidate_genre_matching() {
        let movie = CandidateMovie {
            id: 1,
            title: "Alien".to_string(),
            overview: None,
            release_year: Some(1979),
            poster_url: None,
            genres: vec!["Horror".to_string(), "Science Fiction".to_string()],
            confidence: None,
        };
        assert!(movie.has_genre(Genre::Horror));
        assert!(!movie.has_genre(Genre::Comedy));
    }

    #[test]
    fn test_embedding_text() {
        let details = MovieDetails {
            id: 1,
            title: "Inception".to_string(),
            overview: Some("Dreams.".to_string()),
            release_year: Some(2010),
            poster_url: None,
            genres: vec!["Action".to_string()],
            runtime: None,
            tagline: None,
            vote_average: None,
        };
        assert_eq!(details.embedding_text(), "Inception. Genres: Action. Dreams.");
    }
}
