//! TMDB movie genre ids
//!
//! The list is stable and small enough that fetching `/genre/movie/list`
//! on every start buys nothing.

/// `(id, name)` pairs of the TMDB movie genre list
pub const MOVIE_GENRES: &[(i64, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

/// Look up a genre name by TMDB id
pub fn genre_name(id: i64) -> Option<&'static str> {
    MOVIE_GENRES
        .iter()
        .find(|(genre_id, _)| *genre_id == id)
        .map(|(_, name)| *name)
}

/// Look up a TMDB genre id by name (case-insensitive)
pub fn genre_id(name: &str) -> Option<i64> {
    MOVIE_GENRES
        .iter()
        .find(|(_, genre)| genre.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}
