//! Candidate filtering shared by the merger, the semantic recommender and
//! the catalog tools

use std::collections::{BTreeSet, HashSet};

use crate::models::{CandidateMovie, Genre};

/// Genre and year constraints applied to every candidate list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieFilters {
    pub excluded_genres: BTreeSet<Genre>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

impl MovieFilters {
    pub fn new(excluded_genres: BTreeSet<Genre>, min_year: Option<i32>, max_year: Option<i32>) -> Self {
        Self {
            excluded_genres,
            min_year,
            max_year,
        }
    }

    pub fn has_year_bounds(&self) -> bool {
        self.min_year.is_some() || self.max_year.is_some()
    }

    /// Whether a candidate survives the filters
    ///
    /// A candidate without a release year never survives an active year bound.
    pub fn matches(&self, movie: &CandidateMovie) -> bool {
        if movie.parsed_genres().any(|g| self.excluded_genres.contains(&g)) {
            return false;
        }

        if !self.has_year_bounds() {
            return true;
        }

        let Some(year) = movie.release_year else {
            return false;
        };
        self.min_year.map_or(true, |min| year >= min) && self.max_year.map_or(true, |max| year <= max)
    }

    pub fn apply(&self, movies: Vec<CandidateMovie>) -> Vec<CandidateMovie> {
        movies.into_iter().filter(|m| self.matches(m)).collect()
    }
}

/// Keep the first occurrence of every id, preserving order
pub fn dedupe_by_id(movies: Vec<CandidateMovie>) -> Vec<CandidateMovie> {
    let mut seen = HashSet::with_capacity(movies.len());
    movies.into_iter().filter(|m| seen.insert(m.id)).collect()
}

/// Drop candidates whose title contains any excluded title (case-insensitive)
pub fn exclude_titles(movies: Vec<CandidateMovie>, excluded: &BTreeSet<String>) -> Vec<CandidateMovie> {
    if excluded.is_empty() {
        return movies;
    }

    let needles: Vec<String> = excluded
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    movies
        .into_iter()
        .filter(|m| {
            let title = m.title.to_lowercase();
            !needles.iter().any(|needle| title.contains(needle))
        })
        .collect()
}

/// Keep only candidates sharing every sticky genre the seed carries
pub fn retain_sticky_genres(
    movies: Vec<CandidateMovie>,
    seed_genres: &[Genre],
    sticky: &BTreeSet<Genre>,
) -> Vec<CandidateMovie> {
    let required: Vec<Genre> = seed_genres.iter().copied().filter(|g| sticky.contains(g)).collect();
    if required.is_empty() {
        return movies;
    }

    movies
        .into_iter()
        .filter(|m| required.iter().all(|g| m.has_genre(*g)))
        .collect()
}
