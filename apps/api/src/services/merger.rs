//! Recommendation merger for the deterministic fast path
//!
//! Sources, in order: semantic neighbors of an explicit seed, the catalog's
//! own recommendations for that seed, then an aggregate over the user's
//! recent watches. Each source degrades to an empty list on failure.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use crate::models::{CandidateMovie, Confidence, Genre, MovieDetails, WatchedMovie};
use crate::repositories::HistoryStore;
use crate::services::catalog::Catalog;
use crate::services::constraints::TurnConstraints;
use crate::services::filters::{dedupe_by_id, exclude_titles, retain_sticky_genres, MovieFilters};
use crate::services::response::AssistantPayload;
use crate::services::semantic::{spawn_indexing, SemanticRecommender};

/// Cap for a list drawn from one source
pub const SINGLE_SOURCE_LIMIT: usize = 10;

/// Cap for a list merged from several endpoints, before final filtering
pub const MERGED_SOURCE_LIMIT: usize = 20;

/// Recent watches used as seeds when no title was given
pub const HISTORY_SEED_COUNT: i64 = 3;

/// Which source produced the final list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    Semantic,
    Catalog,
    History,
}

impl RecommendationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationSource::Semantic => "semantic",
            RecommendationSource::Catalog => "catalog",
            RecommendationSource::History => "history",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergedRecommendations {
    pub payload: AssistantPayload,
    pub source: RecommendationSource,
}

pub struct RecommendationMerger {
    catalog: Arc<dyn Catalog>,
    semantic: Arc<dyn SemanticRecommender>,
    history: Arc<dyn HistoryStore>,
    sticky_genres: BTreeSet<Genre>,
}

impl RecommendationMerger {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        semantic: Arc<dyn SemanticRecommender>,
        history: Arc<dyn HistoryStore>,
        sticky_genres: BTreeSet<Genre>,
    ) -> Self {
        Self {
            catalog,
            semantic,
            history,
            sticky_genres,
        }
    }

    /// Merge recommendations for one turn, or `None` when every source came
    /// back empty
    #[instrument(skip(self, constraints), fields(seed = ?constraints.seed_title))]
    pub async fn recommend(&self, user_id: &str, constraints: &TurnConstraints) -> Option<MergedRecommendations> {
        let mut years = constraints.years.clone();
        if let Some(title) = years.not_older_than_title.clone() {
            match self.resolve_seed(&title).await {
                Some(reference) => {
                    if let Some(year) = reference.release_year {
                        years.resolve_not_older_than(year);
                    }
                }
                None => debug!(title = %title, "Could not resolve 'not as old as' reference"),
            }
        }

        let filters = MovieFilters::new(constraints.excluded_genres.clone(), years.min_year, years.max_year);

        if let Some(seed_title) = constraints.seed_title.as_deref() {
            if let Some(seed) = self.resolve_seed(seed_title).await {
                let (movies, source) = self.seeded(&seed, &filters, &constraints.excluded_titles).await;
                if !movies.is_empty() {
                    return Some(finish(movies, source, Some(&seed), &[], &filters));
                }
            }
        }

        let (movies, seeds) = self.from_history(user_id, &filters, &constraints.excluded_titles).await;
        if movies.is_empty() {
            debug!("No recommendation source produced results");
            return None;
        }

        Some(finish(movies, RecommendationSource::History, None, &seeds, &filters))
    }

    /// First catalog search hit, expanded to full details
    async fn resolve_seed(&self, title: &str) -> Option<MovieDetails> {
        let hits = match self.catalog.search_movies(title, None).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, title = %title, "Seed search failed");
                return None;
            }
        };

        let first = hits.into_iter().next()?;
        match self.catalog.movie_details(first.id).await {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(error = %e, movie_id = first.id, "Seed details failed");
                None
            }
        }
    }

    async fn seeded(
        &self,
        seed: &MovieDetails,
        filters: &MovieFilters,
        excluded_titles: &BTreeSet<String>,
    ) -> (Vec<CandidateMovie>, RecommendationSource) {
        let seed_genres: Vec<Genre> = seed.parsed_genres().collect();

        let semantic = match self.semantic.recommend(seed, filters, SINGLE_SOURCE_LIMIT).await {
            Ok(movies) => movies,
            Err(e) => {
                warn!(error = %e, seed_id = seed.id, "Semantic recommender failed");
                Vec::new()
            }
        };
        let semantic = self.post_filter(semantic, seed.id, &seed_genres, filters, excluded_titles);
        if !semantic.is_empty() {
            return (semantic, RecommendationSource::Semantic);
        }

        debug!(seed_id = seed.id, "Semantic path empty, falling back to catalog");
        let (recommended, similar) = tokio::join!(
            self.catalog.recommendations(seed.id),
            self.catalog.similar(seed.id)
        );
        let recommended = recommended.unwrap_or_else(|e| {
            warn!(error = %e, "Catalog recommendations failed");
            Vec::new()
        });
        let similar = similar.unwrap_or_else(|e| {
            warn!(error = %e, "Catalog similar failed");
            Vec::new()
        });

        let merged = merge_catalog_lists(recommended, similar);
        spawn_indexing(self.semantic.clone(), merged.clone());
        let catalog = self.post_filter(merged, seed.id, &seed_genres, filters, excluded_titles);
        (catalog, RecommendationSource::Catalog)
    }

    async fn from_history(
        &self,
        user_id: &str,
        filters: &MovieFilters,
        excluded_titles: &BTreeSet<String>,
    ) -> (Vec<CandidateMovie>, Vec<WatchedMovie>) {
        let watched = match self.history.get_history(user_id, HISTORY_SEED_COUNT).await {
            Ok(watched) => watched,
            Err(e) => {
                warn!(error = %e, "Failed to load watch history");
                return (Vec::new(), Vec::new());
            }
        };
        if watched.is_empty() {
            return (Vec::new(), watched);
        }

        let lists = join_all(watched.iter().map(|w| self.catalog.recommendations(w.movie_id))).await;

        let watched_ids: HashSet<i64> = watched.iter().map(|w| w.movie_id).collect();
        let mut seed_counts: HashMap<i64, usize> = HashMap::new();
        let mut flattened = Vec::new();
        for (seed, list) in watched.iter().zip(lists) {
            match list {
                Ok(movies) => {
                    for movie in dedupe_by_id(movies) {
                        *seed_counts.entry(movie.id).or_default() += 1;
                        flattened.push(movie);
                    }
                }
                Err(e) => warn!(error = %e, movie_id = seed.movie_id, "History seed recommendations failed"),
            }
        }

        let flattened = dedupe_by_id(flattened);
        spawn_indexing(self.semantic.clone(), flattened.clone());

        let movies: Vec<CandidateMovie> = flattened
            .into_iter()
            .filter(|m| !watched_ids.contains(&m.id))
            .map(|m| {
                let confidence = if seed_counts.get(&m.id).copied().unwrap_or(0) >= 2 {
                    Confidence::High
                } else {
                    Confidence::Medium
                };
                m.with_confidence(confidence)
            })
            .collect();

        let movies = exclude_titles(filters.apply(movies), excluded_titles);
        (movies.into_iter().take(SINGLE_SOURCE_LIMIT).collect(), watched)
    }

    fn post_filter(
        &self,
        movies: Vec<CandidateMovie>,
        seed_id: i64,
        seed_genres: &[Genre],
        filters: &MovieFilters,
        excluded_titles: &BTreeSet<String>,
    ) -> Vec<CandidateMovie> {
        let movies: Vec<CandidateMovie> = movies.into_iter().filter(|m| m.id != seed_id).collect();
        let movies = filters.apply(movies);
        let movies = retain_sticky_genres(movies, seed_genres, &self.sticky_genres);
        exclude_titles(movies, excluded_titles)
    }
}

/// Recommended ahead of similar, deduped, capped; ids returned by both
/// endpoints are high confidence
fn merge_catalog_lists(recommended: Vec<CandidateMovie>, similar: Vec<CandidateMovie>) -> Vec<CandidateMovie> {
    let recommended_ids: HashSet<i64> = recommended.iter().map(|m| m.id).collect();
    let similar_ids: HashSet<i64> = similar.iter().map(|m| m.id).collect();

    dedupe_by_id(recommended.into_iter().chain(similar).collect())
        .into_iter()
        .take(MERGED_SOURCE_LIMIT)
        .map(|m| {
            let confidence = if recommended_ids.contains(&m.id) && similar_ids.contains(&m.id) {
                Confidence::High
            } else {
                Confidence::Medium
            };
            m.with_confidence(confidence)
        })
        .collect()
}

/// Stable sort by confidence band, cap, and describe the result
fn finish(
    mut movies: Vec<CandidateMovie>,
    source: RecommendationSource,
    seed: Option<&MovieDetails>,
    history_seeds: &[WatchedMovie],
    filters: &MovieFilters,
) -> MergedRecommendations {
    movies.sort_by_key(|m| m.confidence.map_or(Confidence::Low.rank(), Confidence::rank));
    movies.truncate(SINGLE_SOURCE_LIMIT);

    let count = movies.len();
    let noun = if count == 1 { "movie" } else { "movies" };
    let message = match seed {
        Some(seed) => format!("Here are {} {} like {}.", count, noun, seed.title),
        None => format!("Here are {} {} based on what you've watched recently.", count, noun),
    };

    let basis = match (source, seed) {
        (RecommendationSource::Semantic, Some(seed)) => {
            format!("These share themes and tone with {}", seed.title)
        }
        (_, Some(seed)) => format!("These are TMDB's closest matches to {}", seed.title),
        (_, None) => {
            let titles: Vec<&str> = history_seeds.iter().map(|w| w.title.as_str()).collect();
            format!("These are recommended from your recent watches ({})", titles.join(", "))
        }
    };

    MergedRecommendations {
        payload: AssistantPayload {
            message,
            reasoning: format!("{}{}.", basis, describe_filters(filters)),
            movies,
            tracks: Vec::new(),
        },
        source,
    }
}

fn describe_filters(filters: &MovieFilters) -> String {
    let mut parts = Vec::new();
    if !filters.excluded_genres.is_empty() {
        let genres: Vec<&str> = filters.excluded_genres.iter().map(Genre::name).collect();
        parts.push(format!("excluding {}", genres.join(" and ")));
    }
    match (filters.min_year, filters.max_year) {
        (Some(min), Some(max)) => parts.push(format!("released between {} and {}", min, max)),
        (Some(min), None) => parts.push(format!("released {} or later", min)),
        (None, Some(max)) => parts.push(format!("released {} or earlier", max)),
        (None, None) => {}
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!(", {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64) -> CandidateMovie {
        CandidateMovie {
            id,
            title: format!("Movie {}", id),
            overview: None,
            release_year: Some(2020),
            poster_url: None,
            genres: Vec::new(),
            confidence: None,
        }
    }

    #[test]
    fn test_catalog_merge_upgrades_shared_ids() {
        let merged = merge_catalog_lists(vec![movie(1), movie(2)], vec![movie(2), movie(3)]);
        let ids: Vec<i64> = merged.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(merged[0].confidence, Some(Confidence::Medium));
        assert_eq!(merged[1].confidence, Some(Confidence::High));
    }

    #[test]
    fn test_catalog_merge_caps() {
        let recommended = (1..=15).map(movie).collect();
        let similar = (16..=30).map(movie).collect();
        assert_eq!(merge_catalog_lists(recommended, similar).len(), MERGED_SOURCE_LIMIT);
    }

    #[test]
    fn test_finish_sorts_stably_and_caps() {
        let movies: Vec<CandidateMovie> = (1..=12)
            .map(|id| {
                let confidence = if id % 3 == 0 { Confidence::High } else { Confidence::Medium };
                movie(id).with_confidence(confidence)
            })
            .collect();

        let merged = finish(
            movies,
            RecommendationSource::Catalog,
            None,
            &[],
            &MovieFilters::default(),
        );
        let ids: Vec<i64> = merged.payload.movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 6, 9, 12, 1, 2, 4, 5, 7, 8]);
        assert!(!merged.payload.reasoning.is_empty());
    }

    #[test]
    fn test_describe_filters() {
        let filters = MovieFilters::new(BTreeSet::from([Genre::Horror]), Some(2015), None);
        assert_eq!(describe_filters(&filters), ", excluding Horror, released 2015 or later");
        assert_eq!(describe_filters(&MovieFilters::default()), "");
    }
}
