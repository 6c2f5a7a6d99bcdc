//! Deterministic constraint extraction from user utterances
//!
//! Pure text analysis: excluded genres, excluded titles, year bounds, a seed
//! title and recommendation intent. Extraction never fails; no match yields
//! the empty value. Negation scoping is whole-message.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;

use crate::models::Genre;
use crate::services::filters::MovieFilters;

/// Years subtracted from the current year for a bare recency cue
const RECENCY_WINDOW_YEARS: i32 = 15;

/// Prior user turns whose negations still apply to the current turn
const NEGATION_MEMORY_TURNS: usize = 2;

// ==================== Patterns ====================

static NEGATION_CUE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:avoid|no|without|exclude|skip)\b").ok());

// One pattern per (genre, alias); multi-word aliases tolerate any whitespace
static GENRE_ALIASES: LazyLock<Vec<(Genre, Regex)>> = LazyLock::new(|| {
    Genre::ALL
        .into_iter()
        .flat_map(|genre| genre.aliases().iter().map(move |alias| (genre, *alias)))
        .filter_map(|(genre, alias)| {
            let escaped = regex::escape(alias).replace(' ', r"\s+");
            Regex::new(&format!(r"(?i)\b{}\b", escaped)).ok().map(|re| (genre, re))
        })
        .collect()
});

static AFTER_YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:after|since)\s+(\d{4})\b").ok());

static AT_LEAST_YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bat\s+least\s+(?:from\s+|since\s+)?(\d{4})\b").ok());

static NOT_AS_OLD_AS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bnot\s+as\s+old\s+as\s+([^,.;!?]+)").ok());

static LAST_N_YEARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:last|past)\s+(\d{1,3})\s+years?\b").ok());

static RECENCY_CUE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:recent|newer|latest|modern)\b").ok());

static BEFORE_YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:before|older\s+than)\s+(\d{4})\b").ok());

static QUOTED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"["\x{201C}]([^"\x{201C}\x{201D}]+)["\x{201D}]"#).ok());

static LIKE_SEED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:like|similar\s+to)\s+(.+)").ok());

// Where a seed title stops
static SEED_TERMINATOR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:but|and|without|avoid)\b|[,.;!?]").ok());

static FRANCHISE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\bavoid\b.*?\bthe\s+(.+?)\s+(?:saga|series|franchise)\b").ok()
});

static FOLLOW_UP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:more|another|again|other\s+ones)\b").ok());

const INTENT_PHRASES: [&str; 5] = ["recommend", "recommendation", "movies like", "similar to", "suggest"];

// Words directly before "like" that make it a verb, not a comparison
const LIKE_AS_VERB: [&str; 6] = ["would", "i'd", "i\u{2019}d", "id", "i", "we"];

fn is_match(pattern: &Option<Regex>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

fn capture_year(pattern: &Option<Regex>, text: &str) -> Option<i32> {
    pattern
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '\u{201C}' || c == '\u{201D}')
        .trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

// ==================== Extractors ====================

pub fn has_negation_cue(text: &str) -> bool {
    is_match(&NEGATION_CUE, text)
}

/// Genres the user asked to avoid
///
/// Without a negation cue nothing is excluded. With one, every genre alias
/// found anywhere in the message is excluded.
pub fn extract_excluded_genres(text: &str) -> BTreeSet<Genre> {
    if !has_negation_cue(text) {
        return BTreeSet::new();
    }

    GENRE_ALIASES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(genre, _)| *genre)
        .collect()
}

/// Release-year bounds stated in a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearConstraints {
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    /// "not as old as <title>": the caller resolves the title's release year
    pub not_older_than_title: Option<String>,
}

impl YearConstraints {
    /// Set the lower bound from the release year of `not_older_than_title`
    pub fn resolve_not_older_than(&mut self, release_year: i32) {
        if self.min_year.is_none() && self.not_older_than_title.is_some() {
            self.min_year = Some(release_year + 1);
        }
    }
}

pub fn extract_year_constraints(text: &str) -> YearConstraints {
    extract_year_constraints_at(text, current_year())
}

/// Year bounds relative to an explicit current year
///
/// Lower bound precedence, first match wins: after/since, at least,
/// not as old as, last/past N years, recency cue.
pub fn extract_year_constraints_at(text: &str, current_year: i32) -> YearConstraints {
    let mut constraints = YearConstraints {
        max_year: capture_year(&BEFORE_YEAR, text),
        ..Default::default()
    };

    if let Some(year) = capture_year(&AFTER_YEAR, text) {
        constraints.min_year = Some(year);
    } else if let Some(year) = capture_year(&AT_LEAST_YEAR, text) {
        constraints.min_year = Some(year);
    } else if let Some(title) = NOT_AS_OLD_AS
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| clean_title(m.as_str()))
    {
        constraints.not_older_than_title = Some(title);
    } else if let Some(years) = capture_year(&LAST_N_YEARS, text) {
        constraints.min_year = Some(current_year - years);
    } else if is_match(&RECENCY_CUE, text) {
        constraints.min_year = Some(current_year - RECENCY_WINDOW_YEARS);
    }

    constraints
}

/// The title a recommendation should be seeded from
///
/// A title the same message asks to avoid is never a seed.
pub fn extract_seed_title(text: &str) -> Option<String> {
    let excluded = extract_excluded_titles(text);
    let is_excluded = |title: &str| excluded.iter().any(|t| t.eq_ignore_ascii_case(title));

    if let Some(title) = QUOTED.as_ref().and_then(|re| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| clean_title(m.as_str()))
            .find(|title| !is_excluded(title))
    }) {
        return Some(title);
    }

    like_seed(text).filter(|title| !is_excluded(title))
}

fn like_seed(text: &str) -> Option<String> {
    let like = LIKE_SEED.as_ref()?;
    let mut offset = 0;
    while let Some(caps) = like.captures_at(text, offset) {
        let (Some(whole), Some(rest)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        offset = whole.end().min(whole.start() + 1);

        let preceding = text[..whole.start()].trim_end().to_lowercase();
        let previous_word = preceding.rsplit(char::is_whitespace).next().unwrap_or("");
        if LIKE_AS_VERB.contains(&previous_word) {
            continue;
        }

        let candidate = rest.as_str();
        let end = SEED_TERMINATOR
            .as_ref()
            .and_then(|re| re.find(candidate))
            .map_or(candidate.len(), |m| m.start());
        return clean_title(&candidate[..end]);
    }

    None
}

/// Titles the user asked to avoid
///
/// Quoted titles after the first negation cue, plus "avoid ... the X
/// saga/series/franchise".
pub fn extract_excluded_titles(text: &str) -> BTreeSet<String> {
    let Some(cue) = NEGATION_CUE.as_ref().and_then(|re| re.find(text)) else {
        return BTreeSet::new();
    };

    let mut titles = BTreeSet::new();

    if let Some(quoted) = QUOTED.as_ref() {
        titles.extend(
            quoted
                .captures_iter(&text[cue.start()..])
                .filter_map(|caps| caps.get(1))
                .filter_map(|m| clean_title(m.as_str())),
        );
    }

    if let Some(franchise) = FRANCHISE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| clean_title(m.as_str()))
    {
        titles.insert(franchise);
    }

    titles
}

pub fn is_recommendation_intent(text: &str) -> bool {
    let lower = text.to_lowercase();
    INTENT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

pub fn is_follow_up(text: &str) -> bool {
    is_match(&FOLLOW_UP, text)
}

// ==================== Turn Constraints ====================

/// Everything extracted for one conversation turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnConstraints {
    pub seed_title: Option<String>,
    pub excluded_genres: BTreeSet<Genre>,
    pub excluded_titles: BTreeSet<String>,
    pub years: YearConstraints,
}

impl TurnConstraints {
    pub fn from_turns(current: &str, prior_user_turns: &[&str]) -> Self {
        Self::from_turns_at(current, prior_user_turns, current_year())
    }

    /// `prior_user_turns` are oldest first
    ///
    /// Negations accumulate over the current message and the last two prior
    /// turns. Year bounds come from the current message only. A follow-up
    /// without its own seed reuses the most recent prior one.
    pub fn from_turns_at(current: &str, prior_user_turns: &[&str], current_year: i32) -> Self {
        let recent = &prior_user_turns[prior_user_turns.len().saturating_sub(NEGATION_MEMORY_TURNS)..];

        let mut excluded_genres = extract_excluded_genres(current);
        let mut excluded_titles = extract_excluded_titles(current);
        for turn in recent {
            excluded_genres.extend(extract_excluded_genres(turn));
            excluded_titles.extend(extract_excluded_titles(turn));
        }

        let seed_title = extract_seed_title(current).or_else(|| {
            if is_follow_up(current) {
                prior_user_turns.iter().rev().find_map(|turn| extract_seed_title(turn))
            } else {
                None
            }
        });

        Self {
            seed_title,
            excluded_genres,
            excluded_titles,
            years: extract_year_constraints_at(current, current_year),
        }
    }

    pub fn filters(&self) -> MovieFilters {
        MovieFilters::new(
            self.excluded_genres.clone(),
            self.years.min_year,
            self.years.max_year,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_no_negation_cue_excludes_nothing() {
        let text = "I love horror and \"Alien\"";
        assert!(extract_excluded_genres(text).is_empty());
        assert!(extract_excluded_titles(text).is_empty());
    }

    #[test]
    fn test_avoid_genre_any_case() {
        assert_eq!(
            extract_excluded_genres("Please AVOID Horror"),
            BTreeSet::from([Genre::Horror])
        );
        assert_eq!(
            extract_excluded_genres("no sci-fi, skip rom-com"),
            BTreeSet::from([Genre::ScienceFiction, Genre::Romance])
        );
    }

    #[test]
    fn test_negation_cue_is_whole_word() {
        // "know" and "nothing" must not count as "no"
        assert!(extract_excluded_genres("I know nothing about horror").is_empty());
    }

    #[test]
    fn test_year_after_and_before() {
        let years = extract_year_constraints_at("movies after 2015", 2026);
        assert_eq!(years.min_year, Some(2015));
        assert_eq!(years.max_year, None);

        let years = extract_year_constraints_at("something older than 1990", 2026);
        assert_eq!(years.min_year, None);
        assert_eq!(years.max_year, Some(1990));
    }

    #[test]
    fn test_year_relative_bounds() {
        assert_eq!(
            extract_year_constraints_at("from the last 10 years", 2026).min_year,
            Some(2016)
        );
        assert_eq!(
            extract_year_constraints_at("something recent", 2026).min_year,
            Some(2011)
        );
    }

    #[test]
    fn test_year_precedence() {
        let years = extract_year_constraints_at("recent movies, at least 2000, since 2010", 2026);
        assert_eq!(years.min_year, Some(2010));

        let years = extract_year_constraints_at("at least from 2005 and recent", 2026);
        assert_eq!(years.min_year, Some(2005));
    }

    #[test]
    fn test_not_as_old_as_is_deferred() {
        let mut years = extract_year_constraints_at("not as old as The Matrix, please", 2026);
        assert_eq!(years.min_year, None);
        assert_eq!(years.not_older_than_title.as_deref(), Some("The Matrix"));

        years.resolve_not_older_than(1999);
        assert_eq!(years.min_year, Some(2000));
    }

    #[test]
    fn test_seed_title_quoted_wins() {
        assert_eq!(
            extract_seed_title("movies like Heat or \u{201C}Blade Runner\u{201D}").as_deref(),
            Some("Blade Runner")
        );
    }

    #[test]
    fn test_avoided_quoted_title_is_not_a_seed() {
        assert_eq!(extract_seed_title("avoid \"Alien\", recommend something"), None);
        assert_eq!(
            extract_seed_title("no \"Alien\" this time; something like Arrival").as_deref(),
            Some("Arrival")
        );
        assert_eq!(
            extract_seed_title("\"Dune\" please, but no \"Alien\"").as_deref(),
            Some("Dune")
        );
    }

    #[test]
    fn test_seed_title_like_truncates() {
        assert_eq!(
            extract_seed_title("Give me movies like Inception but avoid horror, after 2015").as_deref(),
            Some("Inception")
        );
        assert_eq!(
            extract_seed_title("something similar to The Dark Knight and more").as_deref(),
            Some("The Dark Knight")
        );
    }

    #[test]
    fn test_would_like_is_not_a_seed() {
        assert_eq!(extract_seed_title("I would like a comedy"), None);
        assert_eq!(extract_seed_title("I'd like something fun"), None);
        assert_eq!(
            extract_seed_title("I'd like movies like Arrival").as_deref(),
            Some("Arrival")
        );
    }

    #[test]
    fn test_excluded_titles_after_cue() {
        let titles = extract_excluded_titles("Like \"Dune\" but avoid \"Alien\" and the Star Wars saga");
        assert_eq!(
            titles,
            BTreeSet::from(["Alien".to_string(), "Star Wars".to_string()])
        );
    }

    #[rstest]
    #[case("Can you RECOMMEND something?", true)]
    #[case("movies like Heat", true)]
    #[case("anything similar to Alien", true)]
    #[case("suggest a comedy", true)]
    #[case("what year did Heat come out?", false)]
    #[case("I like Heat", false)]
    fn test_recommendation_intent(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_recommendation_intent(text), expected);
    }

    #[test]
    fn test_turn_constraints_accumulate_negations() {
        let prior = ["avoid horror please", "movies like Arrival"];
        let turn = TurnConstraints::from_turns_at("show me more", &prior, 2026);

        assert_eq!(turn.excluded_genres, BTreeSet::from([Genre::Horror]));
        assert_eq!(turn.seed_title.as_deref(), Some("Arrival"));
        assert_eq!(turn.years, YearConstraints::default());
    }

    #[test]
    fn test_turn_constraints_forget_old_negations() {
        let prior = ["no comedy", "hello", "thanks"];
        let turn = TurnConstraints::from_turns_at("recommend something", &prior, 2026);
        assert!(turn.excluded_genres.is_empty());
        assert_eq!(turn.seed_title, None);
    }

    #[test]
    fn test_turn_filters() {
        let turn = TurnConstraints::from_turns_at(
            "Give me movies like Inception but avoid horror, after 2015",
            &[],
            2026,
        );
        let filters = turn.filters();
        assert_eq!(filters.min_year, Some(2015));
        assert!(filters.excluded_genres.contains(&Genre::Horror));
    }
}
