//! Watch history and feedback models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A movie the user marked as watched
///
/// Unique per (user_id, movie_id); re-saving refreshes `title` and `updated_at`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct WatchedMovie {
    pub id: Uuid,
    pub user_id: String,
    /// TMDB movie id
    pub movie_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of item a rating refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Movie,
    Track,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Movie => "movie",
            ItemType::Track => "track",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thumbs up / thumbs down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rating {
    Up,
    Down,
}

impl Rating {
    /// Stored value (+1 / -1)
    pub fn value(self) -> i16 {
        match self {
            Rating::Up => 1,
            Rating::Down => -1,
        }
    }

    /// Parse a stored or requested value; only +1 and -1 are ratings
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Rating::Up),
            -1 => Some(Rating::Down),
            _ => None,
        }
    }
}

impl Serialize for Rating {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(self.value())
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Rating::from_value(value)
            .ok_or_else(|| serde::de::Error::custom(format!("rating must be 1 or -1, got {}", value)))
    }
}

/// Feedback record from the feedback table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: String,
    pub item_type: ItemType,
    pub item_id: String,
    /// +1 or -1
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}

/// What a feedback toggle does to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackToggle {
    /// Same rating requested again: back to neutral
    Delete,
    /// Insert, or replace the opposite rating
    Upsert(Rating),
}

impl FeedbackToggle {
    /// Decide the toggle outcome from the currently stored rating
    pub fn resolve(existing: Option<i16>, requested: Rating) -> Self {
        match existing {
            Some(value) if value == requested.value() => FeedbackToggle::Delete,
            _ => FeedbackToggle::Upsert(requested),
        }
    }

    /// Rating left in place after the toggle
    pub fn resulting_rating(self) -> Option<Rating> {
        match self {
            FeedbackToggle::Delete => None,
            FeedbackToggle::Upsert(rating) => Some(rating),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_values() {
        assert_eq!(Rating::Up.value(), 1);
        assert_eq!(Rating::Down.value(), -1);
        assert_eq!(Rating::from_value(1), Some(Rating::Up));
        assert_eq!(Rating::from_value(0), None);
        assert_eq!(Rating::from_value(5), None);
    }

    #[test]
    fn test_rating_serde() {
        assert_eq!(serde_json::to_string(&Rating::Down).unwrap(), "-1");
        let rating: Rating = serde_json::from_str("1").unwrap();
        assert_eq!(rating, Rating::Up);
        assert!(serde_json::from_str::<Rating>("2").is_err());
    }

    #[test]
    fn test_toggle_new_rating() {
        assert_eq!(
            FeedbackToggle::resolve(None, Rating::Up),
            FeedbackToggle::Upsert(Rating::Up)
        );
    }

    #[test]
    fn test_toggle_same_rating_clears() {
        let toggle = FeedbackToggle::resolve(Some(1), Rating::Up);
        assert_eq!(toggle, FeedbackToggle::Delete);
        assert_eq!(toggle.resulting_rating(), None);
    }

    #[test]
    fn test_toggle_opposite_rating_replaces() {
        let toggle = FeedbackToggle::resolve(Some(1), Rating::Down);
        assert_eq!(toggle, FeedbackToggle::Upsert(Rating::Down));
        assert_eq!(toggle.resulting_rating(), Some(Rating::Down));
    }

    #[test]
    fn test_item_type_serialization() {
        assert_eq!(serde_json::to_string(&ItemType::Movie).unwrap(), r#""movie""#);
        let t: ItemType = serde_json::from_str(r#""track""#).unwrap();
        assert_eq!(t, ItemType::Track);
    }
}
