//! Database models and domain types for Marquee
//!
//! This module contains SQLx models for:
//! - Conversations and messages
//! - Watch history and feedback
//!
//! and the transient movie types passed between the recommenders.

pub mod chat;
pub mod history;
pub mod movie;

pub use chat::{Conversation, Message, MessageRole, NewMessage};
pub use history::{Feedback, FeedbackToggle, ItemType, Rating, WatchedMovie};
pub use movie::{CandidateMovie, Confidence, Genre, MovieDetails};
