//! Business logic services for Marquee
//!
//! - Constraint extraction and candidate filtering
//! - Catalog and semantic recommenders behind traits
//! - The recommendation merger (fast path)
//! - Tool registry and the chat turn driver
//! - Health checks

pub mod catalog;
pub mod chat;
pub mod constraints;
pub mod filters;
pub mod health;
pub mod merger;
pub mod response;
pub mod semantic;
pub mod tools;

pub use catalog::{Catalog, CatalogError, CatalogResult, TrackCatalog};
pub use chat::{ChatError, ChatResult, ChatService, ChatTurn, ClearScope, ClearSummary, Transcript};
pub use filters::MovieFilters;
pub use health::HealthService;
pub use merger::RecommendationMerger;
pub use response::{parse_assistant_content, AssistantContent, AssistantPayload};
pub use semantic::{spawn_indexing, PgSemanticRecommender, SemanticError, SemanticRecommender};
pub use tools::{DebugEvent, DebugEventKind, ToolOutcome, ToolRegistry};
