//! Database repository layer for Marquee
//!
//! Each repository is a trait (the narrow interface services depend on)
//! plus its PostgreSQL implementation. Services hold `Arc<dyn Trait>`, so
//! tests substitute in-memory stores.

pub mod chat;
pub mod history;

pub use chat::{ChatStore, PgChatStore};
pub use history::{ClearedHistory, HistoryStore, PgHistoryStore};
