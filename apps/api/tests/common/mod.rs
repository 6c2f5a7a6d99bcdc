//! Common test utilities for API integration tests
//!
//! In-memory stores, a scripted semantic recommender and a harness that
//! wires a `ChatService` against wiremock-backed Ollama and TMDB servers.

#![allow(dead_code, unused_imports)]

pub mod fakes;
pub mod fixtures;

pub use fakes::*;
pub use fixtures::*;
