//! Claim verification service
//!
//! A fact-checking pipeline with:
//! - Claim extraction and sentiment scoring for free text
//! - Semantic verdict caching (fastembed + cosine similarity)
//! - Concurrent evidence gathering (fact-check DB, local model, web search)
//! - Weighted verdict aggregation with graceful source degradation
//! - Per-caller fixed-window admission control

pub mod admission;
pub mod aggregate;
pub mod auth;
pub mod claim;
pub mod config;
pub mod embedder;
pub mod error;
pub mod fetch;
pub mod interceptor;
pub mod pipeline;
pub mod server;
pub mod sources;
pub mod store;

// Re-exports for convenience
pub use claim::{Claim, Verdict, VerdictLabel};
pub use config::Config;
pub use pipeline::Pipeline;
pub use store::VerdictStore;
