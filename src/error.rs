//! Error taxonomy for the verification pipeline.
//!
//! Only `AdmissionDenied` and `Unauthorized` are ever surfaced to callers,
//! and both occur before any evidence gathering begins. Everything else is
//! recovered locally: source failures by exclusion from aggregation, embedder
//! failures by skipping the cache for that request.

use thiserror::Error;

/// Caller-visible pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rate window exceeded. Recoverable by retrying after the window rolls.
    #[error("rate limit exceeded for caller '{caller}', try again later")]
    AdmissionDenied { caller: String },

    /// Bad or missing credential. Not retryable without a new credential.
    #[error("missing or invalid credential")]
    Unauthorized,

    /// The input contained no checkable claim.
    #[error("no checkable claims found in input")]
    Extraction,

    /// Anything unexpected in the wiring around the core pipeline.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Typed outcome of a failed evidence source call. All three variants are
/// treated identically by the aggregator: the source is excluded from
/// `sources_used` and does not affect the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFailure {
    /// Network or configuration error, e.g. a missing credential.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The per-source deadline elapsed before a response arrived.
    #[error("source timed out")]
    Timeout,

    /// The source responded but had nothing relevant to say.
    #[error("source returned no signal")]
    NoSignal,
}

/// The embedding model could not be loaded or invoked. Degrades caching for
/// the request, never fatal to verification.
#[derive(Debug, Clone, Error)]
pub enum EmbedderError {
    #[error("embedding model unavailable: {0}")]
    Unavailable(String),
}

/// The shared counter store backing admission control is unreachable.
/// Resolved by the configured [`AdmissionPolicy`](crate::admission::AdmissionPolicy),
/// never silently.
#[derive(Debug, Clone, Error)]
pub enum AdmissionError {
    #[error("counter store unreachable: {0}")]
    StoreUnreachable(String),
}
