//! Evidence Sources
//!
//! Three independent signal providers, queried concurrently per claim: a
//! curated fact-check lookup, a local verification scorer, and a web-evidence
//! search. Each returns one normalized [`SourceReport`] or a typed
//! [`SourceFailure`]; the pipeline treats every failure kind the same way,
//! by excluding the source from aggregation.

mod factcheck;
mod model;
mod web;

pub use factcheck::FactCheckDbSource;
pub use model::{LlmProvider, ModelVerifierSource, OllamaProvider};
pub use web::WebSearchSource;

use async_trait::async_trait;

use crate::claim::{SourceKind, SourceReport};
use crate::error::SourceFailure;

/// One opinion provider in the evidence fan-out.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Whether the source has the configuration it needs to run. Used for
    /// health reporting only; an unconfigured source still answers `examine`
    /// with `Unavailable`.
    fn configured(&self) -> bool {
        true
    }

    /// Examine one claim and report a label, confidence, and snippets.
    /// Cancellation-safe: the pipeline drops this future on timeout.
    async fn examine(&self, claim: &str) -> Result<SourceReport, SourceFailure>;
}
