//! Verification pipeline.
//!
//! The end-to-end path for one claim: interceptor entry, embedding,
//! similarity-cache lookup, concurrent evidence fan-out with per-source
//! deadlines, weighted aggregation, and a write-through store update.
//! Sources are queried in a fixed order and a failure in any of them
//! excludes that source instead of failing the request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::aggregate::VerdictAggregator;
use crate::claim::{Claim, ClaimExtractor, Label, SourceKind, SourceReport, Verdict};
use crate::embedder::TextEmbedder;
use crate::error::{PipelineError, SourceFailure};
use crate::interceptor::{InterceptorChain, RequestContext};
use crate::sources::EvidenceSource;
use crate::store::VerdictStore;

/// Configuration-time health of one evidence source.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceHealth {
    pub source: SourceKind,
    pub configured: bool,
}

pub struct Pipeline {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<VerdictStore>,
    sources: Vec<Arc<dyn EvidenceSource>>,
    aggregator: VerdictAggregator,
    interceptors: InterceptorChain,
    extractor: ClaimExtractor,
    source_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        store: Arc<VerdictStore>,
        sources: Vec<Arc<dyn EvidenceSource>>,
        aggregator: VerdictAggregator,
        interceptors: InterceptorChain,
        source_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            sources,
            aggregator,
            interceptors,
            extractor: ClaimExtractor::new(),
            source_timeout,
        }
    }

    pub fn store(&self) -> &Arc<VerdictStore> {
        &self.store
    }

    /// Split free text into individual checkable claims.
    pub fn extract_claims(&self, text: &str) -> Vec<String> {
        self.extractor.extract(text)
    }

    /// Verify one claim for one caller.
    pub async fn verify(&self, caller: &str, claim_text: &str) -> Result<Verdict, PipelineError> {
        if claim_text.trim().is_empty() {
            return Err(PipelineError::Extraction);
        }
        let mut ctx = RequestContext::new(caller, claim_text);
        self.interceptors.enter(&mut ctx).await?;
        let result = self.verify_inner(claim_text).await;
        self.interceptors.exit(&mut ctx).await;
        result
    }

    /// Verify every claim extracted from `text`, in extraction order. Each
    /// claim passes through the interceptor chain individually, so a batch
    /// spends one admission slot per claim.
    pub async fn verify_batch(
        &self,
        caller: &str,
        text: &str,
    ) -> Result<Vec<Verdict>, PipelineError> {
        let claims = self.extract_claims(text);
        if claims.is_empty() {
            return Err(PipelineError::Extraction);
        }
        let mut verdicts = Vec::with_capacity(claims.len());
        for claim in claims {
            verdicts.push(self.verify(caller, &claim).await?);
        }
        Ok(verdicts)
    }

    /// Nearest stored verdicts for a free-text query. Unrelated to the
    /// cache-hit path, which applies the threshold; this ranks regardless.
    pub async fn similar_claims(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<crate::store::SimilarVerdict>, PipelineError> {
        match self.embed(text).await? {
            Some(vector) => Ok(self.store.top_k(&vector, k).await),
            None => Ok(Vec::new()),
        }
    }

    pub fn embedder_available(&self) -> bool {
        self.embedder.available()
    }

    pub fn source_health(&self) -> Vec<SourceHealth> {
        self.sources
            .iter()
            .map(|s| SourceHealth {
                source: s.kind(),
                configured: s.configured(),
            })
            .collect()
    }

    async fn verify_inner(&self, claim_text: &str) -> Result<Verdict, PipelineError> {
        let embedding = self.embed(claim_text).await?;

        if let Some(vector) = &embedding {
            if let Some(cached) = self.store.lookup(vector).await {
                info!(claim = claim_text, "similarity cache hit");
                return Ok(cached);
            }
        }

        let reports = self.gather_reports(claim_text).await;
        let outcome = self.aggregator.combine(&reports);
        let claim = Claim::new(claim_text, embedding);
        let verdict = Verdict::from_reports(claim.clone(), outcome.label, outcome.confidence, &reports);

        // Write-through: the verdict is cached before the caller sees it,
        // so an identical follow-up request always hits.
        if claim.embedding.is_some() {
            self.store.store(&claim, verdict.clone()).await;
        }
        Ok(verdict)
    }

    /// Embed the claim off the async runtime. An unavailable embedder
    /// degrades the request (no cache, no store write) instead of failing it.
    async fn embed(&self, claim_text: &str) -> Result<Option<Vec<f32>>, PipelineError> {
        let embedder = Arc::clone(&self.embedder);
        let text = claim_text.to_string();
        let result = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| PipelineError::Internal(anyhow!("embedding task failed: {e}")))?;
        match result {
            Ok(vector) => Ok(Some(vector)),
            Err(e) => {
                warn!(error = %e, "embedder unavailable; skipping similarity cache");
                Ok(None)
            }
        }
    }

    /// Query every source concurrently under one per-source deadline.
    /// Failed, timed-out, and Unknown-labeled sources are excluded.
    async fn gather_reports(&self, claim_text: &str) -> Vec<SourceReport> {
        let futures = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let claim = claim_text.to_string();
            let deadline = self.source_timeout;
            async move {
                let kind = source.kind();
                let outcome = match tokio::time::timeout(deadline, source.examine(&claim)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceFailure::Timeout),
                };
                (kind, outcome)
            }
        });

        let mut reports = Vec::with_capacity(self.sources.len());
        for (kind, outcome) in join_all(futures).await {
            match outcome {
                Ok(report) if report.label == Label::Unknown => {
                    debug!(source = kind.as_str(), "source reported no signal");
                }
                Ok(report) => reports.push(report),
                Err(failure) => {
                    warn!(source = kind.as_str(), failure = %failure, "source excluded");
                }
            }
        }
        reports
    }
}
