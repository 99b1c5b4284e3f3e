//! End-to-end pipeline behavior with stub embedders and sources: caching,
//! degradation, timeouts, admission, and batch ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use claimspotter::admission::{
    AdmissionController, AdmissionPolicy, InMemoryCounterStore,
};
use claimspotter::aggregate::{SourceWeights, VerdictAggregator};
use claimspotter::claim::{Label, SourceKind, SourceReport};
use claimspotter::embedder::{normalize, TextEmbedder};
use claimspotter::error::{EmbedderError, PipelineError, SourceFailure};
use claimspotter::interceptor::{AdmissionInterceptor, InterceptorChain};
use claimspotter::pipeline::Pipeline;
use claimspotter::sources::EvidenceSource;
use claimspotter::store::VerdictStore;
use claimspotter::VerdictLabel;

/// Deterministic embedder: same text, same unit vector.
struct HashEmbedder;

impl TextEmbedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vec = vec![0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            vec[i % 8] += byte as f32;
        }
        normalize(&mut vec);
        Ok(vec)
    }
}

struct BrokenEmbedder;

impl TextEmbedder for BrokenEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
        Err(EmbedderError::Unavailable("model not loaded".into()))
    }

    fn available(&self) -> bool {
        false
    }
}

/// Scripted evidence source that counts how often it is examined.
struct StubSource {
    kind: SourceKind,
    outcome: Result<(Label, f32), SourceFailure>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubSource {
    fn new(kind: SourceKind, label: Label, confidence: f32) -> Arc<Self> {
        Arc::new(Self {
            kind,
            outcome: Ok((label, confidence)),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(kind: SourceKind, failure: SourceFailure) -> Arc<Self> {
        Arc::new(Self {
            kind,
            outcome: Err(failure),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn slow(kind: SourceKind, label: Label, confidence: f32, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            outcome: Ok((label, confidence)),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceSource for StubSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn examine(&self, claim: &str) -> Result<SourceReport, SourceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            Ok((label, confidence)) => {
                let mut report = SourceReport::new(self.kind, *label, *confidence);
                report.evidence.push(claimspotter::claim::EvidenceItem {
                    source: self.kind,
                    snippet: claim.to_string(),
                    link: None,
                    label: *label,
                    confidence: *confidence,
                });
                Ok(report)
            }
            Err(failure) => Err(failure.clone()),
        }
    }
}

fn sources_of(stubs: &[&Arc<StubSource>]) -> Vec<Arc<dyn EvidenceSource>> {
    stubs
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn EvidenceSource>)
        .collect()
}

fn build_pipeline(
    embedder: Arc<dyn TextEmbedder>,
    sources: Vec<Arc<dyn EvidenceSource>>,
    max_requests: u64,
    source_timeout: Duration,
) -> Pipeline {
    let admission = AdmissionController::new(
        Box::new(InMemoryCounterStore::new()),
        max_requests,
        Duration::from_secs(60),
        AdmissionPolicy::FailOpen,
    );
    let interceptors = InterceptorChain::new().with(Arc::new(AdmissionInterceptor::new(admission)));
    Pipeline::new(
        embedder,
        Arc::new(VerdictStore::new(0.92)),
        sources,
        VerdictAggregator::new(SourceWeights::default()),
        interceptors,
        source_timeout,
    )
}

#[tokio::test]
async fn identical_claim_hits_the_cache_without_re_querying_sources() {
    let fact = StubSource::new(SourceKind::FactCheckDb, Label::Refuted, 0.9);
    let web = StubSource::new(SourceKind::WebSearch, Label::Refuted, 0.6);
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fact, &web]),
        100,
        Duration::from_secs(1),
    );

    let first = pipeline.verify("alice", "The moon is made of cheese").await.unwrap();
    let second = pipeline.verify("alice", "The moon is made of cheese").await.unwrap();

    assert_eq!(fact.calls(), 1);
    assert_eq!(web.calls(), 1);
    // The cached verdict comes back as-is.
    assert_eq!(second.id, first.id);
    assert_eq!(second.label, VerdictLabel::Refuted);
}

#[tokio::test]
async fn all_sources_failing_yields_insufficient_neutral() {
    let fact = StubSource::failing(
        SourceKind::FactCheckDb,
        SourceFailure::Unavailable("no API key".into()),
    );
    let model = StubSource::failing(SourceKind::VerificationModel, SourceFailure::NoSignal);
    let web = StubSource::failing(SourceKind::WebSearch, SourceFailure::Timeout);
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fact, &model, &web]),
        100,
        Duration::from_secs(1),
    );

    let verdict = pipeline.verify("alice", "Unverifiable claim").await.unwrap();
    assert_eq!(verdict.label, VerdictLabel::Neutral);
    assert_eq!(verdict.confidence, 0.0);
    assert!(verdict.insufficient_evidence);
    assert!(verdict.sources_used.is_empty());
    assert!(verdict.evidence.is_empty());
}

#[tokio::test]
async fn slow_source_is_excluded_by_the_deadline() {
    let fast = StubSource::new(SourceKind::FactCheckDb, Label::Supported, 0.8);
    let slow = StubSource::slow(
        SourceKind::WebSearch,
        Label::Refuted,
        0.9,
        Duration::from_millis(500),
    );
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fast, &slow]),
        100,
        Duration::from_millis(50),
    );

    let verdict = pipeline.verify("alice", "Only the fast source counts").await.unwrap();
    assert_eq!(slow.calls(), 1);
    assert_eq!(verdict.label, VerdictLabel::Supported);
    assert!(verdict.sources_used.contains(&SourceKind::FactCheckDb));
    assert!(!verdict.sources_used.contains(&SourceKind::WebSearch));
}

#[tokio::test]
async fn broken_embedder_degrades_instead_of_failing() {
    let fact = StubSource::new(SourceKind::FactCheckDb, Label::Supported, 0.7);
    let pipeline = build_pipeline(
        Arc::new(BrokenEmbedder),
        sources_of(&[&fact]),
        100,
        Duration::from_secs(1),
    );

    let verdict = pipeline.verify("alice", "Claim without an embedding").await.unwrap();
    assert_eq!(verdict.label, VerdictLabel::Supported);
    assert!(verdict.claim.embedding.is_none());
    // Nothing cached, so a repeat request re-queries every source.
    assert_eq!(pipeline.store().len().await, 0);
    pipeline.verify("alice", "Claim without an embedding").await.unwrap();
    assert_eq!(fact.calls(), 2);
}

#[tokio::test]
async fn unknown_labeled_source_is_dropped_from_the_verdict() {
    let fact = StubSource::new(SourceKind::FactCheckDb, Label::Unknown, 0.9);
    let web = StubSource::new(SourceKind::WebSearch, Label::Supported, 0.5);
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fact, &web]),
        100,
        Duration::from_secs(1),
    );

    let verdict = pipeline.verify("alice", "One source abstains").await.unwrap();
    assert_eq!(verdict.label, VerdictLabel::Supported);
    assert!(!verdict.sources_used.contains(&SourceKind::FactCheckDb));
    // Redistribution makes the lone opinion carry full weight.
    assert!((verdict.confidence - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn batch_returns_verdicts_in_extraction_order() {
    let fact = StubSource::new(SourceKind::FactCheckDb, Label::Supported, 0.8);
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fact]),
        100,
        Duration::from_secs(1),
    );

    let text = "The Eiffel Tower is 330 meters tall. It was completed in 1889. \
                Paris is the capital of France.";
    let verdicts = pipeline.verify_batch("alice", text).await.unwrap();
    assert_eq!(verdicts.len(), 3);
    assert!(verdicts[0].claim.text.contains("330"));
    assert!(verdicts[1].claim.text.contains("1889"));
    assert!(verdicts[2].claim.text.contains("Paris"));
}

#[tokio::test]
async fn blank_input_is_rejected_before_admission_is_charged() {
    let fact = StubSource::new(SourceKind::FactCheckDb, Label::Supported, 0.8);
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fact]),
        1,
        Duration::from_secs(1),
    );

    assert!(matches!(
        pipeline.verify("alice", "   ").await,
        Err(PipelineError::Extraction)
    ));
    // The rejected request did not consume the caller's only slot.
    pipeline.verify("alice", "A real claim").await.unwrap();
}

#[tokio::test]
async fn admission_denial_rejects_before_any_source_runs() {
    let fact = StubSource::new(SourceKind::FactCheckDb, Label::Supported, 0.8);
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fact]),
        1,
        Duration::from_secs(1),
    );

    pipeline.verify("alice", "First request is admitted").await.unwrap();
    let denied = pipeline.verify("alice", "Second request is not").await;
    match denied {
        Err(PipelineError::AdmissionDenied { caller }) => assert_eq!(caller, "alice"),
        other => panic!("expected admission denial, got {other:?}"),
    }
    assert_eq!(fact.calls(), 1);

    // A different caller still gets through.
    pipeline.verify("bob", "A fresh rate window").await.unwrap();
    assert_eq!(fact.calls(), 2);
}

#[tokio::test]
async fn batch_spends_one_admission_slot_per_claim() {
    let fact = StubSource::new(SourceKind::FactCheckDb, Label::Supported, 0.8);
    let pipeline = build_pipeline(
        Arc::new(HashEmbedder),
        sources_of(&[&fact]),
        2,
        Duration::from_secs(1),
    );

    let text = "The Eiffel Tower is 330 meters tall. It was completed in 1889. \
                Paris is the capital of France.";
    let result = pipeline.verify_batch("alice", text).await;
    assert!(matches!(
        result,
        Err(PipelineError::AdmissionDenied { .. })
    ));
}
