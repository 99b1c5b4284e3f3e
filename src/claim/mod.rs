//! Claim Pipeline Data Model
//!
//! Claims, evidence, and verdicts. A `Verdict` is immutable once created and
//! stored; its confidence is always derived by the aggregator, never set
//! independently.

pub mod extractor;
pub mod sentiment;

pub use extractor::ClaimExtractor;
pub use sentiment::{analyze_sentiment, Sentiment};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three evidence sources a claim fans out to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    FactCheckDb,
    VerificationModel,
    WebSearch,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FactCheckDb => "fact_check_db",
            SourceKind::VerificationModel => "verification_model",
            SourceKind::WebSearch => "web_search",
        }
    }
}

/// Label an individual source attaches to its evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Supported,
    Refuted,
    Neutral,
    Unknown,
}

/// Final label of an aggregated verdict. `Unknown` never survives
/// aggregation; a source that cannot commit is treated as having no signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictLabel {
    Supported,
    Refuted,
    Neutral,
}

impl VerdictLabel {
    /// Conservative tie-break order: a flagged claim beats false reassurance.
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            VerdictLabel::Refuted => 2,
            VerdictLabel::Supported => 1,
            VerdictLabel::Neutral => 0,
        }
    }
}

/// A single extracted factual assertion. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    /// `None` only when the embedder was unavailable for the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub extracted_at: DateTime<Utc>,
}

impl Claim {
    pub fn new(text: impl Into<String>, embedding: Option<Vec<f32>>) -> Self {
        Self {
            text: text.into(),
            embedding,
            extracted_at: Utc::now(),
        }
    }
}

/// One piece of supporting or refuting material from a source. Ephemeral;
/// persisted only as part of a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source: SourceKind,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub label: Label,
    pub confidence: f32,
}

/// Normalized output of one evidence source for one claim: a label, a
/// confidence, and the snippets that back them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub label: Label,
    pub confidence: f32,
    pub evidence: Vec<EvidenceItem>,
}

impl SourceReport {
    pub fn new(source: SourceKind, label: Label, confidence: f32) -> Self {
        Self {
            source,
            label,
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<EvidenceItem>) -> Self {
        self.evidence = evidence;
        self
    }
}

/// The pipeline's final labeled, confidence-scored output for a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub id: String,
    pub claim: Claim,
    pub label: VerdictLabel,
    pub confidence: f32,
    pub evidence: Vec<EvidenceItem>,
    pub sources_used: BTreeSet<SourceKind>,
    /// Set when zero sources succeeded. Distinguishes a genuine "we found
    /// nothing" from a low-confidence neutral result.
    pub insufficient_evidence: bool,
    pub computed_at: DateTime<Utc>,
}

impl Verdict {
    /// Assemble a verdict from the aggregation outcome and the reports that
    /// produced it. Evidence keeps source order; aggregation itself is
    /// order-independent.
    pub fn from_reports(
        claim: Claim,
        label: VerdictLabel,
        confidence: f32,
        reports: &[SourceReport],
    ) -> Self {
        let sources_used: BTreeSet<SourceKind> = reports.iter().map(|r| r.source).collect();
        let evidence: Vec<EvidenceItem> = reports
            .iter()
            .flat_map(|r| r.evidence.iter().cloned())
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            claim,
            label,
            confidence,
            evidence,
            insufficient_evidence: sources_used.is_empty(),
            sources_used,
            computed_at: Utc::now(),
        }
    }
}
