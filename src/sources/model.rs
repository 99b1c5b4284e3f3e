//! Local verification scorer.
//!
//! Prompts a locally hosted model to judge the claim and parses a fixed
//! `SCORE:/VERDICT:/EXPLANATION:` response format. The provider sits behind
//! a trait so the scorer can run against Ollama in production and a canned
//! provider in tests.

use async_trait::async_trait;
use tracing::debug;

use crate::claim::{EvidenceItem, Label, SourceKind, SourceReport};
use crate::error::SourceFailure;
use crate::sources::EvidenceSource;

/// Minimal chat-completion contract for the verification model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String) -> anyhow::Result<String>;
}

/// Ollama-backed provider for local models.
pub struct OllamaProvider {
    client: ollama_rs::Ollama,
}

impl OllamaProvider {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            client: ollama_rs::Ollama::new(host.into(), port),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String) -> anyhow::Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};

        let res = self
            .client
            .send_chat_messages(ChatMessageRequest::new(
                model.to_string(),
                vec![ChatMessage::user(prompt)],
            ))
            .await?;
        Ok(res.message.content)
    }
}

pub struct ModelVerifierSource {
    provider: std::sync::Arc<dyn LlmProvider>,
    model: String,
}

impl ModelVerifierSource {
    pub fn new(provider: std::sync::Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn prompt(claim: &str) -> String {
        format!(
            "Analyze this claim and determine whether it is true or false.\n\n\
             Claim: \"{}\"\n\n\
             Provide:\n\
             1. A score from 0-100 (0 is completely false, 100 is completely true)\n\
             2. A clear verdict (true/false/partial)\n\
             3. A short explanation of your reasoning\n\n\
             Format your response exactly like this:\n\
             SCORE: [number 0-100]\n\
             VERDICT: [true/false/partial]\n\
             EXPLANATION: [your analysis]",
            claim
        )
    }
}

#[async_trait]
impl EvidenceSource for ModelVerifierSource {
    fn kind(&self) -> SourceKind {
        SourceKind::VerificationModel
    }

    async fn examine(&self, claim: &str) -> Result<SourceReport, SourceFailure> {
        let response = self
            .provider
            .generate(&self.model, Self::prompt(claim))
            .await
            .map_err(|e| SourceFailure::Unavailable(e.to_string()))?;

        parse_scorer_output(&response).ok_or(SourceFailure::NoSignal)
    }
}

/// Parse the scorer's `SCORE:/VERDICT:/EXPLANATION:` output into a report.
/// `None` when neither a score nor a verdict line can be found.
fn parse_scorer_output(response: &str) -> Option<SourceReport> {
    let mut score: Option<f32> = None;
    let mut verdict: Option<&str> = None;
    let mut explanation = String::new();

    for line in response.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("SCORE:") {
            if let Ok(s) = rest.trim().parse::<f32>() {
                score = Some(s.clamp(0.0, 100.0));
            }
        } else if let Some(rest) = line.strip_prefix("VERDICT:") {
            let v = rest.trim().to_lowercase();
            verdict = match v.as_str() {
                "true" => Some("true"),
                "false" => Some("false"),
                "partial" => Some("partial"),
                _ => verdict,
            };
        } else if let Some(rest) = line.strip_prefix("EXPLANATION:") {
            explanation = rest.trim().to_string();
        }
    }

    if score.is_none() && verdict.is_none() {
        return None;
    }

    let truth = score.unwrap_or(50.0) / 100.0;
    let (label, confidence) = match verdict {
        Some("true") => (Label::Supported, truth),
        Some("false") => (Label::Refuted, 1.0 - truth),
        Some("partial") => (Label::Neutral, 0.5),
        // No verdict line: fall back to the score alone.
        _ if truth >= 0.6 => (Label::Supported, truth),
        _ if truth <= 0.4 => (Label::Refuted, 1.0 - truth),
        _ => (Label::Neutral, 0.5),
    };
    debug!(?label, confidence, "verification model scored claim");

    let mut report = SourceReport::new(SourceKind::VerificationModel, label, confidence);
    if !explanation.is_empty() {
        let mut cut = explanation.len().min(500);
        while cut > 0 && !explanation.is_char_boundary(cut) {
            cut -= 1;
        }
        explanation.truncate(cut);
        let report_confidence = report.confidence;
        report = report.with_evidence(vec![EvidenceItem {
            source: SourceKind::VerificationModel,
            snippet: explanation,
            link: None,
            label,
            confidence: report_confidence,
        }]);
    }
    Some(report)
}
