//! Web-evidence search via the Serper JSON API.
//!
//! Searches for "fact check <claim>", deduplicates the organic results by
//! URL, and reads a coarse support/refute signal out of the snippets with a
//! cue lexicon. Web snippets are the weakest of the three sources, which is
//! why they carry the smallest aggregation weight and a capped confidence.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::claim::{EvidenceItem, Label, SourceKind, SourceReport};
use crate::error::SourceFailure;
use crate::sources::EvidenceSource;

const SERPER_URL: &str = "https://google.serper.dev/search";
const MAX_EVIDENCE: usize = 5;

const REFUTE_CUES: &[&str] = &[
    "false", "fake", "hoax", "debunk", "myth", "misleading", "no evidence", "incorrect",
    "conspiracy",
];
const SUPPORT_CUES: &[&str] = &[
    "true", "confirm", "accurate", "correct", "verified", "evidence shows", "studies show",
];

pub struct WebSearchSource {
    client: Client,
    api_key: Option<String>,
}

impl WebSearchSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl EvidenceSource for WebSearchSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WebSearch
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn examine(&self, claim: &str) -> Result<SourceReport, SourceFailure> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceFailure::Unavailable("SERPER_API_KEY not set".into()))?;

        let payload = json!({
            "q": format!("fact check {}", claim),
            "num": 10,
            "gl": "us",
            "hl": "en",
        });

        let response = self
            .client
            .post(SERPER_URL)
            .header("X-API-KEY", key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SourceFailure::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceFailure::Unavailable(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceFailure::Unavailable(e.to_string()))?;

        report_from_results(&body).ok_or(SourceFailure::NoSignal)
    }
}

/// Distill the organic search results into one report. `None` when the
/// search came back empty.
fn report_from_results(body: &Value) -> Option<SourceReport> {
    let organic = body.get("organic")?.as_array()?;

    let mut seen_urls: HashSet<&str> = HashSet::new();
    let mut refute = 0usize;
    let mut support = 0usize;
    let mut snippets = Vec::new();

    for result in organic {
        let url = result["link"].as_str().unwrap_or_default();
        if url.is_empty() || !seen_urls.insert(url) {
            continue;
        }
        let title = result["title"].as_str().unwrap_or_default().trim();
        let snippet = result["snippet"].as_str().unwrap_or_default().trim();
        if title.is_empty() && snippet.is_empty() {
            continue;
        }

        let haystack = format!("{} {}", title, snippet).to_lowercase();
        refute += REFUTE_CUES.iter().filter(|cue| haystack.contains(**cue)).count();
        support += SUPPORT_CUES.iter().filter(|cue| haystack.contains(**cue)).count();

        snippets.push((format!("{}: {}", title, snippet), url.to_string()));
    }

    if snippets.is_empty() {
        return None;
    }
    debug!(results = snippets.len(), refute, support, "web evidence gathered");

    let (label, margin) = if refute > support {
        (Label::Refuted, refute - support)
    } else if support > refute {
        (Label::Supported, support - refute)
    } else {
        (Label::Neutral, 0)
    };
    // Capped well below the curated sources; snippet cues are noisy.
    let confidence = if label == Label::Neutral {
        0.3
    } else {
        (0.4 + 0.05 * margin as f32).min(0.8)
    };

    let evidence = snippets
        .into_iter()
        .take(MAX_EVIDENCE)
        .map(|(snippet, url)| EvidenceItem {
            source: SourceKind::WebSearch,
            snippet,
            link: Some(url),
            label,
            confidence,
        })
        .collect();

    Some(SourceReport::new(SourceKind::WebSearch, label, confidence).with_evidence(evidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refute_cues_dominate() {
        let body = json!({"organic": [
            {"title": "Claim debunked", "snippet": "This is a hoax with no evidence", "link": "https://a.example"},
            {"title": "Is it true?", "snippet": "Experts say it is false", "link": "https://b.example"}
        ]});
        let report = report_from_results(&body).expect("report");
        assert_eq!(report.label, Label::Refuted);
        assert!(report.confidence > 0.4);
        assert_eq!(report.evidence.len(), 2);
    }

    #[test]
    fn duplicate_urls_are_collapsed() {
        let body = json!({"organic": [
            {"title": "A", "snippet": "confirmed accurate", "link": "https://a.example"},
            {"title": "A again", "snippet": "confirmed accurate", "link": "https://a.example"}
        ]});
        let report = report_from_results(&body).expect("report");
        assert_eq!(report.evidence.len(), 1);
    }

    #[test]
    fn balanced_cues_read_neutral() {
        let body = json!({"organic": [
            {"title": "Mixed coverage", "snippet": "some say so", "link": "https://a.example"}
        ]});
        let report = report_from_results(&body).expect("report");
        assert_eq!(report.label, Label::Neutral);
        assert!((report.confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn empty_results_are_no_signal() {
        assert!(report_from_results(&json!({})).is_none());
        assert!(report_from_results(&json!({"organic": []})).is_none());
    }

    #[test]
    fn evidence_is_capped() {
        let organic: Vec<Value> = (0..10)
            .map(|i| {
                json!({"title": format!("t{i}"), "snippet": "false claim debunked",
                       "link": format!("https://{i}.example")})
            })
            .collect();
        let report = report_from_results(&json!({ "organic": organic })).expect("report");
        assert_eq!(report.evidence.len(), MAX_EVIDENCE);
    }
}
