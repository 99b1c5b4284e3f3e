//! Service configuration.
//!
//! All knobs come from the environment (loaded through dotenv at startup),
//! with defaults matching the reference deployment. Nothing here is read
//! lazily at call sites; the config is built once in `main` and handed to
//! the components that need it.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::admission::AdmissionPolicy;
use crate::aggregate::SourceWeights;

/// Runtime configuration for the claim verification service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP surface binds to.
    pub bind_addr: String,
    /// Admission window length.
    pub window: Duration,
    /// Max requests per caller per window. Hard cutoff, no carry-over.
    pub max_requests: u64,
    /// What `allow()` returns when the counter store is unreachable.
    pub admission_policy: AdmissionPolicy,
    /// Inclusive cosine similarity threshold for cache hits.
    pub similarity_threshold: f32,
    /// Per-source deadline for evidence calls.
    pub source_timeout: Duration,
    /// Aggregation weights, summing to 1.0 across all three sources.
    pub weights: SourceWeights,
    /// Google Fact Check Tools API key. Absent key disables the source.
    pub factcheck_api_key: Option<String>,
    /// Serper API key for web evidence. Absent key disables the source.
    pub serper_api_key: Option<String>,
    /// Ollama endpoint for the local verification scorer.
    pub ollama_host: String,
    pub ollama_port: u16,
    /// Model the verification scorer prompts.
    pub verifier_model: String,
    /// Snapshot path for the verdict store. Empty disables persistence.
    pub store_path: Option<String>,
    /// Interval between background snapshots.
    pub persist_interval: Duration,
    /// Accepted API keys. Empty means open access keyed by client IP.
    pub api_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            window: Duration::from_secs(60),
            max_requests: 60,
            admission_policy: AdmissionPolicy::FailOpen,
            similarity_threshold: 0.92,
            source_timeout: Duration::from_secs(5),
            weights: SourceWeights::default(),
            factcheck_api_key: None,
            serper_api_key: None,
            ollama_host: "http://localhost".to_string(),
            ollama_port: 11434,
            verifier_model: "llama3.2:3b".to_string(),
            store_path: Some("verdicts.bin".to_string()),
            persist_interval: Duration::from_secs(60),
            api_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Config::default();

        if let Ok(addr) = std::env::var("CLAIMSPOTTER_BIND") {
            cfg.bind_addr = addr;
        }
        if let Some(secs) = parse_var::<u64>("CLAIMSPOTTER_WINDOW_SECS")? {
            cfg.window = Duration::from_secs(secs.max(1));
        }
        if let Some(max) = parse_var::<u64>("RATE_LIMIT_PER_MINUTE")? {
            cfg.max_requests = max;
        }
        if let Ok(policy) = std::env::var("CLAIMSPOTTER_ADMISSION_ON_STORE_ERROR") {
            cfg.admission_policy = match policy.to_lowercase().as_str() {
                "open" => AdmissionPolicy::FailOpen,
                "closed" => AdmissionPolicy::FailClosed,
                other => bail!("unknown admission policy '{}', expected open|closed", other),
            };
        }
        if let Some(t) = parse_var::<f32>("CLAIMSPOTTER_SIMILARITY_THRESHOLD")? {
            if !(0.0..=1.0).contains(&t) {
                bail!("similarity threshold {} out of range [0,1]", t);
            }
            cfg.similarity_threshold = t;
        }
        if let Some(secs) = parse_var::<u64>("CLAIMSPOTTER_SOURCE_TIMEOUT_SECS")? {
            cfg.source_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(weights) = Self::weights_from_env()? {
            cfg.weights = weights;
        }
        cfg.weights.validate()?;

        cfg.factcheck_api_key = non_empty_var("GOOGLE_FACTCHECK_API_KEY");
        cfg.serper_api_key = non_empty_var("SERPER_API_KEY");

        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            cfg.ollama_host = host;
        }
        if let Some(port) = parse_var::<u16>("OLLAMA_PORT")? {
            cfg.ollama_port = port;
        }
        if let Ok(model) = std::env::var("CLAIMSPOTTER_VERIFIER_MODEL") {
            cfg.verifier_model = model;
        }

        if let Ok(path) = std::env::var("CLAIMSPOTTER_STORE_PATH") {
            cfg.store_path = if path.is_empty() { None } else { Some(path) };
        }
        if let Some(secs) = parse_var::<u64>("CLAIMSPOTTER_PERSIST_INTERVAL_SECS")? {
            cfg.persist_interval = Duration::from_secs(secs.max(5));
        }

        if let Ok(keys) = std::env::var("CLAIMSPOTTER_API_KEYS") {
            cfg.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(cfg)
    }

    fn weights_from_env() -> Result<Option<SourceWeights>> {
        let fact = parse_var::<f32>("CLAIMSPOTTER_WEIGHT_FACTCHECK")?;
        let model = parse_var::<f32>("CLAIMSPOTTER_WEIGHT_MODEL")?;
        let web = parse_var::<f32>("CLAIMSPOTTER_WEIGHT_WEB")?;
        match (fact, model, web) {
            (None, None, None) => Ok(None),
            (Some(f), Some(m), Some(w)) => Ok(Some(SourceWeights {
                fact_check_db: f,
                verification_model: m,
                web_search: w,
            })),
            _ => bail!("source weights must be set together or not at all"),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: '{}'", name, raw))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.window, Duration::from_secs(60));
        assert_eq!(cfg.max_requests, 60);
        assert!((cfg.similarity_threshold - 0.92).abs() < f32::EPSILON);
        assert!(cfg.weights.validate().is_ok());
    }
}
