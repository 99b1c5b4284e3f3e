//! Verdict Aggregator
//!
//! Pure reduction of whatever subset of source reports came back into one
//! labeled, confidence-scored outcome. Missing or failed sources simply do
//! not appear in the input; their weight is redistributed proportionally so
//! the effective weights of the surviving subset always sum to 1.0.
//!
//! Winner selection uses the raw weighted score per label; the reported
//! confidence is the winning label's weighted-mean confidence (score divided
//! by the label's effective weight mass), so a single agreeing source at 0.6
//! yields a 0.6-confidence verdict rather than being diluted by sources that
//! voted for other labels. With every source on one label the two quantities
//! coincide and the confidence equals the closed-form weighted sum.

use anyhow::{bail, Result};

use crate::claim::{Label, SourceKind, SourceReport, VerdictLabel};

/// Fixed per-source aggregation weights. Must sum to 1.0 across all three.
#[derive(Debug, Clone, Copy)]
pub struct SourceWeights {
    pub fact_check_db: f32,
    pub verification_model: f32,
    pub web_search: f32,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            fact_check_db: 0.4,
            verification_model: 0.4,
            web_search: 0.2,
        }
    }
}

impl SourceWeights {
    pub fn weight_for(&self, kind: SourceKind) -> f32 {
        match kind {
            SourceKind::FactCheckDb => self.fact_check_db,
            SourceKind::VerificationModel => self.verification_model,
            SourceKind::WebSearch => self.web_search,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let sum = self.fact_check_db + self.verification_model + self.web_search;
        if (sum - 1.0).abs() > 1e-4 {
            bail!("source weights sum to {}, expected 1.0", sum);
        }
        if self.fact_check_db < 0.0 || self.verification_model < 0.0 || self.web_search < 0.0 {
            bail!("source weights must be non-negative");
        }
        Ok(())
    }
}

/// Output of one aggregation: what the verdict will carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateOutcome {
    pub label: VerdictLabel,
    pub confidence: f32,
    /// Set when zero sources contributed.
    pub insufficient_evidence: bool,
}

pub struct VerdictAggregator {
    weights: SourceWeights,
}

impl VerdictAggregator {
    pub fn new(weights: SourceWeights) -> Self {
        Self { weights }
    }

    /// Combine the reports of the sources that succeeded. Order-independent.
    pub fn combine(&self, reports: &[SourceReport]) -> AggregateOutcome {
        // Reports with an Unknown label carry no usable opinion; the
        // pipeline already demotes them to NoSignal, this is a backstop.
        let committed: Vec<&SourceReport> =
            reports.iter().filter(|r| r.label != Label::Unknown).collect();

        if committed.is_empty() {
            return AggregateOutcome {
                label: VerdictLabel::Neutral,
                confidence: 0.0,
                insufficient_evidence: true,
            };
        }

        let total_weight: f32 = committed
            .iter()
            .map(|r| self.weights.weight_for(r.source))
            .sum();
        if total_weight <= 0.0 {
            return AggregateOutcome {
                label: VerdictLabel::Neutral,
                confidence: 0.0,
                insufficient_evidence: true,
            };
        }

        // Per label: weighted score drives winner selection, weight mass
        // turns the winning score back into a mean confidence.
        let labels = [
            VerdictLabel::Supported,
            VerdictLabel::Refuted,
            VerdictLabel::Neutral,
        ];
        let mut scores = [0.0f32; 3];
        let mut masses = [0.0f32; 3];

        for report in &committed {
            let effective = self.weights.weight_for(report.source) / total_weight;
            let idx = match report.label {
                Label::Supported => 0,
                Label::Refuted => 1,
                Label::Neutral => 2,
                Label::Unknown => unreachable!("filtered above"),
            };
            scores[idx] += effective * report.confidence;
            masses[idx] += effective;
        }

        // Only labels that received votes compete; a label nobody reported
        // cannot win a zero-score tie.
        let mut winner: Option<usize> = None;
        for (idx, label) in labels.iter().enumerate() {
            if masses[idx] <= 0.0 {
                continue;
            }
            match winner {
                None => winner = Some(idx),
                Some(current) => {
                    let better_score = scores[idx] > scores[current];
                    let tied = (scores[idx] - scores[current]).abs() < f32::EPSILON;
                    if better_score
                        || (tied && label.tie_break_rank() > labels[current].tie_break_rank())
                    {
                        winner = Some(idx);
                    }
                }
            }
        }
        let winner = winner.unwrap_or(2);

        let confidence = if masses[winner] > 0.0 {
            (scores[winner] / masses[winner]).clamp(0.0, 1.0)
        } else {
            0.0
        };

        AggregateOutcome {
            label: labels[winner],
            confidence,
            insufficient_evidence: false,
        }
    }
}

impl Default for VerdictAggregator {
    fn default() -> Self {
        Self::new(SourceWeights::default())
    }
}
