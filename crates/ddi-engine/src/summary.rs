//! Session-level aggregation over pair records

use crate::compose::{PairRecord, RiskTier};
use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};

/// Aggregate view of one assessment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Every pair, scored or not
    pub total_pairs: usize,
    /// Assessed pairs in the Moderate or High tier
    pub risky_pairs: usize,
    /// `risky_pairs` over assessed pairs, as a fraction; failed pairs are
    /// left out so they cannot dilute the risk
    pub percent_risky: f64,
    /// Mean adjusted probability over assessed pairs
    pub avg_confidence: f64,
    pub combined_score: f64,
    pub overall_level: RiskTier,
    /// Pairs the classifier could not score
    pub failed_pairs: usize,
}

impl SessionSummary {
    pub fn empty() -> Self {
        SessionSummary {
            total_pairs: 0,
            risky_pairs: 0,
            percent_risky: 0.0,
            avg_confidence: 0.0,
            combined_score: 0.0,
            overall_level: RiskTier::Low,
            failed_pairs: 0,
        }
    }

    pub fn from_records(records: &[PairRecord], config: &EngineConfig) -> Self {
        if records.is_empty() {
            return Self::empty();
        }

        let total_pairs = records.len();
        let mut risky_pairs = 0;
        let mut failed_pairs = 0;
        let mut probability_sum = 0.0;
        let mut assessed = 0usize;

        for record in records {
            match (record.adjusted_probability(), record.risk_tier()) {
                (Some(p), Some(tier)) => {
                    assessed += 1;
                    probability_sum += p;
                    if tier.is_risky() {
                        risky_pairs += 1;
                    }
                }
                _ => failed_pairs += 1,
            }
        }

        let (percent_risky, avg_confidence) = if assessed > 0 {
            (
                risky_pairs as f64 / assessed as f64,
                probability_sum / assessed as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let combined_score = (config.risky_fraction_weight * percent_risky
            + config.confidence_weight * avg_confidence)
            .clamp(0.0, 1.0);

        SessionSummary {
            total_pairs,
            risky_pairs,
            percent_risky,
            avg_confidence,
            combined_score,
            overall_level: config.summary_tiers.classify(combined_score),
            failed_pairs,
        }
    }
}
