//! Engine tuning: escalation constants, tier cut-offs and summary weights

use crate::RiskTier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration that would produce out-of-range scores
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be {requirement} (got {value})")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("{field} must satisfy 0 <= moderate <= high <= 1 (got {moderate} / {high})")]
    InvalidTiers {
        field: &'static str,
        moderate: f64,
        high: f64,
    },
    #[error("summary weights must sum to 1 (got {0})")]
    WeightSum(f64),
}

/// Lower bounds for the Moderate and High tiers
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub moderate: f64,
    pub high: f64,
}

impl TierThresholds {
    /// Bucket a score; total over all inputs (NaN lands in Low)
    pub fn classify(&self, score: f64) -> RiskTier {
        if score >= self.high {
            RiskTier::High
        } else if score >= self.moderate {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        let ordered = self.moderate <= self.high;
        if ordered && unit.contains(&self.moderate) && unit.contains(&self.high) {
            Ok(())
        } else {
            Err(ConfigError::InvalidTiers {
                field,
                moderate: self.moderate,
                high: self.high,
            })
        }
    }
}

/// Configuration for pair composition and session aggregation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed escalation per overdosed pair member
    pub escalation_base: f64,
    /// Additional escalation at the percent-above cap
    pub escalation_span: f64,
    /// Percent-above value at which escalation stops growing
    pub percent_above_cap: f64,
    /// Minimum escalation for pediatric pairs with an overdosed member
    pub pediatric_escalation_floor: f64,
    /// Pair risk tiers, applied to the adjusted probability
    pub pair_tiers: TierThresholds,
    /// Session level, applied to the combined score
    pub summary_tiers: TierThresholds,
    /// Weight of the risky-pair fraction in the combined score
    pub risky_fraction_weight: f64,
    /// Weight of the mean adjusted probability in the combined score
    pub confidence_weight: f64,
    /// Score pairs on the rayon pool (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            escalation_base: 0.12,
            escalation_span: 0.38,
            percent_above_cap: 200.0,
            pediatric_escalation_floor: 0.25,
            pair_tiers: TierThresholds {
                moderate: 0.5,
                high: 0.85,
            },
            summary_tiers: TierThresholds {
                moderate: 0.4,
                high: 0.7,
            },
            risky_fraction_weight: 0.6,
            confidence_weight: 0.4,
            parallel: true,
        }
    }
}

impl EngineConfig {
    /// Reject settings that could push a probability or score outside [0, 1]
    /// or make the escalation undefined
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.percent_above_cap.is_finite() || self.percent_above_cap <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "percent_above_cap",
                requirement: "a positive, finite number",
                value: self.percent_above_cap,
            });
        }
        let non_negative = [
            ("escalation_base", self.escalation_base),
            ("escalation_span", self.escalation_span),
            ("pediatric_escalation_floor", self.pediatric_escalation_floor),
            ("risky_fraction_weight", self.risky_fraction_weight),
            ("confidence_weight", self.confidence_weight),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    requirement: "a finite, non-negative number",
                    value,
                });
            }
        }
        self.pair_tiers.validate("pair_tiers")?;
        self.summary_tiers.validate("summary_tiers")?;

        let weights = self.risky_fraction_weight + self.confidence_weight;
        if (weights - 1.0).abs() > 1e-9 {
            return Err(ConfigError::WeightSum(weights));
        }
        Ok(())
    }

    /// Enable/disable parallel pair scoring
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Override the pair tier cut-offs
    pub fn with_pair_tiers(mut self, moderate: f64, high: f64) -> Self {
        self.pair_tiers = TierThresholds { moderate, high };
        self
    }

    /// Override the session level cut-offs
    pub fn with_summary_tiers(mut self, moderate: f64, high: f64) -> Self {
        self.summary_tiers = TierThresholds { moderate, high };
        self
    }

    /// Override the pediatric escalation floor
    pub fn with_pediatric_escalation_floor(mut self, floor: f64) -> Self {
        self.pediatric_escalation_floor = floor;
        self
    }
}
