//! Pairwise risk composition
//!
//! Each unordered pair gets a raw probability (1.0 for curated interactions,
//! otherwise the classifier's opinion), then an escalation derived from the
//! two members' dose checks. The adjusted probability is capped at 1.0 and
//! bucketed into a [`RiskTier`].

use crate::classifier::{
    checked_probability, pair_description, ClassifierError, InteractionClassifier,
};
use crate::config::EngineConfig;
use crate::dose::DoseAssessment;
use crate::pair_key::{unordered_pairs, PairKey};
use crate::reference::KnowledgeBase;
use crate::request::DrugEntry;
use serde::{Deserialize, Serialize};

/// Categorical risk bucket, used for pairs and for the session level
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    /// Moderate or High
    pub fn is_risky(&self) -> bool {
        !matches!(self, RiskTier::Low)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Moderate => "Moderate",
            RiskTier::High => "High",
        }
    }

    /// Lowercase style class used by report renderers
    pub fn css_class(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability outcome for one pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PairScore {
    Assessed {
        raw_probability: f64,
        adjusted_probability: f64,
        risk_tier: RiskTier,
    },
    /// The classifier could not score this pair; nothing was substituted
    Failed { reason: String },
}

/// One unordered drug pair; immutable once computed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub drug_a: String,
    pub drug_b: String,
    pub pair_key: PairKey,
    pub found_in_knowledge_base: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_description: Option<String>,
    /// Dose-driven increase added to the raw probability
    pub escalation: f64,
    #[serde(flatten)]
    pub score: PairScore,
    pub dose_assessment_a: DoseAssessment,
    pub dose_assessment_b: DoseAssessment,
}

impl PairRecord {
    pub fn raw_probability(&self) -> Option<f64> {
        match self.score {
            PairScore::Assessed { raw_probability, .. } => Some(raw_probability),
            PairScore::Failed { .. } => None,
        }
    }

    pub fn adjusted_probability(&self) -> Option<f64> {
        match self.score {
            PairScore::Assessed {
                adjusted_probability,
                ..
            } => Some(adjusted_probability),
            PairScore::Failed { .. } => None,
        }
    }

    pub fn risk_tier(&self) -> Option<RiskTier> {
        match self.score {
            PairScore::Assessed { risk_tier, .. } => Some(risk_tier),
            PairScore::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.score, PairScore::Failed { .. })
    }
}

/// A validated drug with its dose check
#[derive(Clone, Debug, PartialEq)]
pub struct AssessedDrug {
    pub entry: DrugEntry,
    pub assessment: DoseAssessment,
}

/// Escalation contributed by a pair's dose checks
pub fn dose_escalation(
    a: &DoseAssessment,
    b: &DoseAssessment,
    pediatric: bool,
    config: &EngineConfig,
) -> f64 {
    let mut escalation = 0.0;
    for member in [a, b] {
        if member.is_above() {
            let capped = member.percent_above.min(config.percent_above_cap);
            let fraction = capped / config.percent_above_cap;
            escalation += config.escalation_base + config.escalation_span * fraction;
        }
    }
    if pediatric && (a.is_above() || b.is_above()) {
        escalation = escalation.max(config.pediatric_escalation_floor);
    }
    escalation
}

/// Combine a raw probability and escalation into a scored outcome
pub fn adjust(raw_probability: f64, escalation: f64, config: &EngineConfig) -> PairScore {
    let adjusted_probability = (raw_probability + escalation).clamp(0.0, 1.0);
    PairScore::Assessed {
        raw_probability,
        adjusted_probability,
        risk_tier: config.pair_tiers.classify(adjusted_probability),
    }
}

/// Scores every unordered pair of a request
pub struct PairComposer<'a> {
    knowledge_base: &'a KnowledgeBase,
    classifier: Option<&'a dyn InteractionClassifier>,
    config: &'a EngineConfig,
}

impl<'a> PairComposer<'a> {
    pub fn new(
        knowledge_base: &'a KnowledgeBase,
        classifier: Option<&'a dyn InteractionClassifier>,
        config: &'a EngineConfig,
    ) -> Self {
        PairComposer {
            knowledge_base,
            classifier,
            config,
        }
    }

    /// Raw probability for a pair and whether it came from the knowledge base.
    /// The classifier is never consulted for curated pairs.
    pub fn raw_probability(
        &self,
        drug_a: &str,
        drug_b: &str,
    ) -> Result<(f64, bool), ClassifierError> {
        let key = PairKey::new(drug_a, drug_b);
        if self.knowledge_base.contains(&key) {
            return Ok((1.0, true));
        }
        let classifier = self.classifier.ok_or(ClassifierError::Unavailable)?;
        let p = checked_probability(classifier, &pair_description(drug_a.trim(), drug_b.trim()))?;
        Ok((p, false))
    }

    /// Score a single pair
    pub fn score_pair(&self, a: &AssessedDrug, b: &AssessedDrug, pediatric: bool) -> PairRecord {
        let key = PairKey::new(&a.entry.name, &b.entry.name);
        let escalation = dose_escalation(&a.assessment, &b.assessment, pediatric, self.config);

        let outcome = self.raw_probability(&a.entry.name, &b.entry.name);
        let (found_in_knowledge_base, score) = match outcome {
            Ok((raw, found)) => (found, adjust(raw, escalation, self.config)),
            Err(e) => {
                log::warn!("could not score pair {}: {}", key, e);
                (
                    false,
                    PairScore::Failed {
                        reason: e.to_string(),
                    },
                )
            }
        };
        log::debug!("pair {} kb={} escalation={:.3}", key, found_in_knowledge_base, escalation);

        PairRecord {
            drug_a: a.entry.name.clone(),
            drug_b: b.entry.name.clone(),
            interaction_description: self.knowledge_base.description(&key).map(str::to_string),
            pair_key: key,
            found_in_knowledge_base,
            escalation,
            score,
            dose_assessment_a: a.assessment.clone(),
            dose_assessment_b: b.assessment.clone(),
        }
    }

    /// Score all `n(n-1)/2` pairs, in input order
    pub fn compose(&self, drugs: &[AssessedDrug], pediatric: bool) -> Vec<PairRecord> {
        let pairs = unordered_pairs(drugs.len());

        #[cfg(feature = "parallel")]
        if self.config.parallel {
            use rayon::prelude::*;

            return pairs
                .par_iter()
                .map(|&(i, j)| self.score_pair(&drugs[i], &drugs[j], pediatric))
                .collect();
        }

        pairs
            .iter()
            .map(|&(i, j)| self.score_pair(&drugs[i], &drugs[j], pediatric))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dose::DoseStatus;
    use proptest::prelude::*;

    fn assessment(status: DoseStatus, percent_above: f64) -> DoseAssessment {
        DoseAssessment {
            drug: "x".to_string(),
            baseline_found: true,
            status,
            percent_above,
            mg_per_kg_per_day: None,
            comment: String::new(),
        }
    }

    fn drug(name: &str, status: DoseStatus, percent_above: f64) -> AssessedDrug {
        AssessedDrug {
            entry: DrugEntry {
                name: name.to_string(),
                dose_value: Some(1.0),
                dose_unit: Some("mg".to_string()),
                frequency_per_day: 1.0,
                route: "oral".to_string(),
            },
            assessment: assessment(status, percent_above),
        }
    }

    #[test]
    fn test_single_overdose_escalation() {
        let config = EngineConfig::default();
        let above = assessment(DoseStatus::Above, 100.0);
        let within = assessment(DoseStatus::Within, 0.0);
        let escalation = dose_escalation(&above, &within, false, &config);
        assert!((escalation - 0.31).abs() < 1e-12);

        match adjust(0.5, escalation, &config) {
            PairScore::Assessed {
                adjusted_probability,
                risk_tier,
                ..
            } => {
                assert!((adjusted_probability - 0.81).abs() < 1e-12);
                assert_eq!(risk_tier, RiskTier::Moderate);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_both_members_compound_and_cap() {
        let config = EngineConfig::default();
        let a = assessment(DoseStatus::Above, 500.0);
        let b = assessment(DoseStatus::Above, 200.0);
        // each capped at 200% -> 0.5 each
        assert!((dose_escalation(&a, &b, false, &config) - 1.0).abs() < 1e-12);
        match adjust(0.9, 1.0, &config) {
            PairScore::Assessed {
                adjusted_probability,
                risk_tier,
                ..
            } => {
                assert_eq!(adjusted_probability, 1.0);
                assert_eq!(risk_tier, RiskTier::High);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pediatric_floor() {
        let config = EngineConfig::default();
        let slightly_above = assessment(DoseStatus::Above, 2.0);
        let within = assessment(DoseStatus::Within, 0.0);
        let adult = dose_escalation(&slightly_above, &within, false, &config);
        let child = dose_escalation(&slightly_above, &within, true, &config);
        assert!(adult < 0.25);
        assert_eq!(child, 0.25);
        // no overdose, no floor
        assert_eq!(dose_escalation(&within, &within, true, &config), 0.0);
    }

    #[test]
    fn test_unknown_and_below_do_not_escalate() {
        let config = EngineConfig::default();
        let unknown = assessment(DoseStatus::Unknown, 0.0);
        let below = assessment(DoseStatus::Below, 0.0);
        assert_eq!(dose_escalation(&unknown, &below, true, &config), 0.0);
    }

    #[test]
    fn test_knowledge_base_bypasses_classifier() {
        let mut kb = KnowledgeBase::new();
        kb.insert("Warfarin", "Aspirin", Some("Bleeding".to_string()));
        let config = EngineConfig::default();
        let panicking = |_: &str| -> Result<f64, ClassifierError> { panic!("classifier called") };
        let composer = PairComposer::new(&kb, Some(&panicking), &config);

        let record = composer.score_pair(
            &drug(" aspirin", DoseStatus::Within, 0.0),
            &drug("WARFARIN", DoseStatus::Within, 0.0),
            false,
        );
        assert!(record.found_in_knowledge_base);
        assert_eq!(record.raw_probability(), Some(1.0));
        assert_eq!(record.risk_tier(), Some(RiskTier::High));
        assert_eq!(record.interaction_description.as_deref(), Some("Bleeding"));
    }

    #[test]
    fn test_classifier_receives_pair_text() {
        let kb = KnowledgeBase::new();
        let config = EngineConfig::default();
        let echo = |text: &str| -> Result<f64, ClassifierError> {
            assert_eq!(text, "Interaction between Zinc and Metformin");
            Ok(0.2)
        };
        let composer = PairComposer::new(&kb, Some(&echo), &config);
        let record = composer.score_pair(
            &drug("Zinc", DoseStatus::Unknown, 0.0),
            &drug("Metformin", DoseStatus::Unknown, 0.0),
            false,
        );
        assert!(!record.found_in_knowledge_base);
        assert_eq!(record.adjusted_probability(), Some(0.2));
        assert_eq!(record.risk_tier(), Some(RiskTier::Low));
    }

    #[test]
    fn test_classifier_failure_is_isolated() {
        let kb = KnowledgeBase::new();
        let config = EngineConfig::default().with_parallel(false);
        let flaky = |text: &str| -> Result<f64, ClassifierError> {
            if text.contains("Bad") {
                Err(ClassifierError::Backend("timeout".to_string()))
            } else {
                Ok(0.4)
            }
        };
        let composer = PairComposer::new(&kb, Some(&flaky), &config);
        let drugs = vec![
            drug("A", DoseStatus::Within, 0.0),
            drug("Bad", DoseStatus::Above, 50.0),
            drug("C", DoseStatus::Within, 0.0),
        ];
        let records = composer.compose(&drugs, false);
        assert_eq!(records.len(), 3);
        assert!(records[0].is_failed());
        assert!(!records[1].is_failed());
        assert!(records[2].is_failed());
        // escalation is still reported for the failed pair
        assert!(records[0].escalation > 0.0);
        assert_eq!(records[0].risk_tier(), None);
    }

    #[test]
    fn test_missing_classifier_fails_soft() {
        let kb = KnowledgeBase::new();
        let config = EngineConfig::default();
        let composer = PairComposer::new(&kb, None, &config);
        let record = composer.score_pair(
            &drug("A", DoseStatus::Within, 0.0),
            &drug("B", DoseStatus::Within, 0.0),
            false,
        );
        assert_eq!(
            record.score,
            PairScore::Failed {
                reason: ClassifierError::Unavailable.to_string()
            }
        );
    }

    #[test]
    fn test_compose_order_matches_input() {
        let kb = KnowledgeBase::new();
        let config = EngineConfig::default();
        let constant = |_: &str| -> Result<f64, ClassifierError> { Ok(0.1) };
        let composer = PairComposer::new(&kb, Some(&constant), &config);
        let drugs: Vec<_> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| drug(n, DoseStatus::Within, 0.0))
            .collect();
        let names: Vec<(String, String)> = composer
            .compose(&drugs, false)
            .into_iter()
            .map(|r| (r.drug_a, r.drug_b))
            .collect();
        let expected: Vec<(String, String)> = [
            ("A", "B"),
            ("A", "C"),
            ("A", "D"),
            ("B", "C"),
            ("B", "D"),
            ("C", "D"),
        ]
        .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_record_serializes_flat_score() {
        let record = PairRecord {
            drug_a: "A".to_string(),
            drug_b: "B".to_string(),
            pair_key: PairKey::new("A", "B"),
            found_in_knowledge_base: false,
            interaction_description: None,
            escalation: 0.0,
            score: PairScore::Assessed {
                raw_probability: 0.3,
                adjusted_probability: 0.3,
                risk_tier: RiskTier::Low,
            },
            dose_assessment_a: assessment(DoseStatus::Within, 0.0),
            dose_assessment_b: assessment(DoseStatus::Within, 0.0),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "assessed");
        assert_eq!(json["risk_tier"], "Low");
        assert_eq!(json["pair_key"], "a||b");
        assert_eq!(json["dose_assessment_a"]["status"], "within");
    }

    proptest! {
        #[test]
        fn adjusted_probability_stays_in_unit_interval(
            raw in 0.0..=1.0f64,
            pct_a in 0.0..10_000.0f64,
            pct_b in 0.0..10_000.0f64,
            above_a in any::<bool>(),
            above_b in any::<bool>(),
            pediatric in any::<bool>(),
        ) {
            let config = EngineConfig::default();
            let status = |above: bool| if above { DoseStatus::Above } else { DoseStatus::Within };
            let a = assessment(status(above_a), if above_a { pct_a } else { 0.0 });
            let b = assessment(status(above_b), if above_b { pct_b } else { 0.0 });
            let escalation = dose_escalation(&a, &b, pediatric, &config);
            prop_assert!(escalation >= 0.0 && escalation <= 1.0);
            match adjust(raw, escalation, &config) {
                PairScore::Assessed { adjusted_probability, risk_tier, .. } => {
                    prop_assert!((0.0..=1.0).contains(&adjusted_probability));
                    prop_assert!(adjusted_probability >= raw);
                    prop_assert_eq!(risk_tier, config.pair_tiers.classify(adjusted_probability));
                }
                PairScore::Failed { .. } => prop_assert!(false, "adjust never fails"),
            }
        }
    }
}
