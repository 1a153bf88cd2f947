//! Assessment entry point
//!
//! [`AssessmentEngine`] ties a reference snapshot, an optional classifier and
//! the tuning constants together. It holds no per-request state, so one
//! engine can serve any number of concurrent requests.

use crate::classifier::{ClassifierError, InteractionClassifier};
use crate::compose::{AssessedDrug, PairComposer, PairRecord};
use crate::config::{ConfigError, EngineConfig};
use crate::dose::{evaluate_dose, DoseAssessment};
use crate::reference::ReferenceData;
use crate::request::{
    AssessmentRequest, DrugEntry, PatientContext, ValidatedRequest, ValidationError,
};
use crate::summary::SessionSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of assessing one request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Identifies the reference data the result was computed against
    pub snapshot_fingerprint: String,
    pub warnings: Vec<String>,
    /// One per distinct drug, in input order
    pub dose_assessments: Vec<DoseAssessment>,
    /// One per unordered pair, in input order
    pub pairs: Vec<PairRecord>,
    pub summary: SessionSummary,
}

#[derive(Clone)]
pub struct AssessmentEngine {
    reference: Arc<ReferenceData>,
    classifier: Option<Arc<dyn InteractionClassifier>>,
    config: EngineConfig,
}

impl std::fmt::Debug for AssessmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentEngine")
            .field("snapshot", &self.reference.fingerprint())
            .field("classifier", &self.classifier.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl AssessmentEngine {
    /// Engine over a snapshot with no classifier and default tuning
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        AssessmentEngine {
            reference,
            classifier: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn InteractionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Replace the tuning; rejected if it could produce out-of-range scores
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn reference(&self) -> &Arc<ReferenceData> {
        &self.reference
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate and assess a raw request
    pub fn assess(&self, request: &AssessmentRequest) -> Result<Assessment, ValidationError> {
        let validated = request.validate()?;
        Ok(self.assess_validated(validated))
    }

    /// Assess an already validated request
    pub fn assess_validated(&self, request: ValidatedRequest) -> Assessment {
        let ValidatedRequest {
            drugs,
            patient,
            warnings,
        } = request;

        let assessed: Vec<AssessedDrug> = drugs
            .into_iter()
            .map(|entry| {
                let assessment = evaluate_dose(self.reference.baseline(), &entry, &patient);
                AssessedDrug { entry, assessment }
            })
            .collect();

        let composer = PairComposer::new(
            self.reference.knowledge_base(),
            self.classifier.as_deref(),
            &self.config,
        );
        let pairs = composer.compose(&assessed, patient.is_pediatric);
        let summary = SessionSummary::from_records(&pairs, &self.config);

        log::info!(
            "assessed {} drugs / {} pairs: {} (combined {:.3}, {} failed)",
            assessed.len(),
            summary.total_pairs,
            summary.overall_level,
            summary.combined_score,
            summary.failed_pairs
        );

        Assessment {
            snapshot_fingerprint: self.reference.fingerprint().to_string(),
            warnings,
            dose_assessments: assessed.into_iter().map(|d| d.assessment).collect(),
            pairs,
            summary,
        }
    }

    /// Dose check for a single drug
    pub fn evaluate_dose(&self, entry: &DrugEntry, patient: &PatientContext) -> DoseAssessment {
        evaluate_dose(self.reference.baseline(), entry, patient)
    }

    /// Raw interaction probability for two drugs, with no dose adjustment.
    /// Returns the probability and whether it came from the knowledge base.
    pub fn predict_pair(&self, drug_a: &str, drug_b: &str) -> Result<(f64, bool), ClassifierError> {
        PairComposer::new(
            self.reference.knowledge_base(),
            self.classifier.as_deref(),
            &self.config,
        )
        .raw_probability(drug_a, drug_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::RiskTier;
    use crate::reference::{AdultDoseRange, BaselineTable, DrugBaseline, KnowledgeBase};
    use crate::request::NumericInput;
    use crate::request::DrugInput;

    fn engine() -> AssessmentEngine {
        let mut baseline = BaselineTable::new();
        baseline.insert(
            "Ibuprofen",
            DrugBaseline {
                adult: Some(AdultDoseRange {
                    min_mg_per_dose: Some(200.0),
                    max_mg_per_dose: Some(800.0),
                }),
                pediatric_mg_per_kg_per_day: None,
            },
        );
        let mut kb = KnowledgeBase::new();
        kb.insert("Warfarin", "Ibuprofen", Some("Bleeding risk".to_string()));
        let classifier = |_: &str| -> Result<f64, ClassifierError> { Ok(0.2) };
        AssessmentEngine::new(Arc::new(ReferenceData::new(baseline, kb)))
            .with_classifier(Arc::new(classifier))
    }

    #[test]
    fn test_assess_end_to_end() {
        let request = AssessmentRequest::new(vec![
            DrugInput::new("Warfarin", 5.0, "mg"),
            DrugInput::new("Ibuprofen", 1200.0, "mg"),
            DrugInput::new("Zinc", 50.0, "mg"),
        ]);
        let result = engine().assess(&request).unwrap();
        assert_eq!(result.dose_assessments.len(), 3);
        assert_eq!(result.pairs.len(), 3);
        // warfarin + ibuprofen: curated and overdosed
        assert_eq!(result.pairs[0].risk_tier(), Some(RiskTier::High));
        assert!(result.pairs[0].found_in_knowledge_base);
        // ibuprofen 50% over -> 0.12 + 0.38 * 0.25 = 0.215 on top of 0.2
        let adjusted = result.pairs[2].adjusted_probability().unwrap();
        assert!((adjusted - 0.415).abs() < 1e-12);
        assert_eq!(result.summary.total_pairs, 3);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let config = EngineConfig {
            percent_above_cap: 0.0,
            ..EngineConfig::default()
        };
        let err = engine().with_config(config).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));

        let engine = engine().with_config(EngineConfig::default().with_parallel(false)).unwrap();
        assert!(!engine.config().parallel);
    }

    #[test]
    fn test_request_without_doses_is_scored() {
        let request: AssessmentRequest =
            serde_json::from_str(r#"{"drugs": [{"name": "Warfarin"}, {"name": "Ibuprofen"}]}"#)
                .unwrap();
        let result = engine().assess(&request).unwrap();
        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.pairs[0].risk_tier(), Some(RiskTier::High));
        assert_eq!(result.pairs[0].escalation, 0.0);
        assert!(result
            .dose_assessments
            .iter()
            .all(|d| d.status == crate::dose::DoseStatus::Unknown));
        assert_eq!(result.dose_assessments[1].comment, "No dose given");

        let mut unitless = DrugInput::new("Ibuprofen", 1200.0, "mg");
        unitless.unit = None;
        unitless.dose = Some(NumericInput::Text("1200".to_string()));
        let request = AssessmentRequest::new(vec![DrugInput::new("Warfarin", 5.0, "mg"), unitless]);
        let result = engine().assess(&request).unwrap();
        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.dose_assessments[1].comment, "No dose unit given");
        assert!(result.warnings.iter().any(|w| w.contains("no dose unit given")));
    }

    #[test]
    fn test_separator_in_names_never_matches_curated_pair() {
        let mut kb = KnowledgeBase::new();
        kb.insert("a", "b||c", None);
        let engine = AssessmentEngine::new(Arc::new(ReferenceData::new(BaselineTable::new(), kb)));
        assert_eq!(engine.predict_pair("b||c", "A"), Ok((1.0, true)));
        assert_eq!(engine.predict_pair("a||b", "c"), Err(ClassifierError::Unavailable));
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let request = AssessmentRequest::new(vec![DrugInput::new("Warfarin", 5.0, "mg")]);
        assert_eq!(engine().assess(&request), Err(ValidationError::TooFewDrugs(1)));
    }

    #[test]
    fn test_predict_pair() {
        let engine = engine();
        assert_eq!(engine.predict_pair("ibuprofen", "WARFARIN"), Ok((1.0, true)));
        assert_eq!(engine.predict_pair("Zinc", "Iron"), Ok((0.2, false)));

        let bare = AssessmentEngine::new(engine.reference().clone());
        assert_eq!(bare.predict_pair("Zinc", "Iron"), Err(ClassifierError::Unavailable));
    }
}
