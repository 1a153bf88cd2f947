//! DDI Engine - Drug-Drug Interaction Risk Assessment
//!
//! Checks each prescribed dose against reference ranges, scores every
//! unordered pair of drugs for interaction risk and rolls the pairs up into
//! a session-level summary.
//!
//! # Features
//!
//! - Adult per-dose and pediatric mg/kg/day range checks
//! - Curated knowledge base lookups with classifier fallback
//! - Dose-driven escalation of pair probabilities
//! - Deterministic, order-preserving output (JSON and CSV)
//! - Optional parallel pair scoring (`parallel` feature)
//!
//! # Example
//!
//! ```rust
//! use ddi_engine::{
//!     AssessmentEngine, AssessmentRequest, BaselineTable, ClassifierError, DrugInput,
//!     KnowledgeBase, ReferenceData, RiskTier,
//! };
//! use std::sync::Arc;
//!
//! let mut kb = KnowledgeBase::new();
//! kb.insert("Warfarin", "Aspirin", Some("Increased bleeding risk".to_string()));
//! let reference = Arc::new(ReferenceData::new(BaselineTable::new(), kb));
//!
//! let classifier = |_: &str| -> Result<f64, ClassifierError> { Ok(0.1) };
//! let engine = AssessmentEngine::new(reference).with_classifier(Arc::new(classifier));
//!
//! let request = AssessmentRequest::new(vec![
//!     DrugInput::new("Warfarin", 5.0, "mg"),
//!     DrugInput::new("Aspirin", 100.0, "mg"),
//! ]);
//! let result = engine.assess(&request).unwrap();
//!
//! assert_eq!(result.pairs.len(), 1);
//! assert_eq!(result.pairs[0].risk_tier(), Some(RiskTier::High));
//! ```

pub mod classifier;
pub mod compose;
pub mod config;
pub mod dose;
pub mod engine;
pub mod pair_key;
pub mod reference;
pub mod report;
pub mod request;
pub mod summary;
pub mod units;

// Re-export commonly used types for convenience
pub use classifier::{ClassifierError, InteractionClassifier, LinearTextClassifier};
pub use compose::{PairRecord, PairScore, RiskTier};
pub use config::{ConfigError, EngineConfig, TierThresholds};
pub use dose::{evaluate_dose, DoseAssessment, DoseStatus};
pub use engine::{Assessment, AssessmentEngine};
pub use pair_key::{pair_key, PairKey};
pub use reference::{
    BaselineTable, DrugBaseline, KnowledgeBase, KnownInteraction, ReferenceData, ReferenceStore,
};
pub use report::AssessmentReport;
pub use request::{
    AssessmentRequest, DrugEntry, DrugInput, NumericInput, PatientContext, ValidatedRequest,
    ValidationError,
};
pub use summary::SessionSummary;
pub use units::{convert_to_mg, ConversionError, DoseUnit};

use thiserror::Error;

/// Errors loading or writing reference data, models and reports
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("knowledge base is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("invalid classifier model: {0}")]
    InvalidModel(String),
}
