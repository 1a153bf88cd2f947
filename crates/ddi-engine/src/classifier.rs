//! Interaction classifier adapter
//!
//! The engine only sees [`InteractionClassifier`]: a function from a free-text
//! pair description to a probability. Anything implementing it can be
//! injected, including plain closures, so tests run without model files.
//!
//! [`LinearTextClassifier`] is the bundled adapter. It scores text with an
//! exported TF-IDF vocabulary and logistic-regression weights. Fitting the
//! model happens offline and is not part of this crate.

use crate::DataError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Why a single classifier call produced no usable probability
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("no interaction classifier is configured")]
    Unavailable,
    #[error("classifier returned {0}, outside [0, 1]")]
    OutOfRange(f64),
    #[error("classifier failed: {0}")]
    Backend(String),
}

/// Scoring oracle: probability that the described pair interacts
pub trait InteractionClassifier: Send + Sync {
    fn classify(&self, description: &str) -> Result<f64, ClassifierError>;
}

impl<F> InteractionClassifier for F
where
    F: Fn(&str) -> Result<f64, ClassifierError> + Send + Sync,
{
    fn classify(&self, description: &str) -> Result<f64, ClassifierError> {
        self(description)
    }
}

/// Text handed to the classifier for a pair
pub fn pair_description(drug_a: &str, drug_b: &str) -> String {
    format!("Interaction between {} and {}", drug_a, drug_b)
}

/// Call the classifier and reject anything that is not a probability
pub fn checked_probability(
    classifier: &dyn InteractionClassifier,
    description: &str,
) -> Result<f64, ClassifierError> {
    let p = classifier.classify(description)?;
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ClassifierError::OutOfRange(p))
    }
}

/// Serialized form of an exported linear text model
#[derive(Clone, Debug, Serialize, Deserialize)]
struct LinearModelFile {
    /// term -> feature index
    vocabulary: HashMap<String, usize>,
    /// inverse document frequency per feature
    idf: Vec<f64>,
    /// logistic-regression weight per feature
    coefficients: Vec<f64>,
    intercept: f64,
}

/// TF-IDF + logistic regression scorer
#[derive(Clone, Debug)]
pub struct LinearTextClassifier {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearTextClassifier {
    /// Build a classifier, checking that every vector has one entry per feature
    pub fn new(
        vocabulary: HashMap<String, usize>,
        idf: Vec<f64>,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, DataError> {
        if idf.len() != coefficients.len() {
            return Err(DataError::InvalidModel(format!(
                "idf has {} entries but coefficients has {}",
                idf.len(),
                coefficients.len()
            )));
        }
        if let Some((term, &index)) = vocabulary.iter().find(|&(_, &i)| i >= idf.len()) {
            return Err(DataError::InvalidModel(format!(
                "term '{}' maps to feature {} but the model has {} features",
                term,
                index,
                idf.len()
            )));
        }
        if !intercept.is_finite()
            || idf.iter().chain(coefficients.iter()).any(|v| !v.is_finite())
        {
            return Err(DataError::InvalidModel("non-finite weight".to_string()));
        }
        Ok(LinearTextClassifier {
            vocabulary,
            idf,
            coefficients,
            intercept,
        })
    }

    /// Load an exported model from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let file = std::fs::File::open(path.as_ref()).map_err(|source| DataError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        let model = Self::from_json_reader(std::io::BufReader::new(file))?;
        log::info!(
            "loaded interaction classifier with {} features from {}",
            model.feature_count(),
            path.as_ref().display()
        );
        Ok(model)
    }

    pub fn from_json_reader<R: std::io::Read>(reader: R) -> Result<Self, DataError> {
        let data: LinearModelFile = serde_json::from_reader(reader)?;
        Self::new(data.vocabulary, data.idf, data.coefficients, data.intercept)
    }

    pub fn feature_count(&self) -> usize {
        self.idf.len()
    }

    /// Lowercased tokens of two or more word characters
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|token| token.chars().count() >= 2)
            .map(str::to_string)
            .collect()
    }

    /// L2-normalized TF-IDF features as `(index, weight)`
    fn vectorize(&self, text: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in Self::tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        features.sort_by_key(|(index, _)| *index);

        let norm = features.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in features.iter_mut() {
                *w /= norm;
            }
        }
        features
    }
}

impl InteractionClassifier for LinearTextClassifier {
    fn classify(&self, description: &str) -> Result<f64, ClassifierError> {
        let score: f64 = self
            .vectorize(description)
            .iter()
            .map(|(index, w)| w * self.coefficients[*index])
            .sum::<f64>()
            + self.intercept;
        Ok(1.0 / (1.0 + (-score).exp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LinearTextClassifier {
        let json = r#"{
            "vocabulary": {"warfarin": 0, "aspirin": 1, "interaction": 2, "between": 3},
            "idf": [2.0, 2.0, 1.0, 1.0],
            "coefficients": [3.0, 2.0, 0.0, 0.0],
            "intercept": -1.0
        }"#;
        LinearTextClassifier::from_json_reader(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_tokenize_drops_single_characters() {
        assert_eq!(
            LinearTextClassifier::tokenize("Interaction between A and Vitamin_D3!"),
            vec!["interaction", "between", "and", "vitamin_d3"]
        );
    }

    #[test]
    fn test_known_terms_raise_probability() {
        let model = model();
        let known = model.classify(&pair_description("Warfarin", "Aspirin")).unwrap();
        let unknown = model.classify(&pair_description("Zinc", "Metformin")).unwrap();
        assert!(known > 0.5, "expected > 0.5, got {}", known);
        assert!(unknown < 0.5, "expected < 0.5, got {}", unknown);
        assert!((0.0..=1.0).contains(&known));
    }

    #[test]
    fn test_empty_text_uses_intercept() {
        let p = model().classify("").unwrap();
        let expected = 1.0 / (1.0 + 1.0f64.exp());
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_inconsistent_model() {
        let json =
            r#"{"vocabulary": {"a": 5}, "idf": [1.0], "coefficients": [1.0], "intercept": 0.0}"#;
        assert!(matches!(
            LinearTextClassifier::from_json_reader(json.as_bytes()),
            Err(DataError::InvalidModel(_))
        ));
        let json =
            r#"{"vocabulary": {}, "idf": [1.0, 2.0], "coefficients": [1.0], "intercept": 0.0}"#;
        assert!(LinearTextClassifier::from_json_reader(json.as_bytes()).is_err());
    }

    #[test]
    fn test_checked_probability_rejects_out_of_range() {
        let too_high = |_: &str| -> Result<f64, ClassifierError> { Ok(1.2) };
        let nan = |_: &str| -> Result<f64, ClassifierError> { Ok(f64::NAN) };
        let fine = |_: &str| -> Result<f64, ClassifierError> { Ok(0.3) };
        assert_eq!(
            checked_probability(&too_high, "x"),
            Err(ClassifierError::OutOfRange(1.2))
        );
        assert!(checked_probability(&nan, "x").is_err());
        assert_eq!(checked_probability(&fine, "x"), Ok(0.3));
    }

    #[test]
    fn test_pair_description_text() {
        assert_eq!(
            pair_description("Warfarin", "Aspirin"),
            "Interaction between Warfarin and Aspirin"
        );
    }
}
