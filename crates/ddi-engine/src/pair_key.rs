//! Canonical identifiers for drugs and unordered drug pairs.
//!
//! Every lookup in the engine goes through these helpers so that
//! "Warfarin ", "warfarin" and "WARFARIN" all resolve to the same
//! baseline record, and `(a, b)` resolves to the same knowledge-base
//! entry as `(b, a)`.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Separator between the two drug names of a pair key
pub const PAIR_KEY_SEPARATOR: &str = "||";

/// Normalize a single drug name for lookup (trimmed, lowercase)
pub fn drug_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Order-independent key for an unordered pair of drug names.
///
/// The two normalized names are stored separately, so names that themselves
/// contain the separator can never make two different pairs compare equal.
/// The `a||b` form is only used for display and serialization.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    first: String,
    second: String,
}

impl PairKey {
    /// Build the canonical key for two drug names
    pub fn new(a: &str, b: &str) -> Self {
        let a = drug_key(a);
        let b = drug_key(b);
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        PairKey { first, second }
    }

    /// The two normalized names, in canonical order
    pub fn members(&self) -> (&str, &str) {
        (&self.first, &self.second)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, PAIR_KEY_SEPARATOR, self.second)
    }
}

impl Serialize for PairKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PairKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let text = String::deserialize(deserializer)?;
        let (a, b) = text
            .split_once(PAIR_KEY_SEPARATOR)
            .ok_or_else(|| D::Error::custom(format!("pair key '{}' has no separator", text)))?;
        Ok(PairKey::new(a, b))
    }
}

/// Convenience wrapper returning the key as a plain string
pub fn pair_key(a: &str, b: &str) -> String {
    PairKey::new(a, b).to_string()
}

/// Enumerate all unordered index pairs `(i, j)` with `i < j`, in input order
pub fn unordered_pairs(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(n.saturating_sub(1) * n / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs
}
