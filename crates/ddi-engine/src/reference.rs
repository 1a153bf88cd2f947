//! Reference data: baseline dosing table and curated interaction knowledge base
//!
//! Both tables are loaded once and frozen into a [`ReferenceData`] snapshot.
//! Requests only ever see an `Arc<ReferenceData>`; replacing the data means
//! building a new snapshot and swapping it in through [`ReferenceStore`].

use crate::pair_key::{drug_key, PairKey};
use crate::DataError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, RwLock};

// ============================================================================
// Baseline dosing table
// ============================================================================

/// Adult per-dose range in mg
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdultDoseRange {
    #[serde(default)]
    pub min_mg_per_dose: Option<f64>,
    #[serde(default)]
    pub max_mg_per_dose: Option<f64>,
}

/// Pediatric daily range in mg/kg/day
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PediatricDoseRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Reference dosing for one drug; any part may be missing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugBaseline {
    #[serde(default)]
    pub adult: Option<AdultDoseRange>,
    #[serde(default)]
    pub pediatric_mg_per_kg_per_day: Option<PediatricDoseRange>,
}

/// Baseline dosing records keyed by normalized drug name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BaselineTable {
    entries: BTreeMap<String, DrugBaseline>,
}

impl BaselineTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from a JSON file (`{ "drug": { "adult": {...}, ... } }`)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let file = open(path.as_ref())?;
        let table = Self::from_json_reader(std::io::BufReader::new(file))?;
        log::info!(
            "loaded {} baseline dosing records from {}",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Parse the table from any JSON reader
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let raw: BTreeMap<String, DrugBaseline> = serde_json::from_reader(reader)?;
        let mut table = Self::new();
        for (name, baseline) in raw {
            table.insert(&name, baseline);
        }
        Ok(table)
    }

    /// Add or replace a record; the name is normalized
    pub fn insert(&mut self, name: &str, baseline: DrugBaseline) {
        let key = drug_key(name);
        if key.is_empty() {
            return;
        }
        if self.entries.insert(key.clone(), baseline).is_some() {
            log::warn!("duplicate baseline record for '{}', keeping the last one", key);
        }
    }

    /// Case- and whitespace-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&DrugBaseline> {
        self.entries.get(&drug_key(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized drug names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

// ============================================================================
// Curated interaction knowledge base
// ============================================================================

/// One curated interaction, as found in JSON knowledge-base files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnownInteraction {
    pub drug1: String,
    pub drug2: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Known interacting pairs with optional free-text descriptions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KnowledgeBase {
    pairs: BTreeMap<PairKey, Option<String>>,
    drugs: BTreeSet<String>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a known interaction. Blank names are ignored.
    pub fn insert(&mut self, drug1: &str, drug2: &str, description: Option<String>) {
        if drug1.trim().is_empty() || drug2.trim().is_empty() {
            return;
        }
        let key = PairKey::new(drug1, drug2);
        let description = description.filter(|d| !d.trim().is_empty());
        // keep the first non-empty description seen for a pair
        let slot = self.pairs.entry(key).or_insert(None);
        if slot.is_none() {
            *slot = description;
        }
        self.drugs.insert(drug1.trim().to_string());
        self.drugs.insert(drug2.trim().to_string());
    }

    /// Load a CSV file with `drug1,drug2[,description][,label]` columns
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let file = open(path.as_ref())?;
        let kb = Self::from_csv_reader(file)?;
        log::info!(
            "loaded {} curated interactions from {}",
            kb.len(),
            path.as_ref().display()
        );
        Ok(kb)
    }

    /// Parse CSV with a header row. Rows labelled `0` are negative
    /// training samples, not curated interactions, and are skipped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let drug1_col = column("drug1").ok_or(DataError::MissingColumn("drug1"))?;
        let drug2_col = column("drug2").ok_or(DataError::MissingColumn("drug2"))?;
        let description_col = column("description");
        let label_col = column("label");

        let mut kb = Self::new();
        let mut skipped_negative = 0usize;
        for row in reader.records() {
            let row = row?;
            if let Some(label) = label_col.and_then(|c| row.get(c)) {
                if label.parse::<f64>().map(|v| v == 0.0).unwrap_or(false) {
                    skipped_negative += 1;
                    continue;
                }
            }
            let drug1 = row.get(drug1_col).unwrap_or_default();
            let drug2 = row.get(drug2_col).unwrap_or_default();
            let description = description_col
                .and_then(|c| row.get(c))
                .map(str::to_string);
            kb.insert(drug1, drug2, description);
        }
        if skipped_negative > 0 {
            log::debug!("skipped {} negative-label rows", skipped_negative);
        }
        Ok(kb)
    }

    /// Load a JSON array of `{drug1, drug2, description?}` objects
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let file = open(path.as_ref())?;
        let kb = Self::from_json_reader(std::io::BufReader::new(file))?;
        log::info!(
            "loaded {} curated interactions from {}",
            kb.len(),
            path.as_ref().display()
        );
        Ok(kb)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let rows: Vec<KnownInteraction> = serde_json::from_reader(reader)?;
        let mut kb = Self::new();
        for row in rows {
            kb.insert(&row.drug1, &row.drug2, row.description);
        }
        Ok(kb)
    }

    /// Load by file extension: `.json` as JSON, anything else as CSV
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let is_json = path
            .as_ref()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::load_json(path)
        } else {
            Self::load_csv(path)
        }
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.pairs.contains_key(key)
    }

    /// Description of a known pair, if one was curated
    pub fn description(&self, key: &PairKey) -> Option<&str> {
        self.pairs.get(key).and_then(|d| d.as_deref())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Drug names as they appear in the source data
    pub fn drug_names(&self) -> impl Iterator<Item = &str> {
        self.drugs.iter().map(String::as_str)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Frozen reference data shared read-only by every request
#[derive(Debug)]
pub struct ReferenceData {
    baseline: BaselineTable,
    knowledge_base: KnowledgeBase,
    fingerprint: String,
}

impl ReferenceData {
    /// Freeze the two tables into a snapshot
    pub fn new(baseline: BaselineTable, knowledge_base: KnowledgeBase) -> Self {
        let fingerprint = fingerprint(&baseline, &knowledge_base);
        log::debug!("reference snapshot {}", fingerprint);
        ReferenceData {
            baseline,
            knowledge_base,
            fingerprint,
        }
    }

    /// Load both tables from disk
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        baseline_path: P,
        knowledge_base_path: Q,
    ) -> Result<Self, DataError> {
        let baseline = BaselineTable::load(baseline_path)?;
        let knowledge_base = KnowledgeBase::load(knowledge_base_path)?;
        Ok(Self::new(baseline, knowledge_base))
    }

    pub fn baseline(&self) -> &BaselineTable {
        &self.baseline
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    /// SHA-256 (hex) over the canonical contents of both tables
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Every drug name the engine has reference data for, sorted and deduplicated
    pub fn known_drugs(&self) -> Vec<String> {
        let mut seen = BTreeMap::new();
        for name in self.knowledge_base.drug_names().chain(self.baseline.names()) {
            seen.entry(drug_key(name)).or_insert_with(|| name.to_string());
        }
        let mut names: Vec<String> = seen.into_values().collect();
        names.sort();
        names
    }

    /// Substring search over known drug names (case-insensitive)
    pub fn search_drugs(&self, query: &str, limit: usize) -> Vec<String> {
        let query = drug_key(query);
        self.known_drugs()
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&query))
            .take(limit)
            .collect()
    }
}

/// Holder for the current snapshot, replaced only by an explicit reload
#[derive(Debug)]
pub struct ReferenceStore {
    current: RwLock<Arc<ReferenceData>>,
}

impl ReferenceStore {
    pub fn new(data: ReferenceData) -> Self {
        ReferenceStore {
            current: RwLock::new(Arc::new(data)),
        }
    }

    /// The snapshot in effect right now. In-flight requests keep whatever
    /// snapshot they started with.
    pub fn snapshot(&self) -> Arc<ReferenceData> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new snapshot, returning the previous one
    pub fn reload(&self, data: ReferenceData) -> Arc<ReferenceData> {
        let next = Arc::new(data);
        log::info!("reference data reloaded ({})", next.fingerprint());
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}

fn open(path: &Path) -> Result<std::fs::File, DataError> {
    std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn hash_optional(hasher: &mut Sha256, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update(v.to_le_bytes());
        }
        None => hasher.update([0u8]),
    }
}

fn fingerprint(baseline: &BaselineTable, knowledge_base: &KnowledgeBase) -> String {
    let mut hasher = Sha256::new();

    hasher.update(b"baseline");
    for (name, record) in &baseline.entries {
        hasher.update(name.as_bytes());
        hasher.update([0xffu8]);
        let adult = record.adult.clone().unwrap_or_default();
        hasher.update([record.adult.is_some() as u8]);
        hash_optional(&mut hasher, adult.min_mg_per_dose);
        hash_optional(&mut hasher, adult.max_mg_per_dose);
        let pediatric = record.pediatric_mg_per_kg_per_day.clone().unwrap_or_default();
        hasher.update([record.pediatric_mg_per_kg_per_day.is_some() as u8]);
        hash_optional(&mut hasher, pediatric.min);
        hash_optional(&mut hasher, pediatric.max);
    }

    hasher.update(b"interactions");
    for (key, description) in &knowledge_base.pairs {
        let (first, second) = key.members();
        hasher.update(first.as_bytes());
        hasher.update([0xfdu8]);
        hasher.update(second.as_bytes());
        hasher.update([0xffu8]);
        if let Some(text) = description {
            hasher.update(text.as_bytes());
        }
        hasher.update([0xfeu8]);
    }

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASELINE_JSON: &str = r#"{
        "Ibuprofen": {
            "adult": {"min_mg_per_dose": 200, "max_mg_per_dose": 800},
            "pediatric_mg_per_kg_per_day": {"min": 20, "max": 40}
        },
        "warfarin": {"adult": {"min_mg_per_dose": 1}},
        "zinc": {}
    }"#;

    #[test]
    fn test_baseline_lookup_is_normalized() {
        let table = BaselineTable::from_json_reader(BASELINE_JSON.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        let ibuprofen = table.get("  IBUPROFEN ").unwrap();
        assert_eq!(ibuprofen.adult.as_ref().unwrap().max_mg_per_dose, Some(800.0));
        assert_eq!(
            table.get("warfarin").unwrap().adult.as_ref().unwrap().max_mg_per_dose,
            None
        );
        assert!(table.get("zinc").unwrap().adult.is_none());
        assert!(table.get("paracetamol").is_none());
    }

    #[test]
    fn test_knowledge_base_csv_skips_negative_labels() {
        let csv = "drug1,drug2,description,label\n\
                   Warfarin,Aspirin,Bleeding risk,1\n\
                   Metformin,Zinc,,0\n\
                   Lisinopril,Potassium,,1\n";
        let kb = KnowledgeBase::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(kb.len(), 2);
        assert!(kb.contains(&PairKey::new("aspirin", "warfarin")));
        assert!(!kb.contains(&PairKey::new("metformin", "zinc")));
        assert_eq!(
            kb.description(&PairKey::new("ASPIRIN", "warfarin")),
            Some("Bleeding risk")
        );
        assert_eq!(kb.description(&PairKey::new("lisinopril", "potassium")), None);
    }

    #[test]
    fn test_knowledge_base_csv_without_label_column() {
        let csv = " Drug1 , Drug2 \nA,B\nC,\n";
        let kb = KnowledgeBase::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(kb.len(), 1);
        assert!(kb.contains(&PairKey::new("b", "a")));
    }

    #[test]
    fn test_knowledge_base_names_with_separator_stay_distinct() {
        let csv = "drug1,drug2\na,b||c\n";
        let kb = KnowledgeBase::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(kb.contains(&PairKey::new("b||c", "A")));
        assert!(!kb.contains(&PairKey::new("a||b", "c")));
    }

    #[test]
    fn test_knowledge_base_csv_requires_drug_columns() {
        let csv = "first,second\nA,B\n";
        let err = KnowledgeBase::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn("drug1")));
    }

    #[test]
    fn test_knowledge_base_json() {
        let json = r#"[
            {"drug1": "Simvastatin", "drug2": "Clarithromycin", "description": "Myopathy"},
            {"drug1": "a", "drug2": "b"}
        ]"#;
        let kb = KnowledgeBase::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(kb.len(), 2);
        assert_eq!(
            kb.description(&PairKey::new("clarithromycin", "simvastatin")),
            Some("Myopathy")
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let table = BaselineTable::from_json_reader(BASELINE_JSON.as_bytes()).unwrap();
        let mut kb = KnowledgeBase::new();
        kb.insert("warfarin", "aspirin", None);

        let a = ReferenceData::new(table.clone(), kb.clone());
        let b = ReferenceData::new(table.clone(), kb.clone());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        kb.insert("warfarin", "ibuprofen", None);
        let c = ReferenceData::new(table, kb);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_known_drugs_and_search() {
        let table = BaselineTable::from_json_reader(BASELINE_JSON.as_bytes()).unwrap();
        let mut kb = KnowledgeBase::new();
        kb.insert("Warfarin", "Aspirin", None);
        let data = ReferenceData::new(table, kb);

        let known = data.known_drugs();
        assert_eq!(known, vec!["Aspirin", "Warfarin", "ibuprofen", "zinc"]);
        assert_eq!(data.search_drugs("ARF", 30), vec!["Warfarin"]);
        assert_eq!(data.search_drugs("", 2).len(), 2);
    }

    #[test]
    fn test_store_reload_swaps_snapshot() {
        let empty = ReferenceData::new(BaselineTable::new(), KnowledgeBase::new());
        let store = ReferenceStore::new(empty);
        let before = store.snapshot();

        let mut kb = KnowledgeBase::new();
        kb.insert("a", "b", None);
        let previous = store.reload(ReferenceData::new(BaselineTable::new(), kb));

        assert_eq!(previous.fingerprint(), before.fingerprint());
        assert_ne!(store.snapshot().fingerprint(), before.fingerprint());
        // the old snapshot stays valid for whoever still holds it
        assert!(before.knowledge_base().is_empty());
    }
}
