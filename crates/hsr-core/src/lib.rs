//! Core domain model for the HSR roster pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "hsr-core";

/// Placeholder for categorical attributes the upstream record does not resolve.
pub const UNKNOWN: &str = "Unknown";

/// One upstream character entry, exactly as the wiki API returned it.
pub type RawRecord = serde_json::Value;

/// Flat character row built from one raw record, before version tagging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRow {
    pub name: String,
    pub path: String,
    pub element: String,
    pub rarity: String,
    pub atk80: i64,
    pub def80: i64,
    pub hp80: i64,
    pub spd80: i64,
}

impl CharacterRow {
    /// Row with every categorical set to [`UNKNOWN`] and zeroed stats.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: UNKNOWN.to_string(),
            element: UNKNOWN.to_string(),
            rarity: UNKNOWN.to_string(),
            atk80: 0,
            def80: 0,
            hp80: 0,
            spd80: 0,
        }
    }

    pub fn with_version(self, version: f64) -> TaggedRow {
        TaggedRow { row: self, version }
    }
}

/// Ordered roster in upstream page order, then in-page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    rows: Vec<CharacterRow>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: CharacterRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[CharacterRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CharacterRow> {
        self.rows.iter()
    }
}

impl From<Vec<CharacterRow>> for Roster {
    fn from(rows: Vec<CharacterRow>) -> Self {
        Self { rows }
    }
}

impl FromIterator<CharacterRow> for Roster {
    fn from_iter<I: IntoIterator<Item = CharacterRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Roster {
    type Item = CharacterRow;
    type IntoIter = std::vec::IntoIter<CharacterRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Character row with its release cohort assigned; the unit every sink accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedRow {
    #[serde(flatten)]
    pub row: CharacterRow,
    pub version: f64,
}

/// Roster whose rows all carry a version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaggedRoster {
    rows: Vec<TaggedRow>,
}

impl TaggedRoster {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TaggedRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaggedRow> {
        self.rows.iter()
    }
}

impl FromIterator<TaggedRow> for TaggedRoster {
    fn from_iter<I: IntoIterator<Item = TaggedRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CohortTableError {
    #[error("cohort table has no cohorts")]
    Empty,
    #[error("cohort version {0} is not a finite number")]
    InvalidVersion(f64),
}

/// Characters introduced in one release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub version: f64,
    pub characters: Vec<String>,
}

/// Hand-maintained release table. Iteration order is declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CohortTableFile", into = "CohortTableFile")]
pub struct CohortTable {
    cohorts: Vec<Cohort>,
    earliest: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CohortTableFile {
    cohorts: Vec<Cohort>,
}

impl TryFrom<CohortTableFile> for CohortTable {
    type Error = CohortTableError;

    fn try_from(file: CohortTableFile) -> Result<Self, Self::Error> {
        Self::new(file.cohorts)
    }
}

impl From<CohortTable> for CohortTableFile {
    fn from(table: CohortTable) -> Self {
        Self {
            cohorts: table.cohorts,
        }
    }
}

impl CohortTable {
    pub fn new(cohorts: Vec<Cohort>) -> Result<Self, CohortTableError> {
        if let Some(bad) = cohorts.iter().find(|c| !c.version.is_finite()) {
            return Err(CohortTableError::InvalidVersion(bad.version));
        }
        let earliest = cohorts
            .iter()
            .map(|c| c.version)
            .reduce(f64::min)
            .ok_or(CohortTableError::Empty)?;
        Ok(Self { cohorts, earliest })
    }

    pub fn cohorts(&self) -> &[Cohort] {
        &self.cohorts
    }

    /// Smallest version in the table; the cohort assumed for untagged characters.
    pub fn earliest_version(&self) -> f64 {
        self.earliest
    }

    /// Version of the first cohort listing `canonical_name`.
    pub fn lookup(&self, canonical_name: &str) -> Option<f64> {
        self.cohorts
            .iter()
            .find(|c| c.characters.iter().any(|n| n == canonical_name))
            .map(|c| c.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort(version: f64, names: &[&str]) -> Cohort {
        Cohort {
            version,
            characters: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn earliest_version_is_minimum_not_first() {
        let table =
            CohortTable::new(vec![cohort(2.0, &["acheron"]), cohort(1.0, &["kafka"])]).unwrap();
        assert_eq!(table.earliest_version(), 1.0);
    }

    #[test]
    fn lookup_prefers_declaration_order() {
        let table =
            CohortTable::new(vec![cohort(2.0, &["kafka"]), cohort(1.2, &["kafka"])]).unwrap();
        assert_eq!(table.lookup("kafka"), Some(2.0));
        assert_eq!(table.lookup("robin"), None);
    }

    #[test]
    fn empty_and_nan_tables_are_rejected() {
        assert_eq!(CohortTable::new(Vec::new()), Err(CohortTableError::Empty));
        assert!(matches!(
            CohortTable::new(vec![cohort(f64::NAN, &[])]),
            Err(CohortTableError::InvalidVersion(_))
        ));
    }

    #[test]
    fn cohort_table_deserializes_from_json_and_validates() {
        let text = r#"{"cohorts": [
            {"version": 1.1, "characters": ["luocha"]},
            {"version": 1.0, "characters": []}
        ]}"#;
        let table: CohortTable = serde_json::from_str(text).unwrap();
        assert_eq!(table.cohorts().len(), 2);
        assert_eq!(table.earliest_version(), 1.0);

        let empty = serde_json::from_str::<CohortTable>(r#"{"cohorts": []}"#);
        assert!(empty.is_err());
    }

    #[test]
    fn tagged_row_serializes_flat() {
        let tagged = CharacterRow::unknown("kafka").with_version(1.2);
        let value = serde_json::to_value(&tagged).unwrap();
        assert_eq!(value["name"], "kafka");
        assert_eq!(value["path"], UNKNOWN);
        assert_eq!(value["version"], 1.2);
    }
}
