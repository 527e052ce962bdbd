//! Release-cohort tagging.

use std::path::Path;

use anyhow::{Context, Result};
use hsr_core::{CohortTable, Roster, TaggedRoster};
use tracing::info;

use crate::normalize::normalize_name;

pub const COHORTS_FILE: &str = "cohorts.yaml";

pub fn load_cohort_table(path: impl AsRef<Path>) -> Result<CohortTable> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn load_cohort_table_from_workspace_root(root: &Path) -> Result<CohortTable> {
    load_cohort_table(root.join(COHORTS_FILE))
}

/// Assign each row the first cohort listing its canonical name, else the earliest cohort.
pub fn tag_version(roster: Roster, table: &CohortTable) -> TaggedRoster {
    let mut defaulted = 0usize;
    let tagged: TaggedRoster = roster
        .into_iter()
        .map(|row| {
            let version = table.lookup(&normalize_name(&row.name)).unwrap_or_else(|| {
                defaulted += 1;
                table.earliest_version()
            });
            row.with_version(version)
        })
        .collect();
    info!(
        rows = tagged.len(),
        defaulted,
        default_version = table.earliest_version(),
        "tagged release cohorts"
    );
    tagged
}

/// Canonical names of rows the table does not list, in roster order.
pub fn defaulted_characters(roster: &TaggedRoster, table: &CohortTable) -> Vec<String> {
    roster
        .iter()
        .map(|r| normalize_name(&r.row.name))
        .filter(|name| table.lookup(name).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsr_core::{CharacterRow, Cohort};

    fn table(entries: &[(f64, &[&str])]) -> CohortTable {
        CohortTable::new(
            entries
                .iter()
                .map(|(version, names)| Cohort {
                    version: *version,
                    characters: names.iter().map(|n| n.to_string()).collect(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn roster(names: &[&str]) -> Roster {
        names.iter().map(|n| CharacterRow::unknown(*n)).collect()
    }

    fn versions(tagged: &TaggedRoster) -> Vec<f64> {
        tagged.iter().map(|r| r.version).collect()
    }

    #[test]
    fn unlisted_character_gets_minimum_version() {
        let table = table(&[(1.0, &["kafka"]), (2.0, &["acheron"])]);
        let tagged = tag_version(roster(&["robin"]), &table);
        assert_eq!(versions(&tagged), vec![1.0]);
    }

    #[test]
    fn default_is_minimum_even_when_declared_last() {
        let table = table(&[(2.1, &["acheron"]), (1.1, &["luocha"])]);
        let tagged = tag_version(roster(&["welt"]), &table);
        assert_eq!(versions(&tagged), vec![1.1]);
    }

    #[test]
    fn first_matching_cohort_wins() {
        let table = table(&[(1.2, &["kafka"]), (2.0, &["kafka", "sparkle"])]);
        let tagged = tag_version(roster(&["kafka", "sparkle"]), &table);
        assert_eq!(versions(&tagged), vec![1.2, 2.0]);
    }

    #[test]
    fn lookup_uses_canonical_name() {
        let table = table(&[(1.0, &[]), (1.6, &["dr-ratio"])]);
        let tagged = tag_version(roster(&["Dr. Ratio", "dr-ratio"]), &table);
        assert_eq!(versions(&tagged), vec![1.6, 1.6]);
        assert_eq!(tagged.rows()[0].row.name, "Dr. Ratio");
    }

    #[test]
    fn defaulted_characters_lists_unlisted_names() {
        let table = table(&[(1.0, &["kafka"]), (2.0, &["acheron"])]);
        let tagged = tag_version(roster(&["Robin", "Kafka", "Dr. Ratio"]), &table);
        assert_eq!(defaulted_characters(&tagged, &table), vec!["robin", "dr-ratio"]);
    }

    #[test]
    fn shipped_cohort_file_loads() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let table = load_cohort_table_from_workspace_root(&root).unwrap();
        assert_eq!(table.earliest_version(), 1.0);
        assert_eq!(table.lookup("silver-wolf"), Some(1.1));
        assert_eq!(table.lookup("the-herta"), Some(3.0));
    }
}
