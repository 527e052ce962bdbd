//! Aggregate datasets behind the roster charts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use hsr_core::{TaggedRoster, TaggedRow};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionCount {
    pub version: f64,
    pub count: usize,
}

/// Running total for one category up to and including `version`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativeCount {
    pub version: f64,
    pub category: String,
    pub cumulative: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossCount {
    pub row: String,
    pub column: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatValue {
    pub character: String,
    pub value: i64,
}

/// Characters ordered by each level-80 stat, highest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRankings {
    pub atk: Vec<StatValue>,
    pub def: Vec<StatValue>,
    pub hp: Vec<StatValue>,
    pub spd: Vec<StatValue>,
}

impl StatRankings {
    pub fn from_roster(roster: &TaggedRoster) -> Self {
        Self {
            atk: stat_ranking(roster, |r| r.row.atk80),
            def: stat_ranking(roster, |r| r.row.def80),
            hp: stat_ranking(roster, |r| r.row.hp80),
            spd: stat_ranking(roster, |r| r.row.spd80),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDatasets {
    pub path_distribution: Vec<CategoryCount>,
    pub element_distribution: Vec<CategoryCount>,
    pub rarity_distribution: Vec<CategoryCount>,
    pub version_timeline: Vec<VersionCount>,
    pub element_evolution: Vec<CumulativeCount>,
    pub path_evolution: Vec<CumulativeCount>,
    pub rarity_evolution: Vec<CumulativeCount>,
    pub element_path: Vec<CrossCount>,
    pub rarity_element: Vec<CrossCount>,
    pub path_rarity: Vec<CrossCount>,
    pub stat_rankings: StatRankings,
}

impl ChartDatasets {
    pub fn from_roster(roster: &TaggedRoster) -> Self {
        Self {
            path_distribution: distribution(roster, |r| &r.row.path),
            element_distribution: distribution(roster, |r| &r.row.element),
            rarity_distribution: distribution(roster, |r| &r.row.rarity),
            version_timeline: version_timeline(roster),
            element_evolution: cumulative_by_version(roster, |r| &r.row.element),
            path_evolution: cumulative_by_version(roster, |r| &r.row.path),
            rarity_evolution: cumulative_by_version(roster, |r| &r.row.rarity),
            element_path: cross_counts(roster, |r| &r.row.element, |r| &r.row.path),
            rarity_element: cross_counts(roster, |r| &r.row.rarity, |r| &r.row.element),
            path_rarity: cross_counts(roster, |r| &r.row.path, |r| &r.row.rarity),
            stat_rankings: StatRankings::from_roster(roster),
        }
    }
}

// Versions are finite by construction of the cohort table.
#[derive(Debug, Clone, Copy, PartialEq)]
struct VersionKey(f64);

impl Eq for VersionKey {}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Counts per label, largest first; ties broken by label.
pub fn distribution<F>(roster: &TaggedRoster, label: F) -> Vec<CategoryCount>
where
    F: Fn(&TaggedRow) -> &String,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in roster.iter() {
        *counts.entry(label(row).as_str()).or_default() += 1;
    }
    let mut out = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    out
}

pub fn version_timeline(roster: &TaggedRoster) -> Vec<VersionCount> {
    let mut counts: BTreeMap<VersionKey, usize> = BTreeMap::new();
    for row in roster.iter() {
        *counts.entry(VersionKey(row.version)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(version, count)| VersionCount {
            version: version.0,
            count,
        })
        .collect()
}

/// One entry per (version, category) pair present in the roster, ordered by version then
/// category, carrying the category's total across all versions up to that one.
pub fn cumulative_by_version<F>(roster: &TaggedRoster, label: F) -> Vec<CumulativeCount>
where
    F: Fn(&TaggedRow) -> &String,
{
    let mut per_version: BTreeMap<(VersionKey, &str), usize> = BTreeMap::new();
    for row in roster.iter() {
        *per_version
            .entry((VersionKey(row.version), label(row).as_str()))
            .or_default() += 1;
    }

    let mut running: HashMap<&str, usize> = HashMap::new();
    per_version
        .into_iter()
        .map(|((version, category), count)| {
            let total = running.entry(category).or_default();
            *total += count;
            CumulativeCount {
                version: version.0,
                category: category.to_string(),
                cumulative: *total,
            }
        })
        .collect()
}

/// Co-occurrence counts for two attributes, ordered by row label then column label.
pub fn cross_counts<R, C>(roster: &TaggedRoster, row_label: R, column_label: C) -> Vec<CrossCount>
where
    R: Fn(&TaggedRow) -> &String,
    C: Fn(&TaggedRow) -> &String,
{
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for row in roster.iter() {
        *counts
            .entry((row_label(row).as_str(), column_label(row).as_str()))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((row, column), count)| CrossCount {
            row: row.to_string(),
            column: column.to_string(),
            count,
        })
        .collect()
}

/// Every character with its value for one stat, highest first; ties broken by name.
pub fn stat_ranking<F>(roster: &TaggedRoster, stat: F) -> Vec<StatValue>
where
    F: Fn(&TaggedRow) -> i64,
{
    let mut out = roster
        .iter()
        .map(|row| StatValue {
            character: row.row.name.clone(),
            value: stat(row),
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.character.cmp(&b.character)));
    out
}
