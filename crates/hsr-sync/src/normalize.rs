//! Canonical character identifiers and path labels.

use hsr_core::{CharacterRow, Roster};

const COMING_SOON: &str = "(Coming Soon)";
const NBSP: char = '\u{a0}';
const PATH_PREFIX: &str = "The ";

/// Lowercase, hyphen-separated identifier for a display name. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    let cleaned = raw
        .replace(&format!(" {COMING_SOON}"), "")
        .replace(COMING_SOON, "")
        .replace(NBSP, " ");
    let hyphenated = cleaned
        .chars()
        .filter(|c| !matches!(c, '.' | '•' | ':'))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect::<String>()
        .to_lowercase();

    let mut out = String::with_capacity(hyphenated.len());
    for ch in hyphenated.chars() {
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    out.trim_end_matches('-').to_string()
}

/// Drop a leading "The " ("The Hunt" -> "Hunt").
pub fn normalize_path(raw: &str) -> String {
    raw.strip_prefix(PATH_PREFIX).unwrap_or(raw).to_string()
}

/// Canonicalize name and path of every row, keeping order.
pub fn normalize_roster(roster: Roster) -> Roster {
    roster
        .into_iter()
        .map(|row| CharacterRow {
            name: normalize_name(&row.name),
            path: normalize_path(&row.path),
            ..row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_coming_soon_marker() {
        assert_eq!(normalize_name("Kafka (Coming Soon)"), "kafka");
        assert_eq!(normalize_name("Kafka(Coming Soon)"), "kafka");
    }

    #[test]
    fn handles_nbsp_and_punctuation() {
        assert_eq!(normalize_name("Dr. Ratio"), "dr-ratio");
        assert_eq!(normalize_name("Dan Heng • Imbibitor Lunae"), "dan-heng-imbibitor-lunae");
        assert_eq!(normalize_name("Silver\u{a0}Wolf"), "silver-wolf");
        assert_eq!(normalize_name("Trailblazer: Remembrance"), "trailblazer-remembrance");
        assert_eq!(normalize_name("Topaz & Numby"), "topaz-&-numby");
    }

    #[test]
    fn collapses_and_trims_hyphens() {
        assert_eq!(normalize_name("March  7th  "), "march-7th");
        assert_eq!(normalize_name("a - b"), "a-b");
        assert_eq!(normalize_name("..."), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "Kafka (Coming Soon)",
            "Dan Heng • Imbibitor Lunae",
            "  Leading space",
            "Trailing--",
            "(Coming. Soon)",
            "Ünïcödé NAME\u{a0}\u{a0}x",
            "March 7th: The Hunt",
            "",
            "-",
            "İstanbul",
        ];
        for s in samples {
            let once = normalize_name(s);
            assert_eq!(normalize_name(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn marker_removal_runs_before_nbsp_folding() {
        assert_eq!(normalize_name("Kafka\u{a0}(Coming Soon)"), "kafka");
        assert_eq!(normalize_name("X (Coming (Coming Soon) Soon)"), "x");
        assert_eq!(normalize_name("X (Coming(Coming Soon) Soon)"), "x-(coming-soon)");
        assert_eq!(normalize_name("Kafka (Coming\u{a0}Soon)"), "kafka-(coming-soon)");
    }

    #[test]
    fn idempotent_over_every_short_token_sequence() {
        let tokens = [
            "(Coming Soon)",
            " (Coming Soon)",
            "(Coming",
            " Soon)",
            "\u{a0}",
            " ",
            "-",
            ".",
            "•",
            ":",
            "Kafka",
            "X",
        ];
        let mut inputs = vec![String::new()];
        for _ in 0..3 {
            inputs = inputs
                .iter()
                .flat_map(|prefix| tokens.iter().map(move |t| format!("{prefix}{t}")))
                .collect();
            for s in &inputs {
                let once = normalize_name(s);
                assert_eq!(normalize_name(&once), once, "not idempotent for {s:?}");
            }
        }
    }

    #[test]
    fn path_prefix_only_at_start() {
        assert_eq!(normalize_path("The Hunt"), "Hunt");
        assert_eq!(normalize_path("Remembrance"), "Remembrance");
        assert_eq!(normalize_path("Unknown"), "Unknown");
        assert_eq!(normalize_path("Path of The Hunt"), "Path of The Hunt");
    }

    #[test]
    fn roster_normalization_keeps_order_and_stats() {
        let mut kafka = CharacterRow::unknown("Kafka");
        kafka.path = "The Nihility".into();
        kafka.atk80 = 679;
        let roster = Roster::from(vec![kafka, CharacterRow::unknown("Dr. Ratio")]);

        let normalized = normalize_roster(roster);
        let rows = normalized.rows();
        assert_eq!(rows[0].name, "kafka");
        assert_eq!(rows[0].path, "Nihility");
        assert_eq!(rows[0].atk80, 679);
        assert_eq!(rows[1].name, "dr-ratio");
        assert_eq!(rows[1].path, "Unknown");
    }
}
