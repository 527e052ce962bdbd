//! Field extraction and row building over raw wiki entries.
//!
//! Every attribute is resolved on its own: a missing or malformed field only ever defaults that
//! one field. The name is the single required field.

use hsr_core::{CharacterRow, RawRecord, UNKNOWN};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::warn;

pub const FILTER_VALUES_KEY: &str = "filter_values";
pub const PATH_KEY: &str = "character_paths";
pub const ELEMENT_KEY: &str = "character_combat_type";
pub const RARITY_KEY: &str = "character_rarity";
pub const DISPLAY_FIELD_KEY: &str = "display_field";
pub const LEVEL_80_KEY: &str = "attr_level_80";

const ATK_KEYS: &[&str] = &["base_atk", "atk"];
const DEF_KEYS: &[&str] = &["base_def", "def"];
const HP_KEYS: &[&str] = &["base_hp", "hp"];
const SPEED_KEYS: &[&str] = &["base_speed", "speed"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record has no resolvable name (entry_page_id={})", .entry_id.as_deref().unwrap_or("?"))]
pub struct MissingNameError {
    pub entry_id: Option<String>,
}

/// A candidate key was present but did not hold `{"values": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {key:?} is not an object with a `values` list")]
pub struct FieldShapeError {
    pub key: String,
}

/// First element of the first non-empty `values` list among `keys`, or `None`.
///
/// Precondition: any key present in `record` maps to `{"values": [...]}`. A key that breaks it is
/// returned as [`FieldShapeError`] rather than skipped.
pub fn first_value<'a>(
    record: &'a JsonValue,
    keys: &[&str],
) -> Result<Option<&'a JsonValue>, FieldShapeError> {
    for key in keys {
        let Some(entry) = record.get(*key) else {
            continue;
        };
        let values = entry
            .get("values")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| FieldShapeError {
                key: (*key).to_string(),
            })?;
        if let Some(first) = values.first() {
            return Ok(Some(first));
        }
    }
    Ok(None)
}

/// [`first_value`] with a caller-supplied default on absence.
pub fn get_first_value(
    record: &JsonValue,
    keys: &[&str],
    default: JsonValue,
) -> Result<JsonValue, FieldShapeError> {
    Ok(first_value(record, keys)?.cloned().unwrap_or(default))
}

pub fn build_row(raw: &RawRecord) -> Result<CharacterRow, MissingNameError> {
    let name = resolve_name(raw)?;

    let empty = JsonValue::Object(Map::new());
    let filters = raw.get(FILTER_VALUES_KEY).unwrap_or(&empty);
    let path = categorical(filters, PATH_KEY, &name);
    let element = categorical(filters, ELEMENT_KEY, &name);
    let rarity = categorical(filters, RARITY_KEY, &name);

    let stats = level_80_stats(raw, &name);
    let stat = |keys: &[&str]| stats.as_ref().map(|s| stat_value(s, keys)).unwrap_or(0);

    Ok(CharacterRow {
        atk80: stat(ATK_KEYS),
        def80: stat(DEF_KEYS),
        hp80: stat(HP_KEYS),
        spd80: stat(SPEED_KEYS),
        name,
        path,
        element,
        rarity,
    })
}

fn resolve_name(raw: &RawRecord) -> Result<String, MissingNameError> {
    match raw.get("name").and_then(JsonValue::as_str).map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(MissingNameError {
            entry_id: raw.get("entry_page_id").and_then(scalar_to_string),
        }),
    }
}

fn categorical(filters: &JsonValue, key: &str, name: &str) -> String {
    match get_first_value(filters, &[key], JsonValue::Null) {
        Ok(value) => scalar_to_string(&value).unwrap_or_else(|| UNKNOWN.to_string()),
        Err(err) => {
            warn!(character = name, error = %err, "malformed categorical filter; using Unknown");
            UNKNOWN.to_string()
        }
    }
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The level-80 block as an object, decoding the JSON-in-a-string form upstream usually sends.
/// `None` means "no stats", which zeroes all four values.
fn level_80_stats(raw: &RawRecord, name: &str) -> Option<Map<String, JsonValue>> {
    let block = raw.get(DISPLAY_FIELD_KEY)?.get(LEVEL_80_KEY)?;
    match block {
        JsonValue::Object(map) if !map.is_empty() => Some(map.clone()),
        JsonValue::String(text) if !text.trim().is_empty() => {
            match serde_json::from_str::<JsonValue>(text) {
                Ok(JsonValue::Object(map)) => Some(map),
                Ok(_) => {
                    warn!(character = name, "level-80 stats decode to a non-object; zeroing stats");
                    None
                }
                Err(err) => {
                    warn!(
                        character = name,
                        error = %err,
                        "undecodable level-80 stats; zeroing stats"
                    );
                    None
                }
            }
        }
        _ => None,
    }
}

fn stat_value(stats: &Map<String, JsonValue>, keys: &[&str]) -> i64 {
    keys.iter()
        .filter_map(|k| stats.get(*k))
        .find_map(parse_stat)
        .unwrap_or(0)
}

/// Integer stat from a JSON number or numeric string; fractions truncate toward zero.
fn parse_stat(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(truncate)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(truncate))
        }
        _ => None,
    }
}

fn truncate(value: f64) -> i64 {
    value.trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_value_skips_empty_lists() {
        let data = json!({"a": {"values": []}, "b": {"values": ["X"]}});
        assert_eq!(get_first_value(&data, &["a", "b"], json!("d")).unwrap(), json!("X"));
    }

    #[test]
    fn first_value_prefers_earlier_key() {
        let data = json!({"key1": {"values": [10, 20, 30]}, "key3": {"values": [40]}});
        assert_eq!(get_first_value(&data, &["key1", "key3"], json!(null)).unwrap(), json!(10));
    }

    #[test]
    fn first_value_defaults_on_absence() {
        let data = json!({"key2": {"values": []}});
        assert_eq!(
            get_first_value(&data, &["missing"], json!("Not found")).unwrap(),
            json!("Not found")
        );
        assert_eq!(get_first_value(&data, &["key2"], json!("Empty")).unwrap(), json!("Empty"));
        assert_eq!(get_first_value(&data, &[], json!("No keys")).unwrap(), json!("No keys"));
    }

    #[test]
    fn first_value_reports_shape_violation() {
        let data = json!({"a": "The Hunt"});
        assert_eq!(
            first_value(&data, &["a"]),
            Err(FieldShapeError { key: "a".into() })
        );
    }

    #[test]
    fn coming_soon_record_gets_all_defaults() {
        let raw = json!({"name": "Kafka (Coming Soon)", "filter_values": {}, "display_field": {}});
        let row = build_row(&raw).unwrap();
        assert_eq!(row.name, "Kafka (Coming Soon)");
        assert_eq!(row.path, UNKNOWN);
        assert_eq!(row.element, UNKNOWN);
        assert_eq!(row.rarity, UNKNOWN);
        assert_eq!((row.atk80, row.def80, row.hp80, row.spd80), (0, 0, 0, 0));
    }

    #[test]
    fn missing_name_is_an_error() {
        let raw = json!({"entry_page_id": "1001", "filter_values": {}});
        assert_eq!(
            build_row(&raw),
            Err(MissingNameError {
                entry_id: Some("1001".into())
            })
        );
        assert!(build_row(&json!({"name": "   "})).is_err());
        assert!(build_row(&json!({"name": 7})).is_err());
    }

    #[test]
    fn embedded_json_string_stats_are_decoded() {
        let stats = concat!(
            r#"{"base_atk":"640.33","base_def":"363.83","#,
            r#""base_hp":"931.39","base_speed":"115"}"#
        );
        let raw = json!({
            "name": "Seele",
            "filter_values": {
                "character_paths": {"values": ["The Hunt"]},
                "character_combat_type": {"values": ["Quantum"]},
                "character_rarity": {"values": ["5-Star"]}
            },
            "display_field": {
                "attr_level_80": stats
            }
        });
        let row = build_row(&raw).unwrap();
        assert_eq!(row.path, "The Hunt");
        assert_eq!(row.element, "Quantum");
        assert_eq!(row.rarity, "5-Star");
        assert_eq!((row.atk80, row.def80, row.hp80, row.spd80), (640, 363, 931, 115));
    }

    #[test]
    fn partial_stats_default_individually() {
        let raw = json!({
            "name": "Asta",
            "display_field": {"attr_level_80": {"base_atk": 511, "hp": "1023"}}
        });
        let row = build_row(&raw).unwrap();
        assert_eq!(row.atk80, 511);
        assert_eq!(row.def80, 0);
        assert_eq!(row.hp80, 1023);
        assert_eq!(row.spd80, 0);
    }

    #[test]
    fn undecodable_stats_zero_everything() {
        let raw = json!({
            "name": "Arlan",
            "display_field": {"attr_level_80": "{base_atk: 599"}
        });
        let row = build_row(&raw).unwrap();
        assert_eq!((row.atk80, row.def80, row.hp80, row.spd80), (0, 0, 0, 0));
    }

    #[test]
    fn one_malformed_categorical_does_not_block_siblings() {
        let raw = json!({
            "name": "Herta",
            "filter_values": {
                "character_paths": "Erudition",
                "character_combat_type": {"values": ["Ice"]},
                "character_rarity": {"values": []}
            }
        });
        let row = build_row(&raw).unwrap();
        assert_eq!(row.path, UNKNOWN);
        assert_eq!(row.element, "Ice");
        assert_eq!(row.rarity, UNKNOWN);
    }

    #[test]
    fn non_object_sections_are_treated_as_absent() {
        let raw = json!({"name": "Pela", "filter_values": [], "display_field": "n/a"});
        let row = build_row(&raw).unwrap();
        assert_eq!(row, CharacterRow::unknown("Pela"));
    }
}
