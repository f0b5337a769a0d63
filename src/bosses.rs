//! Boss reference dataset
//!
//! The dataset is a JSON object mapping a location name to the bosses found
//! there. A boss may be tied to several event ids; it counts as defeated
//! when any of them is set.
//!
//! ```json
//! {
//!   "Limgrave": [
//!     { "name": "Margit, the Fell Omen", "event_id": 10000850 },
//!     { "name": "Tree Sentinel", "event_id": ["1042360800", 1042367000] }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::service::{parse_event_id, BossStatusResult};

/// Name used for bosses that carry no `name` field
const UNNAMED_BOSS: &str = "Unknown Boss";

/// Boss dataset loading errors
#[derive(Debug, Error)]
pub enum BossDataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unexpected format: {0}")]
    Format(String),
}

/// One boss and its defeat state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BossEntry {
    pub name: String,
    pub location: String,
    pub event_ids: Vec<u64>,
    pub is_defeated: bool,
    /// Fields of the source entry not interpreted here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BossEntry {
    /// Defeated when any of the boss's ids is reported set
    pub fn defeated_in(&self, result: &BossStatusResult) -> bool {
        self.event_ids
            .iter()
            .any(|&id| result.status(id) == Some(true))
    }
}

/// Bosses of one location, in file order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationGroup {
    pub name: String,
    pub bosses: Vec<BossEntry>,
}

/// Full boss dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BossDataset {
    locations: Vec<LocationGroup>,
}

impl BossDataset {
    /// Load a dataset from a JSON file
    pub fn load(path: &Path) -> Result<Self, BossDataError> {
        let content = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&content)?;
        log::info!(
            "Loaded {} bosses ({} unique event ids) from {}",
            dataset.bosses().count(),
            dataset.all_event_ids().len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_json(content: &str) -> Result<Self, BossDataError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Build a dataset from a location map or a flat list of bosses
    pub fn from_value(value: Value) -> Result<Self, BossDataError> {
        let locations = match value {
            Value::Object(map) => map
                .into_iter()
                .filter_map(|(location, bosses)| match bosses {
                    Value::Array(entries) => Some(parse_group(location, entries)),
                    _ => {
                        log::warn!("Location '{}' is not a list of bosses, skipping", location);
                        None
                    }
                })
                .collect(),
            Value::Array(entries) => vec![parse_group(String::new(), entries)],
            other => {
                return Err(BossDataError::Format(format!(
                    "expected an object or array, found {}",
                    json_type_name(&other)
                )))
            }
        };

        Ok(Self { locations })
    }

    pub fn locations(&self) -> &[LocationGroup] {
        &self.locations
    }

    pub fn bosses(&self) -> impl Iterator<Item = &BossEntry> {
        self.locations.iter().flat_map(|group| group.bosses.iter())
    }

    /// Every event id referenced by the dataset, deduplicated
    pub fn all_event_ids(&self) -> BTreeSet<u64> {
        self.bosses()
            .flat_map(|boss| boss.event_ids.iter().copied())
            .collect()
    }

    /// Update `is_defeated` from a status result, returning how many bosses changed
    pub fn apply_statuses(&mut self, result: &BossStatusResult) -> usize {
        let mut changed = 0;
        for boss in self.locations.iter_mut().flat_map(|group| group.bosses.iter_mut()) {
            let defeated = boss.defeated_in(result);
            if boss.is_defeated != defeated {
                boss.is_defeated = defeated;
                changed += 1;
            }
        }
        changed
    }

    /// `(defeated, total)` boss counts
    pub fn counts(&self) -> (usize, usize) {
        let total = self.bosses().count();
        let defeated = self.bosses().filter(|boss| boss.is_defeated).count();
        (defeated, total)
    }

    /// Sort locations by a progression order
    ///
    /// Locations not in `order` keep their relative order after the listed ones.
    pub fn order_locations(&mut self, order: &[&str]) {
        self.locations.sort_by_key(|group| {
            order
                .iter()
                .position(|&name| name == group.name)
                .unwrap_or(order.len())
        });
    }
}

impl Serialize for BossDataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.locations.len()))?;
        for group in &self.locations {
            map.serialize_entry(&group.name, &group.bosses)?;
        }
        map.end()
    }
}

fn parse_group(location: String, entries: Vec<Value>) -> LocationGroup {
    let bosses = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(fields) => Some(parse_boss(&location, fields)),
            other => {
                log::warn!(
                    "Location '{}': boss entry is {}, skipping",
                    location,
                    json_type_name(&other)
                );
                None
            }
        })
        .collect();

    LocationGroup {
        name: location,
        bosses,
    }
}

fn parse_boss(location: &str, mut fields: Map<String, Value>) -> BossEntry {
    let name = match fields.remove("name") {
        Some(Value::String(name)) => name,
        _ => UNNAMED_BOSS.to_string(),
    };

    let event_ids = match fields.remove("event_id") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| event_id_from_value(&name, value))
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(value) => event_id_from_value(&name, &value).into_iter().collect(),
    };

    // Recomputed from statuses, never trusted from the file
    fields.remove("is_defeated");
    fields.remove("location");

    BossEntry {
        name,
        location: location.to_string(),
        event_ids,
        is_defeated: false,
        extra: fields,
    }
}

fn event_id_from_value(boss: &str, value: &Value) -> Option<u64> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_event_id(s),
        _ => None,
    };
    if id.is_none() {
        log::warn!("Invalid event_id '{}' for '{}', ignoring", value, boss);
    }
    id
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Limgrave": [
            { "name": "Margit, the Fell Omen", "event_id": 10000850, "japanese_name": "忌み鬼、マルギット" },
            { "name": "Tree Sentinel", "event_id": ["1042360800", 1042367000] },
            { "name": "Mystery Knight" }
        ],
        "Stormveil Castle": [
            { "name": "Godrick the Grafted", "event_id": "10000800", "is_defeated": true }
        ]
    }"#;

    fn result_with(statuses: &[(u64, bool)]) -> BossStatusResult {
        let mut result = BossStatusResult::default();
        for &(id, set) in statuses {
            result.boss_statuses.insert(id.to_string(), set);
        }
        result
    }

    #[test]
    fn test_parse_location_map() {
        let dataset = BossDataset::from_json(SAMPLE).unwrap();

        assert_eq!(dataset.locations().len(), 2);
        assert_eq!(dataset.locations()[0].name, "Limgrave");
        assert_eq!(dataset.locations()[1].name, "Stormveil Castle");

        let tree = &dataset.locations()[0].bosses[1];
        assert_eq!(tree.name, "Tree Sentinel");
        assert_eq!(tree.location, "Limgrave");
        assert_eq!(tree.event_ids, vec![1042360800, 1042367000]);

        let godrick = &dataset.locations()[1].bosses[0];
        assert_eq!(godrick.event_ids, vec![10000800]);
        assert!(!godrick.is_defeated);
    }

    #[test]
    fn test_extra_fields_are_preserved() {
        let dataset = BossDataset::from_json(SAMPLE).unwrap();
        let margit = &dataset.locations()[0].bosses[0];

        assert_eq!(margit.extra["japanese_name"], "忌み鬼、マルギット");
    }

    #[test]
    fn test_all_event_ids_deduplicated() {
        let dataset = BossDataset::from_json(r#"{
            "A": [ { "name": "x", "event_id": 5 }, { "name": "y", "event_id": [5, 6] } ],
            "B": [ { "name": "z", "event_id": "6" } ]
        }"#).unwrap();

        assert_eq!(dataset.all_event_ids().into_iter().collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_invalid_ids_are_skipped() {
        let dataset = BossDataset::from_json(r#"{
            "A": [ { "name": "x", "event_id": ["abc", -4, 1.5, 77] }, "not a boss" ]
        }"#).unwrap();

        let bosses: Vec<_> = dataset.bosses().collect();
        assert_eq!(bosses.len(), 1);
        assert_eq!(bosses[0].event_ids, vec![77]);
    }

    #[test]
    fn test_grouped_dataset() {
        let dataset = BossDataset::from_json(r#"{
            "base_game_bosses": [ { "name": "Radahn", "event_id": 1252380800 } ],
            "dlc_shadow_of_the_erdtree_bosses": [ { "name": "Messmer", "event_id": 20010800 } ]
        }"#).unwrap();

        assert_eq!(dataset.locations()[1].name, "dlc_shadow_of_the_erdtree_bosses");
        assert_eq!(dataset.locations()[1].bosses[0].location, "dlc_shadow_of_the_erdtree_bosses");
        assert_eq!(dataset.all_event_ids().len(), 2);
    }

    #[test]
    fn test_flat_list_dataset() {
        let dataset = BossDataset::from_json(r#"[ { "name": "x", "event_id": 1 } ]"#).unwrap();
        assert_eq!(dataset.bosses().count(), 1);
    }

    #[test]
    fn test_scalar_dataset_is_rejected() {
        assert!(matches!(BossDataset::from_json("42"), Err(BossDataError::Format(_))));
    }

    #[test]
    fn test_apply_statuses_any_id_defeats() {
        let mut dataset = BossDataset::from_json(SAMPLE).unwrap();

        let changed = dataset.apply_statuses(&result_with(&[
            (10000850, false),
            (1042360800, false),
            (1042367000, true),
            (10000800, true),
        ]));

        assert_eq!(changed, 2);
        assert_eq!(dataset.counts(), (2, 4));

        let tree = &dataset.locations()[0].bosses[1];
        assert!(tree.is_defeated);
    }

    #[test]
    fn test_unknown_status_does_not_defeat() {
        let mut dataset = BossDataset::from_json(SAMPLE).unwrap();
        dataset.apply_statuses(&result_with(&[(10000850, false)]));

        assert_eq!(dataset.counts(), (0, 4));
    }

    #[test]
    fn test_apply_statuses_can_clear() {
        let mut dataset = BossDataset::from_json(SAMPLE).unwrap();
        dataset.apply_statuses(&result_with(&[(10000800, true)]));
        let changed = dataset.apply_statuses(&result_with(&[(10000800, false)]));

        assert_eq!(changed, 1);
        assert_eq!(dataset.counts(), (0, 4));
    }

    #[test]
    fn test_order_locations() {
        let mut dataset = BossDataset::from_json(r#"{
            "Caelid": [], "Side Area": [], "Limgrave": [], "Other": []
        }"#).unwrap();

        dataset.order_locations(&["Limgrave", "Weeping Peninsula", "Caelid"]);

        let names: Vec<_> = dataset.locations().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Limgrave", "Caelid", "Side Area", "Other"]);
    }

    #[test]
    fn test_serialize_report() {
        let mut dataset = BossDataset::from_json(SAMPLE).unwrap();
        dataset.apply_statuses(&result_with(&[(10000800, true)]));

        let json = serde_json::to_value(&dataset).unwrap();
        let godrick = &json["Stormveil Castle"][0];
        assert_eq!(godrick["name"], "Godrick the Grafted");
        assert_eq!(godrick["is_defeated"], true);
        assert_eq!(godrick["event_ids"][0], 10000800);
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), SAMPLE).unwrap();

        let dataset = BossDataset::load(file.path()).unwrap();
        assert_eq!(dataset.bosses().count(), 4);
    }
}
