use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::CatalogEntry;

/// Flatten any accepted document shape into a list of raw catalog records.
///
/// Accepted shapes are a bare array, an object wrapping the array in a
/// `value` field (or in its only field), and an object keyed by record id.
pub fn normalize(document: Value) -> Vec<Value> {
    match document {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if matches!(map.get("value"), Some(Value::Array(_))) {
                if let Some(Value::Array(items)) = map.remove("value") {
                    return items;
                }
            }
            if map.len() == 1 && map.values().all(Value::is_array) {
                if let Some((_, Value::Array(items))) = map.into_iter().next() {
                    return items;
                }
                return Vec::new();
            }
            map.into_iter()
                .filter_map(|(key, value)| match value {
                    Value::Object(mut record) => {
                        record.entry("id").or_insert(Value::String(key));
                        Some(Value::Object(record))
                    }
                    _ => None,
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Index skin records by `(weapon type id, paint index)`.
pub fn skin_entries(records: Vec<Value>) -> HashMap<(u32, u32), CatalogEntry> {
    let mut entries = HashMap::new();
    for record in parse_records(records) {
        let type_id = record
            .weapon
            .as_ref()
            .and_then(|weapon| weapon.weapon_id.as_ref())
            .or(record.def_index.as_ref())
            .and_then(NumericId::value);
        let paint_index = record.paint_index.as_ref().and_then(NumericId::value);
        let (Some(type_id), Some(paint_index)) = (type_id, paint_index) else {
            continue;
        };
        let Some(name) = record.name.clone() else {
            continue;
        };
        let collections: BTreeSet<String> = record
            .collections
            .unwrap_or_default()
            .into_iter()
            .filter_map(|collection| collection.name.or(collection.id))
            .collect();
        entries.entry((type_id, paint_index)).or_insert(CatalogEntry {
            name,
            icon_url: record.image,
            rarity: record.rarity.map(RarityRef::into_id),
            min_float: record.min_float.unwrap_or(0.0),
            max_float: record.max_float.unwrap_or(1.0),
            collections,
        });
    }
    entries
}

/// Index non-skin records by type id, keeping name and icon.
pub fn keyed_entries(records: Vec<Value>) -> HashMap<u32, CatalogEntry> {
    let mut entries = HashMap::new();
    for record in parse_records(records) {
        let Some(type_id) = record.def_index.as_ref().and_then(NumericId::value) else {
            continue;
        };
        let Some(name) = record.name else {
            continue;
        };
        entries
            .entry(type_id)
            .or_insert_with(|| CatalogEntry::named(name, record.image));
    }
    entries
}

fn parse_records(records: Vec<Value>) -> impl Iterator<Item = RawCatalogRecord> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                debug!("skipping malformed catalog record: {err}");
                None
            }
        })
}

#[derive(Debug, Deserialize)]
struct RawCatalogRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    def_index: Option<NumericId>,
    #[serde(default)]
    paint_index: Option<NumericId>,
    #[serde(default)]
    weapon: Option<WeaponRef>,
    #[serde(default)]
    rarity: Option<RarityRef>,
    #[serde(default)]
    min_float: Option<f64>,
    #[serde(default)]
    max_float: Option<f64>,
    #[serde(default)]
    collections: Option<Vec<CollectionRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericId {
    Number(u64),
    Text(String),
}

impl NumericId {
    fn value(&self) -> Option<u32> {
        match self {
            NumericId::Number(value) => u32::try_from(*value).ok(),
            NumericId::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeaponRef {
    #[serde(default)]
    weapon_id: Option<NumericId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RarityRef {
    Detailed { id: String },
    Plain(String),
}

impl RarityRef {
    fn into_id(self) -> String {
        match self {
            RarityRef::Detailed { id } | RarityRef::Plain(id) => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CollectionRef {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}
