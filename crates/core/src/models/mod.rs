//! Shared domain models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Service-assigned item identifier (a 64-bit asset id carried as text).
pub type ItemId = String;

/// Rarity value the service stamps on badge-tier collectibles.
pub const BADGE_RARITY: u32 = 1;

/// Quality value marking a StatTrak™ item.
const STATTRAK_QUALITY: u32 = 9;

/// Loosely-typed attribute attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttribute {
    /// Attribute definition id.
    pub def_index: u32,
    /// Raw attribute payload, if the service delivered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// One entry of an item's sticker-like sub-list (stickers, patches, sealed graffiti).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerSlot {
    /// Position on the item.
    #[serde(default)]
    pub slot: u32,
    /// Pattern id (sticker kit) applied in this slot.
    pub sticker_id: u32,
    /// Scrape level, when worn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wear: Option<f64>,
}

/// Item exactly as delivered by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItemRecord {
    /// Service-assigned asset id.
    pub id: ItemId,
    /// Base item kind.
    pub def_index: u32,
    /// Decorative variant; `0` means "no variant".
    #[serde(default)]
    pub paint_index: u32,
    /// Float value in `[0, 1]`; present only on items that wear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paint_wear: Option<f64>,
    /// Pattern seed of the decorative variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paint_seed: Option<u32>,
    /// Item quality; `9` marks StatTrak™.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    /// Numeric rarity as stamped by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<u32>,
    /// How the item entered the inventory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<u32>,
    /// Service flag bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    /// Name tag applied by the owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    /// Attribute list, in service order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ItemAttribute>,
    /// Sticker-like sub-list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stickers: Vec<StickerSlot>,
    /// Container this item is stored in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casket_id: Option<ItemId>,
    /// Number of stored items, present only when this item is a container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casket_contained_item_count: Option<u32>,
}

impl RawItemRecord {
    /// Whether the item carries the given attribute definition.
    pub fn has_attribute(&self, def_index: u32) -> bool {
        self.attributes
            .iter()
            .any(|attribute| attribute.def_index == def_index)
    }

    /// Whether this item is a bulk storage container.
    pub fn is_container(&self) -> bool {
        self.casket_contained_item_count.is_some()
    }

    /// Whether this item currently sits inside a container.
    pub fn is_stored(&self) -> bool {
        self.casket_id.is_some()
    }
}

/// Human-readable catalog data for one item kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name.
    pub name: String,
    /// Icon image URL.
    pub icon_url: Option<String>,
    /// Catalog rarity id (e.g. `rarity_rare_weapon`).
    pub rarity: Option<String>,
    /// Lowest float this skin can roll.
    pub min_float: f64,
    /// Highest float this skin can roll.
    pub max_float: f64,
    /// Collections the skin belongs to.
    #[serde(default)]
    pub collections: BTreeSet<String>,
}

impl CatalogEntry {
    /// Entry with a name and icon only, as kept for non-skin categories.
    pub fn named(name: impl Into<String>, icon_url: Option<String>) -> Self {
        Self {
            name: name.into(),
            icon_url,
            rarity: None,
            min_float: 0.0,
            max_float: 1.0,
            collections: BTreeSet::new(),
        }
    }
}

/// Display projection of an item combined with its catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    /// Service-assigned asset id.
    pub id: ItemId,
    /// Catalog name; `None` when the item could not be classified.
    pub name: Option<String>,
    /// Icon image URL from the catalog.
    pub icon_url: Option<String>,
    /// Catalog rarity id.
    pub rarity: Option<String>,
    /// Float value, when the item wears.
    pub float_value: Option<f64>,
    /// Wear bracket name derived from the float.
    pub wear: Option<&'static str>,
    /// Pattern seed.
    pub paint_seed: Option<u32>,
    /// Name tag applied by the owner.
    pub custom_name: Option<String>,
    /// Whether the item is StatTrak™.
    pub stattrak: bool,
    /// Collections the skin belongs to, sorted.
    pub collections: Vec<String>,
    /// Container this item is stored in.
    pub container_id: Option<ItemId>,
    /// Number of stored items when this item is a container.
    pub contained_count: Option<u32>,
}

impl ItemView {
    /// Combine a raw record with the result of catalog resolution.
    pub fn from_record(raw: &RawItemRecord, entry: Option<CatalogEntry>) -> Self {
        let (name, icon_url, rarity, collections) = match entry {
            Some(entry) => (
                Some(entry.name),
                entry.icon_url,
                entry.rarity,
                entry.collections.into_iter().collect(),
            ),
            None => (None, None, None, Vec::new()),
        };
        let float_value = raw.paint_wear.filter(|_| raw.paint_index != 0);
        Self {
            id: raw.id.clone(),
            name,
            icon_url,
            rarity,
            float_value,
            wear: float_value.map(wear_name),
            paint_seed: raw.paint_seed,
            custom_name: raw.custom_name.clone(),
            stattrak: raw.quality == Some(STATTRAK_QUALITY),
            collections,
            container_id: raw.casket_id.clone(),
            contained_count: raw.casket_contained_item_count,
        }
    }

    /// Whether this view describes a storage container.
    pub fn is_container(&self) -> bool {
        self.contained_count.is_some()
    }

    /// Returns a user-facing label such as `StatTrak™ AK-47 | Redline (Field-Tested)`.
    pub fn display_name(&self) -> String {
        let base = self.name.as_deref().unwrap_or("Unknown item");
        let mut label = String::new();
        if self.stattrak {
            label.push_str("StatTrak™ ");
        }
        label.push_str(base);
        if let Some(wear) = self.wear {
            label.push_str(&format!(" ({wear})"));
        }
        match self.custom_name.as_deref() {
            Some(custom) if !custom.is_empty() => format!("\"{custom}\" · {label}"),
            _ => label,
        }
    }
}

/// Exterior bucket for a float value.
pub fn wear_name(value: f64) -> &'static str {
    match value {
        v if v < 0.07 => "Factory New",
        v if v < 0.15 => "Minimal Wear",
        v if v < 0.38 => "Field-Tested",
        v if v < 0.45 => "Well-Worn",
        _ => "Battle-Scarred",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wear_buckets_follow_boundaries() {
        assert_eq!(wear_name(0.0), "Factory New");
        assert_eq!(wear_name(0.07), "Minimal Wear");
        assert_eq!(wear_name(0.2), "Field-Tested");
        assert_eq!(wear_name(0.44), "Well-Worn");
        assert_eq!(wear_name(0.45), "Battle-Scarred");
    }

    #[test]
    fn display_name_composes_prefix_and_wear() {
        let raw = RawItemRecord {
            id: "1".to_string(),
            def_index: 7,
            paint_index: 282,
            paint_wear: Some(0.25),
            quality: Some(9),
            ..Default::default()
        };
        let mut entry = CatalogEntry::named("AK-47 | Redline", None);
        entry.rarity = Some("rarity_legendary_weapon".to_string());
        let view = ItemView::from_record(&raw, Some(entry));
        assert_eq!(view.display_name(), "StatTrak™ AK-47 | Redline (Field-Tested)");
        assert_eq!(view.rarity.as_deref(), Some("rarity_legendary_weapon"));
    }

    #[test]
    fn unresolved_items_render_without_name() {
        let raw = RawItemRecord {
            id: "9".to_string(),
            def_index: 99999,
            casket_contained_item_count: Some(3),
            ..Default::default()
        };
        let view = ItemView::from_record(&raw, None);
        assert!(view.name.is_none());
        assert!(view.icon_url.is_none());
        assert!(view.wear.is_none());
        assert!(view.is_container());
        assert_eq!(view.display_name(), "Unknown item");
    }
}
