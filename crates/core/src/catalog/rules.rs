//! Classification of raw items against the catalog indices.
//!
//! Rules run in order and the first one producing an entry wins. Each rule is
//! a plain function so it can be exercised on its own.

use tracing::trace;

use super::{loader::CatalogIndex, Category};
use crate::models::{CatalogEntry, RawItemRecord, BADGE_RARITY};

/// Attribute the service stamps on medals tied to a specific issue year.
pub const MEDAL_ISSUE_ATTRIBUTE: u32 = 222;

/// Type id shared by both veteran coin variants.
pub const VETERAN_COIN_TYPE_ID: u32 = 874;

/// Type id of the loyalty badge, which the catalog files under another category.
pub const LOYALTY_BADGE_TYPE_ID: u32 = 4552;

const TEN_YEAR_COIN: &str = "Ten Year Veteran Coin";
const LOYALTY_BADGE: &str = "Loyalty Badge";

/// Categories that identify an item by type id alone, so an embedded pattern
/// on them (pins, charms, patches) is decoration rather than identity.
const IDENTIFIED_BY_TYPE: [Category; 8] = [
    Category::Containers,
    Category::Keys,
    Category::Agents,
    Category::Collectibles,
    Category::MusicKits,
    Category::Patches,
    Category::Tools,
    Category::Keychains,
];

const TYPE_ID_PRIORITY: [Category; 10] = [
    Category::Containers,
    Category::Keys,
    Category::Agents,
    Category::Collectibles,
    Category::MusicKits,
    Category::Patches,
    Category::Tools,
    Category::Keychains,
    Category::StickerSlabs,
    Category::Stickers,
];

/// A named classification step.
pub struct Rule {
    /// Name used in logs and tests.
    pub name: &'static str,
    apply: fn(&RawItemRecord, &CatalogIndex) -> Option<CatalogEntry>,
}

impl Rule {
    /// Run this rule alone.
    pub fn apply(&self, raw: &RawItemRecord, index: &CatalogIndex) -> Option<CatalogEntry> {
        (self.apply)(raw, index)
    }
}

/// Classification rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "skin-variant",
        apply: skin_variant,
    },
    Rule {
        name: "veteran-coin",
        apply: veteran_coin,
    },
    Rule {
        name: "loyalty-badge",
        apply: loyalty_badge,
    },
    Rule {
        name: "embedded-pattern",
        apply: embedded_pattern,
    },
    Rule {
        name: "type-id",
        apply: by_type_id,
    },
];

/// Classify `raw`, returning the first rule's match.
pub fn resolve(raw: &RawItemRecord, index: &CatalogIndex) -> Option<CatalogEntry> {
    matching_rule(raw, index).map(|(_, entry)| entry)
}

/// Classify `raw`, also reporting which rule matched.
pub fn matching_rule(
    raw: &RawItemRecord,
    index: &CatalogIndex,
) -> Option<(&'static str, CatalogEntry)> {
    let found = RULES
        .iter()
        .find_map(|rule| rule.apply(raw, index).map(|entry| (rule.name, entry)));
    match &found {
        Some((rule, entry)) => trace!(item = %raw.id, rule, name = %entry.name, "resolved"),
        None => trace!(item = %raw.id, def_index = raw.def_index, "unresolved"),
    }
    found
}

fn skin_variant(raw: &RawItemRecord, index: &CatalogIndex) -> Option<CatalogEntry> {
    if raw.paint_index == 0 {
        return None;
    }
    index.skin(raw.def_index, raw.paint_index).cloned()
}

fn is_issued_medal(raw: &RawItemRecord) -> bool {
    raw.rarity == Some(BADGE_RARITY) && raw.has_attribute(MEDAL_ISSUE_ATTRIBUTE)
}

// The catalog files both coin variants under one type id and only knows the
// older one; the issue attribute marks the newer.
fn veteran_coin(raw: &RawItemRecord, index: &CatalogIndex) -> Option<CatalogEntry> {
    if raw.def_index != VETERAN_COIN_TYPE_ID || !is_issued_medal(raw) {
        return None;
    }
    Some(collectible_override(index, TEN_YEAR_COIN))
}

fn loyalty_badge(raw: &RawItemRecord, index: &CatalogIndex) -> Option<CatalogEntry> {
    if raw.def_index != LOYALTY_BADGE_TYPE_ID || !is_issued_medal(raw) {
        return None;
    }
    Some(collectible_override(index, LOYALTY_BADGE))
}

fn collectible_override(index: &CatalogIndex, name: &str) -> CatalogEntry {
    let icon_url = index
        .find_by_name(Category::Collectibles, name)
        .and_then(|entry| entry.icon_url.clone());
    CatalogEntry::named(name, icon_url)
}

fn embedded_pattern(raw: &RawItemRecord, index: &CatalogIndex) -> Option<CatalogEntry> {
    let pattern_id = raw.stickers.first()?.sticker_id;
    if IDENTIFIED_BY_TYPE
        .iter()
        .any(|category| index.lookup(*category, raw.def_index).is_some())
    {
        return None;
    }
    if let Some(graffiti) = index.lookup(Category::Graffiti, pattern_id) {
        return Some(graffiti.clone());
    }
    index.lookup(Category::Stickers, pattern_id).map(|sticker| {
        let mut entry = sticker.clone();
        if let Some(design) = entry.name.strip_prefix("Sticker | ") {
            entry.name = format!("Graffiti | {design}");
        }
        entry
    })
}

fn by_type_id(raw: &RawItemRecord, index: &CatalogIndex) -> Option<CatalogEntry> {
    TYPE_ID_PRIORITY
        .iter()
        .find_map(|category| index.lookup(*category, raw.def_index))
        .cloned()
}
