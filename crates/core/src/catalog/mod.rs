//! Catalog loading and item classification.

/// Normalisation of heterogeneous catalog documents.
pub mod document;
/// Thread-safe catalog holding the per-category lookup indices.
pub mod loader;
/// Ordered classification rules.
pub mod rules;
/// Providers the catalog documents are fetched from.
pub mod source;

use serde::{Deserialize, Serialize};

pub use loader::{Catalog, CatalogIndex, CatalogReport, CategoryOutcome, CategoryReport};
pub use rules::{Rule, RULES};
pub use source::{CatalogSource, HttpCatalogSource};

/// Item category, one catalog document and one lookup index each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Weapon and glove skins.
    Skins,
    /// Cases and capsules.
    Containers,
    /// Stickers.
    Stickers,
    /// Sticker slabs.
    StickerSlabs,
    /// Graffiti.
    Graffiti,
    /// Keys.
    Keys,
    /// Agents.
    Agents,
    /// Pins, coins and badges.
    Collectibles,
    /// Music kits.
    MusicKits,
    /// Tools, including storage units.
    Tools,
    /// Charms.
    Keychains,
    /// Patches.
    Patches,
}

impl Category {
    /// Every category, in fetch order.
    pub const ALL: [Category; 12] = [
        Category::Skins,
        Category::Containers,
        Category::Stickers,
        Category::StickerSlabs,
        Category::Graffiti,
        Category::Keys,
        Category::Agents,
        Category::Collectibles,
        Category::MusicKits,
        Category::Tools,
        Category::Keychains,
        Category::Patches,
    ];

    /// Document name relative to the provider's base URL.
    pub fn document(self) -> &'static str {
        match self {
            Category::Skins => "skins.json",
            Category::Containers => "crates.json",
            Category::Stickers => "stickers.json",
            Category::StickerSlabs => "sticker_slabs.json",
            Category::Graffiti => "graffiti.json",
            Category::Keys => "keys.json",
            Category::Agents => "agents.json",
            Category::Collectibles => "collectibles.json",
            Category::MusicKits => "music_kits.json",
            Category::Tools => "tools.json",
            Category::Keychains => "keychains.json",
            Category::Patches => "patches.json",
        }
    }
}
