//! Inventory listing and trade-up selection over the live item set.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    catalog::Catalog,
    craft::{RarityTier, TRADEUP_SIZE},
    error::{CraftError, SessionError},
    models::{ItemId, ItemView, RawItemRecord},
    session::SessionManager,
};

/// Resolve every record through the catalog.
pub fn resolve_all(records: &[RawItemRecord], catalog: &Catalog) -> Vec<ItemView> {
    records
        .iter()
        .map(|raw| ItemView::from_record(raw, catalog.resolve(raw)))
        .collect()
}

/// Items in the live inventory, excluding those stored inside containers.
pub fn list_inventory(
    session: &SessionManager,
    catalog: &Catalog,
) -> Result<Vec<ItemView>, SessionError> {
    let connection = session.connection()?;
    let items: Vec<RawItemRecord> = connection
        .items()
        .into_iter()
        .filter(|raw| !raw.is_stored())
        .collect();
    Ok(resolve_all(&items, catalog))
}

/// Skins of one rarity tier that could feed a trade-up.
#[derive(Debug, Clone, Serialize)]
pub struct TradeupGroup {
    /// Tier shared by every item in the group.
    pub tier: RarityTier,
    /// Eligible items, in inventory order.
    pub items: Vec<ItemView>,
}

impl TradeupGroup {
    /// Whether the group holds enough items for a trade-up.
    pub fn is_craftable(&self) -> bool {
        self.items.len() >= TRADEUP_SIZE
    }
}

/// Group trade-up eligible skins by rarity tier, lowest tier first.
pub fn tradeup_groups(items: &[ItemView]) -> Vec<TradeupGroup> {
    let mut groups: BTreeMap<RarityTier, Vec<ItemView>> = BTreeMap::new();
    for item in items {
        if let Some(tier) = eligible_tier(item) {
            groups.entry(tier).or_default().push(item.clone());
        }
    }
    groups
        .into_iter()
        .map(|(tier, items)| TradeupGroup { tier, items })
        .collect()
}

fn eligible_tier(item: &ItemView) -> Option<RarityTier> {
    if item.is_container() || item.float_value.is_none() {
        return None;
    }
    let rarity = item.rarity.as_deref()?;
    RarityTier::ALL
        .into_iter()
        .find(|tier| tier.catalog_id() == rarity)
}

/// Check a selection against the inventory before it is crafted.
///
/// Every item must be owned, trade-up eligible and of `rarity_tier`; StatTrak™
/// and regular items cannot be mixed.
pub fn validate_tradeup_selection(
    items: &[ItemView],
    item_ids: &[ItemId],
    rarity_tier: &str,
) -> Result<(), CraftError> {
    let tier = RarityTier::parse(rarity_tier)
        .ok_or_else(|| CraftError::UnknownRarity(rarity_tier.to_string()))?;

    let mut stattrak = None;
    for id in item_ids {
        let item = items
            .iter()
            .find(|item| &item.id == id)
            .ok_or_else(|| CraftError::InvalidItems(format!("item {id} is not in the inventory")))?;
        if eligible_tier(item) != Some(tier) {
            return Err(CraftError::InvalidItems(format!(
                "item {id} is not a {} skin",
                tier.catalog_id()
            )));
        }
        match stattrak {
            None => stattrak = Some(item.stattrak),
            Some(expected) if expected != item.stattrak => {
                return Err(CraftError::InvalidItems(
                    "StatTrak™ and regular items cannot be mixed".to_string(),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
