//! Trade-up crafting.
//!
//! At most one craft is outstanding process-wide. The outstanding craft owns
//! the single request slot until its completion event arrives or its timeout
//! elapses, whichever comes first; the loser of that race finds the slot
//! already empty and does nothing.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{
    sync::{broadcast::error::RecvError, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    connection::CraftCompletion, error::CraftError, models::ItemId, session::SessionManager,
};

/// Number of items a trade-up consumes.
pub const TRADEUP_SIZE: usize = 10;

/// Input rarity of a trade-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RarityTier {
    /// Consumer grade.
    Common,
    /// Industrial grade.
    Uncommon,
    /// Mil-spec grade.
    Rare,
    /// Restricted.
    Mythical,
    /// Classified.
    Legendary,
}

impl RarityTier {
    /// Every tier, lowest first.
    pub const ALL: [RarityTier; 5] = [
        RarityTier::Common,
        RarityTier::Uncommon,
        RarityTier::Rare,
        RarityTier::Mythical,
        RarityTier::Legendary,
    ];

    /// Accepts the bare tier (`rare`) or the catalog rarity id (`rarity_rare_weapon`).
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_ascii_lowercase();
        let tier = normalized.strip_prefix("rarity_").unwrap_or(&normalized);
        let tier = tier.strip_suffix("_weapon").unwrap_or(tier);
        match tier {
            "common" => Some(RarityTier::Common),
            "uncommon" => Some(RarityTier::Uncommon),
            "rare" => Some(RarityTier::Rare),
            "mythical" => Some(RarityTier::Mythical),
            "legendary" => Some(RarityTier::Legendary),
            _ => None,
        }
    }

    /// Recipe the service runs for this tier.
    pub fn recipe_id(self) -> u32 {
        match self {
            RarityTier::Common => 0,
            RarityTier::Uncommon => 1,
            RarityTier::Rare => 2,
            RarityTier::Mythical => 3,
            RarityTier::Legendary => 4,
        }
    }

    /// Rarity id the catalog assigns to weapon skins of this tier.
    pub fn catalog_id(self) -> &'static str {
        match self {
            RarityTier::Common => "rarity_common_weapon",
            RarityTier::Uncommon => "rarity_uncommon_weapon",
            RarityTier::Rare => "rarity_rare_weapon",
            RarityTier::Mythical => "rarity_mythical_weapon",
            RarityTier::Legendary => "rarity_legendary_weapon",
        }
    }
}

/// Outcome of a completed trade-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CraftResult {
    /// Whether the service reported a result.
    pub success: bool,
    /// Items the trade-up produced.
    pub new_item_ids: Vec<ItemId>,
}

struct PendingCraft {
    ticket: u64,
    recipe_id: u32,
    done: oneshot::Sender<Vec<ItemId>>,
}

#[derive(Default)]
struct CraftSlot {
    pending: Mutex<Option<PendingCraft>>,
    tickets: AtomicU64,
}

impl CraftSlot {
    fn claim(&self, recipe_id: u32) -> Result<(SlotClaim<'_>, oneshot::Receiver<Vec<ItemId>>), CraftError> {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            return Err(CraftError::CraftInProgress);
        }
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let (done, receiver) = oneshot::channel();
        *pending = Some(PendingCraft {
            ticket,
            recipe_id,
            done,
        });
        Ok((SlotClaim { slot: self, ticket }, receiver))
    }

    /// Clear the slot if `ticket` still holds it.
    fn release(&self, ticket: u64) -> bool {
        let mut pending = self.pending.lock();
        match pending.as_ref() {
            Some(craft) if craft.ticket == ticket => {
                *pending = None;
                true
            }
            _ => false,
        }
    }

    /// Resolve the outstanding craft, if one is waiting on this recipe.
    fn complete(&self, completion: CraftCompletion) -> bool {
        let craft = {
            let mut pending = self.pending.lock();
            match pending.as_ref() {
                Some(craft) if craft.recipe_id == completion.recipe_id => pending.take(),
                Some(craft) => {
                    debug!(
                        expected = craft.recipe_id,
                        received = completion.recipe_id,
                        "ignoring completion for another recipe"
                    );
                    None
                }
                None => {
                    debug!(recipe_id = completion.recipe_id, "completion with no craft pending");
                    None
                }
            }
        };
        match craft {
            Some(craft) => craft.done.send(completion.new_item_ids).is_ok(),
            None => false,
        }
    }

    fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

/// Releases the slot when the claiming call ends, however it ends.
struct SlotClaim<'a> {
    slot: &'a CraftSlot,
    ticket: u64,
}

impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        self.slot.release(self.ticket);
    }
}

/// Runs trade-ups over the session's connection.
pub struct CraftCoordinator {
    session: SessionManager,
    timeout: Duration,
    slot: Arc<CraftSlot>,
    listener: JoinHandle<()>,
}

impl CraftCoordinator {
    /// Create a coordinator listening for completions on `session`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(session: SessionManager, timeout: Duration) -> Self {
        let slot = Arc::new(CraftSlot::default());
        let mut completions = session.craft_completions();
        let listener_slot = Arc::clone(&slot);
        let listener = tokio::spawn(async move {
            loop {
                match completions.recv().await {
                    Ok(completion) => {
                        listener_slot.complete(completion);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed craft completions");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self {
            session,
            timeout,
            slot,
            listener,
        }
    }

    /// Whether a craft is waiting for its completion.
    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }

    /// Submit a trade-up and wait for the service to report its result.
    pub async fn execute(
        &self,
        item_ids: Vec<ItemId>,
        rarity_tier: &str,
    ) -> Result<CraftResult, CraftError> {
        let tier = RarityTier::parse(rarity_tier)
            .ok_or_else(|| CraftError::UnknownRarity(rarity_tier.to_string()))?;
        validate_selection(&item_ids)?;
        let recipe_id = tier.recipe_id();

        let (_claim, done) = self.slot.claim(recipe_id)?;
        let connection = self.session.connection()?;
        info!(recipe_id, ?tier, "submitting trade-up");
        connection.craft(&item_ids, recipe_id).await?;

        match tokio::time::timeout(self.timeout, done).await {
            Ok(Ok(new_item_ids)) => {
                info!(recipe_id, ?new_item_ids, "trade-up completed");
                Ok(CraftResult {
                    success: true,
                    new_item_ids,
                })
            }
            Ok(Err(_)) => Err(CraftError::Cancelled),
            Err(_) => {
                warn!(recipe_id, timeout = ?self.timeout, "trade-up timed out");
                Err(CraftError::CraftTimeout(self.timeout))
            }
        }
    }
}

impl Drop for CraftCoordinator {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub(crate) fn validate_selection(item_ids: &[ItemId]) -> Result<(), CraftError> {
    if item_ids.len() != TRADEUP_SIZE {
        return Err(CraftError::InvalidItems(format!(
            "expected {TRADEUP_SIZE} items, got {}",
            item_ids.len()
        )));
    }
    if item_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(CraftError::InvalidItems("empty item id".to_string()));
    }
    let distinct: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
    if distinct.len() != item_ids.len() {
        return Err(CraftError::InvalidItems("duplicate item ids".to_string()));
    }
    Ok(())
}
