use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use super::{document, rules, source::CatalogSource, Category};
use crate::models::{CatalogEntry, RawItemRecord};

/// Immutable snapshot of the lookup indices.
///
/// Each category sits behind its own `Arc` so a reload can swap a single
/// category without touching the others.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    skins: Arc<HashMap<(u32, u32), CatalogEntry>>,
    keyed: HashMap<Category, Arc<HashMap<u32, CatalogEntry>>>,
}

impl CatalogIndex {
    /// Skin entry for a `(type id, variant id)` pair.
    pub fn skin(&self, type_id: u32, variant_id: u32) -> Option<&CatalogEntry> {
        self.skins.get(&(type_id, variant_id))
    }

    /// Entry of a non-skin category by type id.
    pub fn lookup(&self, category: Category, type_id: u32) -> Option<&CatalogEntry> {
        self.keyed.get(&category)?.get(&type_id)
    }

    /// First entry of `category` carrying exactly `name`.
    pub fn find_by_name(&self, category: Category, name: &str) -> Option<&CatalogEntry> {
        self.keyed
            .get(&category)?
            .values()
            .find(|entry| entry.name == name)
    }

    /// Number of entries indexed for `category`.
    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Skins => self.skins.len(),
            other => self.keyed.get(&other).map_or(0, |entries| entries.len()),
        }
    }

    fn install(&mut self, category: Category, indexed: Indexed) -> usize {
        match indexed {
            Indexed::Skins(entries) => {
                let count = entries.len();
                self.skins = Arc::new(entries);
                count
            }
            Indexed::Keyed(entries) => {
                let count = entries.len();
                self.keyed.insert(category, Arc::new(entries));
                count
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_skin(&mut self, type_id: u32, variant_id: u32, entry: CatalogEntry) {
        Arc::make_mut(&mut self.skins).insert((type_id, variant_id), entry);
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, category: Category, type_id: u32, entry: CatalogEntry) {
        let entries = self.keyed.entry(category).or_default();
        Arc::make_mut(entries).insert(type_id, entry);
    }
}

enum Indexed {
    Skins(HashMap<(u32, u32), CatalogEntry>),
    Keyed(HashMap<u32, CatalogEntry>),
}

/// Result of fetching one category document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryOutcome {
    /// The document was fetched and indexed.
    Loaded {
        /// Entries in the new index.
        entries: usize,
    },
    /// The fetch or decode failed; the previous index was kept.
    Failed {
        /// Error chain, for diagnostics.
        message: String,
    },
}

/// Per-category line of a [`CatalogReport`].
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    /// Category the line reports on.
    pub category: Category,
    /// What happened.
    pub outcome: CategoryOutcome,
}

/// Summary of one catalog load attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogReport {
    /// When the load attempt finished.
    pub loaded_at: DateTime<Utc>,
    /// One line per category, in fetch order.
    pub categories: Vec<CategoryReport>,
}

impl CatalogReport {
    /// Categories whose fetch or decode failed.
    pub fn failed(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories
            .iter()
            .filter(|report| matches!(report.outcome, CategoryOutcome::Failed { .. }))
    }

    /// Whether every category loaded.
    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Thread-safe catalog that classifies raw items.
#[derive(Clone, Default)]
pub struct Catalog {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    index: CatalogIndex,
    ready: bool,
    last_report: Option<CatalogReport>,
}

impl Catalog {
    /// Create an empty catalog; every lookup is unresolved until the first load.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a load attempt has completed.
    pub fn is_ready(&self) -> bool {
        self.inner.read().ready
    }

    /// Snapshot of the current indices.
    pub fn index(&self) -> CatalogIndex {
        self.inner.read().index.clone()
    }

    /// Report of the most recent load, if any.
    pub fn last_report(&self) -> Option<CatalogReport> {
        self.inner.read().last_report.clone()
    }

    /// Classify a raw item. `None` means "display as unknown".
    pub fn resolve(&self, raw: &RawItemRecord) -> Option<CatalogEntry> {
        let inner = self.inner.read();
        if !inner.ready {
            return None;
        }
        rules::resolve(raw, &inner.index)
    }

    /// Fetch every category concurrently and install the ones that succeed.
    ///
    /// A failed category keeps whatever index it had before (empty on the
    /// first load); the catalog is ready afterwards regardless.
    pub async fn reload(&self, source: &dyn CatalogSource) -> CatalogReport {
        let fetches = Category::ALL.into_iter().map(|category| async move {
            (category, fetch_category(source, category).await)
        });
        let results = join_all(fetches).await;

        let mut categories = Vec::with_capacity(results.len());
        let mut inner = self.inner.write();
        for (category, result) in results {
            let outcome = match result {
                Ok(indexed) => {
                    let entries = inner.index.install(category, indexed);
                    CategoryOutcome::Loaded { entries }
                }
                Err(err) => {
                    warn!(?category, "catalog fetch failed, keeping previous index: {err:#}");
                    CategoryOutcome::Failed {
                        message: format!("{err:#}"),
                    }
                }
            };
            categories.push(CategoryReport { category, outcome });
        }

        let report = CatalogReport {
            loaded_at: Utc::now(),
            categories,
        };
        info!(
            skins = inner.index.len(Category::Skins),
            failed = report.failed().count(),
            "catalog load finished"
        );
        inner.ready = true;
        inner.last_report = Some(report.clone());
        report
    }
}

async fn fetch_category(source: &dyn CatalogSource, category: Category) -> Result<Indexed> {
    let records = document::normalize(source.fetch(category).await?);
    Ok(match category {
        Category::Skins => Indexed::Skins(document::skin_entries(records)),
        _ => Indexed::Keyed(document::keyed_entries(records)),
    })
}
