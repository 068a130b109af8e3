//! Operations exposed to the route layer.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use tokio::task::JoinHandle;

use crate::{
    catalog::{Catalog, CatalogReport, CatalogSource, HttpCatalogSource},
    config::AppConfig,
    connection::ConnectionFactory,
    containers::ContainerOps,
    craft::{self, CraftCoordinator, CraftResult, RarityTier},
    error::{CraftError, Result},
    inventory::{self, TradeupGroup},
    models::{CatalogEntry, ItemId, ItemView, RawItemRecord},
    session::{AccountStore, AccountSummary, SessionManager, SessionState},
};

/// Facade bundling the session, catalog, crafting and container components.
pub struct Backend {
    session: SessionManager,
    catalog: Catalog,
    source: Arc<dyn CatalogSource>,
    crafts: CraftCoordinator,
    containers: ContainerOps,
}

impl Backend {
    /// Assemble the components. Must be called from within a Tokio runtime.
    pub fn new(
        config: &AppConfig,
        factory: Arc<dyn ConnectionFactory>,
        accounts: AccountStore,
        source: Arc<dyn CatalogSource>,
    ) -> Self {
        let session = SessionManager::new(factory, accounts);
        let catalog = Catalog::new();
        let crafts = CraftCoordinator::new(session.clone(), config.craft_timeout());
        let containers =
            ContainerOps::new(session.clone(), catalog.clone(), config.container_stagger());
        Self {
            session,
            catalog,
            source,
            crafts,
            containers,
        }
    }

    /// Build from configuration, using the HTTP catalog provider and the
    /// configured account store.
    pub fn from_config(config: &AppConfig, factory: Arc<dyn ConnectionFactory>) -> AnyResult<Self> {
        let accounts = AccountStore::open(config.accounts_path.clone())?;
        let source = Arc::new(HttpCatalogSource::from_config(config)?);
        Ok(Self::new(config, factory, accounts, source))
    }

    /// Session manager backing this facade.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Catalog backing this facade.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Current session state.
    pub fn session_status(&self) -> SessionState {
        self.session.state()
    }

    /// Known accounts, without their credentials.
    pub fn list_accounts(&self) -> Vec<AccountSummary> {
        self.session.list_accounts()
    }

    /// Interactive log-on; a second-factor challenge may follow.
    pub async fn login(&self, account: &str, password: &str) -> Result<()> {
        Ok(self.session.login(account, password).await?)
    }

    /// Log on with the credential stored for `account`.
    pub async fn login_with_token(&self, account: &str) -> Result<()> {
        Ok(self.session.login_with_token(account).await?)
    }

    /// Answer a pending second-factor challenge.
    pub fn submit_guard_code(&self, code: &str) -> Result<()> {
        Ok(self.session.submit_guard_code(code)?)
    }

    /// Re-authenticate as another stored account.
    pub async fn switch_account(&self, account: &str) -> Result<()> {
        Ok(self.session.switch_account(account).await?)
    }

    /// Forget an account, disconnecting if it owns the session.
    pub async fn remove_account(&self, account: &str) -> Result<()> {
        Ok(self.session.remove_account(account).await?)
    }

    /// Log off and clear the session account's stored credential.
    pub async fn logout(&self) -> Result<()> {
        Ok(self.session.logout().await?)
    }

    /// Classify a raw item; `None` means "display as unknown".
    pub fn resolve_item(&self, raw: &RawItemRecord) -> Option<CatalogEntry> {
        self.catalog.resolve(raw)
    }

    /// Fetch every catalog document again and report per category.
    pub async fn reload_catalog(&self) -> CatalogReport {
        self.catalog.reload(self.source.as_ref()).await
    }

    /// Live inventory, excluding items stored in containers.
    pub fn inventory(&self) -> Result<Vec<ItemView>> {
        Ok(inventory::list_inventory(&self.session, &self.catalog)?)
    }

    /// Inventory skins grouped by trade-up tier.
    pub fn tradeup_groups(&self) -> Result<Vec<TradeupGroup>> {
        Ok(inventory::tradeup_groups(&self.inventory()?))
    }

    /// Validate the selection against the live inventory, then craft it.
    ///
    /// The tier and the shape of the selection are checked before the
    /// connection is consulted.
    pub async fn execute_craft(&self, item_ids: Vec<ItemId>, rarity_tier: &str) -> Result<CraftResult> {
        RarityTier::parse(rarity_tier)
            .ok_or_else(|| CraftError::UnknownRarity(rarity_tier.to_string()))?;
        craft::validate_selection(&item_ids)?;
        let items = self.inventory()?;
        inventory::validate_tradeup_selection(&items, &item_ids, rarity_tier)?;
        Ok(self.crafts.execute(item_ids, rarity_tier).await?)
    }

    /// Resolved contents of a storage container.
    pub async fn container_contents(&self, container_id: &str) -> Result<Vec<ItemView>> {
        Ok(self.containers.contents(container_id).await?)
    }

    /// Schedule storing items in a container; see [`ContainerOps::add_items`].
    pub fn add_to_container(&self, container_id: &str, item_ids: Vec<ItemId>) -> Result<JoinHandle<usize>> {
        Ok(self.containers.add_items(container_id, item_ids)?)
    }

    /// Schedule retrieving items from a container.
    pub fn remove_from_container(
        &self,
        container_id: &str,
        item_ids: Vec<ItemId>,
    ) -> Result<JoinHandle<usize>> {
        Ok(self.containers.remove_items(container_id, item_ids)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::Category,
        connection::ConnectionEvent,
        error::{ContainerError, CraftError, Error, SessionError},
        session::SessionStatus,
        testing::{wait_until, MockFactory, StaticCatalogSource},
    };
    use serde_json::json;
    use tempfile::tempdir;

    fn skins() -> StaticCatalogSource {
        StaticCatalogSource::new().with(
            Category::Skins,
            json!({ "value": [
                { "name": "MP9 | Dart", "weapon": { "weapon_id": 34 }, "paint_index": 386,
                  "rarity": { "id": "rarity_rare_weapon" },
                  "collections": [{ "name": "The Chroma 2 Collection" }] }
            ] }),
        )
    }

    fn records() -> Vec<RawItemRecord> {
        (0..10)
            .map(|n| RawItemRecord {
                id: format!("{}", 500 + n),
                def_index: 34,
                paint_index: 386,
                paint_wear: Some(0.3),
                ..Default::default()
            })
            .collect()
    }

    fn backend(factory: Arc<MockFactory>, dir: &tempfile::TempDir) -> Backend {
        let config = AppConfig {
            craft_timeout_secs: 5,
            ..AppConfig::default()
        };
        let accounts = AccountStore::open(dir.path().join("accounts.json")).expect("store");
        Backend::new(&config, factory, accounts, Arc::new(skins()))
    }

    #[tokio::test]
    async fn end_to_end_tradeup() {
        let dir = tempdir().expect("tempdir");
        let factory = MockFactory::with_items(records());
        let backend = Arc::new(backend(factory.clone(), &dir));

        let report = backend.reload_catalog().await;
        assert!(report.is_complete());

        backend.login("alice", "pw").await.expect("login");
        backend.session().handle_event(ConnectionEvent::Authenticated {
            session_id: "1".to_string(),
        });
        backend.session().handle_event(ConnectionEvent::ServiceReady);
        assert_eq!(backend.session_status().status, SessionStatus::Connected);

        let groups = backend.tradeup_groups().expect("groups");
        assert_eq!(groups.len(), 1);
        assert!(groups[0].is_craftable());
        assert_eq!(groups[0].items[0].collections, vec!["The Chroma 2 Collection".to_string()]);

        let ids: Vec<ItemId> = records().into_iter().map(|raw| raw.id).collect();
        let task = {
            let backend = Arc::clone(&backend);
            let ids = ids.clone();
            tokio::spawn(async move { backend.execute_craft(ids, "rarity_rare_weapon").await })
        };
        let connection = factory.latest();
        wait_until(|| !connection.crafts().is_empty()).await;
        backend.session().handle_event(ConnectionEvent::CraftCompleted {
            recipe_id: 2,
            new_item_ids: vec!["555".to_string()],
        });
        let result = task.await.expect("join").expect("craft");
        assert!(result.success);
        assert_eq!(result.new_item_ids, vec!["555".to_string()]);
    }

    #[tokio::test]
    async fn selection_of_wrong_tier_is_rejected_before_crafting() {
        let dir = tempdir().expect("tempdir");
        let factory = MockFactory::with_items(records());
        let backend = backend(factory.clone(), &dir);
        backend.reload_catalog().await;
        backend.login("alice", "pw").await.expect("login");
        backend.session().handle_event(ConnectionEvent::Authenticated {
            session_id: "1".to_string(),
        });
        backend.session().handle_event(ConnectionEvent::ServiceReady);

        let ids: Vec<ItemId> = records().into_iter().map(|raw| raw.id).collect();
        let err = backend
            .execute_craft(ids, "mythical")
            .await
            .expect_err("wrong tier");
        assert!(matches!(err, Error::Craft(CraftError::InvalidItems(_))));
        assert!(factory.latest().crafts().is_empty());
        assert_eq!(
            backend.resolve_item(&records()[0]).map(|entry| entry.name),
            Some("MP9 | Dart".to_string())
        );
    }

    #[tokio::test]
    async fn inventory_requires_connected_session() {
        let dir = tempdir().expect("tempdir");
        let backend = backend(MockFactory::new(), &dir);
        assert!(matches!(
            backend.inventory(),
            Err(Error::Session(SessionError::NotConnected))
        ));
        assert!(matches!(
            backend.add_to_container("box", vec!["a".to_string()]),
            Err(Error::Container(ContainerError::Session(SessionError::NotConnected)))
        ));
        assert!(backend.list_accounts().is_empty());
    }

    #[tokio::test]
    async fn craft_input_errors_come_before_connection_checks() {
        let dir = tempdir().expect("tempdir");
        let factory = MockFactory::new();
        let backend = backend(factory.clone(), &dir);
        let ids: Vec<ItemId> = records().into_iter().map(|raw| raw.id).collect();

        let err = backend
            .execute_craft(ids.clone(), "bogus")
            .await
            .expect_err("unknown tier");
        assert!(matches!(err, Error::Craft(CraftError::UnknownRarity(_))));

        let err = backend
            .execute_craft(ids[..9].to_vec(), "rare")
            .await
            .expect_err("short selection");
        assert!(matches!(err, Error::Craft(CraftError::InvalidItems(_))));

        let err = backend
            .execute_craft(ids, "rare")
            .await
            .expect_err("disconnected");
        assert!(matches!(err, Error::Session(SessionError::NotConnected)));
        assert_eq!(factory.opened(), 0);
    }
}
