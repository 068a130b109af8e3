//! Scripted collaborators shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::{
    catalog::{CatalogSource, Category},
    connection::{Connection, ConnectionEvent, ConnectionFactory, LogOnCredentials},
    error::ConnectionError,
    models::{ItemId, RawItemRecord},
    session::{AccountStore, SessionManager, SessionStatus},
};

/// Command recorded by [`MockConnection`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    LogOn(LogOnCredentials),
    LogOff,
    Craft {
        item_ids: Vec<ItemId>,
        recipe_id: u32,
    },
    AddToContainer {
        container_id: String,
        item_id: String,
    },
    RemoveFromContainer {
        container_id: String,
        item_id: String,
    },
    ContainerContents(String),
}

#[derive(Default)]
pub(crate) struct MockConnection {
    commands: Mutex<Vec<Command>>,
    items: Vec<RawItemRecord>,
    contents: HashMap<String, Vec<RawItemRecord>>,
    fail_log_on: Option<String>,
    rejected_items: HashSet<String>,
}

impl MockConnection {
    pub(crate) fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub(crate) fn crafts(&self) -> Vec<(Vec<ItemId>, u32)> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                Command::Craft {
                    item_ids,
                    recipe_id,
                } => Some((item_ids, recipe_id)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, command: Command) {
        self.commands.lock().push(command);
    }

    fn check_item(&self, item_id: &str) -> Result<(), ConnectionError> {
        if self.rejected_items.contains(item_id) {
            return Err(ConnectionError::Rejected(format!("item {item_id} is locked")));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn log_on(&self, credentials: LogOnCredentials) -> Result<(), ConnectionError> {
        self.record(Command::LogOn(credentials));
        match &self.fail_log_on {
            Some(message) => Err(ConnectionError::Transport(message.clone())),
            None => Ok(()),
        }
    }

    async fn log_off(&self) {
        self.record(Command::LogOff);
    }

    async fn craft(&self, item_ids: &[ItemId], recipe_id: u32) -> Result<(), ConnectionError> {
        self.record(Command::Craft {
            item_ids: item_ids.to_vec(),
            recipe_id,
        });
        Ok(())
    }

    async fn add_to_container(
        &self,
        container_id: &str,
        item_id: &str,
    ) -> Result<(), ConnectionError> {
        self.record(Command::AddToContainer {
            container_id: container_id.to_string(),
            item_id: item_id.to_string(),
        });
        self.check_item(item_id)
    }

    async fn remove_from_container(
        &self,
        container_id: &str,
        item_id: &str,
    ) -> Result<(), ConnectionError> {
        self.record(Command::RemoveFromContainer {
            container_id: container_id.to_string(),
            item_id: item_id.to_string(),
        });
        self.check_item(item_id)
    }

    async fn container_contents(
        &self,
        container_id: &str,
    ) -> Result<Vec<RawItemRecord>, ConnectionError> {
        self.record(Command::ContainerContents(container_id.to_string()));
        Ok(self.contents.get(container_id).cloned().unwrap_or_default())
    }

    fn items(&self) -> Vec<RawItemRecord> {
        self.items.clone()
    }
}

/// Hands out [`MockConnection`]s and keeps their event senders.
#[derive(Default)]
pub(crate) struct MockFactory {
    opened: Mutex<Vec<(Arc<MockConnection>, mpsc::Sender<ConnectionEvent>)>>,
    items: Mutex<Vec<RawItemRecord>>,
    contents: Mutex<HashMap<String, Vec<RawItemRecord>>>,
    rejected_items: Mutex<HashSet<String>>,
    fail_next_log_on: Mutex<Option<String>>,
}

impl MockFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_items(items: Vec<RawItemRecord>) -> Arc<Self> {
        let factory = Self::default();
        *factory.items.lock() = items;
        Arc::new(factory)
    }

    pub(crate) fn set_contents(&self, container_id: &str, items: Vec<RawItemRecord>) {
        self.contents.lock().insert(container_id.to_string(), items);
    }

    pub(crate) fn reject_item(&self, item_id: &str) {
        self.rejected_items.lock().insert(item_id.to_string());
    }

    pub(crate) fn fail_next_log_on(&self, message: &str) {
        *self.fail_next_log_on.lock() = Some(message.to_string());
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.lock().len()
    }

    pub(crate) fn connection(&self, index: usize) -> Arc<MockConnection> {
        Arc::clone(&self.opened.lock()[index].0)
    }

    pub(crate) fn latest(&self) -> Arc<MockConnection> {
        let opened = self.opened.lock();
        Arc::clone(&opened.last().expect("no connection opened").0)
    }

    pub(crate) fn sender(&self, index: usize) -> mpsc::Sender<ConnectionEvent> {
        self.opened.lock()[index].1.clone()
    }
}

impl ConnectionFactory for MockFactory {
    fn open(&self) -> (Arc<dyn Connection>, mpsc::Receiver<ConnectionEvent>) {
        let (sender, receiver) = mpsc::channel(32);
        let connection = Arc::new(MockConnection {
            commands: Mutex::new(Vec::new()),
            items: self.items.lock().clone(),
            contents: self.contents.lock().clone(),
            fail_log_on: self.fail_next_log_on.lock().take(),
            rejected_items: self.rejected_items.lock().clone(),
        });
        self.opened.lock().push((Arc::clone(&connection), sender));
        (connection, receiver)
    }
}

/// Log `alice` in and drive the session to `Connected`.
pub(crate) async fn connected_session(factory: Arc<MockFactory>, dir: &TempDir) -> SessionManager {
    let store = AccountStore::open(dir.path().join("accounts.json")).expect("account store");
    let session = SessionManager::new(factory, store);
    session.login("alice", "hunter2").await.expect("login");
    session.handle_event(ConnectionEvent::Authenticated {
        session_id: "76561198000000000".to_string(),
    });
    session.handle_event(ConnectionEvent::ServiceReady);
    assert_eq!(session.status(), SessionStatus::Connected);
    session
}

/// Poll `condition` until it holds, failing the test after about a second.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// In-memory catalog documents with per-category failure injection.
#[derive(Default)]
pub(crate) struct StaticCatalogSource {
    documents: HashMap<Category, Value>,
    failing: HashSet<Category>,
}

impl StaticCatalogSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, category: Category, document: Value) -> Self {
        self.documents.insert(category, document);
        self
    }

    pub(crate) fn failing(mut self, category: Category) -> Self {
        self.failing.insert(category);
        self
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch(&self, category: Category) -> Result<Value> {
        if self.failing.contains(&category) {
            bail!("HTTP status server error (503 Service Unavailable) for {}", category.document());
        }
        Ok(self
            .documents
            .get(&category)
            .cloned()
            .unwrap_or_else(|| json!([])))
    }
}
