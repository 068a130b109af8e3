//! Bulk storage container operations.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog,
    connection::Connection,
    error::ContainerError,
    inventory::resolve_all,
    models::{ItemId, ItemView},
    session::SessionManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Store,
    Retrieve,
}

/// Moves items into and out of storage containers.
///
/// Commands are paced: consecutive dispatches are separated by a fixed
/// stagger, and no per-item completion is awaited.
#[derive(Clone)]
pub struct ContainerOps {
    session: SessionManager,
    catalog: Catalog,
    stagger: Duration,
}

impl ContainerOps {
    /// Operations over `session`, resolving through `catalog` and pacing commands by `stagger`.
    pub fn new(session: SessionManager, catalog: Catalog, stagger: Duration) -> Self {
        Self {
            session,
            catalog,
            stagger,
        }
    }

    /// Items stored in `container_id`, resolved through the catalog.
    pub async fn contents(&self, container_id: &str) -> Result<Vec<ItemView>, ContainerError> {
        let connection = self.session.connection()?;
        require_container(connection.as_ref(), container_id)?;
        let items = connection.container_contents(container_id).await?;
        Ok(resolve_all(&items, &self.catalog))
    }

    /// Schedule moving `item_ids` into `container_id`.
    ///
    /// The returned handle resolves to the number of commands the service
    /// accepted; callers may drop it.
    pub fn add_items(
        &self,
        container_id: &str,
        item_ids: Vec<ItemId>,
    ) -> Result<JoinHandle<usize>, ContainerError> {
        let connection = self.session.connection()?;
        require_container(connection.as_ref(), container_id)?;
        let items = connection.items();
        for id in &item_ids {
            let item = items
                .iter()
                .find(|item| &item.id == id)
                .ok_or_else(|| ContainerError::UnknownItem(id.clone()))?;
            if item.is_container() || item.is_stored() {
                return Err(ContainerError::UnknownItem(id.clone()));
            }
        }
        Ok(self.dispatch(connection, container_id, item_ids, Direction::Store))
    }

    /// Schedule moving `item_ids` out of `container_id`.
    pub fn remove_items(
        &self,
        container_id: &str,
        item_ids: Vec<ItemId>,
    ) -> Result<JoinHandle<usize>, ContainerError> {
        let connection = self.session.connection()?;
        require_container(connection.as_ref(), container_id)?;
        Ok(self.dispatch(connection, container_id, item_ids, Direction::Retrieve))
    }

    fn dispatch(
        &self,
        connection: Arc<dyn Connection>,
        container_id: &str,
        item_ids: Vec<ItemId>,
        direction: Direction,
    ) -> JoinHandle<usize> {
        let container_id = container_id.to_string();
        let stagger = self.stagger;
        info!(container = %container_id, items = item_ids.len(), ?direction, "dispatching container commands");
        tokio::spawn(async move {
            let mut accepted = 0;
            for (position, item_id) in item_ids.iter().enumerate() {
                if position > 0 {
                    tokio::time::sleep(stagger).await;
                }
                let result = match direction {
                    Direction::Store => connection.add_to_container(&container_id, item_id).await,
                    Direction::Retrieve => {
                        connection
                            .remove_from_container(&container_id, item_id)
                            .await
                    }
                };
                match result {
                    Ok(()) => accepted += 1,
                    Err(err) => {
                        warn!(container = %container_id, item = %item_id, "container command failed: {err}")
                    }
                }
            }
            debug!(container = %container_id, accepted, total = item_ids.len(), "container dispatch finished");
            accepted
        })
    }
}

fn require_container(connection: &dyn Connection, container_id: &str) -> Result<(), ContainerError> {
    let is_container = connection
        .items()
        .iter()
        .any(|item| item.id == container_id && item.is_container());
    if is_container {
        Ok(())
    } else {
        Err(ContainerError::NotAContainer(container_id.to_string()))
    }
}
