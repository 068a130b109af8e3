#![warn(clippy::all, missing_docs)]

//! Core logic for the trade-up backend.
//!
//! This crate hosts the session state machine and account store, the item
//! catalog and its resolution rules, trade-up crafting and storage container
//! operations. The game-service transport sits behind the
//! [`connection::Connection`] trait so frontends and tests can supply their own.

pub mod catalog;
pub mod config;
pub mod connection;
pub mod containers;
pub mod craft;
pub mod error;
pub mod inventory;
pub mod models;
pub mod service;
pub mod session;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, CatalogReport, CatalogSource, Category, HttpCatalogSource};
pub use config::AppConfig;
pub use connection::{Connection, ConnectionEvent, ConnectionFactory, LogOnCredentials};
pub use craft::{CraftCoordinator, CraftResult, RarityTier};
pub use error::{ConnectionError, ContainerError, CraftError, Error, Result, SessionError};
pub use models::{CatalogEntry, ItemId, ItemView, RawItemRecord};
pub use service::Backend;
pub use session::{AccountStore, SessionManager, SessionState, SessionStatus};
