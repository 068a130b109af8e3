//! Typed errors surfaced by the core components.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by the service connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// Transport-level failure; the session drops to `Error` with this message.
    #[error("connection failed: {0}")]
    Transport(String),
    /// The service refused a command.
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Errors from session and account operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// [`SessionManager::submit_guard_code`](crate::session::SessionManager::submit_guard_code) called with no challenge outstanding.
    #[error("no second-factor challenge is pending")]
    NoChallengePending,
    /// The account is not in the store.
    #[error("unknown account {0:?}")]
    UnknownAccount(String),
    /// The account has no credential for a token log-on.
    #[error("account {0:?} has no stored credential; log in interactively")]
    NoCredentialForAccount(String),
    /// The operation needs a `Connected` session.
    #[error("no fully negotiated session")]
    NotConnected,
    /// The connection refused or failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Reading or writing the account store failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Errors from trade-up crafting.
#[derive(Debug, Error)]
pub enum CraftError {
    /// The tier is not one of common through legendary.
    #[error("unknown rarity tier {0:?}")]
    UnknownRarity(String),
    /// The selection is not a valid trade-up.
    #[error("invalid trade-up selection: {0}")]
    InvalidItems(String),
    /// A craft is already outstanding.
    #[error("another trade-up is already in progress")]
    CraftInProgress,
    /// No completion arrived within the bound; the slot is free again.
    #[error("trade-up did not complete within {0:?}")]
    CraftTimeout(Duration),
    /// The completion channel closed before a result arrived.
    #[error("trade-up was abandoned before completion")]
    Cancelled,
    /// The session could not provide a connection.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The service refused the craft command.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Errors from storage container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The id is not a container in the live item set.
    #[error("item {0} is not a storage container")]
    NotAContainer(String),
    /// The item is not eligible to be stored.
    #[error("item {0} is not in the inventory")]
    UnknownItem(String),
    /// The session could not provide a connection.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The service refused the command.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Umbrella error for the [`crate::service::Backend`] facade.
#[derive(Debug, Error)]
pub enum Error {
    /// Session or account failure.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Trade-up failure.
    #[error(transparent)]
    Craft(#[from] CraftError),
    /// Storage container failure.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Result alias for facade operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
