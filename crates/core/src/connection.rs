//! Seam to the external item service connection.
//!
//! The transport itself lives outside this crate. The session manager drives
//! it through [`Connection`] commands and observes it through the
//! [`ConnectionEvent`] stream handed out by [`ConnectionFactory::open`].

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::ConnectionError,
    models::{ItemId, RawItemRecord},
};

/// Credentials for a log-on command.
#[derive(Clone, PartialEq, Eq)]
pub enum LogOnCredentials {
    /// Interactive password log-on.
    Password {
        /// Account login name.
        account: String,
        /// Account password.
        password: String,
    },
    /// Log-on with a previously issued refresh credential.
    Token {
        /// Account login name.
        account: String,
        /// Stored credential.
        token: String,
    },
}

impl LogOnCredentials {
    /// Account the credentials belong to.
    pub fn account(&self) -> &str {
        match self {
            Self::Password { account, .. } | Self::Token { account, .. } => account,
        }
    }
}

impl fmt::Debug for LogOnCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { account, .. } => f
                .debug_struct("Password")
                .field("account", account)
                .finish_non_exhaustive(),
            Self::Token { account, .. } => f
                .debug_struct("Token")
                .field("account", account)
                .finish_non_exhaustive(),
        }
    }
}

/// One-shot handle that completes a pending second-factor challenge.
pub struct GuardResponder(oneshot::Sender<String>);

impl GuardResponder {
    /// Create a responder plus the receiver the transport waits on.
    pub fn channel() -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Deliver the code. Returns `false` when the transport stopped waiting.
    pub fn respond(self, code: String) -> bool {
        self.0.send(code).is_ok()
    }
}

impl fmt::Debug for GuardResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GuardResponder")
    }
}

/// Events produced by the connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Credentials accepted; the item service handshake follows.
    Authenticated {
        /// Opaque session identity.
        session_id: String,
    },
    /// The service issued a credential for the account logging in.
    CredentialRefreshed {
        /// Credential to persist for later token log-ons.
        token: String,
    },
    /// A second-factor code is required.
    GuardChallenge {
        /// Where the code was sent; `None` for the authenticator app.
        domain: Option<String>,
        /// Whether the previously submitted code was rejected.
        last_code_wrong: bool,
        /// Completes the challenge.
        responder: GuardResponder,
    },
    /// Transport failure; the message is kept verbatim.
    TransportError(String),
    /// The service ended the session.
    LoggedOff {
        /// Service-supplied reason, if any.
        reason: Option<String>,
    },
    /// Item service handshake finished.
    ServiceReady,
    /// Item service went away while logged on.
    ServiceUnready,
    /// A submitted trade-up finished.
    CraftCompleted {
        /// Recipe the completion belongs to.
        recipe_id: u32,
        /// Items the trade-up produced.
        new_item_ids: Vec<ItemId>,
    },
    /// An item entered the live item set.
    ItemAcquired(RawItemRecord),
    /// An item in the live item set changed.
    ItemChanged(RawItemRecord),
    /// An item left the live item set.
    ItemRemoved(ItemId),
}

/// Commands accepted by the service connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Start logging on; progress arrives as events.
    async fn log_on(&self, credentials: LogOnCredentials) -> Result<(), ConnectionError>;

    /// Close the connection. Never fails.
    async fn log_off(&self);

    /// Submit a trade-up. Completion arrives later as [`ConnectionEvent::CraftCompleted`].
    async fn craft(&self, item_ids: &[ItemId], recipe_id: u32) -> Result<(), ConnectionError>;

    /// Move an item into a storage container.
    async fn add_to_container(
        &self,
        container_id: &str,
        item_id: &str,
    ) -> Result<(), ConnectionError>;

    /// Move an item out of a storage container.
    async fn remove_from_container(
        &self,
        container_id: &str,
        item_id: &str,
    ) -> Result<(), ConnectionError>;

    /// Items stored inside a container.
    async fn container_contents(
        &self,
        container_id: &str,
    ) -> Result<Vec<RawItemRecord>, ConnectionError>;

    /// Snapshot of the live item set.
    fn items(&self) -> Vec<RawItemRecord>;
}

/// Opens fresh connections for each log-on attempt.
pub trait ConnectionFactory: Send + Sync {
    /// Open a connection together with its event stream.
    fn open(&self) -> (Arc<dyn Connection>, mpsc::Receiver<ConnectionEvent>);
}

/// Completion of a trade-up as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftCompletion {
    /// Recipe the completion belongs to.
    pub recipe_id: u32,
    /// Items the trade-up produced.
    pub new_item_ids: Vec<ItemId>,
}

/// Unsolicited change to the live item set.
#[derive(Debug, Clone)]
pub enum ItemNotification {
    /// An item entered the live item set.
    Acquired(RawItemRecord),
    /// An item in the live item set changed.
    Changed(RawItemRecord),
    /// An item left the live item set.
    Removed(ItemId),
}
