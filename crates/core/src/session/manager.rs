use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{
    accounts::{AccountStore, AccountSummary},
    machine::{self, SessionInput, SessionState, SessionStatus},
};
use crate::{
    connection::{
        Connection, ConnectionEvent, ConnectionFactory, CraftCompletion, GuardResponder,
        ItemNotification, LogOnCredentials,
    },
    error::SessionError,
};

const CRAFT_CHANNEL_CAPACITY: usize = 16;
const ITEM_CHANNEL_CAPACITY: usize = 256;

/// Owns the service connection and the account store.
///
/// Login, switch, remove and logout are serialised; a new login first tears
/// down whatever connection is in flight. Events from a torn-down connection
/// are discarded.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

struct Shared {
    factory: Arc<dyn ConnectionFactory>,
    accounts: AccountStore,
    operations: tokio::sync::Mutex<()>,
    inner: Mutex<Inner>,
    crafts: broadcast::Sender<CraftCompletion>,
    items: broadcast::Sender<ItemNotification>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    connection: Option<Arc<dyn Connection>>,
    epoch: u64,
    guard: Option<GuardResponder>,
    pump: Option<JoinHandle<()>>,
}

impl Inner {
    fn apply(&mut self, input: SessionInput) -> bool {
        match machine::transition(&self.state, input) {
            Ok(next) => {
                if next.status != self.state.status {
                    debug!(from = %self.state.status, to = %next.status, "session transition");
                }
                self.state = next;
                true
            }
            Err(err) => {
                debug!("ignoring session input: {err}");
                false
            }
        }
    }
}

impl SessionManager {
    /// Create a disconnected manager over `factory` and the account store.
    pub fn new(factory: Arc<dyn ConnectionFactory>, accounts: AccountStore) -> Self {
        let (crafts, _) = broadcast::channel(CRAFT_CHANNEL_CAPACITY);
        let (items, _) = broadcast::channel(ITEM_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                factory,
                accounts,
                operations: tokio::sync::Mutex::new(()),
                inner: Mutex::new(Inner::default()),
                crafts,
                items,
            }),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state.clone()
    }

    /// Current session status.
    pub fn status(&self) -> SessionStatus {
        self.shared.inner.lock().state.status.clone()
    }

    /// Backing account store.
    pub fn accounts(&self) -> &AccountStore {
        &self.shared.accounts
    }

    /// Known accounts, without their credentials.
    pub fn list_accounts(&self) -> Vec<AccountSummary> {
        self.shared.accounts.list()
    }

    /// The live connection, available only once fully negotiated.
    pub fn connection(&self) -> Result<Arc<dyn Connection>, SessionError> {
        let inner = self.shared.inner.lock();
        if inner.state.status != SessionStatus::Connected {
            return Err(SessionError::NotConnected);
        }
        inner.connection.clone().ok_or(SessionError::NotConnected)
    }

    /// Subscribe to trade-up completions reported by the service.
    pub fn craft_completions(&self) -> broadcast::Receiver<CraftCompletion> {
        self.shared.crafts.subscribe()
    }

    /// Subscribe to unsolicited item-set changes.
    pub fn item_notifications(&self) -> broadcast::Receiver<ItemNotification> {
        self.shared.items.subscribe()
    }

    /// Interactive log-on with a password.
    pub async fn login(&self, account: &str, password: &str) -> Result<(), SessionError> {
        let _serial = self.shared.operations.lock().await;
        self.shared.accounts.activate(account)?;
        self.connect(LogOnCredentials::Password {
            account: account.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// Log on with the credential stored for `account`.
    pub async fn login_with_token(&self, account: &str) -> Result<(), SessionError> {
        let _serial = self.shared.operations.lock().await;
        self.resume(account).await
    }

    /// Drop the current session and re-authenticate as `account`.
    pub async fn switch_account(&self, account: &str) -> Result<(), SessionError> {
        let _serial = self.shared.operations.lock().await;
        let from = self.shared.inner.lock().state.active_account.clone();
        info!(from = ?from, to = account, "switching account");
        self.resume(account).await
    }

    /// Complete a pending second-factor challenge.
    pub fn submit_guard_code(&self, code: &str) -> Result<(), SessionError> {
        let responder = {
            let mut inner = self.shared.inner.lock();
            if inner.state.status != SessionStatus::AwaitingGuardCode {
                return Err(SessionError::NoChallengePending);
            }
            let responder = inner
                .guard
                .take()
                .ok_or(SessionError::NoChallengePending)?;
            inner.apply(SessionInput::GuardCodeSubmitted);
            responder
        };
        if !responder.respond(code.to_string()) {
            warn!("connection stopped waiting for the guard code");
        }
        Ok(())
    }

    /// Delete an account, disconnecting if it owns the current session.
    pub async fn remove_account(&self, account: &str) -> Result<(), SessionError> {
        let _serial = self.shared.operations.lock().await;
        if !self.shared.accounts.remove(account)? {
            return Err(SessionError::UnknownAccount(account.to_string()));
        }
        let owns_session =
            self.shared.inner.lock().state.active_account.as_deref() == Some(account);
        if owns_session {
            info!(account, "removed account owned the session, disconnecting");
            self.teardown(SessionInput::ForgetAccount).await;
        } else {
            info!(account, "removed account");
        }
        Ok(())
    }

    /// Log off and forget the stored credential of the account in session.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let _serial = self.shared.operations.lock().await;
        let account = self.shared.inner.lock().state.active_account.clone();
        self.teardown(SessionInput::Disconnect).await;
        if let Some(account) = account {
            self.shared.accounts.clear_credential(&account)?;
            info!(account = %account, "logged out");
        }
        Ok(())
    }

    /// Apply an event as if it came from the current connection.
    pub fn handle_event(&self, event: ConnectionEvent) {
        let epoch = self.shared.inner.lock().epoch;
        dispatch(&self.shared, epoch, event);
    }

    async fn resume(&self, account: &str) -> Result<(), SessionError> {
        let stored = self
            .shared
            .accounts
            .get(account)
            .ok_or_else(|| SessionError::UnknownAccount(account.to_string()))?;
        let token = stored
            .credential
            .ok_or_else(|| SessionError::NoCredentialForAccount(account.to_string()))?;
        self.shared.accounts.activate(account)?;
        self.connect(LogOnCredentials::Token {
            account: account.to_string(),
            token,
        })
        .await
    }

    async fn connect(&self, credentials: LogOnCredentials) -> Result<(), SessionError> {
        self.teardown(SessionInput::Disconnect).await;

        let (connection, events) = self.shared.factory.open();
        let epoch = {
            let mut inner = self.shared.inner.lock();
            inner.apply(SessionInput::LoginRequested {
                account: credentials.account().to_string(),
            });
            inner.connection = Some(connection.clone());
            inner.epoch
        };
        let pump = tokio::spawn(pump_events(Arc::downgrade(&self.shared), epoch, events));
        self.shared.inner.lock().pump = Some(pump);

        info!(account = credentials.account(), "logging on");
        if let Err(err) = connection.log_on(credentials).await {
            let mut inner = self.shared.inner.lock();
            if inner.epoch == epoch {
                inner.apply(SessionInput::TransportError(err.to_string()));
            }
            return Err(err.into());
        }
        Ok(())
    }

    async fn teardown(&self, input: SessionInput) {
        let (connection, pump) = {
            let mut inner = self.shared.inner.lock();
            inner.epoch += 1;
            inner.guard = None;
            inner.apply(input);
            (inner.connection.take(), inner.pump.take())
        };
        if let Some(pump) = pump {
            pump.abort();
        }
        if let Some(connection) = connection {
            connection.log_off().await;
        }
    }
}

async fn pump_events(shared: Weak<Shared>, epoch: u64, mut events: mpsc::Receiver<ConnectionEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        dispatch(&shared, epoch, event);
    }
    debug!(epoch, "connection event stream closed");
}

fn dispatch(shared: &Shared, epoch: u64, event: ConnectionEvent) {
    let mut inner = shared.inner.lock();
    if inner.epoch != epoch {
        debug!(?event, "dropping event from a closed connection");
        return;
    }

    match event {
        ConnectionEvent::Authenticated { session_id } => {
            info!(session = %session_id, "authenticated, negotiating item service");
            inner.apply(SessionInput::Authenticated { session_id });
        }
        ConnectionEvent::CredentialRefreshed { token } => {
            let account = inner.state.active_account.clone();
            drop(inner);
            match account {
                Some(account) => match shared.accounts.set_credential(&account, &token) {
                    Ok(()) => info!(account = %account, "stored refreshed credential"),
                    Err(err) => warn!(account = %account, "failed to store credential: {err:#}"),
                },
                None => warn!("credential issued with no account logging in"),
            }
        }
        ConnectionEvent::GuardChallenge {
            domain,
            last_code_wrong,
            responder,
        } => {
            if inner.apply(SessionInput::GuardChallenge) {
                info!(?domain, last_code_wrong, "guard code required");
                inner.guard = Some(responder);
            }
        }
        ConnectionEvent::TransportError(message) => {
            warn!("connection error: {message}");
            inner.guard = None;
            inner.apply(SessionInput::TransportError(message));
        }
        ConnectionEvent::LoggedOff { reason } => {
            info!(?reason, "logged off by service");
            inner.guard = None;
            inner.connection = None;
            inner.apply(SessionInput::LoggedOff);
        }
        ConnectionEvent::ServiceReady => {
            if inner.apply(SessionInput::ServiceReady) {
                info!(account = ?inner.state.active_account, "session ready");
            }
        }
        ConnectionEvent::ServiceUnready => {
            inner.apply(SessionInput::ServiceUnready);
        }
        ConnectionEvent::CraftCompleted {
            recipe_id,
            new_item_ids,
        } => {
            drop(inner);
            let _ = shared.crafts.send(CraftCompletion {
                recipe_id,
                new_item_ids,
            });
        }
        ConnectionEvent::ItemAcquired(item) => {
            drop(inner);
            let _ = shared.items.send(ItemNotification::Acquired(item));
        }
        ConnectionEvent::ItemChanged(item) => {
            drop(inner);
            let _ = shared.items.send(ItemNotification::Changed(item));
        }
        ConnectionEvent::ItemRemoved(id) => {
            drop(inner);
            let _ = shared.items.send(ItemNotification::Removed(id));
        }
    }
}
