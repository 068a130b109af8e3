//! Session lifecycle: connection state machine, account store and manager.

pub mod accounts;
pub mod machine;
mod manager;

pub use accounts::{Account, AccountStore, AccountSummary, AccountsDocument};
pub use machine::{InvalidTransition, SessionInput, SessionState, SessionStatus};
pub use manager::SessionManager;
