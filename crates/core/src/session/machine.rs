//! Session state machine.
//!
//! [`transition`] is pure: it maps the current state plus an input to the next
//! state, or rejects the pair. The manager feeds it from connection events and
//! caller requests.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Externally visible session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum SessionStatus {
    /// No connection.
    Disconnected,
    /// Logging on or negotiating the item service.
    Connecting,
    /// Waiting for a second-factor code.
    AwaitingGuardCode,
    /// Fully negotiated; item operations are available.
    Connected,
    /// Transport failure, with its message.
    Error(String),
}

/// The single session state of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Current status.
    pub status: SessionStatus,
    /// Account the session belongs to.
    pub active_account: Option<String>,
    /// Identity captured on authentication.
    pub session_id: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            active_account: None,
            session_id: None,
        }
    }
}

impl SessionState {
    /// Authenticated but still waiting for the item service handshake.
    pub fn is_negotiating(&self) -> bool {
        self.status == SessionStatus::Connecting && self.session_id.is_some()
    }
}

/// Inputs driving the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// A log-on was started for `account`.
    LoginRequested {
        /// Account logging on.
        account: String,
    },
    /// Credentials were accepted.
    Authenticated {
        /// Opaque session identity.
        session_id: String,
    },
    /// The connection asked for a second-factor code.
    GuardChallenge,
    /// The caller supplied the code.
    GuardCodeSubmitted,
    /// Item service handshake finished.
    ServiceReady,
    /// Item service went away.
    ServiceUnready,
    /// Transport failure.
    TransportError(String),
    /// The service ended the session.
    LoggedOff,
    /// Local teardown of the connection.
    Disconnect,
    /// Local teardown that also drops the active account.
    ForgetAccount,
}

impl SessionInput {
    fn label(&self) -> &'static str {
        match self {
            SessionInput::LoginRequested { .. } => "login-requested",
            SessionInput::Authenticated { .. } => "authenticated",
            SessionInput::GuardChallenge => "guard-challenge",
            SessionInput::GuardCodeSubmitted => "guard-code-submitted",
            SessionInput::ServiceReady => "service-ready",
            SessionInput::ServiceUnready => "service-unready",
            SessionInput::TransportError(_) => "transport-error",
            SessionInput::LoggedOff => "logged-off",
            SessionInput::Disconnect => "disconnect",
            SessionInput::ForgetAccount => "forget-account",
        }
    }
}

/// Rejected `(state, input)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{input} is not valid while {from}")]
pub struct InvalidTransition {
    /// Status the input arrived in.
    pub from: SessionStatus,
    /// Label of the rejected input.
    pub input: &'static str,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Disconnected => f.write_str("disconnected"),
            SessionStatus::Connecting => f.write_str("connecting"),
            SessionStatus::AwaitingGuardCode => f.write_str("awaiting guard code"),
            SessionStatus::Connected => f.write_str("connected"),
            SessionStatus::Error(message) => write!(f, "error ({message})"),
        }
    }
}

/// Compute the next state.
pub fn transition(
    state: &SessionState,
    input: SessionInput,
) -> Result<SessionState, InvalidTransition> {
    use SessionInput as In;
    use SessionStatus as St;

    let rejected = |input: &In| InvalidTransition {
        from: state.status.clone(),
        input: input.label(),
    };

    let next = match (&state.status, input) {
        (St::Disconnected | St::Error(_) | St::Connected, In::LoginRequested { account }) => {
            SessionState {
                status: St::Connecting,
                active_account: Some(account),
                session_id: None,
            }
        }
        (St::Connecting, In::Authenticated { session_id }) => SessionState {
            session_id: Some(session_id),
            ..state.clone()
        },
        (St::Connecting, In::GuardChallenge) => SessionState {
            status: St::AwaitingGuardCode,
            ..state.clone()
        },
        (St::AwaitingGuardCode, In::GuardCodeSubmitted) => SessionState {
            status: St::Connecting,
            ..state.clone()
        },
        (St::Connecting, In::ServiceReady)
            if state.session_id.is_some() && state.active_account.is_some() =>
        {
            SessionState {
                status: St::Connected,
                ..state.clone()
            }
        }
        (St::Connected, In::ServiceUnready) => SessionState {
            status: St::Connecting,
            ..state.clone()
        },
        (_, In::TransportError(message)) => SessionState {
            status: St::Error(message),
            session_id: None,
            ..state.clone()
        },
        (_, In::LoggedOff | In::Disconnect) => SessionState {
            status: St::Disconnected,
            session_id: None,
            ..state.clone()
        },
        (_, In::ForgetAccount) => SessionState::default(),
        (_, input) => return Err(rejected(&input)),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(account: &str) -> SessionInput {
        SessionInput::LoginRequested {
            account: account.to_string(),
        }
    }

    fn run(inputs: Vec<SessionInput>) -> Result<SessionState, InvalidTransition> {
        inputs
            .into_iter()
            .try_fold(SessionState::default(), |state, input| transition(&state, input))
    }

    #[test]
    fn login_handshake_reaches_connected() {
        let state = run(vec![
            login("alice"),
            SessionInput::Authenticated {
                session_id: "7656".to_string(),
            },
        ])
        .expect("valid path");
        assert!(state.is_negotiating());

        let state = transition(&state, SessionInput::ServiceReady).expect("ready");
        assert_eq!(state.status, SessionStatus::Connected);
        assert_eq!(state.active_account.as_deref(), Some("alice"));
        assert_eq!(state.session_id.as_deref(), Some("7656"));
    }

    #[test]
    fn service_ready_before_authentication_is_rejected() {
        let err = run(vec![login("alice"), SessionInput::ServiceReady]).unwrap_err();
        assert_eq!(err.from, SessionStatus::Connecting);
        assert_eq!(err.input, "service-ready");
    }

    #[test]
    fn guard_challenge_round_trip() {
        let state = run(vec![login("alice"), SessionInput::GuardChallenge]).expect("challenge");
        assert_eq!(state.status, SessionStatus::AwaitingGuardCode);

        let state = transition(&state, SessionInput::GuardCodeSubmitted).expect("submit");
        assert_eq!(state.status, SessionStatus::Connecting);

        assert!(transition(&state, SessionInput::GuardCodeSubmitted).is_err());
    }

    #[test]
    fn login_is_rejected_mid_transition() {
        let state = run(vec![login("alice")]).expect("connecting");
        assert!(transition(&state, login("bob")).is_err());

        let state = transition(&state, SessionInput::GuardChallenge).expect("challenge");
        assert!(transition(&state, login("bob")).is_err());
    }

    #[test]
    fn transport_error_preserves_message_and_allows_relogin() {
        let state = run(vec![
            login("alice"),
            SessionInput::TransportError("socket hang up".to_string()),
        ])
        .expect("error");
        assert_eq!(
            state.status,
            SessionStatus::Error("socket hang up".to_string())
        );
        assert!(state.session_id.is_none());

        let state = transition(&state, login("bob")).expect("relogin");
        assert_eq!(state.active_account.as_deref(), Some("bob"));
    }

    #[test]
    fn unready_service_returns_to_negotiation() {
        let state = run(vec![
            login("alice"),
            SessionInput::Authenticated {
                session_id: "1".to_string(),
            },
            SessionInput::ServiceReady,
            SessionInput::ServiceUnready,
        ])
        .expect("valid path");
        assert!(state.is_negotiating());
    }

    #[test]
    fn teardown_inputs() {
        let connected = run(vec![
            login("alice"),
            SessionInput::Authenticated {
                session_id: "1".to_string(),
            },
            SessionInput::ServiceReady,
        ])
        .expect("connected");

        let logged_off = transition(&connected, SessionInput::LoggedOff).expect("logged off");
        assert_eq!(logged_off.status, SessionStatus::Disconnected);
        assert_eq!(logged_off.active_account.as_deref(), Some("alice"));
        assert!(logged_off.session_id.is_none());

        let forgotten = transition(&connected, SessionInput::ForgetAccount).expect("forget");
        assert_eq!(forgotten, SessionState::default());
    }
}
