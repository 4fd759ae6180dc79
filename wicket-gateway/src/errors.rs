//! Error types for wicket-gateway.
//!
//! The taxonomy is deliberately small: transport failures surface to the
//! caller of the triggering operation, auth rejections surface with the
//! state machine left in place for a retry, and parse problems degrade to
//! empty results instead of erroring (see [`crate::extract`]).

use std::fmt;

// ─── TransportError ───────────────────────────────────────────────────────────

/// A gateway call failed at the HTTP layer.
#[derive(Debug)]
pub enum TransportError {
    /// The gateway answered with a non-success status code.
    Status(u16),
    /// Connection, write, or read failure before a status was obtained.
    Connection(reqwest::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code)  => write!(f, "HTTP error: {code}"),
            Self::Connection(e) => write!(f, "connection error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest folds a non-success status into its error only when asked;
        // we check statuses explicitly, so anything arriving here is I/O.
        Self::Connection(e)
    }
}

impl TransportError {
    /// The HTTP status code, if the failure was a status failure.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(c)     => Some(*c),
            Self::Connection(_) => None,
        }
    }
}

// ─── AuthError ────────────────────────────────────────────────────────────────

/// Errors returned by the [`crate::auth::LoginFlow`] steps.
#[derive(Debug)]
pub enum AuthError {
    /// Local validation failed; nothing was sent. State unchanged.
    Input(&'static str),
    /// The gateway rejected the step (`status` was not a success and no
    /// password was requested). State unchanged so the step can be retried.
    Denied(String),
    /// The call never completed. State unchanged.
    Transport(TransportError),
    /// The step does not apply to the current state (e.g. submitting a code
    /// before a phone). State unchanged.
    OutOfTurn(&'static str),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(s)     => write!(f, "invalid input: {s}"),
            Self::Denied(s)    => write!(f, "authentication failed: {s}"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::OutOfTurn(s) => write!(f, "out of turn: {s}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self { Self::Transport(e) }
}
