//! The login state machine: phone → code → (password) → authenticated.
//!
//! Each step validates locally, calls the gateway, and transitions only on
//! a definitive answer. A failed call leaves the state exactly where it was
//! so the same step can be re-submitted with the same or corrected input.

use std::sync::Arc;

use serde_json::json;

use crate::errors::AuthError;
use crate::session_store::SessionStore;
use crate::transport::Transport;
use crate::types::{AuthOutcome, AuthStatus, Session};

/// Shortest phone number the gateway will accept a code request for.
const MIN_PHONE_LEN: usize = 10;
/// Login codes are at least this many digits.
const MIN_CODE_LEN: usize = 5;

// ─── State ────────────────────────────────────────────────────────────────────

/// Where the flow currently stands.
#[derive(Debug, Clone)]
pub enum AuthState {
    /// Initial state: no phone submitted yet.
    AwaitingPhone,
    /// A code was sent to `phone`; waiting for the user to type it in.
    AwaitingCode { phone: String },
    /// The account has a 2FA password; waiting for it.
    AwaitingPassword { phone: String },
    /// Terminal for this subsystem. Logout resets externally.
    Authenticated(Session),
}

/// What a successful `submit_code` / `submit_password` step produced.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// A session was established; the flow is done.
    Authenticated(Session),
    /// The gateway wants the 2FA password next.
    PasswordNeeded,
}

// ─── LoginFlow ────────────────────────────────────────────────────────────────

/// Drives the gateway authentication sequence.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use wicket_gateway::{LoginFlow, HttpTransport, StepOutcome};
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Arc::new(HttpTransport::new("http://localhost:8080")?);
/// let mut flow = LoginFlow::new(transport);
///
/// flow.submit_phone("+123456789012").await?;
/// match flow.submit_code("12345").await? {
///     StepOutcome::Authenticated(session) => { /* hand off */ }
///     StepOutcome::PasswordNeeded => {
///         flow.submit_password("hunter2").await?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct LoginFlow {
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn SessionStore>>,
    state: AuthState,
}

impl LoginFlow {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, store: None, state: AuthState::AwaitingPhone }
    }

    /// Attach a store that receives the session the moment it is created.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The current state (read-only).
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// The established session, once authenticated.
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            AuthState::Authenticated(s) => Some(s),
            _ => None,
        }
    }

    // ── Steps ──────────────────────────────────────────────────────────────

    /// Ask the gateway to send a one-time code to `phone`.
    ///
    /// On success the flow moves to [`AuthState::AwaitingCode`]. On any
    /// failure the state is unchanged and the step may be retried.
    pub async fn submit_phone(&mut self, phone: &str) -> Result<(), AuthError> {
        match self.state {
            AuthState::AwaitingPhone | AuthState::AwaitingCode { .. } => {}
            _ => return Err(AuthError::OutOfTurn("phone already confirmed")),
        }

        let phone = phone.trim();
        if phone.len() < MIN_PHONE_LEN {
            return Err(AuthError::Input("phone number too short"));
        }

        let body = json!({ "phone": phone }).to_string();
        self.transport.post("/auth/request-code", body, None).await?;

        log::info!("[wicket] login code requested for {phone}");
        self.state = AuthState::AwaitingCode { phone: phone.to_string() };
        Ok(())
    }

    /// Submit the one-time code the user received.
    pub async fn submit_code(&mut self, code: &str) -> Result<StepOutcome, AuthError> {
        let phone = match &self.state {
            AuthState::AwaitingCode { phone } => phone.clone(),
            _ => return Err(AuthError::OutOfTurn("no code was requested")),
        };

        let code = code.trim();
        if code.len() < MIN_CODE_LEN {
            return Err(AuthError::Input("code too short"));
        }

        let body = json!({ "phone": phone, "code": code }).to_string();
        let response = self.transport.post("/auth/login", body, None).await?;

        self.apply_outcome(phone, AuthOutcome::from_response(&response))
    }

    /// Submit the 2FA password. Only valid in [`AuthState::AwaitingPassword`].
    pub async fn submit_password(&mut self, password: &str) -> Result<StepOutcome, AuthError> {
        let phone = match &self.state {
            AuthState::AwaitingPassword { phone } => phone.clone(),
            _ => return Err(AuthError::OutOfTurn("no password was requested")),
        };

        if password.is_empty() {
            return Err(AuthError::Input("password must not be empty"));
        }

        let body = json!({ "phone": phone, "password": password }).to_string();
        let response = self.transport.post("/auth/password", body, None).await?;

        self.apply_outcome(phone, AuthOutcome::from_response(&response))
    }

    // ── Outcome handling ───────────────────────────────────────────────────

    /// The single point where a [`Session`] comes into existence.
    fn apply_outcome(
        &mut self,
        submitted_phone: String,
        outcome: AuthOutcome,
    ) -> Result<StepOutcome, AuthError> {
        match outcome.status {
            AuthStatus::Success => {
                let Some(token) = outcome.session_token.filter(|t| !t.is_empty()) else {
                    return Err(AuthError::Denied("gateway omitted session data".into()));
                };
                let phone = outcome.phone.unwrap_or(submitted_phone);
                let session = Session::new(phone, token);

                if let Some(store) = &self.store {
                    if let Err(e) = store.save(&session) {
                        log::warn!("[wicket] session not persisted ({}): {e}", store.name());
                    }
                }

                log::info!("[wicket] signed in as {}", session.phone);
                self.state = AuthState::Authenticated(session.clone());
                Ok(StepOutcome::Authenticated(session))
            }
            AuthStatus::NeedsPassword => {
                log::info!("[wicket] 2FA password required");
                self.state = AuthState::AwaitingPassword { phone: submitted_phone };
                Ok(StepOutcome::PasswordNeeded)
            }
            AuthStatus::Failure => Err(AuthError::Denied(
                outcome.detail.unwrap_or_else(|| "gateway rejected the step".into()),
            )),
        }
    }
}
