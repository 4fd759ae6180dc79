//! # wicket-gateway
//!
//! Async client core for the Wicket messaging gateway.
//!
//! ## Features
//! - Login flow: phone + one-time code + optional 2FA password
//! - Session persistence behind a pluggable [`SessionStore`]
//! - Chat list, per-chat history, send message, mark-as-read
//! - Long-poll synchronizer per conversation with local-echo merging
//! - Configurable poll pacing ([`FixedDelay`] / [`ExponentialBackoff`])
//! - Transport behind a trait so tests run against an in-memory fake
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wicket_gateway::{Client, FixedDelay, HttpTransport, LoginFlow, StepOutcome, sync};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new("http://localhost:8080")?);
//!
//! let mut flow = LoginFlow::new(transport.clone());
//! flow.submit_phone("+123456789012").await?;
//! let session = match flow.submit_code("12345").await? {
//!     StepOutcome::Authenticated(s) => s,
//!     StepOutcome::PasswordNeeded => match flow.submit_password("hunter2").await? {
//!         StepOutcome::Authenticated(s) => s,
//!         StepOutcome::PasswordNeeded => unreachable!(),
//!     },
//! };
//!
//! let client = Client::new(transport, session);
//! let chats = client.list_conversations().await?;
//! let history = client.fetch_history(&chats[0].id, 20).await?;
//!
//! let (handle, mut feed) = sync::spawn(
//!     client.clone(), chats[0].id.clone(), history, Arc::new(FixedDelay::default()));
//! while let Some(snapshot) = feed.next().await {
//!     println!("{} messages", snapshot.len());
//! }
//! # handle.cancel();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

mod errors;
mod transport;
pub mod auth;
pub mod extract;
pub mod retry;
pub mod session_store;
pub mod sync;
pub mod types;

pub use auth::{AuthState, LoginFlow, StepOutcome};
pub use errors::{AuthError, TransportError};
pub use retry::{ExponentialBackoff, FixedDelay, PollPolicy};
pub use session_store::{FileStore, InMemoryStore, SessionStore};
pub use sync::{MessageFeed, SyncHandle};
pub use transport::{HttpTransport, Transport};
pub use types::{AuthOutcome, AuthStatus, ChatMessage, Conversation, Session};

use std::sync::Arc;

use serde_json::json;

/// Server-side hold for a long-poll request, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

// ─── PollResult ───────────────────────────────────────────────────────────────

/// Body of one `/api/poll/{id}` response.
#[derive(Debug, Clone, Default)]
pub struct PollResult {
    /// `false` when the hold expired with nothing new.
    pub has_new: bool,
    /// New messages, in server-provided order.
    pub messages: Vec<ChatMessage>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Authenticated gateway client. Cheap to clone — the transport is shared
/// and the session is immutable.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    session: Session,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, session: Session) -> Self {
        Self { transport, session }
    }

    /// The session this client presents on every call.
    pub fn session(&self) -> &Session {
        &self.session
    }

    // ── Conversations ──────────────────────────────────────────────────────

    /// Fetch the conversation list.
    ///
    /// An unreadable body yields an empty list, never an error — only
    /// transport failures surface.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, TransportError> {
        let body = self
            .transport
            .get("/api/chats", Some(&self.session))
            .await?;
        Ok(extract::typed_array(&body, "chats"))
    }

    /// Fetch up to `limit` most recent messages of a conversation.
    pub async fn fetch_history(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, TransportError> {
        let path = format!("/api/messages/{conversation_id}?limit={limit}");
        let body = self.transport.get(&path, Some(&self.session)).await?;
        Ok(extract::typed_array(&body, "messages"))
    }

    // ── Messages ───────────────────────────────────────────────────────────

    /// Send `text` to a conversation.
    ///
    /// Returns as soon as the gateway accepts the message, without waiting
    /// for the server-assigned id — display the local echo
    /// ([`ChatMessage::local_echo`], [`SyncHandle::echo`]) and let the next
    /// poll reconcile it.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        let body = json!({ "chat_id": conversation_id, "text": text }).to_string();
        self.transport
            .post("/api/send", body, Some(&self.session))
            .await?;
        Ok(())
    }

    /// Mark messages as read, up to the highest id in `message_ids`.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        message_ids: &[i64],
    ) -> Result<(), TransportError> {
        let body = json!({ "chat_id": conversation_id, "message_ids": message_ids }).to_string();
        self.transport
            .post("/api/mark-read", body, Some(&self.session))
            .await?;
        Ok(())
    }

    // ── Long poll ──────────────────────────────────────────────────────────

    /// Issue one long-poll request for messages newer than `after_id`.
    ///
    /// The gateway holds the request open for up to 30 seconds and answers
    /// early when something arrives. Normally driven by [`sync::spawn`]
    /// rather than called directly.
    pub async fn poll(
        &self,
        conversation_id: &str,
        after_id: i64,
    ) -> Result<PollResult, TransportError> {
        let path = format!(
            "/api/poll/{conversation_id}?after_message_id={after_id}&timeout={POLL_TIMEOUT_SECS}"
        );
        let body = self.transport.get(&path, Some(&self.session)).await?;

        // A hold that expired (or a malformed body) degrades to "nothing new".
        if !extract::boolean(&body, "has_new") {
            return Ok(PollResult::default());
        }
        Ok(PollResult {
            has_new: true,
            messages: extract::typed_array(&body, "messages"),
        })
    }
}
