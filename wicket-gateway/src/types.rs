//! Gateway data model — sessions, auth outcomes, conversations, messages.
//!
//! Everything here is a read-only snapshot of what the gateway returned.
//! Decoding is lenient on purpose: the gateway omits fields freely, sends
//! ids as JSON numbers, and serializes timestamps as RFC 3339 strings, so
//! every field defaults rather than erroring (absent data degrades to empty
//! lists and zero values, never to a failed call).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

// ─── Session ──────────────────────────────────────────────────────────────────

/// An established gateway session. Immutable once built; cloned freely and
/// read by any number of concurrent callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The phone number the session was authenticated for.
    pub phone: String,
    /// Opaque credential blob presented on every authenticated call.
    pub token: String,
}

impl Session {
    pub fn new(phone: impl Into<String>, token: impl Into<String>) -> Self {
        Self { phone: phone.into(), token: token.into() }
    }

    /// Encode as the single stored record: `phone|token`.
    ///
    /// Returns `None` when the phone contains the delimiter — such a record
    /// could not be split back unambiguously, so it is never written.
    /// (Tokens may contain `|`: the split is on the *first* delimiter.)
    pub fn to_record(&self) -> Option<String> {
        if self.phone.contains('|') {
            return None;
        }
        Some(format!("{}|{}", self.phone, self.token))
    }

    /// Decode a stored record, splitting on the first `|`.
    ///
    /// Byte-compatible with records written by earlier clients.
    pub fn from_record(record: &str) -> Option<Self> {
        let (phone, token) = record.split_once('|')?;
        if phone.is_empty() || token.is_empty() {
            return None;
        }
        Some(Self::new(phone, token))
    }
}

// ─── AuthOutcome ──────────────────────────────────────────────────────────────

/// Result classification of one auth step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Authenticated; a session token was issued.
    Success,
    /// The account is protected by a 2FA password; submit it next.
    NeedsPassword,
    /// The step was rejected (or the response was unreadable).
    Failure,
}

/// Parsed body of `/auth/login` and `/auth/password` responses.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub status: AuthStatus,
    pub phone: Option<String>,
    pub session_token: Option<String>,
    /// Human-readable detail from the gateway, if any (`message`/`error`).
    pub detail: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawAuthOutcome {
    #[serde(default)]
    status: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    session_data: Option<String>,
    #[serde(default)]
    needs_password: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl AuthOutcome {
    /// Classify a raw auth response body. Unparseable bodies are failures.
    pub fn from_response(body: &str) -> Self {
        let raw: RawAuthOutcome = serde_json::from_str(body).unwrap_or_default();

        let status = if raw.needs_password || raw.status == "password_required" {
            AuthStatus::NeedsPassword
        } else if raw.status == "success"
            && raw.session_data.as_deref().is_some_and(|s| !s.is_empty())
        {
            AuthStatus::Success
        } else {
            AuthStatus::Failure
        };

        Self {
            status,
            phone: raw.phone,
            session_token: raw.session_data,
            detail: raw.error.or(raw.message),
        }
    }
}

// ─── Conversation ─────────────────────────────────────────────────────────────

/// One entry of the gateway chat list. Read-only; never mutated locally.
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    /// `"user"`, `"chat"`, or `"channel"`.
    #[serde(default, rename = "type")]
    pub kind: String,
}

// ─── ChatMessage ──────────────────────────────────────────────────────────────

/// One message within a conversation.
///
/// `id` is gateway-assigned and monotonically increasing within the
/// conversation, except for a locally-echoed just-sent message which holds
/// id 0 until the next poll reconciles it.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: i64,
    #[serde(default, rename = "chat_id", deserialize_with = "string_or_number")]
    pub conversation_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sender: String,
    /// Unix seconds.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: i64,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, rename = "out")]
    pub outbound: bool,
}

impl ChatMessage {
    /// Build the local echo shown immediately after a successful send,
    /// before the server confirms and assigns a real id.
    pub fn local_echo(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            conversation_id: conversation_id.into(),
            text: text.into(),
            sender: String::new(),
            timestamp: Utc::now().timestamp(),
            is_read: true,
            outbound: true,
        }
    }
}

// ─── Lenient field decoders ───────────────────────────────────────────────────

/// Accept a JSON string or number, yielding its text form.
fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        S(String),
        I(i64),
        F(f64),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::S(s) => s,
        Raw::I(i) => i.to_string(),
        Raw::F(f) => f.to_string(),
    })
}

/// Accept unix seconds or an RFC 3339 string; anything else is 0.
fn lenient_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        I(i64),
        S(String),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::I(i) => i,
        Raw::S(s) => s
            .parse::<DateTime<Utc>>()
            .map(|t| t.timestamp())
            .unwrap_or(0),
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
