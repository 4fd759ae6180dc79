//! Pluggable session persistence.
//!
//! The [`SessionStore`] trait abstracts over where the device keeps its one
//! session record so callers can swap in a file, an in-memory store, or a
//! platform keystore.
//!
//! The stored format is a single UTF-8 record `phone|token`, split on the
//! first `|` when read — byte-compatible with records written by earlier
//! clients (see [`crate::Session::from_record`]).

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::types::Session;

// ─── Trait ────────────────────────────────────────────────────────────────────

/// An abstraction over where and how the session record is persisted.
pub trait SessionStore: Send + Sync {
    /// Persist the session, replacing any previous record.
    fn save(&self, session: &Session) -> io::Result<()>;

    /// Load the stored session, or `None` if there is none.
    fn load(&self) -> io::Result<Option<Session>>;

    /// Remove the stored session (e.g. on logout).
    fn clear(&self) -> io::Result<()>;

    /// Human-readable name of this store (for log messages).
    fn name(&self) -> &str;
}

// ─── FileStore ────────────────────────────────────────────────────────────────

/// The default store — one text record in a file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileStore {
    fn save(&self, session: &Session) -> io::Result<()> {
        let record = session.to_record().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "phone contains the record delimiter")
        })?;
        std::fs::write(&self.path, record)
    }

    fn load(&self) -> io::Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let record = std::fs::read_to_string(&self.path)?;
        Ok(Session::from_record(record.trim_end()))
    }

    fn clear(&self) -> io::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn name(&self) -> &str { "file" }
}

// ─── InMemoryStore ────────────────────────────────────────────────────────────

/// An ephemeral store that keeps nothing on disk.
///
/// Useful for tests and for runs that should always start fresh.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<Option<Session>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemoryStore {
    fn save(&self, session: &Session) -> io::Result<()> {
        *self.data.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> io::Result<Option<Session>> {
        Ok(self.data.lock().unwrap().clone())
    }

    fn clear(&self) -> io::Result<()> {
        *self.data.lock().unwrap() = None;
        Ok(())
    }

    fn name(&self) -> &str { "in-memory" }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
