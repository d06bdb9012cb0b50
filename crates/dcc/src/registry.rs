//! Correlation tables for pending DCC handshakes.
//!
//! An outbound SEND waits here for a possible RESUME; an outbound RESUME
//! waits for the peer's ACCEPT. Entries are keyed by (peer nickname, port).
//! The key is not unique — that identification scheme is borrowed from a
//! popular client's convention and kept for wire compatibility — so
//! duplicate keys may coexist; lookups return the first match in insertion
//! order. Matching consumes the entry.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use sidewire_transfer::Session;

/// The two pending-handshake tables.
///
/// Both live behind one lock so a lookup-and-take is atomic with respect to
/// concurrent insertions from newly initiated sessions.
pub struct Registry {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    pending_send: Vec<Entry>,
    pending_resume: Vec<Entry>,
}

struct Entry {
    nickname: String,
    session: Arc<Session>,
}

impl Entry {
    fn matches(&self, nickname: &str, port: u16) -> bool {
        // The port is read from the live session: a locally initiated SEND
        // learns its listener port only once the engine binds.
        self.nickname == nickname && self.session.correlation_port() == port
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
        }
    }

    /// Registers an outbound SEND awaiting a possible RESUME.
    pub fn register_send(&self, session: &Arc<Session>) {
        let mut tables = self.inner.lock().unwrap();
        tables.pending_send.push(Entry {
            nickname: session.peer().to_string(),
            session: Arc::clone(session),
        });
    }

    /// Registers an outbound RESUME awaiting the peer's ACCEPT.
    pub fn register_resume(&self, session: &Arc<Session>) {
        let mut tables = self.inner.lock().unwrap();
        tables.pending_resume.push(Entry {
            nickname: session.peer().to_string(),
            session: Arc::clone(session),
        });
    }

    /// Consumes and returns the first-inserted SEND entry matching
    /// (nickname, port), if any.
    pub fn take_send(&self, nickname: &str, port: u16) -> Option<Arc<Session>> {
        Self::take(&mut self.inner.lock().unwrap().pending_send, nickname, port)
    }

    /// Consumes and returns the first-inserted RESUME entry matching
    /// (nickname, port), if any.
    pub fn take_resume(&self, nickname: &str, port: u16) -> Option<Arc<Session>> {
        Self::take(
            &mut self.inner.lock().unwrap().pending_resume,
            nickname,
            port,
        )
    }

    fn take(entries: &mut Vec<Entry>, nickname: &str, port: u16) -> Option<Arc<Session>> {
        let index = entries.iter().position(|e| e.matches(nickname, port))?;
        Some(entries.remove(index).session)
    }

    /// Drops every entry referring to `id`. Called on terminal transitions.
    pub fn forget(&self, id: Uuid) {
        let mut tables = self.inner.lock().unwrap();
        tables.pending_send.retain(|e| e.session.id() != id);
        tables.pending_resume.retain(|e| e.session.id() != id);
    }

    /// Number of entries in (pending-send, pending-resume).
    pub fn pending_counts(&self) -> (usize, usize) {
        let tables = self.inner.lock().unwrap();
        (tables.pending_send.len(), tables.pending_resume.len())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
