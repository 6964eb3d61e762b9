//! Session registry mapping client identifiers to network addresses
//!
//! The registry is the only state the relay holds: which identifiers are
//! currently part of the session and where their datagrams should go. It is
//! deliberately not validated against game logic — duplicate joins overwrite
//! the stored address (last-write-wins) and lookups for unknown identifiers
//! are reported as `None`, never as an error.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use uuid::Uuid;

/// Live mapping from client identifier to its last reported address.
///
/// Purely in-memory. Callers needing concurrent access wrap it in
/// `Arc<RwLock<_>>`; mutations and snapshots then serialize through the
/// lock, though a snapshot may be stale by the time sends complete.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, SocketAddr>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Inserts or replaces the session for `client`. Always succeeds;
    /// re-joining with the same identifier simply overwrites the address.
    pub fn add(&mut self, client: Uuid, addr: SocketAddr) {
        if self.sessions.insert(client, addr).is_some() {
            info!("Client {} re-joined from {}", client, addr);
        } else {
            info!("Client {} joined from {}", client, addr);
        }
    }

    /// Deletes the session if present. Returns true if a session was
    /// removed, false if the identifier was already gone.
    pub fn remove(&mut self, client: &Uuid) -> bool {
        if self.sessions.remove(client).is_some() {
            info!("Client {} left", client);
            true
        } else {
            false
        }
    }

    /// Looks up the address for `client`, `None` if not registered.
    pub fn resolve(&self, client: &Uuid) -> Option<SocketAddr> {
        self.sessions.get(client).copied()
    }

    /// Snapshot of every session other than `client`, in registry order.
    /// The order carries no meaning to clients.
    pub fn all_except(&self, client: &Uuid) -> Vec<(Uuid, SocketAddr)> {
        self.sessions
            .iter()
            .filter(|(id, _)| *id != client)
            .map(|(id, addr)| (*id, *addr))
            .collect()
    }

    /// Number of currently registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
