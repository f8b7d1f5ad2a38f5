//! Live connections and their document associations.
//!
//! A connection is registered as soon as its WebSocket handshake completes
//! and stays "unassociated" until a CONNECT succeeds. From then on it maps to
//! exactly one (document, user) pair.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use tandem_core::{ConnectionId, DocumentId, UserId};
use tokio::sync::mpsc;

/// Items queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Send a close frame and stop writing
    Close,
}

/// Handle on a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
        }
    }

    /// A connection together with the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame. Returns false once the writer is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.tx.send(Outbound::Text(text.into())).is_ok()
    }

    /// Ask the writer to close the transport after draining.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Whether the transport is still being written to.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A completed association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub document_id: DocumentId,
    pub user_id: UserId,
}

/// Concurrent connection → session map with a per-document index.
#[derive(Default)]
pub struct SessionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    sessions: DashMap<ConnectionId, Session>,
    by_document: DashMap<DocumentId, HashSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection: Connection) {
        log::trace!("Registered connection {}", connection.id());
        self.connections.insert(connection.id(), connection);
    }

    /// Drop the connection along with any association it holds.
    pub fn unregister(&self, id: &ConnectionId) -> Option<Connection> {
        self.dissociate(id);
        self.connections.remove(id).map(|(_, connection)| connection)
    }

    /// Bind a registered connection to a document and user.
    ///
    /// Fails when the connection is unknown or already associated.
    pub fn associate(&self, id: ConnectionId, session: Session) -> bool {
        if !self.connections.contains_key(&id) {
            return false;
        }
        match self.sessions.entry(id) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                slot.insert(session);
            }
        }
        self.by_document
            .entry(session.document_id)
            .or_default()
            .insert(id);
        true
    }

    /// Remove the association, keeping the connection registered.
    pub fn dissociate(&self, id: &ConnectionId) -> Option<Session> {
        let (_, session) = self.sessions.remove(id)?;
        if let Some(mut members) = self.by_document.get_mut(&session.document_id) {
            members.remove(id);
        }
        self.by_document
            .remove_if(&session.document_id, |_, members| members.is_empty());
        Some(session)
    }

    pub fn session(&self, id: &ConnectionId) -> Option<Session> {
        self.sessions.get(id).map(|entry| *entry.value())
    }

    pub fn is_associated(&self, id: &ConnectionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<Connection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Connections associated with `document`, minus `except`.
    pub fn peers(&self, document: &DocumentId, except: Option<ConnectionId>) -> Vec<Connection> {
        let ids: Vec<ConnectionId> = match self.by_document.get(document) {
            Some(members) => members
                .iter()
                .copied()
                .filter(|id| Some(*id) != except)
                .collect(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.connection(id)).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn document_session_count(&self, document: &DocumentId) -> usize {
        self.by_document.get(document).map_or(0, |members| members.len())
    }
}
