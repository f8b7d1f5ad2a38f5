//! Per-connection protocol state machine.
//!
//! ```text
//!            CONNECT ok                  DISCONNECT / transport closed
//! Unassociated ──────────► Associated(doc, user) ─────────────────────► released
//!      │                         │
//!      │ anything else           │ protocol violation
//!      ▼                         ▼
//!   ERROR + close             ERROR + close
//! ```
//!
//! Edits run under the document lock and are relayed before the lock is
//! released, so every peer observes the same order of edits.

use std::sync::Arc;
use tandem_core::{Buffer, ConnectionId, Document, DocumentDirectory, UserDirectory};

use crate::broadcast::{BroadcastStats, Broadcaster};
use crate::protocol::{Connect, Envelope, Instruction, Participant};
use crate::session::{Connection, Session, SessionRegistry};

/// What the transport should do after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Result of applying an edit to a document.
enum Outcome {
    Applied,
    Failed,
    Unchanged(&'static str),
}

impl From<bool> for Outcome {
    fn from(applied: bool) -> Self {
        if applied {
            Outcome::Applied
        } else {
            Outcome::Failed
        }
    }
}

pub struct InstructionDispatcher {
    documents: Arc<DocumentDirectory>,
    users: Arc<UserDirectory>,
    sessions: Arc<SessionRegistry>,
    broadcaster: Broadcaster,
}

impl InstructionDispatcher {
    pub fn new(
        documents: Arc<DocumentDirectory>,
        users: Arc<UserDirectory>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        let broadcaster = Broadcaster::new(sessions.clone());
        Self {
            documents,
            users,
            sessions,
            broadcaster,
        }
    }

    pub fn documents(&self) -> &Arc<DocumentDirectory> {
        &self.documents
    }

    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.users
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn stats(&self) -> BroadcastStats {
        self.broadcaster.stats()
    }

    /// Start tracking a freshly accepted connection.
    pub fn open(&self, connection: Connection) {
        self.sessions.register(connection);
    }

    /// Handle one inbound text frame.
    pub fn handle_text(&self, id: ConnectionId, text: &str) -> Flow {
        let Some(conn) = self.sessions.connection(&id) else {
            log::warn!("Frame for unknown connection {id}");
            return Flow::Close;
        };

        let instruction = match Instruction::parse(text) {
            Ok(instruction) => instruction,
            Err(e) => {
                log::warn!("Rejected frame from {id}: {e}");
                return self.refuse(&conn, &e.to_string());
            }
        };
        log::debug!("{} from connection {id}", instruction.kind());

        if let Instruction::Connect(connect) = instruction {
            return self.connect(&conn, connect);
        }

        let Some(session) = self.sessions.session(&id) else {
            log::warn!("{} on unassociated connection {id}", instruction.kind());
            return self.refuse(&conn, "Not connected");
        };
        if instruction.kind().requires_ownership_check()
            && instruction.user_id() != session.user_id
        {
            log::warn!(
                "Connection {id} sent {} as {} but is bound to {}",
                instruction.kind(),
                instruction.user_id(),
                session.user_id
            );
            return self.refuse(&conn, "User does not own this connection");
        }

        if let Instruction::Disconnect(_) = instruction {
            if self.documents.get(&session.document_id).is_none() {
                self.sessions.dissociate(&id);
                self.users.remove(&session.user_id);
                return self.refuse(&conn, "Document does not exist");
            }
            self.reply(&conn, &Envelope::disconnected(session.user_id));
            self.release(id);
            conn.close();
            return Flow::Close;
        }
        self.execute(&conn, session, &instruction)
    }

    /// Tear down a connection whose transport is gone.
    pub fn close(&self, id: ConnectionId) {
        self.release(id);
        self.sessions.unregister(&id);
        log::info!("Connection {id} closed");
    }

    /// Send an error envelope and ask the transport to close.
    pub fn refuse(&self, conn: &Connection, message: &str) -> Flow {
        self.reply(conn, &Envelope::error(message));
        conn.close();
        Flow::Close
    }

    fn reply(&self, conn: &Connection, envelope: &Envelope) {
        match envelope.encode() {
            Ok(frame) => {
                conn.send(frame);
            }
            Err(e) => log::error!("Failed to encode reply for {}: {e}", conn.id()),
        }
    }

    fn connect(&self, conn: &Connection, connect: Connect) -> Flow {
        let id = conn.id();
        if self.sessions.is_associated(&id) {
            log::warn!("Duplicate CONNECT on connection {id}");
            return self.refuse(conn, "Already connected");
        }

        let Some(user) = self.users.get(&connect.user_id) else {
            return self.refuse(conn, "User does not exist");
        };
        let Some(document) = self.documents.get(&connect.doc_id) else {
            self.users.remove(&user.id());
            return self.refuse(conn, "Document does not exist");
        };

        // Snapshot and association happen under the lock so the reply
        // precedes every edit relayed afterwards.
        let buffer = document.lock();
        if document.promote_joining_user(&user.id()).is_none() {
            drop(buffer);
            return self.refuse(conn, "User is not registered to this document");
        }
        let session = Session {
            document_id: document.id(),
            user_id: user.id(),
        };
        if !self.sessions.associate(id, session) {
            document.remove_user(&user.id());
            drop(buffer);
            return self.refuse(conn, "Could not connect");
        }
        user.set_connection(Some(id));

        let users = document
            .users()
            .iter()
            .map(|u| Participant {
                user_name: u.name().to_string(),
                user_id: u.id(),
            })
            .collect();
        let reply = Envelope::connected(
            document.id(),
            document.name(),
            user.id(),
            users,
            buffer.to_string(),
        );
        self.reply(conn, &reply);
        drop(buffer);

        log::info!(
            "User {} ({}) connected to doc {} on {id}",
            user.name(),
            user.id(),
            document.id()
        );
        Flow::Continue
    }

    fn execute(&self, conn: &Connection, session: Session, instruction: &Instruction) -> Flow {
        let Some(document) = self.documents.get(&session.document_id) else {
            self.sessions.dissociate(&conn.id());
            self.users.remove(&session.user_id);
            return self.refuse(conn, "Document does not exist");
        };

        let kind = instruction.kind();
        let mut buffer = document.lock();
        match apply(&mut buffer, &document, instruction) {
            Outcome::Applied => {
                if kind.broadcasts() {
                    match instruction.to_wire() {
                        Ok(frame) => {
                            let origin = Some(conn.id());
                            self.broadcaster.broadcast(&session.document_id, origin, &frame);
                        }
                        Err(e) => log::error!("Failed to encode {kind} for relay: {e}"),
                    }
                }
            }
            Outcome::Failed => {
                drop(buffer);
                log::debug!("{kind} from {} could not be applied", conn.id());
                self.reply(conn, &Envelope::failure(format!("Could not apply {kind}")));
            }
            Outcome::Unchanged(message) => {
                drop(buffer);
                self.reply(conn, &Envelope::warn(message));
            }
        }
        Flow::Continue
    }

    /// Undo a connection's association: detach the user, forget it and
    /// notify the remaining peers. The document is kept.
    fn release(&self, id: ConnectionId) {
        let Some(session) = self.sessions.dissociate(&id) else {
            return;
        };
        if let Some(user) = self.users.remove(&session.user_id) {
            user.set_connection(None);
        }

        let Some(document) = self.documents.get(&session.document_id) else {
            return;
        };
        let _buffer = document.lock();
        document.remove_user(&session.user_id);
        if document.user_count() > 0 {
            match Envelope::departed(session.user_id).encode() {
                Ok(frame) => {
                    self.broadcaster.broadcast(&session.document_id, Some(id), &frame);
                }
                Err(e) => log::error!("Failed to encode disconnect notice: {e}"),
            }
        }
        log::info!(
            "User {} left doc {} ({} remaining)",
            session.user_id,
            session.document_id,
            document.user_count()
        );
    }
}

fn apply(buffer: &mut Buffer, document: &Document, instruction: &Instruction) -> Outcome {
    match instruction {
        Instruction::InsertChar(i) => buffer.insert(i.line_idx, i.column_idx, i.ch).into(),
        Instruction::DeleteChar(i) => buffer.delete(i.line_idx, i.column_idx).into(),
        Instruction::InsertLineBrk(i) => buffer.insert_line_break(i.line_idx, i.column_idx).into(),
        Instruction::DeleteLineBrk(i) => buffer.delete_line_break(i.line_idx).into(),
        Instruction::ChangeDocName(i) => {
            if document.rename(i.new_name.clone()) {
                Outcome::Applied
            } else {
                Outcome::Unchanged("Document already has this name")
            }
        }
        Instruction::Connect(_) | Instruction::Disconnect(_) => Outcome::Failed,
    }
}
