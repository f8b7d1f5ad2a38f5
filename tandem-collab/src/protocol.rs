//! JSON text protocol spoken over the WebSocket.
//!
//! Every frame is a single JSON object carrying a string `type`
//! discriminator:
//! ```text
//! {"type":"INSERT_CHAR","lineIdx":0,"columnIdx":3,"char":"x","userId":"…"}
//! ```
//!
//! Client frames decode into an [`Instruction`]; the server answers with an
//! [`Envelope`]. Applied instructions are re-encoded with
//! [`Instruction::to_wire`] and fanned out verbatim to the other peers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tandem_core::{DocumentId, DocumentName, UserId};
use thiserror::Error;

/// Instruction discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionType {
    Connect,
    InsertChar,
    DeleteChar,
    InsertLineBrk,
    DeleteLineBrk,
    ChangeDocName,
    Disconnect,
}

impl InstructionType {
    pub const ALL: [InstructionType; 7] = [
        Self::Connect,
        Self::InsertChar,
        Self::DeleteChar,
        Self::InsertLineBrk,
        Self::DeleteLineBrk,
        Self::ChangeDocName,
        Self::Disconnect,
    ];

    /// Wire discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::InsertChar => "INSERT_CHAR",
            Self::DeleteChar => "DELETE_CHAR",
            Self::InsertLineBrk => "INSERT_LINE_BRK",
            Self::DeleteLineBrk => "DELETE_LINE_BRK",
            Self::ChangeDocName => "CHANGE_DOC_NAME",
            Self::Disconnect => "DISCONNECT",
        }
    }

    /// Whether the instruction's `userId` must match the connected user.
    pub fn requires_ownership_check(self) -> bool {
        !matches!(self, Self::Connect)
    }

    /// Whether an applied instruction is relayed to the other peers.
    pub fn broadcasts(self) -> bool {
        !matches!(self, Self::Connect | Self::Disconnect)
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connect {
    pub user_id: UserId,
    pub doc_id: DocumentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertChar {
    pub line_idx: usize,
    pub column_idx: usize,
    /// Exactly one character on the wire
    #[serde(rename = "char")]
    pub ch: char,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteChar {
    pub line_idx: usize,
    pub column_idx: usize,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertLineBrk {
    pub line_idx: usize,
    pub column_idx: usize,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLineBrk {
    pub line_idx: usize,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDocName {
    pub new_name: DocumentName,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disconnect {
    pub user_id: UserId,
}

/// A decoded client instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    Connect(Connect),
    InsertChar(InsertChar),
    DeleteChar(DeleteChar),
    InsertLineBrk(InsertLineBrk),
    DeleteLineBrk(DeleteLineBrk),
    ChangeDocName(ChangeDocName),
    Disconnect(Disconnect),
}

type ParseFn = fn(Value) -> Result<Instruction, ProtocolError>;

/// Discriminator → payload parser.
const PARSERS: &[(InstructionType, ParseFn)] = &[
    (InstructionType::Connect, parse_connect),
    (InstructionType::InsertChar, parse_insert_char),
    (InstructionType::DeleteChar, parse_delete_char),
    (InstructionType::InsertLineBrk, parse_insert_line_brk),
    (InstructionType::DeleteLineBrk, parse_delete_line_brk),
    (InstructionType::ChangeDocName, parse_change_doc_name),
    (InstructionType::Disconnect, parse_disconnect),
];

fn payload<T: DeserializeOwned>(kind: InstructionType, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidField {
        kind,
        reason: e.to_string(),
    })
}

fn parse_connect(value: Value) -> Result<Instruction, ProtocolError> {
    payload(InstructionType::Connect, value).map(Instruction::Connect)
}

fn parse_insert_char(value: Value) -> Result<Instruction, ProtocolError> {
    payload(InstructionType::InsertChar, value).map(Instruction::InsertChar)
}

fn parse_delete_char(value: Value) -> Result<Instruction, ProtocolError> {
    payload(InstructionType::DeleteChar, value).map(Instruction::DeleteChar)
}

fn parse_insert_line_brk(value: Value) -> Result<Instruction, ProtocolError> {
    payload(InstructionType::InsertLineBrk, value).map(Instruction::InsertLineBrk)
}

fn parse_delete_line_brk(value: Value) -> Result<Instruction, ProtocolError> {
    payload(InstructionType::DeleteLineBrk, value).map(Instruction::DeleteLineBrk)
}

fn parse_change_doc_name(value: Value) -> Result<Instruction, ProtocolError> {
    payload(InstructionType::ChangeDocName, value).map(Instruction::ChangeDocName)
}

fn parse_disconnect(value: Value) -> Result<Instruction, ProtocolError> {
    payload(InstructionType::Disconnect, value).map(Instruction::Disconnect)
}

impl Instruction {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text.trim().is_empty() {
            return Err(ProtocolError::EmptyPayload);
        }
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        let discriminator = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;

        let parse = PARSERS
            .iter()
            .find(|(kind, _)| kind.as_str() == discriminator)
            .map(|(_, parse)| *parse)
            .ok_or_else(|| ProtocolError::UnknownType(discriminator.to_string()))?;
        parse(value)
    }

    pub fn kind(&self) -> InstructionType {
        match self {
            Self::Connect(_) => InstructionType::Connect,
            Self::InsertChar(_) => InstructionType::InsertChar,
            Self::DeleteChar(_) => InstructionType::DeleteChar,
            Self::InsertLineBrk(_) => InstructionType::InsertLineBrk,
            Self::DeleteLineBrk(_) => InstructionType::DeleteLineBrk,
            Self::ChangeDocName(_) => InstructionType::ChangeDocName,
            Self::Disconnect(_) => InstructionType::Disconnect,
        }
    }

    /// The user the instruction claims to come from.
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Connect(i) => i.user_id,
            Self::InsertChar(i) => i.user_id,
            Self::DeleteChar(i) => i.user_id,
            Self::InsertLineBrk(i) => i.user_id,
            Self::DeleteLineBrk(i) => i.user_id,
            Self::ChangeDocName(i) => i.user_id,
            Self::Disconnect(i) => i.user_id,
        }
    }

    /// Canonical text frame, as relayed to peers.
    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

// ---------------------------------------------------------------------
// Server frames
// ---------------------------------------------------------------------

/// An attached user as listed in the CONNECT reply.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_name: String,
    pub user_id: UserId,
}

/// Frames generated by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Fatal: the connection is closed right after
    Error { message: String },
    /// The instruction was valid but could not be applied
    Failure { message: String },
    Warn { message: String },
    #[serde(rename_all = "camelCase")]
    Connect {
        message: String,
        doc_id: DocumentId,
        doc_name: String,
        user_id: UserId,
        /// Everyone attached to the document, the new user included
        users: Vec<Participant>,
        content: String,
    },
    /// Reply to the leaving connection (with `message`) or notice to the
    /// remaining peers (without)
    #[serde(rename_all = "camelCase")]
    Disconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        user_id: UserId,
    },
}

impl Envelope {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::Warn {
            message: message.into(),
        }
    }

    /// Reply to a successful CONNECT. `users` is listed ordered by name.
    pub fn connected(
        doc_id: DocumentId,
        doc_name: String,
        user_id: UserId,
        mut users: Vec<Participant>,
        content: String,
    ) -> Self {
        users.sort();
        Self::Connect {
            message: "Connected".to_string(),
            doc_id,
            doc_name,
            user_id,
            users,
            content,
        }
    }

    pub fn disconnected(user_id: UserId) -> Self {
        Self::Disconnect {
            message: Some("Disconnected".to_string()),
            user_id,
        }
    }

    /// Notice that `user_id` left the document.
    pub fn departed(user_id: UserId) -> Self {
        Self::Disconnect {
            message: None,
            user_id,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty payload")]
    EmptyPayload,
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing instruction type")]
    MissingType,
    #[error("unknown instruction type {0:?}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {reason}")]
    InvalidField { kind: InstructionType, reason: String },
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}
