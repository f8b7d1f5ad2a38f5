//! # tandem-collab: Real-time editing protocol for Tandem
//!
//! Clients edit a shared [`tandem_core::Document`] by sending JSON
//! instructions over a WebSocket. Each applied instruction is relayed to the
//! other clients attached to the same document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  POST /create, /join  ┌──────────────┐
//! │   Client    │ ────────────────────► │ HTTP (axum)  │
//! │             │                       └──────────────┘
//! │             │   WebSocket (JSON)    ┌──────────────────────┐
//! │             │ ◄───────────────────► │ CollabServer         │
//! └─────────────┘                       │  └ Dispatcher        │
//!                                       │     ├ SessionRegistry│
//!                                       │     └ Broadcaster    │
//!                                       └──────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Instruction and reply frames
//! - [`session`]: Connection → (document, user) associations
//! - [`broadcast`]: Per-document fan-out
//! - [`dispatcher`]: Protocol state machine
//! - [`http`]: Create/join endpoints
//! - [`server`]: WebSocket + HTTP server

pub mod broadcast;
pub mod dispatcher;
pub mod http;
pub mod protocol;
pub mod server;
pub mod session;

pub use broadcast::{BroadcastStats, Broadcaster};
pub use dispatcher::{Flow, InstructionDispatcher};
pub use http::{DocumentView, HttpError, HttpState, JoinTicket};
pub use protocol::{Envelope, Instruction, InstructionType, Participant, ProtocolError};
pub use server::{CollabServer, ServerConfig, ServerError, ServerStats};
pub use session::{Connection, Outbound, Session, SessionRegistry};
