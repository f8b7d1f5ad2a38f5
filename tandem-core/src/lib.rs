//! # tandem-core: Shared document model for Tandem
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐        ┌───────────────────┐
//! │ DocumentDirectory │        │ UserDirectory     │
//! │ (id → Document)   │        │ (id → User)       │
//! └─────────┬─────────┘        └─────────┬─────────┘
//!           │                            │
//!           ▼                            │
//! ┌───────────────────┐   attached /     │
//! │ Document          │◄── joining ──────┘
//! │  name, users      │
//! │  Mutex<Buffer>    │
//! └─────────┬─────────┘
//!           ▼
//!   LineNode ⇄ LineNode ⇄ ...
//!      │
//!   CharacterNode ⇄ CharacterNode ⇄ ...
//! ```
//!
//! ## Modules
//!
//! - [`buffer`]: Arena-backed line/character chains
//! - [`document`]: Buffer + membership behind a per-document lock
//! - [`directory`]: Concurrent document and user stores
//! - [`name`]: Document name validation
//! - [`ids`]: Opaque identifiers

pub mod buffer;
pub mod directory;
pub mod document;
pub mod ids;
pub mod name;
pub mod user;

pub use buffer::{Buffer, CharId, CharacterNode, LineId, LineNode};
pub use directory::{DocumentDirectory, UserDirectory};
pub use document::Document;
pub use ids::{ConnectionId, DocumentId, UserId};
pub use name::{DocumentName, NameError};
pub use user::User;
