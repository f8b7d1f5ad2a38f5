//! HTTP endpoints that register a user as joining a document.
//!
//! A client first calls `/create` or `/join`, then opens the WebSocket and
//! sends CONNECT with the returned user id.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tandem_core::{DocumentDirectory, DocumentId, NameError, UserDirectory, UserId};
use thiserror::Error;

#[derive(Clone)]
pub struct HttpState {
    documents: Arc<DocumentDirectory>,
    users: Arc<UserDirectory>,
}

impl HttpState {
    pub fn new(documents: Arc<DocumentDirectory>, users: Arc<UserDirectory>) -> Self {
        Self { documents, users }
    }

    /// Create a document and a user joining it.
    pub fn create(&self, document_name: &str, user_name: &str) -> Result<JoinTicket, HttpError> {
        let document = self.documents.create(document_name)?;
        let user = self.users.create(user_name);
        document.add_joining_user(user.clone());
        Ok(JoinTicket {
            id: user.id(),
            name: user.name().to_string(),
            document: DocumentView {
                id: document.id(),
                name: document.name(),
                content: document.content(),
            },
        })
    }

    /// Create a user joining an existing document.
    pub fn join(&self, document_id: &str, user_name: &str) -> Result<JoinTicket, HttpError> {
        let document = document_id
            .parse::<DocumentId>()
            .ok()
            .and_then(|id| self.documents.get(&id))
            .ok_or_else(|| HttpError::DocumentNotFound(document_id.to_string()))?;
        let user = self.users.create(user_name);
        document.add_joining_user(user.clone());
        Ok(JoinTicket {
            id: user.id(),
            name: user.name().to_string(),
            document: DocumentView {
                id: document.id(),
                name: document.name(),
                content: document.content(),
            },
        })
    }
}

/// Everything a client needs to send CONNECT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTicket {
    /// The new user's id
    pub id: UserId,
    pub name: String,
    pub document: DocumentView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid document name: {0}")]
    InvalidName(#[from] NameError),
    #[error("document {0} not found")]
    DocumentNotFound(String),
}

impl HttpError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName(_) => StatusCode::BAD_REQUEST,
            Self::DocumentNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    pub document_name: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    pub document_id: String,
    pub user_name: String,
}

async fn index() -> &'static str {
    "Tandem collaboration server"
}

async fn create(
    State(state): State<HttpState>,
    Query(params): Query<CreateParams>,
) -> Result<(StatusCode, Json<JoinTicket>), HttpError> {
    let ticket = state.create(&params.document_name, &params.user_name)?;
    log::info!(
        "HTTP create: doc {} ({}) for user {}",
        ticket.document.id,
        ticket.document.name,
        ticket.id
    );
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

async fn join(
    State(state): State<HttpState>,
    Query(params): Query<JoinParams>,
) -> Result<(StatusCode, Json<JoinTicket>), HttpError> {
    let ticket = state.join(&params.document_id, &params.user_name).inspect_err(|e| {
        log::debug!("HTTP join refused: {e}");
    })?;
    log::info!("HTTP join: user {} on doc {}", ticket.id, ticket.document.id);
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/create", post(create))
        .route("/join", post(join))
        .with_state(state)
}
