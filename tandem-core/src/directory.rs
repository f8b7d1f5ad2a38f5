//! Concurrent keyed stores for documents and users.

use dashmap::DashMap;
use std::sync::Arc;

use crate::document::Document;
use crate::ids::{DocumentId, UserId};
use crate::name::NameError;
use crate::user::User;

/// Document id → document.
#[derive(Default)]
pub struct DocumentDirectory {
    documents: DashMap<DocumentId, Arc<Document>>,
}

impl DocumentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an empty document.
    pub fn create(&self, name: &str) -> Result<Arc<Document>, NameError> {
        let document = Arc::new(Document::new(name)?);
        self.documents.insert(document.id(), document.clone());
        log::info!("Created document {} ({})", document.id(), name);
        Ok(document)
    }

    pub fn get(&self, id: &DocumentId) -> Option<Arc<Document>> {
        self.documents.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &DocumentId) -> Option<Arc<Document>> {
        self.documents.remove(id).map(|(_, document)| document)
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// User id → user.
#[derive(Default)]
pub struct UserDirectory {
    users: DashMap<UserId, Arc<User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: &str) -> Arc<User> {
        let user = Arc::new(User::new(name));
        self.users.insert(user.id(), user.clone());
        log::debug!("Created user {} ({})", user.id(), name);
        user
    }

    pub fn get(&self, id: &UserId) -> Option<Arc<User>> {
        self.users.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &UserId) -> Option<Arc<User>> {
        self.users.remove(id).map(|(_, user)| user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
