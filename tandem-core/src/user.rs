use std::sync::{Mutex, PoisonError};

use crate::ids::{ConnectionId, UserId};

/// A user taking part in an editing session.
#[derive(Debug)]
pub struct User {
    id: UserId,
    name: String,
    /// Live connection, set once the user attaches to a document
    connection: Mutex<Option<ConnectionId>>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            connection: Mutex::new(None),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        *self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_connection(&self, connection: Option<ConnectionId>) {
        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = connection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_slot() {
        let user = User::new("Alice");
        assert_eq!(user.name(), "Alice");
        assert!(user.connection().is_none());

        let conn = ConnectionId::new();
        user.set_connection(Some(conn));
        assert_eq!(user.connection(), Some(conn));

        user.set_connection(None);
        assert!(user.connection().is_none());
    }
}
