//! Shared document: a text buffer plus the users editing it.
//!
//! Every structural operation on the buffer runs under a single
//! per-document mutex. Callers that must keep a multi-step sequence atomic
//! with respect to other edits (apply an edit and publish it, snapshot and
//! subscribe) hold [`Document::lock`] for the whole sequence.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::buffer::Buffer;
use crate::ids::{DocumentId, UserId};
use crate::name::{DocumentName, NameError};
use crate::user::User;

pub struct Document {
    id: DocumentId,
    name: RwLock<DocumentName>,
    buffer: Mutex<Buffer>,
    /// Users holding a live connection to this document
    users: DashMap<UserId, Arc<User>>,
    /// Users allowed to attach but not connected yet
    joining_users: DashMap<UserId, Arc<User>>,
}

impl Document {
    /// Create an empty document (one empty line).
    pub fn new(name: &str) -> Result<Self, NameError> {
        Ok(Self::with_name(DocumentName::parse(name)?))
    }

    pub fn with_name(name: DocumentName) -> Self {
        Self {
            id: DocumentId::new(),
            name: RwLock::new(name),
            buffer: Mutex::new(Buffer::new()),
            users: DashMap::new(),
            joining_users: DashMap::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_string()
    }

    /// Rename the document. Returns false when the name is unchanged.
    pub fn rename(&self, name: DocumentName) -> bool {
        let mut current = self.name.write().unwrap_or_else(PoisonError::into_inner);
        if *current == name {
            return false;
        }
        log::debug!("Document {} renamed from {} to {}", self.id, current, name);
        *current = name;
        true
    }

    /// Exclusive access to the buffer.
    ///
    /// Holding the guard serializes against every other edit and render of
    /// this document.
    pub fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, line: usize, column: usize, ch: char) -> bool {
        self.lock().insert(line, column, ch)
    }

    pub fn modify(&self, line: usize, column: usize, ch: char) -> bool {
        self.lock().modify(line, column, ch)
    }

    pub fn delete(&self, line: usize, column: usize) -> bool {
        self.lock().delete(line, column)
    }

    pub fn insert_line_break(&self, line: usize, column: usize) -> bool {
        self.lock().insert_line_break(line, column)
    }

    pub fn delete_line_break(&self, line: usize) -> bool {
        self.lock().delete_line_break(line)
    }

    pub fn line_count(&self) -> usize {
        self.lock().line_count()
    }

    pub fn char_at(&self, line: usize, column: usize) -> Option<char> {
        self.lock().char_at(line, column)
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().lines()
    }

    /// Full text, lines joined by `\n`.
    pub fn content(&self) -> String {
        self.lock().to_string()
    }

    // ---------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------

    pub fn add_user(&self, user: Arc<User>) -> bool {
        insert_unique(&self.users, user)
    }

    pub fn remove_user(&self, user_id: &UserId) -> bool {
        self.users.remove(user_id).is_some()
    }

    pub fn is_user_in_document(&self, user_id: &UserId) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn add_joining_user(&self, user: Arc<User>) -> bool {
        insert_unique(&self.joining_users, user)
    }

    pub fn remove_joining_user(&self, user_id: &UserId) -> bool {
        self.joining_users.remove(user_id).is_some()
    }

    pub fn is_joining_user_in_document(&self, user_id: &UserId) -> bool {
        self.joining_users.contains_key(user_id)
    }

    /// Move a user from the joining set to the attached set.
    ///
    /// Returns None when the user was not joining.
    pub fn promote_joining_user(&self, user_id: &UserId) -> Option<Arc<User>> {
        let (_, user) = self.joining_users.remove(user_id)?;
        self.users.insert(*user_id, user.clone());
        Some(user)
    }

    /// Attached users.
    pub fn users(&self) -> Vec<Arc<User>> {
        self.users.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn joining_count(&self) -> usize {
        self.joining_users.len()
    }
}

fn insert_unique(set: &DashMap<UserId, Arc<User>>, user: Arc<User>) -> bool {
    match set.entry(user.id()) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(user);
            true
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.lock(), f)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("users", &self.users.len())
            .field("joining_users", &self.joining_users.len())
            .finish_non_exhaustive()
    }
}
