//! Document display names.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Longest accepted name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Characters that may not appear in a document name.
pub const FORBIDDEN_CHARS: &[char] = &[
    '\\', '/', ':', '*', '?', '"', '<', '>', '|', '\n', '\t', '\r', '\u{8}', '\u{c}', '\'', '`',
    ' ',
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("document name is empty")]
    Empty,
    #[error("document name is blank")]
    Blank,
    #[error("document name is {0} characters long, the limit is 255")]
    TooLong(usize),
    #[error("document name contains forbidden character {0:?}")]
    ForbiddenChar(char),
}

/// A validated document name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentName(String);

impl DocumentName {
    pub fn parse(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Check `name` against the naming rules.
pub fn validate(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.trim().is_empty() {
        return Err(NameError::Blank);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(NameError::TooLong(len));
    }
    match name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        Some(c) => Err(NameError::ForbiddenChar(c)),
        None => Ok(()),
    }
}

impl TryFrom<String> for DocumentName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DocumentName> for String {
    fn from(name: DocumentName) -> Self {
        name.0
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
