//! Per-document visibility rules.
//!
//! Both checks assume the document has already been confirmed non-deleted by the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::document::{Document, UserId};

/// Visibility boundary of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only the requester's own documents.
    #[default]
    Personal,
    /// Every non-deleted document, regardless of owner.
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Personal => "personal",
            Scope::Global => "global",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "personal" => Ok(Scope::Personal),
            "global" => Ok(Scope::Global),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

pub fn can_read(doc: &Document, requester: &UserId, scope: Scope) -> bool {
    match scope {
        Scope::Personal => doc.is_owned_by(requester),
        Scope::Global => true,
    }
}

/// Deletion is owner-only in every scope.
pub fn can_delete(doc: &Document, requester: &UserId) -> bool {
    doc.is_owned_by(requester)
}
