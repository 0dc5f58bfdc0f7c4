use parking_lot::RwLock;
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::document::{Document, DocumentId, NewDocument, UserId};
use crate::error::StoreError;

/// Result of a soft-delete attempt. A document that was already deleted reports `NotFound`,
/// the same as one that never existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Forbidden,
    NotFound,
}

/// Persistence contract for document records.
///
/// `get`, `query_by_owner` and `query_all` only ever return non-deleted records. Writes are
/// atomic per document; no cross-document transaction is offered.
pub trait DocumentStore: Send + Sync {
    fn create(&self, doc: NewDocument) -> Result<DocumentId, StoreError>;

    fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Raw record lookup, soft-deleted documents included.
    fn get_record(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    fn soft_delete(&self, id: DocumentId, requester: &UserId) -> Result<DeleteOutcome, StoreError>;

    fn query_by_owner(&self, owner: &UserId) -> Result<Vec<Document>, StoreError>;

    fn query_all(&self) -> Result<Vec<Document>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    last_id: DocumentId,
    docs: BTreeMap<DocumentId, Document>,
}

/// In-process store. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, deleted ones included.
    pub fn len(&self) -> usize {
        self.inner.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn create(&self, doc: NewDocument) -> Result<DocumentId, StoreError> {
        let mut inner = self.inner.write();
        inner.last_id += 1;
        let id = inner.last_id;
        inner.docs.insert(id, Document::from_new(id, doc));
        Ok(id)
    }

    fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.read().docs.get(&id).filter(|d| !d.deleted).cloned())
    }

    fn get_record(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.read().docs.get(&id).cloned())
    }

    fn soft_delete(&self, id: DocumentId, requester: &UserId) -> Result<DeleteOutcome, StoreError> {
        let mut inner = self.inner.write();
        let Some(doc) = inner.docs.get_mut(&id) else {
            return Ok(DeleteOutcome::NotFound);
        };
        if doc.deleted {
            return Ok(DeleteOutcome::NotFound);
        }
        if !doc.is_owned_by(requester) {
            return Ok(DeleteOutcome::Forbidden);
        }
        doc.mark_deleted(OffsetDateTime::now_utc());
        Ok(DeleteOutcome::Deleted)
    }

    fn query_by_owner(&self, owner: &UserId) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .inner
            .read()
            .docs
            .values()
            .filter(|d| !d.deleted && d.is_owned_by(owner))
            .cloned()
            .collect())
    }

    fn query_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.inner.read().docs.values().filter(|d| !d.deleted).cloned().collect())
    }
}
