use sled::{Db, IVec, Tree};
use std::path::Path;
use time::OffsetDateTime;

use crate::document::{Document, DocumentId, NewDocument, UserId};
use crate::error::StoreError;
use crate::store::{DeleteOutcome, DocumentStore};

const DOCUMENTS_TREE: &str = "documents";

/// Document store on an embedded sled database.
///
/// Records live in a single tree keyed by the big-endian id, so iteration follows id order.
/// Values are bincode-encoded [`Document`]s.
pub struct SledStore {
    db: Db,
    docs: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Store backed by a throwaway database, removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let docs = db.open_tree(DOCUMENTS_TREE)?;
        Ok(Self { db, docs })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of records held, deleted ones included.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn scan<F>(&self, keep: F) -> Result<Vec<Document>, StoreError>
    where
        F: Fn(&Document) -> bool,
    {
        let mut out = Vec::new();
        for entry in self.docs.iter() {
            let (key, value) = entry?;
            let doc = decode(&key, &value)?;
            if !doc.deleted && keep(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

fn key(id: DocumentId) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode(key: &[u8], value: &[u8]) -> Result<Document, StoreError> {
    let doc: Document = bincode::deserialize(value)?;
    let expected = <[u8; 8]>::try_from(key)
        .map(DocumentId::from_be_bytes)
        .map_err(|_| StoreError::Corrupt(doc.id))?;
    if expected != doc.id {
        return Err(StoreError::Corrupt(expected));
    }
    Ok(doc)
}

impl DocumentStore for SledStore {
    fn create(&self, new: NewDocument) -> Result<DocumentId, StoreError> {
        // generate_id is monotonic across restarts; offset so ids start at 1.
        let id = self.db.generate_id()? + 1;
        let doc = Document::from_new(id, new);
        self.docs.insert(key(id), bincode::serialize(&doc)?)?;
        Ok(id)
    }

    fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.get_record(id)?.filter(|d| !d.deleted))
    }

    fn get_record(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let k = key(id);
        match self.docs.get(k)? {
            Some(value) => Ok(Some(decode(&k, &value)?)),
            None => Ok(None),
        }
    }

    fn soft_delete(&self, id: DocumentId, requester: &UserId) -> Result<DeleteOutcome, StoreError> {
        let k = key(id);
        loop {
            let Some(current): Option<IVec> = self.docs.get(k)? else {
                return Ok(DeleteOutcome::NotFound);
            };
            let mut doc = decode(&k, &current)?;
            if doc.deleted {
                return Ok(DeleteOutcome::NotFound);
            }
            if !doc.is_owned_by(requester) {
                return Ok(DeleteOutcome::Forbidden);
            }
            doc.mark_deleted(OffsetDateTime::now_utc());
            let updated = bincode::serialize(&doc)?;
            match self.docs.compare_and_swap(k, Some(current), Some(updated))? {
                Ok(()) => return Ok(DeleteOutcome::Deleted),
                // Lost a race with another writer; re-read and decide again.
                Err(_) => continue,
            }
        }
    }

    fn query_by_owner(&self, owner: &UserId) -> Result<Vec<Document>, StoreError> {
        self.scan(|d| d.is_owned_by(owner))
    }

    fn query_all(&self) -> Result<Vec<Document>, StoreError> {
        self.scan(|_| true)
    }
}
