use docsearch_core::{DeleteOutcome, DocumentStore, ExtractionMethod, MemoryStore, NewDocument, SledStore, UserId};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;
use time::macros::datetime;

fn new_doc(owner: &str, text: &str) -> NewDocument {
    NewDocument {
        owner_id: UserId::from(owner),
        file_name: "file.pdf".into(),
        size_bytes: 4096,
        extraction_method: ExtractionMethod::Ocr,
        extracted_text: text.into(),
        processed_at: datetime!(2024-02-02 02:02:02.5 UTC),
        processing_seconds: Some(3.25),
    }
}

fn exercise_contract(store: &dyn DocumentStore) {
    let u1 = UserId::from("u1");
    let u2 = UserId::from("u2");
    let a = store.create(new_doc("u1", "alpha")).unwrap();
    let b = store.create(new_doc("u2", "beta")).unwrap();
    assert_ne!(a, b);

    assert_eq!(store.query_all().unwrap().len(), 2);
    let mine = store.query_by_owner(&u1).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].extracted_text, "alpha");

    assert_eq!(store.soft_delete(a, &u2).unwrap(), DeleteOutcome::Forbidden);
    assert_eq!(store.soft_delete(a, &u1).unwrap(), DeleteOutcome::Deleted);
    assert_eq!(store.soft_delete(a, &u1).unwrap(), DeleteOutcome::NotFound);
    assert_eq!(store.soft_delete(a, &u2).unwrap(), DeleteOutcome::NotFound);

    assert!(store.get(a).unwrap().is_none());
    assert!(store.get_record(a).unwrap().unwrap().deleted);
    assert!(store.query_by_owner(&u1).unwrap().is_empty());
    assert_eq!(store.query_all().unwrap().len(), 1);

    let c = store.create(new_doc("u1", "gamma")).unwrap();
    assert!(c != a && c != b);
}

#[test]
fn memory_store_honours_the_contract() {
    exercise_contract(&MemoryStore::new());
}

#[test]
fn sled_store_honours_the_contract() {
    exercise_contract(&SledStore::temporary().unwrap());
}

#[test]
fn sled_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let (kept, removed) = {
        let store = SledStore::open(dir.path()).unwrap();
        let kept = store.create(new_doc("u1", "persistent text")).unwrap();
        let removed = store.create(new_doc("u1", "deleted text")).unwrap();
        store.soft_delete(removed, &UserId::from("u1")).unwrap();
        store.flush().unwrap();
        (kept, removed)
    };

    let store = SledStore::open(dir.path()).unwrap();
    let doc = store.get(kept).unwrap().unwrap();
    assert_eq!(doc.extracted_text, "persistent text");
    assert_eq!(doc.processed_at, datetime!(2024-02-02 02:02:02.5 UTC));
    assert_eq!(doc.processing_seconds, Some(3.25));
    assert!(store.get(removed).unwrap().is_none());
    assert_eq!(store.len(), 2);

    let fresh = store.create(new_doc("u1", "after restart")).unwrap();
    assert!(fresh != kept && fresh != removed);
}

fn race_deletes(store: Arc<dyn DocumentStore>) {
    let id = store.create(new_doc("owner", "contended")).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.soft_delete(id, &UserId::from("owner")).unwrap())
        })
        .collect();
    let outcomes: Vec<DeleteOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let deleted = outcomes.iter().filter(|o| **o == DeleteOutcome::Deleted).count();
    assert_eq!(deleted, 1);
    assert!(outcomes.iter().all(|o| matches!(o, DeleteOutcome::Deleted | DeleteOutcome::NotFound)));
}

#[test]
fn concurrent_deletes_succeed_exactly_once_in_memory() {
    race_deletes(Arc::new(MemoryStore::new()));
}

#[test]
fn concurrent_deletes_succeed_exactly_once_on_sled() {
    race_deletes(Arc::new(SledStore::temporary().unwrap()));
}
