//! Document search and retrieval core.
//!
//! Users upload PDFs whose text is pulled out by an external extraction collaborator; the
//! records are then searchable either within the requester's own documents or across every
//! live document. This crate holds the record model, the stores, the visibility policy,
//! matching and snippets, pagination, statistics and the [`gateway::Gateway`] that ties them
//! together per request.

pub mod access;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod listing;
pub mod pagination;
pub mod persist;
pub mod search;
pub mod snippet;
pub mod stats;
pub mod store;

pub use access::Scope;
pub use config::{GatewayConfig, OwnerVisibility};
pub use document::{Document, DocumentId, DocumentSummary, DocumentView, ExtractionMethod, NewDocument, UserId};
pub use error::{ExtractError, GatewayError, StoreError, ValidationError};
pub use gateway::{DeletedDocument, Gateway, SearchRequest};
pub use persist::SledStore;
pub use store::{DeleteOutcome, DocumentStore, MemoryStore};
