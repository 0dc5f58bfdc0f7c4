use serde::Serialize;
use std::cmp::Ordering;
use time::OffsetDateTime;

use crate::access::{can_read, Scope};
use crate::config::{GatewayConfig, OwnerVisibility};
use crate::document::{Document, DocumentId, ExtractionMethod, UserId};
use crate::error::{StoreError, ValidationError};
use crate::pagination::{paginate, PageRequest, Pagination};
use crate::snippet::{Snippet, TermMatcher};
use crate::store::DocumentStore;

/// A validated search: non-blank term, scope, 1-based page.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    matcher: TermMatcher,
    scope: Scope,
    page: PageRequest,
}

impl SearchQuery {
    pub fn new(term: &str, scope: Scope, page: usize, page_size: usize) -> Result<Self, ValidationError> {
        let matcher = TermMatcher::new(term)?;
        let page = PageRequest::new(page, page_size)?;
        Ok(Self { matcher, scope, page })
    }

    pub fn term(&self) -> &str {
        self.matcher.term()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSearchHit {
    pub id: DocumentId,
    pub file_name: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub extraction_method: ExtractionMethod,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    pub snippet: Snippet,
    /// Uploader identity; only filled for global hits when owners are exposed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryEcho {
    pub term: String,
    pub scope: Scope,
    pub match_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResultPage {
    pub hits: Vec<DocumentSearchHit>,
    pub pagination: Pagination,
    pub query: QueryEcho,
}

/// Most recent first, ties broken by ascending id.
pub(crate) fn by_recency(a: &Document, b: &Document) -> Ordering {
    b.processed_at
        .cmp(&a.processed_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Scans the store under a scope and returns one page of snippet-annotated hits.
pub struct SearchEngine<'a> {
    store: &'a dyn DocumentStore,
    snippet_radius: usize,
    owner_visibility: OwnerVisibility,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a dyn DocumentStore, config: &GatewayConfig) -> Self {
        Self {
            store,
            snippet_radius: config.snippet_radius,
            owner_visibility: config.owner_visibility,
        }
    }

    pub fn search(&self, query: &SearchQuery, requester: &UserId) -> Result<SearchResultPage, StoreError> {
        let candidates = match query.scope {
            Scope::Personal => self.store.query_by_owner(requester)?,
            Scope::Global => self.store.query_all()?,
        };

        let mut matches: Vec<Document> = candidates
            .into_iter()
            .filter(|d| can_read(d, requester, query.scope) && query.matcher.is_match(&d.extracted_text))
            .collect();
        matches.sort_by(by_recency);

        let page = paginate(matches, query.page);
        let show_owner = query.scope == Scope::Global && self.owner_visibility == OwnerVisibility::Exposed;
        let hits = page
            .items
            .into_iter()
            .map(|doc| self.hit(doc, &query.matcher, show_owner))
            .collect();

        Ok(SearchResultPage {
            hits,
            query: QueryEcho {
                term: query.term().to_string(),
                scope: query.scope,
                match_count: page.pagination.total_matches,
            },
            pagination: page.pagination,
        })
    }

    fn hit(&self, doc: Document, matcher: &TermMatcher, show_owner: bool) -> DocumentSearchHit {
        let snippet = matcher.snippet(&doc.extracted_text, self.snippet_radius);
        let size_human = doc.size_human();
        DocumentSearchHit {
            id: doc.id,
            file_name: doc.file_name,
            size_bytes: doc.size_bytes,
            size_human,
            extraction_method: doc.extraction_method,
            processed_at: doc.processed_at,
            snippet,
            owner: show_owner.then_some(doc.owner_id),
        }
    }
}
