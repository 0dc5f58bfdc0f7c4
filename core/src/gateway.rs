//! Request-level orchestration: validation, access policy, then the store.
//!
//! Every call takes the requester explicitly. Unauthorised reads collapse to
//! [`GatewayError::NotFound`]; `Forbidden` is reserved for a non-owner deleting a document
//! they can otherwise see.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

use crate::access::{can_delete, can_read, Scope};
use crate::config::{GatewayConfig, OwnerVisibility};
use crate::document::{DocumentId, DocumentSummary, DocumentView, NewDocument, UserId};
use crate::error::{ExtractError, GatewayError, Result, ValidationError};
use crate::extract::{Extraction, TextExtractor};
use crate::listing::{list_documents, ListFilter};
use crate::pagination::{Page, PageRequest};
use crate::search::{SearchEngine, SearchQuery, SearchResultPage};
use crate::stats::{aggregate, StatisticsSummary};
use crate::store::{DeleteOutcome, DocumentStore};

/// Unvalidated search parameters as they arrive from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub term: String,
    #[serde(default)]
    pub scope: Scope,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedDocument {
    pub id: DocumentId,
    pub file_name: String,
}

pub struct Gateway {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(store: Arc<dyn DocumentStore>, extractor: Arc<dyn TextExtractor>, config: GatewayConfig) -> Self {
        Self { store, extractor, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn search(&self, request: &SearchRequest, requester: &UserId) -> Result<SearchResultPage> {
        let query = SearchQuery::new(
            &request.term,
            request.scope,
            request.page.unwrap_or(1),
            self.config.page_size(request.page_size),
        )?;
        let page = SearchEngine::new(self.store.as_ref(), &self.config).search(&query, requester)?;
        tracing::info!(
            %requester,
            scope = %query.scope(),
            term = query.term(),
            matches = page.pagination.total_matches,
            "search"
        );
        Ok(page)
    }

    pub fn get_document(&self, id: DocumentId, requester: &UserId, scope: Scope) -> Result<DocumentView> {
        let doc = self.store.get(id)?.ok_or(GatewayError::NotFound)?;
        if !can_read(&doc, requester, scope) {
            return Err(GatewayError::NotFound);
        }
        let owned = doc.is_owned_by(requester);
        if !owned {
            tracing::info!(%requester, id, owner = %doc.owner_id, "global document access");
        }
        let mut view = DocumentView::from(doc);
        if !owned && self.config.owner_visibility == OwnerVisibility::Hidden {
            view.owner_id = None;
        }
        Ok(view)
    }

    pub fn delete_document(&self, id: DocumentId, requester: &UserId) -> Result<DeletedDocument> {
        let doc = self.store.get(id)?.ok_or(GatewayError::NotFound)?;
        if !can_delete(&doc, requester) {
            tracing::warn!(%requester, id, "delete rejected: not the owner");
            return Err(GatewayError::Forbidden);
        }
        match self.store.soft_delete(id, requester)? {
            DeleteOutcome::Deleted => {
                tracing::info!(%requester, id, file_name = %doc.file_name, "document deleted");
                Ok(DeletedDocument { id, file_name: doc.file_name })
            }
            // Someone else deleted it between our read and the flag flip.
            DeleteOutcome::NotFound => Err(GatewayError::NotFound),
            DeleteOutcome::Forbidden => Err(GatewayError::Forbidden),
        }
    }

    pub fn list_documents(
        &self,
        requester: &UserId,
        filter: &ListFilter,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> Result<Page<DocumentSummary>> {
        let request = PageRequest::new(page.unwrap_or(1), self.config.page_size(page_size))?;
        let docs = self.store.query_by_owner(requester)?;
        let page = list_documents(docs, filter, request)?;
        tracing::debug!(%requester, total = page.pagination.total_matches, "listed documents");
        Ok(page)
    }

    pub fn statistics(&self, requester: &UserId) -> Result<StatisticsSummary> {
        self.statistics_at(requester, OffsetDateTime::now_utc())
    }

    /// Statistics as of `now`, which anchors the recent-documents window.
    pub fn statistics_at(&self, requester: &UserId, now: OffsetDateTime) -> Result<StatisticsSummary> {
        let docs = self.store.query_by_owner(requester)?;
        tracing::info!(%requester, "statistics requested");
        Ok(aggregate(&docs, now, self.config.recent_window_days))
    }

    /// Validates an upload, runs the extractor and stores the result for `requester`.
    pub fn ingest(&self, file_name: &str, bytes: &[u8], requester: &UserId) -> Result<DocumentView> {
        self.validate_upload(file_name, bytes.len() as u64)?;

        let started = Instant::now();
        let extraction = self.extractor.extract(bytes).map_err(|e| {
            tracing::error!(%requester, file_name, error = %e, "extraction failed");
            GatewayError::Processing(e)
        })?;
        let seconds = (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0;

        self.record_extraction(
            requester,
            file_name.trim(),
            bytes.len() as u64,
            extraction,
            Some(seconds),
            OffsetDateTime::now_utc(),
        )
    }

    /// Turns a successful extraction into a new document record.
    pub fn record_extraction(
        &self,
        requester: &UserId,
        file_name: &str,
        size_bytes: u64,
        extraction: Extraction,
        processing_seconds: Option<f64>,
        processed_at: OffsetDateTime,
    ) -> Result<DocumentView> {
        let text = extraction.text.trim();
        let chars = text.chars().count();
        if chars < self.config.min_text_chars {
            tracing::error!(%requester, file_name, chars, "extracted text too short");
            return Err(ExtractError::InsufficientText { chars, min: self.config.min_text_chars }.into());
        }

        let id = self.store.create(NewDocument {
            owner_id: requester.clone(),
            file_name: file_name.to_string(),
            size_bytes,
            extraction_method: extraction.method,
            extracted_text: text.to_string(),
            processed_at,
            processing_seconds,
        })?;
        let doc = self.store.get_record(id)?.ok_or(GatewayError::NotFound)?;
        tracing::info!(
            %requester,
            id,
            file_name,
            method = %extraction.method,
            seconds = processing_seconds.unwrap_or_default(),
            "document created"
        );
        Ok(doc.into())
    }

    fn validate_upload(&self, file_name: &str, size: u64) -> std::result::Result<(), ValidationError> {
        let name = file_name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyFileName);
        }
        if !name.to_lowercase().ends_with(".pdf") {
            return Err(ValidationError::NotPdf(name.to_string()));
        }
        if size > self.config.max_upload_bytes {
            return Err(ValidationError::FileTooLarge { size, max: self.config.max_upload_bytes });
        }
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        Ok(())
    }
}
