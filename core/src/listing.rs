use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::document::{Document, DocumentSummary, ExtractionMethod};
use crate::error::ValidationError;
use crate::pagination::{paginate, Page, PageRequest};
use crate::search::by_recency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrdering {
    #[default]
    NewestFirst,
    OldestFirst,
    NameAsc,
    NameDesc,
    SizeAsc,
    SizeDesc,
}

impl FromStr for ListOrdering {
    type Err = String;

    /// Accepts the snake_case names and the `field` / `-field` shorthand.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "newest_first" | "-processed_at" => Ok(ListOrdering::NewestFirst),
            "oldest_first" | "processed_at" => Ok(ListOrdering::OldestFirst),
            "name_asc" | "file_name" => Ok(ListOrdering::NameAsc),
            "name_desc" | "-file_name" => Ok(ListOrdering::NameDesc),
            "size_asc" | "size_bytes" => Ok(ListOrdering::SizeAsc),
            "size_desc" | "-size_bytes" => Ok(ListOrdering::SizeDesc),
            other => Err(format!("unknown ordering: {other}")),
        }
    }
}

impl ListOrdering {
    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let primary = match self {
            ListOrdering::NewestFirst => return by_recency(a, b),
            ListOrdering::OldestFirst => a.processed_at.cmp(&b.processed_at),
            ListOrdering::NameAsc => a.file_name.cmp(&b.file_name),
            ListOrdering::NameDesc => b.file_name.cmp(&a.file_name),
            ListOrdering::SizeAsc => a.size_bytes.cmp(&b.size_bytes),
            ListOrdering::SizeDesc => b.size_bytes.cmp(&a.size_bytes),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Filters for the owner's document listing. All are optional and combine with AND.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub method: Option<ExtractionMethod>,
    pub processed_from: Option<OffsetDateTime>,
    pub processed_to: Option<OffsetDateTime>,
    pub name_contains: Option<String>,
    pub ordering: ListOrdering,
}

impl ListFilter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.processed_from, self.processed_to) {
            (Some(from), Some(to)) if from > to => Err(ValidationError::InvalidDateRange),
            _ => Ok(()),
        }
    }

    fn accepts(&self, doc: &Document, name_needle: Option<&str>) -> bool {
        if self.method.is_some_and(|m| m != doc.extraction_method) {
            return false;
        }
        if self.processed_from.is_some_and(|from| doc.processed_at < from) {
            return false;
        }
        if self.processed_to.is_some_and(|to| doc.processed_at > to) {
            return false;
        }
        match name_needle {
            Some(needle) => doc.file_name.to_lowercase().contains(needle),
            None => true,
        }
    }
}

/// Filters, orders and pages an owner's documents.
pub fn list_documents(
    docs: Vec<Document>,
    filter: &ListFilter,
    request: PageRequest,
) -> Result<Page<DocumentSummary>, ValidationError> {
    filter.validate()?;
    let needle = filter
        .name_contains
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut kept: Vec<Document> = docs
        .into_iter()
        .filter(|d| !d.deleted && filter.accepts(d, needle.as_deref()))
        .collect();
    kept.sort_by(|a, b| filter.ordering.compare(a, b));

    let page = paginate(kept, request);
    Ok(Page {
        items: page.items.iter().map(DocumentSummary::from).collect(),
        pagination: page.pagination,
    })
}
