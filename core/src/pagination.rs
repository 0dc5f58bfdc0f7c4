//! Page slicing shared by search and listing.
//!
//! Pages are 1-based. The store is not snapshotted between requests, so inserts or deletes
//! between two page fetches may shift which records land on a given page.

use serde::Serialize;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    /// `page` must be at least 1. A zero page size is raised to 1; the upper bound is the
    /// caller's to apply (see `GatewayConfig::page_size`).
    pub fn new(page: usize, page_size: usize) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::InvalidPage(page));
        }
        Ok(Self { page, page_size: page_size.max(1) })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
    pub page_size: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_matches: usize) -> Self {
        let total_pages = total_matches.div_ceil(request.page_size);
        Self {
            current_page: request.page,
            total_pages,
            total_matches,
            page_size: request.page_size,
            has_previous: request.page > 1,
            has_next: request.page < total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Slices an already ordered sequence. A page past the end yields no items but still reports
/// the true totals.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let pagination = Pagination::new(request, items.len());
    let items = items
        .into_iter()
        .skip(request.offset())
        .take(request.page_size)
        .collect();
    Page { items, pagination }
}
