//! Pagination types for lifecycle listings.

use serde::{Deserialize, Serialize};

/// Page size applied when the caller does not request one.
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Upper bound on the requested page size.
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Pagination input as supplied by the caller.
///
/// Out-of-range values are clamped, not rejected: page floors at 1 and
/// limit is clamped to `1..=MAX_PAGE_LIMIT`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl PageRequest {
    /// The requested page number, floored at 1.
    pub fn page_number(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// The requested page size, clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn page_size(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Number of records to skip before this page.
    pub fn offset(&self) -> u64 {
        (self.page_number() - 1) * self.page_size()
    }
}

/// Pagination metadata returned alongside a page of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl PageMeta {
    /// Compute metadata for `total` records at the given page/limit.
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        Self {
            total,
            page,
            limit,
            pages: total.div_ceil(limit),
        }
    }
}

/// One page of records plus metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// A fully resolved listing query handed to the storage backend: sort
/// field and direction decided, page arithmetic done.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub sort: String,
    pub order: SortOrder,
    pub offset: u64,
    pub limit: u64,
}
