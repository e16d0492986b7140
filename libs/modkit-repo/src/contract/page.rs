//! Page request and page result envelope

use crate::error::{RepoError, RepoResult};
use serde::{Deserialize, Serialize};

/// A request for one page of a filtered, sorted set.
///
/// Pages are 1-based. Sort column and direction are free-form strings as they
/// arrive from a query string; they are resolved against the entity's sortable
/// columns when the page is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<String>,
}

impl PageRequest {
    /// Unsorted request (the default newest-first order applies)
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            sort_column: None,
            sort_direction: None,
        }
    }

    /// Sort by `column` in `direction`
    #[must_use]
    pub fn sorted_by(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort_column = Some(column.into());
        self.sort_direction = Some(direction.into());
        self
    }

    /// Validate the request and compute its row window.
    ///
    /// `page` and `page_size` below 1 are rejected; page sizes above
    /// `max_page_size` are clamped. A `max_page_size` of 0 disables clamping.
    pub fn window(&self, max_page_size: u64) -> RepoResult<PageWindow> {
        if self.page < 1 || self.page_size < 1 {
            return Err(RepoError::InvalidPageRequest {
                page: self.page,
                page_size: self.page_size,
            });
        }

        let take = if max_page_size > 0 && self.page_size > max_page_size {
            tracing::warn!(
                requested = self.page_size,
                max = max_page_size,
                "Page size clamped"
            );
            max_page_size
        } else {
            self.page_size
        };

        Ok(PageWindow {
            skip: (self.page - 1).saturating_mul(take),
            take,
        })
    }
}

/// Skip/take bounds of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub take: u64,
}

impl PageWindow {
    /// Number of rows a set of `total` rows leaves for this window
    pub fn expected_len(&self, total: u64) -> u64 {
        total.saturating_sub(self.skip).min(self.take)
    }
}

/// One page of projected results.
///
/// `total_count` counts the whole filtered set, ignoring skip/take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub sort_column: Option<String>,
    pub sort_direction: Option<String>,
    pub items: Vec<T>,
}

impl<T> PageResult<T> {
    /// Empty page for a request
    pub fn empty(request: &PageRequest) -> Self {
        Self {
            total_count: 0,
            page: request.page,
            page_size: request.page_size,
            sort_column: request.sort_column.clone(),
            sort_direction: request.sort_direction.clone(),
            items: Vec::new(),
        }
    }

    /// Number of pages the filtered set spans
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Convert the items while keeping the envelope
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
            sort_column: self.sort_column,
            sort_direction: self.sort_direction,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
