//! Pagination and search state for the catalog list.
//!
//! `ListState` is only ever changed through the transition methods below; the
//! controller applies one transition under its lock and then publishes
//! [`ListState::snapshot`], so observers never see half of a transition.

use shared::domain::CatalogItem;

use crate::{error::ListError, mapping::MappedPage};

/// What consumers render: either the whole backing collection or the
/// filtered view of the active search session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSnapshot {
    pub items: Vec<CatalogItem>,
    pub is_loading: bool,
    pub load_error: Option<String>,
    pub end_reached: bool,
    pub is_search_active: bool,
}

impl ListSnapshot {
    /// Empty when the last fetch succeeded (or none failed yet).
    pub fn load_error_message(&self) -> &str {
        self.load_error.as_deref().unwrap_or_default()
    }

    /// A search that matched nothing, as opposed to nothing loaded yet.
    pub fn is_empty_search_result(&self) -> bool {
        self.is_search_active && self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: u32,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Loaded { total_count: u64, page: MappedPage },
    Failed(ListError),
}

#[derive(Debug, Clone)]
struct SearchState {
    cached_items: Vec<CatalogItem>,
    results: Vec<CatalogItem>,
    is_active: bool,
    is_session_starting: bool,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            cached_items: Vec::new(),
            results: Vec::new(),
            is_active: false,
            is_session_starting: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListState {
    page_size: u32,
    backing_items: Vec<CatalogItem>,
    current_page: u32,
    total_count: Option<u64>,
    load_error: Option<String>,
    is_loading: bool,
    search: SearchState,
}

impl ListState {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            backing_items: Vec::new(),
            current_page: 0,
            total_count: None,
            load_error: None,
            is_loading: false,
            search: SearchState::default(),
        }
    }

    pub fn backing_items(&self) -> &[CatalogItem] {
        &self.backing_items
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn is_search_active(&self) -> bool {
        self.search.is_active
    }

    /// False until a page has reported the catalog total.
    pub fn end_reached(&self) -> bool {
        match self.total_count {
            Some(total) => u64::from(self.current_page) * u64::from(self.page_size) >= total,
            None => false,
        }
    }

    pub fn visible_items(&self) -> &[CatalogItem] {
        if self.search.is_active {
            &self.search.results
        } else {
            &self.backing_items
        }
    }

    pub fn can_auto_paginate(&self) -> bool {
        !self.end_reached() && !self.is_loading && !self.search.is_active
    }

    /// Marks a fetch as in flight and returns the page to request, or `None`
    /// when a fetch is already running or the catalog is exhausted.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if self.is_loading || self.end_reached() {
            return None;
        }

        self.is_loading = true;
        Some(PageRequest {
            page_index: self.current_page,
            limit: self.page_size,
            offset: self.current_page.saturating_mul(self.page_size),
        })
    }

    /// [`ListState::begin_load`] for the near-end trigger, which must not
    /// start a fetch while a search session is active.
    pub fn begin_auto_load(&mut self) -> Option<PageRequest> {
        if !self.can_auto_paginate() {
            return None;
        }
        self.begin_load()
    }

    /// Applies the result of the fetch started by [`ListState::begin_load`].
    /// A failure leaves the backing items and page index untouched, so the
    /// next attempt re-requests the same page.
    pub fn complete_load(&mut self, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Loaded { total_count, page } => {
                self.total_count.get_or_insert(total_count);
                self.current_page += 1;
                self.load_error = None;
                self.backing_items.extend(page.items);
            }
            PageOutcome::Failed(err) => {
                self.load_error = Some(err.to_string());
            }
        }
        self.is_loading = false;
    }

    /// Releases the loading flag for a fetch that was dropped before it
    /// produced a result.
    pub fn abandon_load(&mut self) {
        self.is_loading = false;
    }

    pub fn apply_search(&mut self, query: &str) {
        if query.is_empty() {
            self.search = SearchState::default();
            return;
        }

        if self.search.is_session_starting {
            self.search.cached_items = self.backing_items.clone();
            self.search.is_session_starting = false;
        }

        self.search.results = filter_items(&self.search.cached_items, query);
        self.search.is_active = true;
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            items: self.visible_items().to_vec(),
            is_loading: self.is_loading,
            load_error: self.load_error.clone(),
            end_reached: self.end_reached(),
            is_search_active: self.search.is_active,
        }
    }
}

/// Case-insensitive substring match on the display name, or an exact match
/// on the identifier. The query is trimmed first.
pub fn filter_items(source: &[CatalogItem], query: &str) -> Vec<CatalogItem> {
    let needle = query.trim();
    let needle_lower = needle.to_lowercase();

    source
        .iter()
        .filter(|item| {
            item.display_name.to_lowercase().contains(&needle_lower)
                || item.id.0.to_string() == needle
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
