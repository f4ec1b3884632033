use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    config::ClientSettings,
    error::ListError,
    mapping::map_page,
    state::{ListSnapshot, ListState, PageOutcome, PageRequest},
    PageSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoad {
    /// Nothing was requested: a fetch was in flight, the catalog is
    /// exhausted, or pagination is suspended by an active search.
    Skipped,
    Appended {
        page_index: u32,
        items: usize,
        malformed: usize,
    },
}

/// Owns the paginated catalog and the search view over it.
///
/// Every state change is applied under one lock and published as a whole
/// [`ListSnapshot`] on a `watch` channel.
pub struct ListController {
    source: Arc<dyn PageSource>,
    image_url_base: String,
    state: Mutex<ListState>,
    snapshots: watch::Sender<ListSnapshot>,
}

impl ListController {
    pub fn new(source: Arc<dyn PageSource>, settings: &ClientSettings) -> Self {
        let state = ListState::new(settings.page_size);
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            source,
            image_url_base: settings.image_url_base.clone(),
            state: Mutex::new(state),
            snapshots,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.snapshots.borrow().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition<R>(&self, apply: impl FnOnce(&mut ListState) -> R) -> R {
        let mut state = self.lock_state();
        let out = apply(&mut state);
        let next = state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        out
    }

    /// Fetches the next page and appends it. Calls made while a fetch is in
    /// flight, or after the end of the catalog, return [`PageLoad::Skipped`].
    /// A failure is also recorded in the published `load_error`.
    pub async fn load_next_page(&self) -> Result<PageLoad, ListError> {
        let Some(request) = self.transition(ListState::begin_load) else {
            debug!("page load skipped: fetch in flight or end reached");
            return Ok(PageLoad::Skipped);
        };
        self.fetch_and_apply(request).await
    }

    /// Pagination trigger for "the last rendered item became visible". The
    /// search check and the claim of the fetch happen under the same lock.
    pub async fn on_item_near_end(&self) -> Result<PageLoad, ListError> {
        let Some(request) = self.transition(ListState::begin_auto_load) else {
            return Ok(PageLoad::Skipped);
        };
        self.fetch_and_apply(request).await
    }

    async fn fetch_and_apply(&self, request: PageRequest) -> Result<PageLoad, ListError> {
        let page_index = request.page_index;
        let mut in_flight = InFlight {
            controller: self,
            armed: true,
        };

        debug!(
            page_index,
            limit = request.limit,
            offset = request.offset,
            "requesting catalog page"
        );
        let result = self.source.fetch_page(request.limit, request.offset).await;
        in_flight.armed = false;

        match result {
            Ok(response) => {
                let page = map_page(&response.results, &self.image_url_base);
                let items = page.items.len();
                let malformed = page.malformed.len();
                let end_reached = self.transition(|state| {
                    state.complete_load(PageOutcome::Loaded {
                        total_count: response.count,
                        page,
                    });
                    state.end_reached()
                });
                info!(page_index, items, malformed, end_reached, "catalog page loaded");
                Ok(PageLoad::Appended {
                    page_index,
                    items,
                    malformed,
                })
            }
            Err(err) => {
                let error = ListError::FetchFailed {
                    page_index,
                    message: format!("{err:#}"),
                };
                warn!(page_index, %error, "catalog page fetch failed");
                self.transition(|state| state.complete_load(PageOutcome::Failed(error.clone())));
                Err(error)
            }
        }
    }

    /// Filters the loaded items; an empty query leaves search mode.
    pub fn search(&self, query: &str) {
        let matches = self.transition(|state| {
            state.apply_search(query);
            state.is_search_active().then(|| state.visible_items().len())
        });
        match matches {
            Some(matches) => debug!(query, matches, "search applied"),
            None => debug!("search cleared"),
        }
    }
}

/// Clears the loading flag if a `load_next_page` future is dropped while the
/// fetch is still pending.
struct InFlight<'a> {
    controller: &'a ListController,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("catalog page fetch dropped before completion");
            self.controller.transition(ListState::abandon_load);
        }
    }
}

#[cfg(test)]
#[path = "tests/list_controller_tests.rs"]
mod tests;
