use super::*;

use std::{collections::VecDeque, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use shared::{
    domain::{CatalogItem, ItemId},
    protocol::{NamedResource, PageResponse},
};
use tokio::sync::{Mutex as AsyncMutex, Notify};

struct ScriptedPageSource {
    responses: AsyncMutex<VecDeque<Result<PageResponse>>>,
    requests: Arc<AsyncMutex<Vec<(u32, u32)>>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedPageSource {
    fn new(responses: Vec<Result<PageResponse>>) -> Self {
        Self {
            responses: AsyncMutex::new(responses.into()),
            requests: Arc::new(AsyncMutex::new(Vec::new())),
            gate: None,
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl PageSource for ScriptedPageSource {
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<PageResponse> {
        self.requests.lock().await.push((limit, offset));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response")))
    }
}

fn page(count: u64, entries: &[(&str, u32)]) -> Result<PageResponse> {
    Ok(PageResponse {
        count,
        next: None,
        previous: None,
        results: entries
            .iter()
            .map(|(name, id)| NamedResource {
                name: name.to_string(),
                url: format!("https://pokeapi.co/api/v2/pokemon/{id}/"),
            })
            .collect(),
    })
}

fn settings(page_size: u32) -> ClientSettings {
    ClientSettings {
        page_size,
        image_url_base: "https://img.example/".into(),
        ..ClientSettings::default()
    }
}

fn controller_with(
    source: ScriptedPageSource,
    page_size: u32,
) -> (Arc<ListController>, Arc<AsyncMutex<Vec<(u32, u32)>>>) {
    let requests = source.requests.clone();
    let controller = Arc::new(ListController::new(Arc::new(source), &settings(page_size)));
    (controller, requests)
}

#[tokio::test]
async fn first_page_is_mapped_and_published() {
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![page(
            25,
            &[("bulbasaur", 1), ("ivysaur", 2)],
        )]),
        20,
    );
    let mut rx = controller.subscribe();

    let outcome = controller.load_next_page().await.expect("load");

    assert_eq!(
        outcome,
        PageLoad::Appended {
            page_index: 0,
            items: 2,
            malformed: 0
        }
    );
    assert!(rx.has_changed().expect("sender alive"));
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(
        snapshot.items,
        vec![
            CatalogItem::new(ItemId(1), "Bulbasaur", "https://img.example/1.png"),
            CatalogItem::new(ItemId(2), "Ivysaur", "https://img.example/2.png"),
        ]
    );
    assert!(!snapshot.is_loading);
    assert!(!snapshot.end_reached);
    assert_eq!(snapshot.load_error_message(), "");
    assert_eq!(*requests.lock().await, vec![(20, 0)]);
}

#[tokio::test]
async fn items_grow_by_exactly_what_each_page_returned() {
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![
            page(5, &[("a", 1), ("b", 2)]),
            page(5, &[("c", 3), ("d", 4)]),
            page(5, &[("e", 5)]),
        ]),
        2,
    );

    let mut previous_len = 0;
    for expected_len in [2, 4, 5] {
        controller.load_next_page().await.expect("load");
        let len = controller.snapshot().items.len();
        assert!(len >= previous_len);
        assert_eq!(len, expected_len);
        previous_len = len;
    }

    assert!(controller.snapshot().end_reached);
    assert_eq!(
        controller.load_next_page().await.expect("skip"),
        PageLoad::Skipped
    );
    assert_eq!(*requests.lock().await, vec![(2, 0), (2, 2), (2, 4)]);
}

#[tokio::test]
async fn overlapping_load_requests_fetch_once() {
    let gate = Arc::new(Notify::new());
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![page(40, &[("a", 1), ("b", 2)]), page(40, &[("c", 3)])])
            .gated(gate.clone()),
        20,
    );
    let mut rx = controller.subscribe();

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_next_page().await }
    });
    rx.wait_for(|snapshot| snapshot.is_loading)
        .await
        .expect("loading published");

    let second = controller.load_next_page().await.expect("second call");
    assert_eq!(second, PageLoad::Skipped);

    gate.notify_one();
    let first = first.await.expect("join").expect("first load");
    assert!(matches!(first, PageLoad::Appended { items: 2, .. }));

    assert_eq!(requests.lock().await.len(), 1);
    assert_eq!(controller.snapshot().items.len(), 2);
}

#[tokio::test]
async fn loading_flag_clears_in_the_same_snapshot_as_the_results() {
    let gate = Arc::new(Notify::new());
    let (controller, _requests) = controller_with(
        ScriptedPageSource::new(vec![page(40, &[("a", 1), ("b", 2)])]).gated(gate.clone()),
        20,
    );
    let mut rx = controller.subscribe();

    let task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load_next_page().await }
    });

    let loading = rx
        .wait_for(|snapshot| snapshot.is_loading)
        .await
        .expect("loading")
        .clone();
    assert!(loading.items.is_empty());

    gate.notify_one();
    let done = rx
        .wait_for(|snapshot| !snapshot.is_loading)
        .await
        .expect("done")
        .clone();
    assert_eq!(done.items.len(), 2);

    task.await.expect("join").expect("load");
}

#[tokio::test]
async fn failed_fetch_only_changes_error_and_loading() {
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![
            page(40, &[("a", 1)]),
            Err(anyhow!("connection refused")).context("GET /pokemon"),
            page(40, &[("b", 2)]),
        ]),
        20,
    );

    controller.load_next_page().await.expect("page 0");
    let before = controller.snapshot();

    let err = controller.load_next_page().await.expect_err("page 1 fails");
    assert_eq!(
        err,
        ListError::FetchFailed {
            page_index: 1,
            message: "GET /pokemon: connection refused".into(),
        }
    );

    let after = controller.snapshot();
    assert_eq!(after.items, before.items);
    assert!(!after.is_loading);
    assert_eq!(
        after.load_error_message(),
        "Failed to fetch catalog page 1: GET /pokemon: connection refused"
    );

    controller.load_next_page().await.expect("retry");
    assert_eq!(controller.snapshot().load_error, None);
    assert_eq!(controller.snapshot().items.len(), 2);
    assert_eq!(*requests.lock().await, vec![(20, 0), (20, 20), (20, 20)]);
}

#[tokio::test]
async fn near_end_trigger_is_ignored_while_searching() {
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![
            page(100, &[("bulbasaur", 1), ("charmander", 4)]),
            page(100, &[("squirtle", 7)]),
        ]),
        20,
    );

    controller.load_next_page().await.expect("page 0");
    controller.search("char");
    assert!(controller.snapshot().is_search_active);

    let outcome = controller.on_item_near_end().await.expect("near end");
    assert_eq!(outcome, PageLoad::Skipped);
    assert_eq!(requests.lock().await.len(), 1);

    controller.search("");
    let outcome = controller.on_item_near_end().await.expect("near end");
    assert!(matches!(outcome, PageLoad::Appended { page_index: 1, .. }));
    assert_eq!(requests.lock().await.len(), 2);
}

#[tokio::test]
async fn near_end_trigger_during_search_never_marks_a_load() {
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![page(100, &[("bulbasaur", 1)])]),
        20,
    );

    controller.load_next_page().await.expect("page 0");
    controller.search("bul");
    let mut updates = controller.subscribe();
    updates.mark_unchanged();

    assert_eq!(
        controller.on_item_near_end().await.expect("near end"),
        PageLoad::Skipped
    );
    assert!(!updates.has_changed().expect("controller alive"));
    assert!(!controller.snapshot().is_loading);
    assert_eq!(requests.lock().await.len(), 1);
}

#[tokio::test]
async fn near_end_trigger_is_ignored_once_the_end_is_reached() {
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![page(1, &[("bulbasaur", 1)])]),
        20,
    );

    controller.on_item_near_end().await.expect("page 0");
    assert!(controller.snapshot().end_reached);

    assert_eq!(
        controller.on_item_near_end().await.expect("near end"),
        PageLoad::Skipped
    );
    assert_eq!(requests.lock().await.len(), 1);
}

#[tokio::test]
async fn search_round_trip_through_the_controller() {
    let (controller, _requests) = controller_with(
        ScriptedPageSource::new(vec![page(100, &[("bulba", 1), ("char", 2)])]),
        20,
    );
    controller.load_next_page().await.expect("page 0");
    let full = controller.snapshot().items;

    controller.search("char");
    let filtered = controller.snapshot();
    assert_eq!(filtered.items.len(), 1);
    assert_eq!(filtered.items[0].display_name, "Char");

    controller.search("");
    let restored = controller.snapshot();
    assert_eq!(restored.items, full);
    assert!(!restored.is_search_active);
}

#[tokio::test]
async fn malformed_entries_are_skipped_and_the_page_still_counts() {
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![
            Ok(PageResponse {
                count: 40,
                next: None,
                previous: None,
                results: vec![
                    NamedResource {
                        name: "bulbasaur".into(),
                        url: "https://pokeapi.co/api/v2/pokemon/1/".into(),
                    },
                    NamedResource {
                        name: "glitch".into(),
                        url: "https://pokeapi.co/api/v2/pokemon/".into(),
                    },
                ],
            }),
            page(40, &[("ivysaur", 2)]),
        ]),
        20,
    );

    let outcome = controller.load_next_page().await.expect("page 0");
    assert_eq!(
        outcome,
        PageLoad::Appended {
            page_index: 0,
            items: 1,
            malformed: 1
        }
    );

    controller.load_next_page().await.expect("page 1");
    assert_eq!(*requests.lock().await, vec![(20, 0), (20, 20)]);
}

#[tokio::test]
async fn dropped_fetch_releases_the_loading_flag() {
    let gate = Arc::new(Notify::new());
    let (controller, requests) = controller_with(
        ScriptedPageSource::new(vec![page(40, &[("a", 1)])]).gated(gate),
        20,
    );

    let timed_out = tokio::time::timeout(Duration::from_millis(20), controller.load_next_page()).await;
    assert!(timed_out.is_err());

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_loading);
    assert!(snapshot.items.is_empty());
    assert_eq!(requests.lock().await.len(), 1);
}
