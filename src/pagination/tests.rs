//! Tests for pagination module

use super::*;
use crate::error::{Error, Result};
use crate::types::{Cursor, Envelope};
use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_case::test_case;
use tokio::sync::oneshot;

// ============================================================================
// Merge Tests
// ============================================================================

#[test_case(&[], vec![1, 2], vec![1, 2] ; "empty accumulation")]
#[test_case(&[1, 2], vec![2, 3], vec![1, 2, 3] ; "partial overlap")]
#[test_case(&[1, 2], vec![2, 1], vec![1, 2] ; "full overlap")]
#[test_case(&[1, 2], vec![3, 3, 4], vec![1, 2, 3, 4] ; "duplicates inside page")]
#[test_case(&[1, 2], vec![], vec![1, 2] ; "empty page")]
fn test_concat_distinct(previous: &[i32], page: Vec<i32>, expected: Vec<i32>) {
    assert_eq!(merge::concat_distinct(previous, page), expected);
}

#[test]
fn test_concat_keeps_duplicates() {
    assert_eq!(merge::concat(&[1, 2], vec![2, 3]), vec![1, 2, 2, 3]);
}

#[test]
fn test_replace_drops_previous() {
    assert_eq!(merge::replace(&[1, 2], vec![3]), vec![3]);
}

#[derive(Debug, Clone, PartialEq)]
struct Update {
    id: u32,
    title: &'static str,
}

#[test]
fn test_concat_distinct_by_key_first_occurrence_wins() {
    let merge = merge::concat_distinct_by_key(|update: &Update| update.id);
    let previous = vec![
        Update { id: 1, title: "launch" },
        Update { id: 2, title: "shipping" },
    ];
    let page = vec![
        Update { id: 2, title: "shipping (edited)" },
        Update { id: 3, title: "survey" },
    ];

    let merged = merge(&previous, page);

    assert_eq!(
        merged,
        vec![
            Update { id: 1, title: "launch" },
            Update { id: 2, title: "shipping" },
            Update { id: 3, title: "survey" },
        ]
    );
}

// ============================================================================
// Types Tests
// ============================================================================

#[test]
fn test_generation_next() {
    let generation = Generation::INITIAL;
    assert_eq!(generation.get(), 0);
    assert_eq!(generation.next().get(), 1);
    assert_eq!(generation.next().next().to_string(), "2");
    assert!(generation < generation.next());
}

#[test]
fn test_cursor_state() {
    assert_eq!(CursorState::default(), CursorState::Unknown);

    let state = CursorState::from_cursor(Some(Cursor::from("c1")));
    assert_eq!(state.cursor(), Some(&Cursor::from("c1")));
    assert!(!state.is_exhausted());

    let state = CursorState::from_cursor(None);
    assert!(state.is_exhausted());
    assert!(state.cursor().is_none());
}

#[test]
fn test_pagination_status_helpers() {
    assert!(PaginationStatus::Loading { page: 2 }.is_loading());
    assert_eq!(PaginationStatus::Loading { page: 2 }.loading_page(), Some(2));
    assert_eq!(PaginationStatus::Idle.loading_page(), None);
    assert!(PaginationStatus::Ready { has_more: false }.is_exhausted());
    assert!(!PaginationStatus::Ready { has_more: true }.is_exhausted());
    assert!(!PaginationStatus::Failed { page: 1 }.is_loading());
}

#[test]
fn test_fetch_request_accessors() {
    let request: FetchRequest<&str> = FetchRequest::Cursor {
        generation: Generation::INITIAL.next(),
        page: 3,
        cursor: Cursor::from("c2"),
    };
    assert_eq!(request.page(), 3);
    assert_eq!(request.kind(), FetchKind::NextPage);
    assert_eq!(request.generation().get(), 1);

    let request = FetchRequest::Params {
        generation: Generation::INITIAL,
        params: "p",
    };
    assert_eq!(request.page(), 1);
    assert_eq!(request.kind(), FetchKind::FirstPage);
}

#[test]
fn test_options_builder_and_serde() {
    let options = PaginatorOptions::new()
        .with_clear_on_restart(true)
        .with_distinct_until_changed(true);
    assert!(options.clear_on_restart);
    assert!(options.distinct_until_changed);

    let options: PaginatorOptions = serde_json::from_str(r#"{"clear_on_restart": true}"#).unwrap();
    assert!(options.clear_on_restart);
    assert!(!options.distinct_until_changed);
}

// ============================================================================
// FeedState Tests
// ============================================================================

fn feed_state(options: PaginatorOptions) -> FeedState<&'static str, &'static str> {
    FeedState::new(options, merge::shared(merge::concat_distinct))
}

fn next_cursor(request: Option<FetchRequest<&'static str>>) -> (Generation, u32, Cursor) {
    match request {
        Some(FetchRequest::Cursor {
            generation,
            page,
            cursor,
        }) => (generation, page, cursor),
        other => panic!("Expected cursor fetch, got {other:?}"),
    }
}

#[test]
fn test_state_initial() {
    let state = feed_state(PaginatorOptions::default());
    assert_eq!(state.generation(), Generation::INITIAL);
    assert_eq!(state.status(), PaginationStatus::Idle);
    assert!(state.items().is_empty());
    assert!(!state.is_loading());
    assert!(state.params().is_none());
}

#[test]
fn test_state_advance_before_first_page_is_ignored() {
    let mut state = feed_state(PaginatorOptions::default());
    assert!(state.advance().is_none());

    state.restart("p1");
    // page 1 still in flight
    assert!(state.advance().is_none());
    assert_eq!(state.stats().advances_ignored, 2);
}

#[test]
fn test_state_restart_issues_first_page() {
    let mut state = feed_state(PaginatorOptions::default());

    let request = state.restart("p1").unwrap();
    assert_eq!(
        request,
        FetchRequest::Params {
            generation: Generation::INITIAL.next(),
            params: "p1",
        }
    );
    assert!(state.is_loading());
    assert_eq!(state.status(), PaginationStatus::Loading { page: 1 });
    assert_eq!(state.params(), Some(&"p1"));
    assert_eq!(state.cursor(), &CursorState::Unknown);
}

#[test]
fn test_state_full_walk() {
    let mut state = feed_state(PaginatorOptions::default());
    let generation = state.restart("p1").unwrap().generation();

    let items = state
        .apply_page(generation, vec!["A", "B"], Some(Cursor::from("c1")))
        .unwrap();
    assert_eq!(*items, vec!["A", "B"]);
    assert_eq!(state.status(), PaginationStatus::Ready { has_more: true });

    let (next_generation, page, cursor) = next_cursor(state.advance());
    assert_eq!(next_generation, generation);
    assert_eq!(page, 2);
    assert_eq!(cursor, Cursor::from("c1"));

    let items = state.apply_page(generation, vec!["B", "C"], None).unwrap();
    assert_eq!(*items, vec!["A", "B", "C"]);
    assert_eq!(state.status(), PaginationStatus::Ready { has_more: false });
    assert!(state.cursor().is_exhausted());

    assert!(state.advance().is_none());
    assert_eq!(state.stats().fetches_issued, 2);
    assert_eq!(state.stats().pages_loaded, 2);
}

#[test]
fn test_state_discards_superseded_generation() {
    let mut state = feed_state(PaginatorOptions::default());
    let first = state.restart("p1").unwrap().generation();
    let second = state.restart("p2").unwrap().generation();
    assert_ne!(first, second);

    assert!(state.apply_page(first, vec!["stale"], None).is_none());
    assert!(state.is_loading());
    assert!(state.items().is_empty());

    let items = state.apply_page(second, vec!["fresh"], None).unwrap();
    assert_eq!(*items, vec!["fresh"]);
    assert_eq!(state.stats().stale_discarded, 1);
}

#[test]
fn test_state_discards_stale_failure() {
    let mut state = feed_state(PaginatorOptions::default());
    let first = state.restart("p1").unwrap().generation();
    state.restart("p2");

    assert!(state.apply_failure(first).is_none());
    assert!(state.is_loading());
    assert_eq!(state.stats().failures, 0);
}

#[test]
fn test_state_clear_on_restart() {
    let mut state = feed_state(PaginatorOptions::new().with_clear_on_restart(true));
    let generation = state.restart("p1").unwrap().generation();
    state.apply_page(generation, vec!["A", "B"], None);

    let generation = state.restart("p2").unwrap().generation();
    // previous items stay visible until page 1 arrives
    assert_eq!(**state.items(), vec!["A", "B"]);

    let items = state.apply_page(generation, vec!["C"], None).unwrap();
    assert_eq!(*items, vec!["C"]);
}

#[test]
fn test_state_clear_on_restart_still_merges_first_page() {
    let mut state = feed_state(PaginatorOptions::new().with_clear_on_restart(true));
    let generation = state.restart("p1").unwrap().generation();

    let items = state
        .apply_page(generation, vec!["A", "B", "A"], None)
        .unwrap();
    assert_eq!(*items, vec!["A", "B"]);
}

#[test]
fn test_state_merge_on_restart() {
    let mut state = feed_state(PaginatorOptions::default());
    let generation = state.restart("p1").unwrap().generation();
    state.apply_page(generation, vec!["A", "B"], Some(Cursor::from("c1")));

    let generation = state.restart("p1").unwrap().generation();
    assert_eq!(state.cursor(), &CursorState::Unknown);

    let items = state.apply_page(generation, vec!["B", "C"], None).unwrap();
    assert_eq!(*items, vec!["A", "B", "C"]);
}

#[test]
fn test_state_failure_keeps_items_and_cursor() {
    let mut state = feed_state(PaginatorOptions::default());
    let generation = state.restart("p1").unwrap().generation();
    state.apply_page(generation, vec!["A"], Some(Cursor::from("c1")));
    state.advance();

    assert_eq!(state.apply_failure(generation), Some(2));
    assert_eq!(state.status(), PaginationStatus::Failed { page: 2 });
    assert!(!state.is_loading());
    assert_eq!(**state.items(), vec!["A"]);
    assert_eq!(state.cursor().cursor(), Some(&Cursor::from("c1")));

    // retry goes to the same page with the same cursor
    let (_, page, cursor) = next_cursor(state.advance());
    assert_eq!(page, 2);
    assert_eq!(cursor, Cursor::from("c1"));
}

#[test]
fn test_state_first_page_failure_blocks_advance() {
    let mut state = feed_state(PaginatorOptions::default());
    let generation = state.restart("p1").unwrap().generation();

    assert_eq!(state.apply_failure(generation), Some(1));
    assert_eq!(state.status(), PaginationStatus::Failed { page: 1 });
    assert!(state.advance().is_none());

    assert!(state.restart("p1").is_some());
}

#[test]
fn test_state_distinct_until_changed() {
    let mut state = feed_state(PaginatorOptions::new().with_distinct_until_changed(true));
    let generation = state.restart("p1").unwrap().generation();
    state.apply_page(generation, vec!["A"], None);

    assert!(state.restart("p1").is_none());
    assert_eq!(state.generation(), generation);
    assert_eq!(state.stats().restarts_skipped, 1);

    assert!(state.restart("p2").is_some());
}

#[test]
fn test_state_distinct_until_changed_retries_after_failure() {
    let mut state = feed_state(PaginatorOptions::new().with_distinct_until_changed(true));
    let generation = state.restart("p1").unwrap().generation();
    state.apply_failure(generation);

    assert!(state.restart("p1").is_some());
}

#[test]
fn test_state_restart_without_distinct_always_restarts() {
    let mut state = feed_state(PaginatorOptions::default());
    state.restart("p1");
    assert!(state.restart("p1").is_some());
    assert_eq!(state.generation().get(), 2);
}

// ============================================================================
// ApiPaginator Tests
// ============================================================================

type Page = Envelope<&'static str>;

enum Scripted {
    Page(Page),
    Fail(u16),
}

/// Loader answering from a script, optionally holding calls behind a gate
#[derive(Default)]
struct ScriptedLoader {
    responses: Mutex<HashMap<String, Scripted>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    fn page(&self, key: &str, items: &[&'static str], cursor: Option<&str>) {
        let page = Envelope::new(items.to_vec(), cursor.map(Cursor::from));
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), Scripted::Page(page));
    }

    fn fail(&self, key: &str, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), Scripted::Fail(status));
    }

    fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (open, gate) = oneshot::channel();
        self.gates.lock().unwrap().insert(key.to_string(), gate);
        open
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, key: String) -> Result<Page> {
        self.calls.lock().unwrap().push(key.clone());
        let gate = self.gates.lock().unwrap().remove(&key);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.responses.lock().unwrap().get(&key) {
            Some(Scripted::Page(page)) => Ok(page.clone()),
            Some(Scripted::Fail(status)) => Err(Error::http_status(*status, "scripted")),
            None => Err(Error::Other(format!("no scripted response for {key}"))),
        }
    }
}

#[async_trait]
impl PageLoader<String, Page> for ScriptedLoader {
    async fn load_by_params(&self, params: String) -> Result<Page> {
        self.respond(format!("p:{params}")).await
    }

    async fn load_by_cursor(&self, cursor: Cursor) -> Result<Page> {
        self.respond(format!("c:{cursor}")).await
    }
}

fn paginator(
    loader: &Arc<ScriptedLoader>,
    clear_on_restart: bool,
) -> ApiPaginator<String, &'static str> {
    ApiPaginator::builder()
        .shared_loader(Arc::clone(loader) as Arc<dyn PageLoader<String, Page>>)
        .with_envelope_extractors()
        .clear_when_starting_over(clear_on_restart)
        .merge(merge::concat_distinct)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_paginator_end_to_end() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:updates", &["A", "B"], Some("c1"));
    loader.page("c:c1", &["B", "C"], None);
    let paginator = paginator(&loader, false);

    paginator.restart("updates".to_string()).unwrap();
    let items = paginator.idle().await.unwrap();
    assert_eq!(*items, vec!["A", "B"]);

    paginator.advance().unwrap();
    let items = paginator.idle().await.unwrap();
    assert_eq!(*items, vec!["A", "B", "C"]);
    assert!(!*paginator.is_loading().borrow());
    assert_eq!(
        *paginator.status().borrow(),
        PaginationStatus::Ready { has_more: false }
    );

    paginator.advance().unwrap();
    let items = paginator.idle().await.unwrap();
    assert_eq!(*items, vec!["A", "B", "C"]);
    assert_eq!(loader.calls(), vec!["p:updates", "c:c1"]);
    assert_eq!(paginator.stats().borrow().advances_ignored, 1);
}

#[tokio::test]
async fn test_paginator_double_advance_issues_one_fetch() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A"], Some("c1"));
    loader.page("c:c1", &["B"], Some("c2"));
    let paginator = paginator(&loader, false);

    paginator.restart("feed".to_string()).unwrap();
    paginator.idle().await.unwrap();

    let open = loader.gate("c:c1");
    paginator.advance().unwrap();
    paginator.advance().unwrap();
    paginator.flush().await.unwrap();

    assert!(*paginator.is_loading().borrow());
    assert_eq!(*paginator.loading_page().borrow(), Some(2));

    open.send(()).unwrap();
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, vec!["A", "B"]);
    assert_eq!(loader.calls(), vec!["p:feed", "c:c1"]);
    assert_eq!(paginator.stats().borrow().fetches_issued, 2);
    assert_eq!(*paginator.loading_page().borrow(), None);
}

#[tokio::test]
async fn test_paginator_discards_superseded_restart() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:old", &["stale-1", "stale-2"], Some("c-old"));
    loader.page("p:new", &["fresh"], None);
    let paginator = paginator(&loader, false);

    let open = loader.gate("p:old");
    paginator.restart("old".to_string()).unwrap();
    paginator.flush().await.unwrap();
    paginator.restart("new".to_string()).unwrap();

    let items = paginator.idle().await.unwrap();
    assert_eq!(*items, vec!["fresh"]);

    // the superseded fetch was aborted; opening its gate changes nothing
    let _ = open.send(());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, vec!["fresh"]);
    assert_eq!(loader.calls().last().map(String::as_str), Some("p:new"));
    assert_eq!(
        *paginator.status().borrow(),
        PaginationStatus::Ready { has_more: false }
    );
}

#[tokio::test]
async fn test_paginator_clear_on_restart() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:one", &["A", "B"], None);
    loader.page("p:two", &["C"], None);
    let paginator = paginator(&loader, true);

    paginator.restart("one".to_string()).unwrap();
    paginator.idle().await.unwrap();
    paginator.restart("two".to_string()).unwrap();
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, vec!["C"]);
}

#[tokio::test]
async fn test_paginator_clear_on_restart_dedups_first_page() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A", "B", "A"], None);
    let paginator = paginator(&loader, true);

    paginator.restart("feed".to_string()).unwrap();
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, vec!["A", "B"]);
}

#[tokio::test]
async fn test_paginator_merge_on_restart() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A", "B"], Some("c1"));
    let paginator = paginator(&loader, false);

    paginator.restart("feed".to_string()).unwrap();
    paginator.idle().await.unwrap();

    loader.page("p:feed", &["B", "C"], None);
    paginator.restart("feed".to_string()).unwrap();
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, merge::concat_distinct(&["A", "B"], vec!["B", "C"]));
    assert_eq!(loader.calls(), vec!["p:feed", "p:feed"]);
}

#[tokio::test]
async fn test_paginator_failure_reports_error_and_keeps_items() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A"], Some("c1"));
    loader.fail("c:c1", 503);
    let paginator = paginator(&loader, false);
    let mut errors = paginator.errors();
    let mut items_rx = paginator.items();

    paginator.restart("feed".to_string()).unwrap();
    paginator.idle().await.unwrap();
    items_rx.borrow_and_update();

    paginator.advance().unwrap();
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, vec!["A"]);
    assert!(!items_rx.has_changed().unwrap());
    assert_eq!(
        *paginator.status().borrow(),
        PaginationStatus::Failed { page: 2 }
    );

    let error = errors.recv().await.unwrap();
    assert!(matches!(*error, Error::FetchFailed { page: 2, .. }));
    assert!(error.to_string().contains("HTTP 503"));

    // advancing again retries the same cursor
    loader.page("c:c1", &["B"], None);
    paginator.advance().unwrap();
    let items = paginator.idle().await.unwrap();
    assert_eq!(*items, vec!["A", "B"]);
    assert_eq!(loader.calls(), vec!["p:feed", "c:c1", "c:c1"]);
}

#[tokio::test]
async fn test_paginator_first_page_failure() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.fail("p:feed", 500);
    let paginator = paginator(&loader, false);
    let mut errors = paginator.errors();

    paginator.restart("feed".to_string()).unwrap();
    let items = paginator.idle().await.unwrap();
    assert!(items.is_empty());
    assert!(matches!(
        *errors.recv().await.unwrap(),
        Error::FetchFailed { page: 1, .. }
    ));

    paginator.advance().unwrap();
    paginator.idle().await.unwrap();
    assert_eq!(loader.calls(), vec!["p:feed"]);
}

/// Loader whose first page blows up
struct PanickingLoader;

#[async_trait]
impl PageLoader<String, Page> for PanickingLoader {
    async fn load_by_params(&self, params: String) -> Result<Page> {
        if params == "boom" {
            panic!("loader exploded");
        }
        Ok(Envelope::with_cursor(vec!["A"], "c1"))
    }

    async fn load_by_cursor(&self, _cursor: Cursor) -> Result<Page> {
        panic!("cursor loader exploded");
    }
}

#[tokio::test]
async fn test_paginator_loader_panic_reports_failure() {
    let paginator: ApiPaginator<String, &'static str> = ApiPaginator::builder()
        .shared_loader(Arc::new(PanickingLoader) as Arc<dyn PageLoader<String, Page>>)
        .with_envelope_extractors()
        .build()
        .unwrap();
    let mut errors = paginator.errors();

    paginator.restart("boom".to_string()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), paginator.idle())
        .await
        .expect("paginator settles after a panic")
        .unwrap();

    assert!(!*paginator.is_loading().borrow());
    assert_eq!(
        *paginator.status().borrow(),
        PaginationStatus::Failed { page: 1 }
    );
    let error = errors.recv().await.unwrap();
    assert!(matches!(*error, Error::FetchFailed { page: 1, .. }));
    assert!(error.to_string().contains("loader exploded"));

    // still usable afterwards
    paginator.restart("fine".to_string()).unwrap();
    assert_eq!(*paginator.idle().await.unwrap(), vec!["A"]);

    paginator.advance().unwrap();
    paginator.idle().await.unwrap();
    assert_eq!(
        *paginator.status().borrow(),
        PaginationStatus::Failed { page: 2 }
    );
    let error = errors.recv().await.unwrap();
    assert!(error.to_string().contains("cursor loader exploded"));
}

#[tokio::test]
async fn test_paginator_distinct_until_changed() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A"], None);
    let paginator: ApiPaginator<String, &'static str> = ApiPaginator::builder()
        .shared_loader(Arc::clone(&loader) as Arc<dyn PageLoader<String, Page>>)
        .with_envelope_extractors()
        .distinct_until_changed(true)
        .build()
        .unwrap();

    paginator.restart("feed".to_string()).unwrap();
    paginator.idle().await.unwrap();
    paginator.restart("feed".to_string()).unwrap();
    paginator.idle().await.unwrap();

    assert_eq!(loader.calls(), vec!["p:feed"]);
    assert_eq!(paginator.stats().borrow().restarts_skipped, 1);
}

#[tokio::test]
async fn test_paginator_page_transformation() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A", "B"], Some("c1"));
    loader.page("c:c1", &["C", "D"], None);
    let paginator: ApiPaginator<String, &'static str> = ApiPaginator::builder()
        .shared_loader(Arc::clone(&loader) as Arc<dyn PageLoader<String, Page>>)
        .with_envelope_extractors()
        .page_transformation(|mut page: Vec<&'static str>| {
            page.reverse();
            page
        })
        .build()
        .unwrap();

    paginator.restart("feed".to_string()).unwrap();
    paginator.idle().await.unwrap();
    paginator.advance().unwrap();
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, vec!["B", "A", "D", "C"]);
}

#[tokio::test]
async fn test_paginator_with_closure_loaders() {
    let paginator: ApiPaginator<u32, u32> = ApiPaginator::builder()
        .load_with_params(|start: u32| async move {
            Ok::<_, Error>(Envelope::with_cursor(vec![start, start + 1], "next"))
        })
        .load_with_cursor(|_cursor: Cursor| async move { Ok(Envelope::last_page(vec![1, 2, 3])) })
        .with_envelope_extractors()
        .merge(merge::concat_distinct)
        .build()
        .unwrap();

    paginator.restart(0).unwrap();
    paginator.idle().await.unwrap();
    paginator.advance().unwrap();
    let items = paginator.idle().await.unwrap();

    assert_eq!(*items, vec![0, 1, 2, 3]);
}

fn parse_start(raw: &str) -> anyhow::Result<u32> {
    use anyhow::Context;
    raw.parse::<u32>()
        .with_context(|| format!("start '{raw}' is not a number"))
}

#[tokio::test]
async fn test_paginator_closure_loader_propagates_anyhow() {
    let paginator: ApiPaginator<String, u32> = ApiPaginator::builder()
        .load_with_params(|raw: String| async move {
            let start = parse_start(&raw)?;
            Ok::<_, Error>(Envelope::last_page(vec![start]))
        })
        .load_with_cursor(|_cursor: Cursor| async move { Ok(Envelope::last_page(Vec::new())) })
        .with_envelope_extractors()
        .build()
        .unwrap();
    let mut errors = paginator.errors();

    paginator.restart("7".to_string()).unwrap();
    assert_eq!(*paginator.idle().await.unwrap(), vec![7]);

    paginator.restart("seven".to_string()).unwrap();
    paginator.idle().await.unwrap();
    let error = errors.recv().await.unwrap();
    let Error::FetchFailed { page, source } = &*error else {
        panic!("expected FetchFailed, got {error:?}");
    };
    assert_eq!(*page, 1);
    assert!(matches!(**source, Error::Anyhow(_)));
    assert!(source.to_string().contains("start 'seven' is not a number"));
}

#[tokio::test]
async fn test_paginator_signal_streams() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A"], Some("c1"));
    loader.page("c:c1", &["B"], None);

    let (restarts, restart_signals) = futures::channel::mpsc::unbounded::<String>();
    let (advances, advance_signals) = futures::channel::mpsc::unbounded::<()>();

    let paginator: ApiPaginator<String, &'static str> = ApiPaginator::builder()
        .shared_loader(Arc::clone(&loader) as Arc<dyn PageLoader<String, Page>>)
        .with_envelope_extractors()
        .start_over_with(restart_signals)
        .next_page(advance_signals)
        .build()
        .unwrap();
    let mut updates = paginator.items_stream().boxed();

    restarts.unbounded_send("feed".to_string()).unwrap();
    let items = tokio::time::timeout(Duration::from_secs(1), updates.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*items, vec!["A"]);

    advances.unbounded_send(()).unwrap();
    let items = tokio::time::timeout(Duration::from_secs(1), updates.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*items, vec!["A", "B"]);
}

#[tokio::test]
async fn test_paginator_loading_stream() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A"], None);
    let paginator = paginator(&loader, false);
    let mut loading = paginator.loading_stream().boxed();

    assert_eq!(loading.next().await, Some(false));

    let open = loader.gate("p:feed");
    paginator.restart("feed".to_string()).unwrap();
    assert_eq!(loading.next().await, Some(true));

    open.send(()).unwrap();
    assert_eq!(loading.next().await, Some(false));
}

#[tokio::test]
async fn test_paginator_handle_from_other_task() {
    let loader = Arc::new(ScriptedLoader::default());
    loader.page("p:feed", &["A"], None);
    let paginator = paginator(&loader, false);
    let handle = paginator.handle();

    tokio::spawn(async move {
        handle.restart("feed".to_string()).unwrap();
        handle.flush().await.unwrap();
    })
    .await
    .unwrap();

    let items = paginator.idle().await.unwrap();
    assert_eq!(*items, vec!["A"]);
}

#[tokio::test]
async fn test_paginator_flush_waits_for_event_loop() {
    let loader = Arc::new(ScriptedLoader::default());
    let paginator = paginator(&loader, false);

    // the event loop has not been polled yet on this single-threaded runtime
    let mut flush = tokio_test::task::spawn(paginator.flush());
    tokio_test::assert_pending!(flush.poll());

    flush.await.unwrap();
}

#[tokio::test]
async fn test_paginator_shutdown_closes_handles() {
    let loader = Arc::new(ScriptedLoader::default());
    let paginator = paginator(&loader, false);
    let handle = paginator.handle();

    paginator.shutdown().await;

    assert!(handle.is_closed());
    assert!(matches!(
        handle.restart("feed".to_string()),
        Err(Error::Closed)
    ));
    assert!(matches!(handle.flush().await, Err(Error::Closed)));
}

#[tokio::test]
async fn test_builder_requires_loader_and_extractors() {
    let result: Result<ApiPaginator<String, &'static str>> =
        PaginatorBuilder::<String, &'static str, Page>::new()
            .with_envelope_extractors()
            .build();
    assert!(matches!(
        result,
        Err(Error::MissingConfigField { ref field }) if field == "load_with_params"
    ));

    let result: Result<ApiPaginator<String, &'static str>> =
        PaginatorBuilder::<String, &'static str, Page>::new()
            .load_with_params(|_params: String| async { Ok(Page::default()) })
            .with_envelope_extractors()
            .build();
    assert!(matches!(
        result,
        Err(Error::MissingConfigField { ref field }) if field == "load_with_cursor"
    ));

    let loader = Arc::new(ScriptedLoader::default());
    let result: Result<ApiPaginator<String, &'static str>> =
        PaginatorBuilder::<String, &'static str, Page>::new()
            .shared_loader(loader as Arc<dyn PageLoader<String, Page>>)
            .envelope_to_items(|page: Page| page.items)
            .build();
    assert!(matches!(
        result,
        Err(Error::MissingConfigField { ref field }) if field == "envelope_to_cursor"
    ));
}

#[test]
fn test_builder_requires_runtime() {
    let result: Result<ApiPaginator<u32, u32>> = PaginatorBuilder::<u32, u32, Envelope<u32>>::new()
        .load_with_params(|_params: u32| async { Ok(Envelope::default()) })
        .load_with_cursor(|_cursor: Cursor| async { Ok(Envelope::default()) })
        .with_envelope_extractors()
        .build();

    assert!(matches!(result, Err(Error::Config { .. })));
}
