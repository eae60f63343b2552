//! The paginator event loop
//!
//! `ApiPaginator` owns a spawned task that serializes restart and advance
//! signals from every source into one queue. Only that task touches the
//! `FeedState`; fetches run in their own tasks and report back through a
//! second channel tagged with the generation that issued them.

use super::loader::{cursor_fn, params_fn, CursorLoadFn, FnLoader, PageLoader, ParamsLoadFn};
use super::merge::{self, MergeFn};
use super::state::FeedState;
use super::types::{FetchRequest, Generation, PaginationStatus, PaginatorOptions, PaginatorStats};
use crate::error::{Error, Result};
use crate::types::{Cursor, Envelope};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Pulls a page's items out of an envelope
pub type ItemsFn<E, T> = Arc<dyn Fn(E) -> Vec<T> + Send + Sync>;

/// Pulls the next-page cursor out of an envelope
pub type CursorFn<E> = Arc<dyn Fn(&E) -> Option<Cursor> + Send + Sync>;

/// Rewrites a page's items before they are merged
pub type PageTransformFn<T> = Arc<dyn Fn(Vec<T>) -> Vec<T> + Send + Sync>;

/// Failed fetches kept for lagging error subscribers
const ERROR_CHANNEL_CAPACITY: usize = 64;

enum Command<P> {
    Restart(P),
    Advance,
    Flush(oneshot::Sender<()>),
    Shutdown,
}

struct FetchOutcome<E> {
    generation: Generation,
    page: u32,
    result: Result<E>,
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable input side of a paginator
///
/// Handles can be moved to other tasks or threads; everything they send
/// lands in the same ordered queue.
pub struct PaginatorHandle<P> {
    commands: mpsc::UnboundedSender<Command<P>>,
}

impl<P> PaginatorHandle<P> {
    /// Start a new generation for `params`
    pub fn restart(&self, params: P) -> Result<()> {
        self.send(Command::Restart(params))
    }

    /// Request the next page
    pub fn advance(&self) -> Result<()> {
        self.send(Command::Advance)
    }

    /// Wait until every signal sent before this call has been processed
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush(ack))?;
        done.await.map_err(|_| Error::Closed)
    }

    /// Check if the event loop has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command<P>) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::Closed)
    }
}

impl<P> Clone for PaginatorHandle<P> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<P> std::fmt::Debug for PaginatorHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatorHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Paginator
// ============================================================================

/// Incremental paginator over a cursor-paged source
///
/// Turns restart and advance signals into a stream of accumulated item
/// lists, a loading flag and an error stream. At most one fetch is in
/// flight at a time, and a restart makes every earlier fetch irrelevant.
pub struct ApiPaginator<P, T> {
    handle: PaginatorHandle<P>,
    items: watch::Receiver<Arc<Vec<T>>>,
    loading: watch::Receiver<bool>,
    loading_page: watch::Receiver<Option<u32>>,
    status: watch::Receiver<PaginationStatus>,
    stats: watch::Receiver<PaginatorStats>,
    errors: broadcast::Sender<Arc<Error>>,
    task: JoinHandle<()>,
}

impl<P, T> ApiPaginator<P, T>
where
    P: Clone + PartialEq + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Start configuring a paginator
    pub fn builder<E: Send + 'static>() -> PaginatorBuilder<P, T, E> {
        PaginatorBuilder::new()
    }

    /// Start a new generation for `params`
    pub fn restart(&self, params: P) -> Result<()> {
        self.handle.restart(params)
    }

    /// Request the next page
    pub fn advance(&self) -> Result<()> {
        self.handle.advance()
    }

    /// A handle for sending signals from elsewhere
    pub fn handle(&self) -> PaginatorHandle<P> {
        self.handle.clone()
    }

    /// Latest accumulated items
    pub fn items(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.items.clone()
    }

    /// Snapshot of the accumulated items
    pub fn current_items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.items.borrow())
    }

    /// Whether a fetch for the current generation is in flight
    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.loading.clone()
    }

    /// Page number being loaded, `None` when idle
    pub fn loading_page(&self) -> watch::Receiver<Option<u32>> {
        self.loading_page.clone()
    }

    /// Lifecycle status of the current generation
    pub fn status(&self) -> watch::Receiver<PaginationStatus> {
        self.status.clone()
    }

    /// Counters
    pub fn stats(&self) -> watch::Receiver<PaginatorStats> {
        self.stats.clone()
    }

    /// Subscribe to failed fetches
    ///
    /// Every item is an `Error::FetchFailed`. Only failures after the
    /// subscription are delivered.
    pub fn errors(&self) -> broadcast::Receiver<Arc<Error>> {
        self.errors.subscribe()
    }

    /// Stream of accumulated lists, one per successful fetch from now on
    ///
    /// Backed by a watch channel: a slow consumer sees the latest list and
    /// may skip intermediate ones.
    pub fn items_stream(&self) -> impl Stream<Item = Arc<Vec<T>>> + Send + 'static {
        let mut rx = self.items.clone();
        rx.borrow_and_update();
        stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let items = Arc::clone(&rx.borrow_and_update());
            Some((items, rx))
        })
    }

    /// Stream of loading flags, starting with the current one
    pub fn loading_stream(&self) -> impl Stream<Item = bool> + Send + 'static {
        let rx = self.loading.clone();
        stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first {
                rx.changed().await.ok()?;
            }
            let loading = *rx.borrow_and_update();
            Some((loading, (rx, false)))
        })
    }

    /// Wait until every signal sent before this call has been processed
    pub async fn flush(&self) -> Result<()> {
        self.handle.flush().await
    }

    /// Wait for the queue to drain and the in-flight fetch to settle
    ///
    /// Returns the accumulated items at that point.
    pub async fn idle(&self) -> Result<Arc<Vec<T>>> {
        self.flush().await?;
        let mut loading = self.loading.clone();
        loading
            .wait_for(|loading| !*loading)
            .await
            .map_err(|_| Error::Closed)?;
        Ok(self.current_items())
    }

    /// Check if the event loop has stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the event loop and wait for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.handle.send(Command::Shutdown);
        let _ = (&mut self.task).await;
    }
}

impl<P, T> Drop for ApiPaginator<P, T> {
    fn drop(&mut self) {
        let _ = self.handle.commands.send(Command::Shutdown);
    }
}

impl<P, T> std::fmt::Debug for ApiPaginator<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiPaginator")
            .field("items", &self.items.borrow().len())
            .field("loading", &*self.loading.borrow())
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for `ApiPaginator`
pub struct PaginatorBuilder<P, T, E> {
    start_over_with: Option<BoxStream<'static, P>>,
    next_page: Option<BoxStream<'static, ()>>,
    envelope_to_items: Option<ItemsFn<E, T>>,
    envelope_to_cursor: Option<CursorFn<E>>,
    load_with_params: Option<ParamsLoadFn<P, E>>,
    load_with_cursor: Option<CursorLoadFn<E>>,
    loader: Option<Arc<dyn PageLoader<P, E>>>,
    merge: Option<MergeFn<T>>,
    page_transformation: Option<PageTransformFn<T>>,
    options: PaginatorOptions,
}

impl<P, T, E> PaginatorBuilder<P, T, E>
where
    P: Clone + PartialEq + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            start_over_with: None,
            next_page: None,
            envelope_to_items: None,
            envelope_to_cursor: None,
            load_with_params: None,
            load_with_cursor: None,
            loader: None,
            merge: None,
            page_transformation: None,
            options: PaginatorOptions::default(),
        }
    }

    /// Restart signals: every emitted value starts a new generation
    #[must_use]
    pub fn start_over_with<S>(mut self, restarts: S) -> Self
    where
        S: Stream<Item = P> + Send + 'static,
    {
        self.start_over_with = Some(restarts.boxed());
        self
    }

    /// Advance signals: every emitted value requests the next page
    #[must_use]
    pub fn next_page<S>(mut self, advances: S) -> Self
    where
        S: Stream<Item = ()> + Send + 'static,
    {
        self.next_page = Some(advances.boxed());
        self
    }

    /// How to pull a page's items out of an envelope
    #[must_use]
    pub fn envelope_to_items<F>(mut self, f: F) -> Self
    where
        F: Fn(E) -> Vec<T> + Send + Sync + 'static,
    {
        self.envelope_to_items = Some(Arc::new(f));
        self
    }

    /// How to pull the next-page cursor out of an envelope
    #[must_use]
    pub fn envelope_to_cursor<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> Option<Cursor> + Send + Sync + 'static,
    {
        self.envelope_to_cursor = Some(Arc::new(f));
        self
    }

    /// Page-1 loader
    #[must_use]
    pub fn load_with_params<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E>> + Send + 'static,
    {
        self.load_with_params = Some(params_fn(f));
        self
    }

    /// Page-2+ loader
    #[must_use]
    pub fn load_with_cursor<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Cursor) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E>> + Send + 'static,
    {
        self.load_with_cursor = Some(cursor_fn(f));
        self
    }

    /// Use a `PageLoader` for both kinds of fetch
    ///
    /// Takes precedence over `load_with_params` / `load_with_cursor`.
    #[must_use]
    pub fn loader<L>(self, loader: L) -> Self
    where
        L: PageLoader<P, E> + 'static,
    {
        self.shared_loader(Arc::new(loader))
    }

    /// Use an already shared `PageLoader`
    #[must_use]
    pub fn shared_loader(mut self, loader: Arc<dyn PageLoader<P, E>>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Drop accumulated items when a restart's page 1 arrives
    #[must_use]
    pub fn clear_when_starting_over(mut self, clear: bool) -> Self {
        self.options.clear_on_restart = clear;
        self
    }

    /// Skip restarts whose params equal the current ones
    #[must_use]
    pub fn distinct_until_changed(mut self, distinct: bool) -> Self {
        self.options.distinct_until_changed = distinct;
        self
    }

    /// Merge policy, plain concatenation by default
    #[must_use]
    pub fn merge<F>(mut self, f: F) -> Self
    where
        F: Fn(&[T], Vec<T>) -> Vec<T> + Send + Sync + 'static,
    {
        self.merge = Some(merge::shared(f));
        self
    }

    /// Rewrite each page's items before merging
    #[must_use]
    pub fn page_transformation<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<T>) -> Vec<T> + Send + Sync + 'static,
    {
        self.page_transformation = Some(Arc::new(f));
        self
    }

    /// Replace all options at once
    #[must_use]
    pub fn options(mut self, options: PaginatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Spawn the event loop on the current tokio runtime
    pub fn build(self) -> Result<ApiPaginator<P, T>> {
        let loader: Arc<dyn PageLoader<P, E>> =
            match (self.loader, self.load_with_params, self.load_with_cursor) {
                (Some(loader), _, _) => loader,
                (None, Some(by_params), Some(by_cursor)) => {
                    Arc::new(FnLoader::from_parts(by_params, by_cursor))
                }
                (None, None, _) => return Err(Error::missing_field("load_with_params")),
                (None, Some(_), None) => return Err(Error::missing_field("load_with_cursor")),
            };
        let envelope_to_items = self
            .envelope_to_items
            .ok_or_else(|| Error::missing_field("envelope_to_items"))?;
        let envelope_to_cursor = self
            .envelope_to_cursor
            .ok_or_else(|| Error::missing_field("envelope_to_cursor"))?;
        let merge = self.merge.unwrap_or_else(|| merge::shared(merge::concat));

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::config(format!("Paginator requires a tokio runtime: {e}")))?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (items_tx, items_rx) = watch::channel(Arc::new(Vec::new()));
        let (loading_tx, loading_rx) = watch::channel(false);
        let (loading_page_tx, loading_page_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(PaginationStatus::Idle);
        let (stats_tx, stats_rx) = watch::channel(PaginatorStats::default());
        let (errors_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let mut forwarders = Vec::new();
        if let Some(restarts) = self.start_over_with {
            forwarders.push(runtime.spawn(forward(
                restarts.map(Command::Restart),
                commands_tx.clone(),
            )));
        }
        if let Some(advances) = self.next_page {
            forwarders.push(runtime.spawn(forward(
                advances.map(|()| Command::Advance),
                commands_tx.clone(),
            )));
        }

        let event_loop = EventLoop {
            state: FeedState::new(self.options, merge),
            loader,
            envelope_to_items,
            envelope_to_cursor,
            page_transformation: self.page_transformation,
            commands: commands_rx,
            outcomes_tx,
            outcomes: outcomes_rx,
            in_flight: None,
            forwarders,
            outputs: Outputs {
                items: items_tx,
                loading: loading_tx,
                loading_page: loading_page_tx,
                status: status_tx,
                stats: stats_tx,
                errors: errors_tx.clone(),
            },
        };
        let task = runtime.spawn(event_loop.run());

        debug!(options = ?self.options, "paginator started");

        Ok(ApiPaginator {
            handle: PaginatorHandle {
                commands: commands_tx,
            },
            items: items_rx,
            loading: loading_rx,
            loading_page: loading_page_rx,
            status: status_rx,
            stats: stats_rx,
            errors: errors_tx,
            task,
        })
    }
}

impl<P, T> PaginatorBuilder<P, T, Envelope<T>>
where
    P: Clone + PartialEq + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Read items and cursor straight from an `Envelope`
    #[must_use]
    pub fn with_envelope_extractors(self) -> Self {
        self.envelope_to_items(|envelope: Envelope<T>| envelope.items)
            .envelope_to_cursor(|envelope: &Envelope<T>| envelope.cursor.clone())
    }
}

impl<P, T, E> Default for PaginatorBuilder<P, T, E>
where
    P: Clone + PartialEq + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn forward<P, S>(signals: S, commands: mpsc::UnboundedSender<Command<P>>)
where
    S: Stream<Item = Command<P>> + Send,
{
    futures::pin_mut!(signals);
    while let Some(command) = signals.next().await {
        if commands.send(command).is_err() {
            break;
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

struct Outputs<T> {
    items: watch::Sender<Arc<Vec<T>>>,
    loading: watch::Sender<bool>,
    loading_page: watch::Sender<Option<u32>>,
    status: watch::Sender<PaginationStatus>,
    stats: watch::Sender<PaginatorStats>,
    errors: broadcast::Sender<Arc<Error>>,
}

struct EventLoop<P, T, E> {
    state: FeedState<P, T>,
    loader: Arc<dyn PageLoader<P, E>>,
    envelope_to_items: ItemsFn<E, T>,
    envelope_to_cursor: CursorFn<E>,
    page_transformation: Option<PageTransformFn<T>>,
    commands: mpsc::UnboundedReceiver<Command<P>>,
    outcomes_tx: mpsc::UnboundedSender<FetchOutcome<E>>,
    outcomes: mpsc::UnboundedReceiver<FetchOutcome<E>>,
    in_flight: Option<JoinHandle<()>>,
    forwarders: Vec<JoinHandle<()>>,
    outputs: Outputs<T>,
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl<P, T, E> EventLoop<P, T, E>
where
    P: Clone + PartialEq + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                Some(outcome) = self.outcomes.recv() => self.on_outcome(outcome),
                command = self.commands.recv() => match command {
                    Some(Command::Restart(params)) => self.on_restart(params),
                    Some(Command::Advance) => self.on_advance(),
                    Some(Command::Flush(ack)) => {
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        if let Some(fetch) = self.in_flight.take() {
            fetch.abort();
        }
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
        self.outputs.loading.send_replace(false);
        self.outputs.loading_page.send_replace(None);
        debug!(generation = %self.state.generation(), "paginator stopped");
    }

    fn on_restart(&mut self, params: P) {
        if let Some(request) = self.state.restart(params) {
            if let Some(superseded) = self.in_flight.take() {
                trace!("aborting fetch of a superseded generation");
                superseded.abort();
            }
            self.issue(request);
        }
        self.publish_state();
    }

    fn on_advance(&mut self) {
        if let Some(request) = self.state.advance() {
            self.issue(request);
        }
        self.publish_state();
    }

    fn issue(&mut self, request: FetchRequest<P>) {
        let generation = request.generation();
        let page = request.page();
        debug!(%generation, page, "issuing fetch");

        let loader = Arc::clone(&self.loader);
        let outcomes = self.outcomes_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let load = async {
                match request {
                    FetchRequest::Params { params, .. } => loader.load_by_params(params).await,
                    FetchRequest::Cursor { cursor, .. } => loader.load_by_cursor(cursor).await,
                }
            };
            // A panicking loader still has to report, or the fetch never settles
            let result = futures::FutureExt::catch_unwind(AssertUnwindSafe(load))
                .await
                .unwrap_or_else(|panic| {
                    Err(Error::Other(format!(
                        "page loader panicked: {}",
                        panic_message(&*panic)
                    )))
                });
            let _ = outcomes.send(FetchOutcome {
                generation,
                page,
                result,
            });
        }));
    }

    fn on_outcome(&mut self, outcome: FetchOutcome<E>) {
        let FetchOutcome {
            generation,
            page,
            result,
        } = outcome;

        if generation != self.state.generation() {
            trace!(%generation, page, "discarding result of a superseded generation");
        }

        match result {
            Ok(envelope) => {
                let cursor = (self.envelope_to_cursor)(&envelope);
                let mut items = (self.envelope_to_items)(envelope);
                if let Some(transform) = &self.page_transformation {
                    items = transform(items);
                }
                let fetched = items.len();

                if let Some(snapshot) = self.state.apply_page(generation, items, cursor) {
                    self.in_flight = None;
                    debug!(
                        %generation,
                        page,
                        fetched,
                        total = snapshot.len(),
                        has_more = !self.state.cursor().is_exhausted(),
                        "page merged"
                    );
                    self.outputs.items.send_replace(snapshot);
                }
                self.publish_state();
            }
            Err(error) => {
                let failed = self.state.apply_failure(generation);
                self.publish_state();
                if let Some(page) = failed {
                    self.in_flight = None;
                    warn!("Fetch of page {page} failed (generation {generation}): {error}");
                    let _ = self
                        .outputs
                        .errors
                        .send(Arc::new(Error::fetch_failed(page, error)));
                }
            }
        }
    }

    fn publish_state(&self) {
        let status = self.state.status();
        let loading = self.state.is_loading();

        // Loading goes last: a reader woken by `loading == false` sees the
        // merged items and the settled status.
        self.outputs
            .status
            .send_if_modified(|current| set_if_changed(current, status));
        self.outputs
            .loading_page
            .send_if_modified(|current| set_if_changed(current, status.loading_page()));
        self.outputs
            .stats
            .send_if_modified(|current| set_if_changed(current, self.state.stats().clone()));
        self.outputs
            .loading
            .send_if_modified(|current| set_if_changed(current, loading));
    }
}

fn set_if_changed<V: PartialEq>(slot: &mut V, value: V) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
