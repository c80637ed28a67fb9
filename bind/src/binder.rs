use super::*;
use crate::binding_table::BindingTable;
use crate::config::Config;
use crate::image::Image;
use crate::request::{CompleteFn, ProgressFn, Request};
use crate::target::{Target, target_key};
use easel_async::MainQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// A specialized `Result` type for bind outcomes.
pub type Result<T> = core::result::Result<T, Error>;

/// The terminal outcomes a bind can report, beyond fetch success.
#[derive(Debug, Error)]
pub enum Error {
    /// The request carried no source descriptor.
    #[error("no source supplied")]
    EmptySource,

    /// The completion arrived for a bind that has since been superseded by a
    /// later bind on the same target. Wraps the original success-or-error
    /// for diagnostics; the slot was not touched.
    #[error("superseded by a later bind")]
    Stale(Box<Result<fetch::Fetched>>),

    /// The fetch itself failed; propagated verbatim.
    #[error(transparent)]
    Fetch(#[from] fetch::Error),
}

impl Error {
    /// Whether this outcome means "discarded because superseded" rather
    /// than "really failed".
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::Stale(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Fetch(fetch::Error::Cancelled))
    }
}

/// The load orchestrator.
///
/// Coordinates repeated, overlapping, cancellable loads against reusable
/// display slots: each bind issues a fresh [`TaskId`], and a completion may
/// only mutate its target when its identifier is still the current one.
///
/// All methods must be invoked from the thread that drives the
/// [`MainPump`](easel_async::MainPump) connected to the queue given at
/// construction; callbacks are delivered back on that same thread.
///
/// ```no_run
/// use easel_bind::{binder::Binder, config::Config, request::Request, source::Source, target};
/// use std::sync::Arc;
///
/// let (queue, pump) = easel_async::main_queue();
/// let binder = Binder::new(Config::default(), queue);
///
/// let slot: Arc<dyn target::Target> = target::SlotCell::new();
/// binder.bind(
///     &slot,
///     Request::builder()
///         .source(Source::url("https://example.com/avatar.png"))
///         .build(),
/// );
///
/// // ...pump from the UI loop
/// pump.pump();
/// ```
pub struct Binder {
    queue: MainQueue,
    fetcher: Arc<dyn fetch::Fetcher>,
    table: Arc<BindingTable>,
    prune_every: usize,
    bind_count: AtomicUsize,
}

impl Binder {
    pub fn new(config: Config, queue: MainQueue) -> Self {
        #[cfg(feature = "tokio")]
        let fetcher = config
            .fetcher
            .unwrap_or_else(|| fetch_mem::new(&fetch_mem::Config::default()));

        #[cfg(not(feature = "tokio"))]
        let fetcher = config.fetcher.trace_expect("No fetcher configured");

        describe_metrics();

        Self {
            queue,
            fetcher,
            table: Arc::new(BindingTable::new()),
            prune_every: config.prune_every.get(),
            bind_count: AtomicUsize::new(0),
        }
    }

    /// Binds `request` to `target`'s display slot.
    ///
    /// Applies the placeholder per the request's options, starts the fetch,
    /// and arranges for exactly one terminal outcome to be delivered to the
    /// request's completion callback. Rebinding a target that is already
    /// loading supersedes the earlier load: its completion will be reported
    /// as [`Error::Stale`] and cannot touch the slot.
    ///
    /// Returns the in-flight handle when the fetcher resolved one
    /// synchronously. `None` means either that the request completed on the
    /// spot without a task (no source), or that the handle is not yet known.
    /// A late handle is recorded against the target once the fetcher reports
    /// it, and
    /// [`current_task`](Binder::current_task) is the authoritative holder
    /// from then on.
    #[cfg_attr(
        feature = "instrument",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn bind(
        &self,
        target: &Arc<dyn Target>,
        mut request: Request,
    ) -> Option<Arc<dyn fetch::Handle>> {
        metrics::counter!("bind_requests").increment(1);

        // Periodic sweep of dead targets
        if self.bind_count.fetch_add(1, Ordering::Relaxed) % self.prune_every == 0 {
            self.table.prune();
        }

        let key = target_key(target);

        // An explicit "no source" bind is terminal on the spot: apply the
        // placeholder, drop any pending binding, report, never start a task.
        let Some(source) = request.source.take() else {
            if request.placeholder.is_some() {
                target.set_content(request.placeholder.take());
            }
            self.table.clear(key);
            metrics::counter!("bind_empty_source").increment(1);
            if let Some(on_complete) = request.on_complete.take() {
                on_complete(Err(Error::EmptySource));
            }
            return None;
        };

        // Placeholder policy: keep_current_while_loading only holds the
        // placeholder back when the slot actually shows something, and never
        // on a target class that forces placeholder display.
        if !request.options.keep_current_while_loading
            || target.content().is_none()
            || target.forces_placeholder()
        {
            target.set_content(request.placeholder.take());
        }

        let id = TaskId::next();
        self.table.begin(target, id);

        // Progress side effects are additive
        let mut options = request.options;
        if let Some(observer) = request.on_progress.take() {
            options.progress_observers.push(observer);
        }

        let sink = Arc::new(BindSink {
            id,
            key,
            target: Arc::downgrade(target),
            table: self.table.clone(),
            queue: self.queue.clone(),
            observers: options.progress_observers.clone(),
            failure_image: options.failure_image.clone(),
            on_complete: Mutex::new(request.on_complete.take()),
        });

        trace!("load {id} started: {source}");
        metrics::counter!("loads_started").increment(1);

        let task = self.fetcher.fetch(source, options, sink);
        if let Some(task) = &task {
            self.table.set_task(key, id, task.clone());
        }
        task
    }

    /// Cancels the current load for `target`, if any.
    ///
    /// Cooperative: the binding state is *not* cleared here. The fetch
    /// delivers its cancellation failure through the normal completion path,
    /// which is the single transition back to idle. No-op when nothing is
    /// pending; safe to call twice.
    pub fn cancel(&self, target: &Arc<dyn Target>) {
        if let Some(task) = self.table.current_task(target_key(target)) {
            trace!("cancelling current load for target");
            task.cancel();
        }
    }

    /// Cancels every pending load, for teardown.
    pub fn cancel_all(&self) {
        for task in self.table.tasks() {
            task.cancel();
        }
    }

    /// Whether a load is currently pending for `target`.
    pub fn is_loading(&self, target: &Arc<dyn Target>) -> bool {
        self.table.current_id(target_key(target)).is_some()
    }

    /// The in-flight handle for `target`'s current load, once the fetcher
    /// has reported it.
    pub fn current_task(&self, target: &Arc<dyn Target>) -> Option<Arc<dyn fetch::Handle>> {
        self.table.current_task(target_key(target))
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder")
            .field("prune_every", &self.prune_every)
            .field("bind_count", &self.bind_count)
            .finish()
    }
}

// The per-bind callback surface handed to the fetcher. Everything that can
// mutate binding state or the slot is marshaled onto the main queue; only
// the reference-check predicate reads directly, so workers can poll it
// cheaply.
struct BindSink {
    id: TaskId,
    key: usize,
    target: Weak<dyn Target>,
    table: Arc<BindingTable>,
    queue: MainQueue,
    observers: Vec<ProgressFn>,
    failure_image: Option<Image>,
    on_complete: Mutex<Option<CompleteFn>>,
}

impl fetch::Sink for BindSink {
    fn on_task(&self, task: Arc<dyn fetch::Handle>) {
        let table = self.table.clone();
        let (key, id) = (self.key, self.id);
        self.queue.post(move || table.set_task(key, id, task));
    }

    fn on_progress(&self, progress: fetch::Progress) {
        if self.observers.is_empty() {
            return;
        }
        let observers = self.observers.clone();
        self.queue.post(move || {
            for observer in &observers {
                observer(&progress);
            }
        });
    }

    fn on_partial(&self, image: Image) {
        // Progressive updates trust the fetcher's is_current() polling; no
        // identifier re-check here. Only the final completion decides
        // terminal content.
        let target = self.target.clone();
        self.queue.post(move || {
            if let Some(target) = target.upgrade() {
                target.set_content(Some(image));
            }
        });
    }

    fn is_current(&self) -> bool {
        self.table.current_id(self.key) == Some(self.id)
    }

    fn on_complete(&self, result: fetch::Result<fetch::Fetched>) {
        let id = self.id;
        let key = self.key;
        let target = self.target.clone();
        let table = self.table.clone();
        let failure_image = self.failure_image.clone();
        let on_complete = self
            .on_complete
            .lock()
            .trace_expect("Failed to lock mutex")
            .take();

        self.queue.post(move || {
            complete(id, key, target, table, failure_image, on_complete, result)
        });
    }
}

// The single transition back to idle: every terminal outcome funnels here,
// on the main queue.
fn complete(
    id: TaskId,
    key: usize,
    target: Weak<dyn Target>,
    table: Arc<BindingTable>,
    failure_image: Option<Image>,
    on_complete: Option<CompleteFn>,
    result: fetch::Result<fetch::Fetched>,
) {
    if table.current_id(key) != Some(id) {
        // Superseded: a later bind owns the slot now. Report, touch nothing.
        trace!("load {id} superseded, discarding result");
        metrics::counter!("loads_superseded").increment(1);
        if let Some(on_complete) = on_complete {
            on_complete(Err(Error::Stale(Box::new(result.map_err(Error::Fetch)))));
        }
        return;
    }

    table.clear(key);

    match result {
        Ok(fetched) => {
            trace!("load {id} complete: {}", fetched.source);
            metrics::counter!("loads_completed").increment(1);
            if let Some(target) = target.upgrade() {
                target.set_content(Some(fetched.image.clone()));
            }
            if let Some(on_complete) = on_complete {
                on_complete(Ok(fetched));
            }
        }
        Err(e) => {
            if matches!(e, fetch::Error::Cancelled) {
                trace!("load {id} cancelled");
                metrics::counter!("loads_cancelled").increment(1);
            } else {
                warn!("load {id} failed: {e}");
                metrics::counter!("loads_failed").increment(1);
            }
            if failure_image.is_some() {
                if let Some(target) = target.upgrade() {
                    target.set_content(failure_image);
                }
            }
            if let Some(on_complete) = on_complete {
                on_complete(Err(e.into()));
            }
        }
    }
}

fn describe_metrics() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        metrics::describe_counter!(
            "bind_requests",
            metrics::Unit::Count,
            "Total number of bind requests"
        );
        metrics::describe_counter!(
            "bind_empty_source",
            metrics::Unit::Count,
            "Total number of bind requests submitted without a source"
        );
        metrics::describe_counter!(
            "loads_started",
            metrics::Unit::Count,
            "Total number of fetches started"
        );
        metrics::describe_counter!(
            "loads_completed",
            metrics::Unit::Count,
            "Total number of loads completed successfully"
        );
        metrics::describe_counter!(
            "loads_failed",
            metrics::Unit::Count,
            "Total number of loads that failed"
        );
        metrics::describe_counter!(
            "loads_cancelled",
            metrics::Unit::Count,
            "Total number of loads cancelled before completion"
        );
        metrics::describe_counter!(
            "loads_superseded",
            metrics::Unit::Count,
            "Total number of completions discarded because a later bind superseded them"
        );
    });
}
