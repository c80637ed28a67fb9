//! State-machine tests for the binder, driven by a scripted fetcher and a
//! manually pumped main queue so every interleaving is deterministic.

use easel_async::{MainPump, main_queue};
use easel_bind::{
    Bytes,
    binder::{Binder, Error},
    config::Config,
    fetch::{self, Fetched, Origin, Progress},
    image::Image,
    request::{Options, Request},
    source::Source,
    target::{SlotCell, Target},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

/// A fetcher whose fetches complete only when the test says so.
struct ScriptedFetcher {
    fetches: Mutex<Vec<ScriptedFetch>>,
    provide_handles: bool,
}

struct ScriptedFetch {
    source: Source,
    sink: Arc<dyn fetch::Sink>,
    handle: Arc<ScriptedHandle>,
}

#[derive(Default)]
struct ScriptedHandle {
    cancelled: AtomicBool,
}

impl ScriptedHandle {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fetch::Handle for ScriptedHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl ScriptedFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fetches: Mutex::new(Vec::new()),
            provide_handles: true,
        })
    }

    /// A fetcher that resolves its task handles asynchronously: `fetch`
    /// returns `None` and the handle only arrives via
    /// [`release_handle`](Self::release_handle).
    fn deferred() -> Arc<Self> {
        Arc::new(Self {
            fetches: Mutex::new(Vec::new()),
            provide_handles: false,
        })
    }

    fn count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    fn source(&self, index: usize) -> Source {
        self.fetches.lock().unwrap()[index].source.clone()
    }

    fn sink(&self, index: usize) -> Arc<dyn fetch::Sink> {
        self.fetches.lock().unwrap()[index].sink.clone()
    }

    fn handle(&self, index: usize) -> Arc<ScriptedHandle> {
        self.fetches.lock().unwrap()[index].handle.clone()
    }

    fn release_handle(&self, index: usize) {
        let (sink, handle) = {
            let fetch = &self.fetches.lock().unwrap()[index];
            (fetch.sink.clone(), fetch.handle.clone())
        };
        sink.on_task(handle);
    }

    fn succeed(&self, index: usize, tag: u8) {
        let source = self.source(index);
        self.sink(index).on_complete(Ok(Fetched {
            image: image(tag),
            source,
            origin: Origin::Network,
        }));
    }

    fn fail(&self, index: usize, error: fetch::Error) {
        self.sink(index).on_complete(Err(error));
    }
}

impl fetch::Fetcher for ScriptedFetcher {
    fn fetch(
        &self,
        source: Source,
        _options: Options,
        sink: Arc<dyn fetch::Sink>,
    ) -> Option<Arc<dyn fetch::Handle>> {
        let handle = Arc::new(ScriptedHandle::default());
        self.fetches.lock().unwrap().push(ScriptedFetch {
            source,
            sink,
            handle: handle.clone(),
        });
        if self.provide_handles {
            Some(handle)
        } else {
            None
        }
    }
}

type Outcome = Arc<Mutex<Option<easel_bind::binder::Result<Fetched>>>>;

fn capture() -> (
    Outcome,
    impl FnOnce(easel_bind::binder::Result<Fetched>) + Send + 'static,
) {
    let outcome: Outcome = Arc::new(Mutex::new(None));
    let cell = outcome.clone();
    (outcome, move |result| {
        *cell.lock().unwrap() = Some(result);
    })
}

fn image(tag: u8) -> Image {
    Image::new(1, 1, Bytes::from(vec![tag]))
}

fn setup_with(fetcher: Arc<ScriptedFetcher>) -> (Binder, MainPump, Arc<ScriptedFetcher>) {
    let (queue, pump) = main_queue();
    let binder = Binder::new(
        Config {
            fetcher: Some(fetcher.clone()),
            ..Default::default()
        },
        queue,
    );
    (binder, pump, fetcher)
}

fn setup() -> (Binder, MainPump, Arc<ScriptedFetcher>) {
    setup_with(ScriptedFetcher::new())
}

fn target() -> Arc<dyn Target> {
    SlotCell::new()
}

#[test]
fn successful_load_fills_slot_and_clears_state() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let src = Source::url("https://example.com/a.png");
    let (outcome, on_complete) = capture();

    let task = binder.bind(
        &t,
        Request::builder()
            .source(src.clone())
            .on_complete(on_complete)
            .build(),
    );

    assert!(task.is_some());
    assert!(binder.is_loading(&t));
    assert_eq!(fetcher.count(), 1);
    assert_eq!(fetcher.source(0), src);

    fetcher.succeed(0, 1);
    pump.pump();

    assert_eq!(t.content(), Some(image(1)));
    assert!(!binder.is_loading(&t));
    assert!(binder.current_task(&t).is_none());
    match outcome.lock().unwrap().take() {
        Some(Ok(fetched)) => {
            assert_eq!(fetched.image, image(1));
            assert_eq!(fetched.source, src);
            assert_eq!(fetched.origin, Origin::Network);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn newest_bind_wins_even_when_old_completes_last() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let (outcome_a, complete_a) = capture();
    let (outcome_b, complete_b) = capture();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .on_complete(complete_a)
            .build(),
    );
    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/b.png"))
            .on_complete(complete_b)
            .build(),
    );
    assert_eq!(fetcher.count(), 2);

    // The newer load completes first...
    fetcher.succeed(1, 2);
    pump.pump();
    assert_eq!(t.content(), Some(image(2)));
    assert!(!binder.is_loading(&t));

    // ...and the older one arriving afterwards must not touch the slot
    fetcher.succeed(0, 1);
    pump.pump();
    assert_eq!(t.content(), Some(image(2)));

    match outcome_b.lock().unwrap().take() {
        Some(Ok(fetched)) => assert_eq!(fetched.image, image(2)),
        other => panic!("expected success, got {other:?}"),
    }
    match outcome_a.lock().unwrap().take() {
        Some(Err(Error::Stale(original))) => match *original {
            Ok(fetched) => assert_eq!(fetched.image, image(1)),
            other => panic!("expected wrapped success, got {other:?}"),
        },
        other => panic!("expected stale, got {other:?}"),
    }
}

#[test]
fn only_the_latest_of_many_binds_applies() {
    let (binder, pump, fetcher) = setup();
    let t = target();

    for i in 0..3 {
        binder.bind(
            &t,
            Request::builder()
                .source(Source::url(format!("https://example.com/{i}.png")))
                .build(),
        );
    }

    fetcher.succeed(2, 3);
    pump.pump();
    assert_eq!(t.content(), Some(image(3)));

    // Late completions from superseded binds, in any order
    fetcher.succeed(0, 1);
    fetcher.succeed(1, 2);
    pump.pump();
    assert_eq!(t.content(), Some(image(3)));
    assert!(!binder.is_loading(&t));
}

#[test]
fn empty_source_is_synchronous_and_terminal() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let (outcome, on_complete) = capture();

    let task = binder.bind(
        &t,
        Request::builder()
            .placeholder(image(7))
            .on_complete(on_complete)
            .build(),
    );

    // Delivered before bind returned, with no task and no fetch
    assert!(task.is_none());
    assert!(matches!(
        outcome.lock().unwrap().take(),
        Some(Err(Error::EmptySource))
    ));
    assert_eq!(t.content(), Some(image(7)));
    assert_eq!(fetcher.count(), 0);
    assert!(!binder.is_loading(&t));
    assert_eq!(pump.pump(), 0);
}

#[test]
fn empty_source_without_placeholder_leaves_slot() {
    let (binder, _pump, _fetcher) = setup();
    let t = target();
    t.set_content(Some(image(3)));

    let (outcome, on_complete) = capture();
    binder.bind(&t, Request::builder().on_complete(on_complete).build());

    assert_eq!(t.content(), Some(image(3)));
    assert!(matches!(
        outcome.lock().unwrap().take(),
        Some(Err(Error::EmptySource))
    ));
}

#[test]
fn empty_source_supersedes_pending_load() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let (outcome_a, complete_a) = capture();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .on_complete(complete_a)
            .build(),
    );
    assert!(binder.is_loading(&t));

    binder.bind(&t, Request::builder().build());
    assert!(!binder.is_loading(&t));

    // The superseded load's completion is discarded
    fetcher.succeed(0, 1);
    pump.pump();
    assert_eq!(t.content(), None);
    assert!(
        outcome_a
            .lock()
            .unwrap()
            .take()
            .is_some_and(|r| r.is_err_and(|e| e.is_stale()))
    );
}

#[test]
fn placeholder_overwrites_slot_by_default() {
    let (binder, _pump, _fetcher) = setup();
    let t = target();
    t.set_content(Some(image(1)));

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .placeholder(image(2))
            .build(),
    );
    assert_eq!(t.content(), Some(image(2)));
}

#[test]
fn keep_current_holds_placeholder_back_while_slot_filled() {
    let (binder, _pump, _fetcher) = setup();
    let t = target();
    t.set_content(Some(image(1)));

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .placeholder(image(2))
            .keep_current_while_loading()
            .build(),
    );
    assert_eq!(t.content(), Some(image(1)));
}

#[test]
fn keep_current_still_applies_placeholder_to_empty_slot() {
    let (binder, _pump, _fetcher) = setup();
    let t = target();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .placeholder(image(2))
            .keep_current_while_loading()
            .build(),
    );
    assert_eq!(t.content(), Some(image(2)));
}

#[test]
fn forced_placeholder_class_ignores_keep_current() {
    let (binder, _pump, _fetcher) = setup();
    let t: Arc<dyn Target> = SlotCell::always_placeholder();
    t.set_content(Some(image(1)));

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .placeholder(image(2))
            .keep_current_while_loading()
            .build(),
    );
    assert_eq!(t.content(), Some(image(2)));
}

#[test]
fn rebind_without_placeholder_clears_slot() {
    let (binder, _pump, _fetcher) = setup();
    let t = target();
    t.set_content(Some(image(1)));

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .build(),
    );
    assert_eq!(t.content(), None);
}

#[test]
fn failure_applies_fallback_image() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let src = Source::url("https://example.com/a.png");
    let (outcome, on_complete) = capture();

    binder.bind(
        &t,
        Request::builder()
            .source(src.clone())
            .failure_image(image(9))
            .on_complete(on_complete)
            .build(),
    );

    fetcher.fail(0, fetch::Error::NotFound(src));
    pump.pump();

    assert_eq!(t.content(), Some(image(9)));
    assert!(!binder.is_loading(&t));
    match outcome.lock().unwrap().take() {
        Some(Err(error)) => {
            assert!(matches!(
                error,
                Error::Fetch(fetch::Error::NotFound(_))
            ));
            assert!(!error.is_stale());
            assert!(!error.is_cancelled());
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn failure_without_fallback_keeps_placeholder() {
    let (binder, pump, fetcher) = setup();
    let t = target();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .placeholder(image(7))
            .build(),
    );

    fetcher.fail(0, fetch::Error::Internal("decode failed".to_string().into()));
    pump.pump();

    assert_eq!(t.content(), Some(image(7)));
    assert!(!binder.is_loading(&t));
}

#[test]
fn cancel_is_a_noop_when_idle() {
    let (binder, _pump, _fetcher) = setup();
    let t = target();

    binder.cancel(&t);
    binder.cancel(&t);
    assert!(!binder.is_loading(&t));
}

#[test]
fn cancel_signals_task_and_completes_through_normal_path() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let (outcome, on_complete) = capture();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .on_complete(on_complete)
            .build(),
    );

    binder.cancel(&t);
    assert!(fetcher.handle(0).is_cancelled());

    // Cancellation is cooperative: state stays pending until the fetch
    // reports back
    assert!(binder.is_loading(&t));

    fetcher.fail(0, fetch::Error::Cancelled);
    pump.pump();

    assert!(!binder.is_loading(&t));
    assert!(
        outcome
            .lock()
            .unwrap()
            .take()
            .is_some_and(|r| r.is_err_and(|e| e.is_cancelled()))
    );

    // Cancelling again after completion is a no-op
    binder.cancel(&t);
}

#[test]
fn deferred_handle_is_recorded_via_on_task() {
    let (binder, pump, fetcher) = setup_with(ScriptedFetcher::deferred());
    let t = target();

    let task = binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .build(),
    );
    assert!(task.is_none());
    assert!(binder.current_task(&t).is_none());

    fetcher.release_handle(0);
    pump.pump();
    assert!(binder.current_task(&t).is_some());

    binder.cancel(&t);
    assert!(fetcher.handle(0).is_cancelled());
}

#[test]
fn late_handle_for_superseded_bind_is_dropped() {
    let (binder, pump, fetcher) = setup_with(ScriptedFetcher::deferred());
    let t = target();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .build(),
    );
    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/b.png"))
            .build(),
    );

    // The first bind's handle arrives after it has been superseded
    fetcher.release_handle(0);
    pump.pump();
    assert!(binder.current_task(&t).is_none());

    fetcher.release_handle(1);
    pump.pump();
    assert!(binder.current_task(&t).is_some());
}

#[test]
fn progress_observers_fire_in_registration_order() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = log.clone();
    let second = log.clone();
    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .observe_progress(move |p| first.lock().unwrap().push(("options", p.received)))
            .on_progress(move |p| second.lock().unwrap().push(("request", p.received)))
            .build(),
    );

    fetcher.sink(0).on_progress(Progress {
        received: 5,
        total: Some(10),
    });
    pump.pump();

    assert_eq!(*log.lock().unwrap(), vec![("options", 5), ("request", 5)]);
}

#[test]
fn partial_content_applies_directly_to_slot() {
    let (binder, pump, fetcher) = setup();
    let t = target();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .build(),
    );

    fetcher.sink(0).on_partial(image(4));
    pump.pump();
    assert_eq!(t.content(), Some(image(4)));
    assert!(binder.is_loading(&t));

    fetcher.succeed(0, 5);
    pump.pump();
    assert_eq!(t.content(), Some(image(5)));
}

#[test]
fn reference_check_flips_on_rebind() {
    let (binder, _pump, fetcher) = setup();
    let t = target();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .build(),
    );
    assert!(fetcher.sink(0).is_current());

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/b.png"))
            .build(),
    );
    assert!(!fetcher.sink(0).is_current());
    assert!(fetcher.sink(1).is_current());
}

#[test]
fn target_dropped_midflight_still_reports_completion() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let (outcome, on_complete) = capture();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .on_complete(on_complete)
            .build(),
    );
    drop(t);

    fetcher.succeed(0, 1);
    pump.pump();

    assert!(matches!(outcome.lock().unwrap().take(), Some(Ok(_))));
}

#[test]
fn rebind_after_completion_starts_fresh() {
    let (binder, pump, fetcher) = setup();
    let t = target();

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .build(),
    );
    fetcher.succeed(0, 1);
    pump.pump();
    assert_eq!(t.content(), Some(image(1)));

    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/b.png"))
            .build(),
    );
    assert_eq!(fetcher.count(), 2);
    fetcher.succeed(1, 2);
    pump.pump();
    assert_eq!(t.content(), Some(image(2)));
}

#[test]
fn cancel_all_signals_every_pending_task() {
    let (binder, _pump, fetcher) = setup();
    let a = target();
    let b = target();

    binder.bind(
        &a,
        Request::builder()
            .source(Source::url("https://example.com/a.png"))
            .build(),
    );
    binder.bind(
        &b,
        Request::builder()
            .source(Source::url("https://example.com/b.png"))
            .build(),
    );

    binder.cancel_all();
    assert!(fetcher.handle(0).is_cancelled());
    assert!(fetcher.handle(1).is_cancelled());
}

#[test]
fn stale_wraps_original_error() {
    let (binder, pump, fetcher) = setup();
    let t = target();
    let src_a = Source::url("https://example.com/a.png");
    let (outcome_a, complete_a) = capture();

    binder.bind(
        &t,
        Request::builder()
            .source(src_a.clone())
            .on_complete(complete_a)
            .build(),
    );
    binder.bind(
        &t,
        Request::builder()
            .source(Source::url("https://example.com/b.png"))
            .build(),
    );

    fetcher.fail(0, fetch::Error::NotFound(src_a));
    pump.pump();

    match outcome_a.lock().unwrap().take() {
        Some(Err(Error::Stale(original))) => {
            assert!(matches!(
                *original,
                Err(Error::Fetch(fetch::Error::NotFound(_)))
            ));
        }
        other => panic!("expected stale, got {other:?}"),
    }

    fetcher.succeed(1, 2);
    pump.pump();
    assert_eq!(t.content(), Some(image(2)));
}
