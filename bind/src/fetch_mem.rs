use super::*;
use crate::image::Image;
use crate::request::Options;
use crate::source::Source;
use easel_async::{CancellationToken, TaskPool};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Simulated transport latency per fetch.
    pub latency: Duration,

    /// Number of progressive partial frames emitted before completion.
    pub partial_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            partial_frames: 0,
        }
    }
}

struct Inner {
    entries: HashMap<Source, core::result::Result<Image, String>>,
}

/// An in-memory fetcher.
///
/// Serves content preloaded with [`insert`](Fetcher::insert) /
/// [`insert_error`](Fetcher::insert_error), optionally simulating transport
/// latency and progressive decode. Each fetch runs on the fetcher's task
/// pool with its own child cancellation token, honors the binder's
/// reference-check predicate, and reports [`Cancelled`](fetch::Error::Cancelled)
/// when cancelled: the same contract a real transport-backed fetcher must
/// implement. Not a cache: the default fetcher for hosts that preload their
/// content, and the reference implementation for tests.
pub struct Fetcher {
    inner: Mutex<Inner>,
    pool: TaskPool,
    latency: Duration,
    partial_frames: usize,
}

pub fn new(config: &Config) -> Arc<Fetcher> {
    Arc::new(Fetcher {
        inner: Mutex::new(Inner {
            entries: HashMap::new(),
        }),
        pool: TaskPool::new(),
        latency: config.latency,
        partial_frames: config.partial_frames,
    })
}

impl Fetcher {
    /// Preloads content for `source`.
    pub fn insert(&self, source: Source, image: Image) {
        self.inner
            .lock()
            .trace_expect("Failed to lock mutex")
            .entries
            .insert(source, Ok(image));
    }

    /// Preloads a failure for `source`.
    pub fn insert_error(&self, source: Source, message: impl Into<String>) {
        self.inner
            .lock()
            .trace_expect("Failed to lock mutex")
            .entries
            .insert(source, Err(message.into()));
    }

    /// Cancels outstanding fetches and waits for the workers to finish.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

struct Handle {
    cancel: CancellationToken,
}

impl fetch::Handle for Handle {
    fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl fetch::Fetcher for Fetcher {
    fn fetch(
        &self,
        source: Source,
        _options: Options,
        sink: Arc<dyn fetch::Sink>,
    ) -> Option<Arc<dyn fetch::Handle>> {
        let outcome = self
            .inner
            .lock()
            .trace_expect("Failed to lock mutex")
            .entries
            .get(&source)
            .cloned();

        let cancel = self.pool.child_token();
        let handle: Arc<dyn fetch::Handle> = Arc::new(Handle {
            cancel: cancel.clone(),
        });
        sink.on_task(handle.clone());

        let latency = self.latency;
        let partial_frames = self.partial_frames;
        self.pool.spawn(async move {
            run_fetch(source, outcome, sink, cancel, latency, partial_frames).await;
        });

        Some(handle)
    }
}

async fn run_fetch(
    source: Source,
    outcome: Option<core::result::Result<Image, String>>,
    sink: Arc<dyn fetch::Sink>,
    cancel: CancellationToken,
    latency: Duration,
    partial_frames: usize,
) {
    // Simulated transport delay, interruptible
    if !latency.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(latency) => {}
            _ = cancel.cancelled() => {
                sink.on_complete(Err(fetch::Error::Cancelled));
                return;
            }
        }
    }
    if cancel.is_cancelled() {
        sink.on_complete(Err(fetch::Error::Cancelled));
        return;
    }

    let image = match outcome {
        Some(Ok(image)) => image,
        Some(Err(message)) => {
            sink.on_complete(Err(fetch::Error::Internal(message.into())));
            return;
        }
        None => {
            sink.on_complete(Err(fetch::Error::NotFound(source)));
            return;
        }
    };

    let total = image.data().len() as u64;
    sink.on_progress(fetch::Progress {
        received: 0,
        total: Some(total),
    });

    // Progressive frames, stopping as soon as the binder reports this fetch
    // is no longer current
    for frame in 1..=partial_frames {
        if cancel.is_cancelled() {
            sink.on_complete(Err(fetch::Error::Cancelled));
            return;
        }
        if !sink.is_current() {
            break;
        }
        sink.on_partial(image.clone());
        sink.on_progress(fetch::Progress {
            received: total * frame as u64 / (partial_frames as u64 + 1),
            total: Some(total),
        });
        tokio::task::yield_now().await;
    }

    sink.on_progress(fetch::Progress {
        received: total,
        total: Some(total),
    });
    sink.on_complete(Ok(fetch::Fetched {
        image,
        source,
        origin: fetch::Origin::Cache,
    }));
}
