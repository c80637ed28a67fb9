use super::*;
use crate::image::Image;
use crate::request::Options;
use crate::source::Source;
use thiserror::Error;

/// A specialized `Result` type for fetch operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced by a fetcher.
#[derive(Debug, Error)]
pub enum Error {
    /// The load was cancelled before a terminal result was produced.
    #[error("load cancelled")]
    Cancelled,

    /// The fetcher has no content for the source.
    #[error("no content for {0}")]
    NotFound(Source),

    /// The fetcher does not understand the source descriptor.
    #[error("unsupported source {0}")]
    UnsupportedSource(Source),

    /// An internal fetcher error occurred.
    #[error(transparent)]
    Internal(#[from] Box<dyn core::error::Error + Send + Sync>),
}

/// Forward progress of an in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes received so far.
    pub received: u64,
    /// Total expected, when the transport knows it.
    pub total: Option<u64>,
}

/// Where a successful fetch was served from. Diagnostic passthrough only;
/// the binder treats all origins alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Network,
    Cache,
}

/// Terminal payload of a successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub image: Image,
    pub source: Source,
    pub origin: Origin,
}

/// Handle to one in-flight fetch.
pub trait Handle: Send + Sync {
    /// Signals the fetch to stop.
    ///
    /// Cooperative: the fetch still delivers a terminal result (normally
    /// [`Error::Cancelled`]) through [`Sink::on_complete`]. Safe to call on
    /// a fetch that has already finished.
    fn cancel(&self);
}

/// The callback surface handed to a fetcher for one fetch.
///
/// Methods may be invoked from any thread; the binder marshals onto its
/// UI-affine queue internally. `on_complete` must be invoked exactly once
/// per fetch; `on_partial` and `on_progress` zero or more times, strictly
/// before it.
pub trait Sink: Send + Sync {
    /// The in-flight handle is known. May lag the `fetch` call when the
    /// fetcher resolves its task asynchronously.
    fn on_task(&self, task: Arc<dyn Handle>);

    /// Transport progress.
    fn on_progress(&self, progress: Progress);

    /// Partial decoded content, for progressively-decoded formats.
    ///
    /// Must only be delivered for the currently-initiated fetch: poll
    /// [`is_current`](Sink::is_current) and stop once it reports false. The
    /// binder applies partial content to the slot without re-checking the
    /// task identifier.
    fn on_partial(&self, image: Image);

    /// Whether this fetch is still the current one for its target.
    fn is_current(&self) -> bool;

    /// Delivers the one terminal result of the fetch.
    fn on_complete(&self, result: Result<Fetched>);
}

/// The external resource manager: cache lookup, transport, and decode all
/// live behind this boundary.
pub trait Fetcher: Send + Sync {
    /// Begins fetching `source`.
    ///
    /// Must not block: implementations hand the work to their own
    /// concurrency context and report back through `sink`.
    ///
    /// Returns the in-flight handle when one is immediately available;
    /// fetchers that resolve the handle later return `None` here and deliver
    /// it via [`Sink::on_task`].
    fn fetch(
        &self,
        source: Source,
        options: Options,
        sink: Arc<dyn Sink>,
    ) -> Option<Arc<dyn Handle>>;
}
