use super::*;
use crate::image::Image;
use crate::source::Source;

/// An ordered progress observer. Invoked on the UI-affine queue.
pub type ProgressFn = Arc<dyn Fn(&fetch::Progress) + Send + Sync>;

/// A one-shot completion callback.
///
/// Invoked on the UI-affine queue, except for the synchronous empty-source
/// outcome, which is delivered before `bind` returns.
pub type CompleteFn = Box<dyn FnOnce(binder::Result<fetch::Fetched>) + Send>;

/// Options governing one load.
#[derive(Clone, Default)]
pub struct Options {
    /// Leave existing slot content in place while the load is in flight,
    /// instead of overwriting it with the placeholder. Ignored when the slot
    /// is empty, and on target classes that force placeholder display.
    pub keep_current_while_loading: bool,

    /// Fallback applied to the slot on terminal failure. When unset, the
    /// slot keeps whatever the placeholder step left there.
    pub failure_image: Option<Image>,

    /// Progress observers, invoked in registration order. A request's
    /// `on_progress` is appended to this list; composition is additive,
    /// never replacing.
    pub progress_observers: Vec<ProgressFn>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field(
                "keep_current_while_loading",
                &self.keep_current_while_loading,
            )
            .field("failure_image", &self.failure_image)
            .field("progress_observers", &self.progress_observers.len())
            .finish()
    }
}

/// A single load request. Immutable once submitted.
pub struct Request {
    /// What to load. `None` is an explicit "no source" request: the bind is
    /// terminal on the spot and no task is created.
    pub source: Option<Source>,

    /// Shown while the load is in flight, subject to the placeholder policy
    /// in [`Options::keep_current_while_loading`].
    pub placeholder: Option<Image>,

    pub options: Options,

    pub on_progress: Option<ProgressFn>,

    pub on_complete: Option<CompleteFn>,
}

impl Request {
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("source", &self.source)
            .field("placeholder", &self.placeholder)
            .field("options", &self.options)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Chained builder for [`Request`].
pub struct Builder {
    request: Request,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            request: Request {
                source: None,
                placeholder: None,
                options: Options::default(),
                on_progress: None,
                on_complete: None,
            },
        }
    }

    pub fn source(mut self, source: Source) -> Self {
        self.request.source = Some(source);
        self
    }

    pub fn placeholder(mut self, placeholder: Image) -> Self {
        self.request.placeholder = Some(placeholder);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.request.options = options;
        self
    }

    pub fn keep_current_while_loading(mut self) -> Self {
        self.request.options.keep_current_while_loading = true;
        self
    }

    pub fn failure_image(mut self, image: Image) -> Self {
        self.request.options.failure_image = Some(image);
        self
    }

    /// Appends a progress observer to the options' ordered list.
    pub fn observe_progress(
        mut self,
        observer: impl Fn(&fetch::Progress) + Send + Sync + 'static,
    ) -> Self {
        self.request
            .options
            .progress_observers
            .push(Arc::new(observer));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&fetch::Progress) + Send + Sync + 'static) -> Self {
        self.request.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_complete(
        mut self,
        f: impl FnOnce(binder::Result<fetch::Fetched>) + Send + 'static,
    ) -> Self {
        self.request.on_complete = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
