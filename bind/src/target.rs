use super::*;
use crate::image::Image;

/// Capability interface for anything that can host bound content.
///
/// A target owns exactly one display slot and is reused across many logical
/// contents over its lifetime. Implementations are free to back the slot
/// however they like (a widget property, a texture handle, a cell of a
/// recycled row); the binder only needs get/set access plus the per-class
/// placeholder flag.
///
/// The slot must not be mutated by anything other than the binder while a
/// load is pending for this target; the interleaving is undefined if it is.
pub trait Target: Send + Sync {
    /// Current content of the display slot.
    fn content(&self) -> Option<Image>;

    /// Replaces the content of the display slot. `None` clears it.
    fn set_content(&self, content: Option<Image>);

    /// Whether this target's class always shows the placeholder while
    /// loading, overriding
    /// [`keep_current_while_loading`](crate::request::Options::keep_current_while_loading).
    /// Fixed per target class, not per request.
    fn forces_placeholder(&self) -> bool {
        false
    }
}

/// A minimal owned [`Target`]: one mutex-guarded slot.
///
/// For hosts without their own widget state, and for tests.
pub struct SlotCell {
    content: Mutex<Option<Image>>,
    forces_placeholder: bool,
}

impl SlotCell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            content: Mutex::new(None),
            forces_placeholder: false,
        })
    }

    /// A slot whose class always shows the placeholder while loading.
    pub fn always_placeholder() -> Arc<Self> {
        Arc::new(Self {
            content: Mutex::new(None),
            forces_placeholder: true,
        })
    }
}

impl Target for SlotCell {
    fn content(&self) -> Option<Image> {
        self.content
            .lock()
            .trace_expect("Failed to lock mutex")
            .clone()
    }

    fn set_content(&self, content: Option<Image>) {
        *self.content.lock().trace_expect("Failed to lock mutex") = content;
    }

    fn forces_placeholder(&self) -> bool {
        self.forces_placeholder
    }
}

// Identity key for the binding table: the pointer identity of the target
// allocation, stable for the target's lifetime.
pub(crate) fn target_key(target: &Arc<dyn Target>) -> usize {
    Arc::as_ptr(target) as *const () as usize
}
