use super::*;
use crate::target::{Target, target_key};
use std::collections::HashMap;

struct Entry {
    target: Weak<dyn Target>,
    id: TaskId,
    task: Option<Arc<dyn fetch::Handle>>,
}

/// Per-target binding state, keyed by target identity.
///
/// An entry exists exactly while a load is pending for its target, so the
/// "current identifier" of an unbound or idle target is simply absent. The
/// table never keeps a target alive: entries hold a `Weak` reference and
/// dead targets are swept by [`prune`](BindingTable::prune).
///
/// Guarded by a mutex because the reference-check predicate reads the
/// current identifier from worker threads; all writes happen on the
/// UI-affine queue.
pub(crate) struct BindingTable {
    entries: Mutex<HashMap<usize, Entry>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self {
            entries: Default::default(),
        }
    }

    /// The current identifier for the target, if a load is pending.
    pub fn current_id(&self, key: usize) -> Option<TaskId> {
        self.entries
            .lock()
            .trace_expect("Failed to lock mutex")
            .get(&key)
            .map(|e| e.id)
    }

    /// The current in-flight handle for the target, if known.
    pub fn current_task(&self, key: usize) -> Option<Arc<dyn fetch::Handle>> {
        self.entries
            .lock()
            .trace_expect("Failed to lock mutex")
            .get(&key)
            .and_then(|e| e.task.clone())
    }

    /// Upserts the entry for a fresh bind: new identifier, no task yet.
    pub fn begin(&self, target: &Arc<dyn Target>, id: TaskId) {
        self.entries
            .lock()
            .trace_expect("Failed to lock mutex")
            .insert(
                target_key(target),
                Entry {
                    target: Arc::downgrade(target),
                    id,
                    task: None,
                },
            );
    }

    /// Records the in-flight handle, unless `id` has been superseded in the
    /// interval between the starting call and the handle becoming available.
    /// A handle for a superseded bind is dropped, not retained.
    pub fn set_task(&self, key: usize, id: TaskId, task: Arc<dyn fetch::Handle>) {
        let mut entries = self.entries.lock().trace_expect("Failed to lock mutex");
        if let Some(e) = entries.get_mut(&key) {
            if e.id == id {
                e.task = Some(task);
            }
        }
    }

    /// Returns the binding to idle.
    pub fn clear(&self, key: usize) {
        self.entries
            .lock()
            .trace_expect("Failed to lock mutex")
            .remove(&key);
    }

    /// Every pending task handle, for teardown sweeps.
    pub fn tasks(&self) -> Vec<Arc<dyn fetch::Handle>> {
        self.entries
            .lock()
            .trace_expect("Failed to lock mutex")
            .values()
            .filter_map(|e| e.task.clone())
            .collect()
    }

    /// Drops entries whose target has been destroyed.
    pub fn prune(&self) {
        self.entries
            .lock()
            .trace_expect("Failed to lock mutex")
            .retain(|_, e| e.target.strong_count() > 0);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().trace_expect("Failed to lock mutex").len()
    }
}
