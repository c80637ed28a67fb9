//! Binds asynchronous image loads to reusable display slots.
//!
//! A display slot (a grid cell, a list row, an avatar view) outlives any one
//! piece of content: it is rebound every time the row is recycled. The
//! hazard is the old, still-in-flight load completing after the new one and
//! clobbering the slot. [`binder::Binder`] issues a fresh [`TaskId`] per
//! bind, records it against the target, and discards any completion whose
//! identifier is no longer current: only the most recent bind may mutate
//! the slot, no matter how late earlier completions arrive.
//!
//! Fetching itself is delegated to a [`fetch::Fetcher`]: cache lookup,
//! transport, and decode all live behind that boundary. The binder's job is
//! purely the coordination of overlapping, cancellable loads against a
//! single mutable target.
//!
//! All entry points must be invoked from the thread that drives the
//! [`easel_async::MainPump`]; completion and progress callbacks are always
//! delivered back on that same thread.

pub mod binder;
pub mod config;
pub mod fetch;
#[cfg(feature = "tokio")]
pub mod fetch_mem;
pub mod image;
pub mod request;
pub mod source;
pub mod target;

mod binding_table;
mod task_id;

use std::sync::{Arc, Mutex, Weak};
use trace_err::*;
use tracing::{trace, warn};

// Re-export for consistency
pub use bytes::Bytes;
pub use task_id::TaskId;
