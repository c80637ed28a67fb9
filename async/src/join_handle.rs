//! JoinHandle abstraction for runtime-agnostic task handles.
//!
//! Currently wraps `tokio::task::JoinHandle`. When alternative runtime
//! support is added, this will be feature-gated to provide the appropriate
//! handle type.

/// A handle to a spawned task that can be awaited for its result.
#[cfg(feature = "tokio")]
pub type JoinHandle<T> = tokio::task::JoinHandle<T>;
