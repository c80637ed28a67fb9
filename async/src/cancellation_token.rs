//! CancellationToken abstraction for runtime-agnostic cancellation signaling.
//!
//! Currently wraps `tokio_util::sync::CancellationToken`. When alternative
//! runtime support is added, this will be feature-gated to provide the
//! appropriate cancellation primitive.

/// A token for cooperative cancellation of async operations.
///
/// # Key Methods
///
/// - `new()` - Create a new cancellation token
/// - `child_token()` - Create a child token that cancels when the parent does
/// - `cancel()` - Signal cancellation
/// - `cancelled()` - Returns a future that completes when cancelled
/// - `is_cancelled()` - Check if cancellation has been requested
///
/// Child tokens are how a single in-flight fetch is cancelled without
/// tearing down the pool that runs it.
#[cfg(feature = "tokio")]
pub type CancellationToken = tokio_util::sync::CancellationToken;
