//! Runtime plumbing for the easel load-binding coordinator.
//!
//! This crate provides the concurrency primitives the binder is built on,
//! abstracted so the coordination logic never names a runtime directly:
//!
//! - **MainQueue / MainPump**: an explicit "marshal onto the UI-affine
//!   thread" primitive. All binding state and display-slot mutation funnels
//!   through one consumer.
//! - **TaskPool**: manages cancellable worker tasks with graceful shutdown.
//! - **CancellationToken / JoinHandle**: abstracted handle types for runtime
//!   portability.
//!
//! # Example
//!
//! ```no_run
//! let (queue, pump) = easel_async::main_queue();
//!
//! // Any thread can post work...
//! queue.post(|| println!("on the main thread"));
//!
//! // ...which only runs when the owning thread drains the pump.
//! pump.pump();
//! ```

pub mod main_queue;

#[cfg(feature = "tokio")]
pub mod cancellation_token;
#[cfg(feature = "tokio")]
pub mod join_handle;
#[cfg(feature = "tokio")]
pub mod task_pool;

// Re-export commonly used types at crate root
pub use main_queue::{MainPump, MainQueue, main_queue};

#[cfg(feature = "tokio")]
pub use cancellation_token::CancellationToken;
#[cfg(feature = "tokio")]
pub use join_handle::JoinHandle;
#[cfg(feature = "tokio")]
pub use task_pool::TaskPool;
