//! The UI-affine job queue.
//!
//! A display slot is owned by a single logical thread, the one that drives
//! the UI. Worker contexts must never touch it directly; instead they post
//! closures here and the owning thread runs them in posting order. This
//! makes the "marshal onto the UI context" step an explicit primitive
//! rather than an implicit thread-confinement convention.
//!
//! [`main_queue`] splits the contract in two: a cloneable, `Send`
//! [`MainQueue`] handle for posting, and a single [`MainPump`] consumer
//! owned by the driving thread.
//!
//! # Example
//!
//! ```
//! let (queue, pump) = easel_async::main_queue();
//!
//! std::thread::spawn(move || {
//!     queue.post(|| println!("runs on the pumping thread"));
//! })
//! .join()
//! .unwrap();
//!
//! // Hosts with their own event loop call this once per frame or wakeup
//! pump.pump();
//! ```
//!
//! Tokio hosts hand the pump to [`MainPump::run`], which drains jobs until
//! a cancellation token fires.

use tracing::trace;

type Job = Box<dyn FnOnce() + Send>;

/// Posting half of the UI-affine job queue.
///
/// Cheap to clone and safe to share with any worker context. Jobs posted
/// from a single thread run in posting order.
#[derive(Clone)]
pub struct MainQueue {
    tx: flume::Sender<Job>,
}

/// Consumer half of the UI-affine job queue.
///
/// Exactly one exists per queue; whichever thread holds it is, by
/// definition, the UI-affine thread.
pub struct MainPump {
    rx: flume::Receiver<Job>,
}

/// Creates a connected [`MainQueue`]/[`MainPump`] pair.
pub fn main_queue() -> (MainQueue, MainPump) {
    let (tx, rx) = flume::unbounded();
    (MainQueue { tx }, MainPump { rx })
}

impl MainQueue {
    /// Posts a job to run on the pumping thread.
    ///
    /// Returns `false` if the pump has been dropped; the job is discarded.
    /// Posting to a torn-down UI is a normal shutdown race, not an error.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        if self.tx.send(Box::new(job)).is_err() {
            trace!("job posted after pump shutdown, discarded");
            return false;
        }
        true
    }
}

impl MainPump {
    /// Runs every job currently queued, in posting order, including jobs
    /// posted by the jobs themselves. Returns the number of jobs run.
    pub fn pump(&self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Blocks until one job arrives and runs it.
    ///
    /// Returns `false` when every [`MainQueue`] handle has been dropped.
    pub fn pump_one(&self) -> bool {
        match self.rx.recv() {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    /// Drains jobs until `cancel` fires or every posting handle is dropped.
    ///
    /// Jobs already queued when the cancel lands are still delivered, so
    /// in-flight completions are not dropped on shutdown.
    #[cfg(feature = "tokio")]
    pub async fn run(self, cancel: crate::CancellationToken) {
        loop {
            tokio::select! {
                job = self.rx.recv_async() => match job {
                    Ok(job) => job(),
                    Err(_) => return,
                },
                _ = cancel.cancelled() => break,
            }
        }
        self.pump();
    }
}
