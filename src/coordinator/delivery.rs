//! Callback delivery contexts
//!
//! Progress and completion callbacks never run on the thread that observed the
//! underlying event. The coordinator hands them to a [`DeliveryContext`],
//! which decides where they execute.

use crate::error::{Error, Result};

/// A unit of work queued on a delivery context
pub type DeliveryJob = Box<dyn FnOnce() + Send + 'static>;

/// Execution context on which all caller-facing callbacks run
///
/// Implementations must run jobs in the order they were dispatched.
pub trait DeliveryContext: Send + Sync {
    /// Queue a job for execution
    fn dispatch(&self, job: DeliveryJob);
}

/// Delivery context backed by one dedicated, named OS thread
///
/// Jobs run in FIFO order. A panicking job is logged and does not take the
/// thread down. The thread exits once the queue is dropped and the remaining
/// jobs have run.
pub struct DeliveryQueue {
    tx: tokio::sync::mpsc::UnboundedSender<DeliveryJob>,
    thread_name: String,
}

impl DeliveryQueue {
    /// Spawn the delivery thread
    pub fn new(thread_name: impl Into<String>) -> Result<Self> {
        let thread_name = thread_name.into();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DeliveryJob>();

        let name = thread_name.clone();
        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
                        tracing::error!(thread = %name, "Delivery job panicked");
                    }
                }
                tracing::debug!(thread = %name, "Delivery thread stopped");
            })
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to spawn delivery thread '{}': {}", thread_name, e),
                ))
            })?;

        Ok(Self { tx, thread_name })
    }

    /// Name of the delivery thread
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

impl DeliveryContext for DeliveryQueue {
    fn dispatch(&self, job: DeliveryJob) {
        if self.tx.send(job).is_err() {
            tracing::warn!(thread = %self.thread_name, "Delivery thread gone, dropping job");
        }
    }
}

/// Delivery context that runs every job on the dispatching thread
///
/// For hosts that already serialize callbacks themselves, and for tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateDelivery;

impl DeliveryContext for ImmediateDelivery {
    fn dispatch(&self, job: DeliveryJob) {
        job();
    }
}
