//! Strictly ordered execution of reporting operations.
//!
//! Every operation handed to [`RequestQueue::enqueue`] is sent to a single
//! driver task which runs them one after another in enqueue order. An
//! operation only starts once the previous one has settled, so at most one
//! request to the reporting API is in flight per queue.
//!
//! Each operation runs inside its own failure boundary: an `Err` or a panic is
//! logged and turned into `None`, and the driver moves on to the next one.

use crate::transport::ReporterResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type QueueTask = BoxFuture<'static, ()>;

#[derive(Debug, Clone)]
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<QueueTask>,
}

impl RequestQueue {
    /// Starts the driver task. Must be called within a Tokio runtime.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Self::drive(receiver));
        Self { sender }
    }

    async fn drive(mut receiver: mpsc::UnboundedReceiver<QueueTask>) {
        let mut settled: u64 = 0;
        while let Some(task) = receiver.recv().await {
            task.await;
            settled += 1;
        }
        debug!("Request queue closed after {} operations", settled);
    }

    /// Appends `operation` to the queue.
    ///
    /// The operation is registered immediately, so call order is execution
    /// order even if the returned future is polled later or dropped. The
    /// future resolves with the operation's value, or `None` if it failed.
    pub fn enqueue<F, Fut, T>(
        &self,
        label: &'static str,
        operation: F,
    ) -> impl Future<Output = Option<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ReporterResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        let task = async move {
            debug!("Running queued {}", label);
            let outcome = match AssertUnwindSafe(async move { operation().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Some(value),
                Ok(Err(e)) => {
                    error!("Reporting {} failed: {}", label, e);
                    None
                }
                Err(_) => {
                    error!("Reporting {} panicked", label);
                    None
                }
            };
            let _ = done_tx.send(outcome);
        }
        .boxed();

        let accepted = self.sender.send(task).is_ok();
        if !accepted {
            error!("Request queue is closed, dropping {}", label);
        }

        async move {
            if !accepted {
                return None;
            }
            done_rx.await.ok().flatten()
        }
    }

    /// Resolves once everything enqueued before this call has settled.
    pub fn flush(&self) -> impl Future<Output = ()> + Send + 'static {
        let done = self.enqueue("flush", || async { Ok(()) });
        async move {
            done.await;
        }
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
